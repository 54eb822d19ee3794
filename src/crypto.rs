//! SHA-256 and HMAC-SHA256 helpers used by the SigV4 signer.

// crates.io
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, error::SigningError};

type HmacSha256 = Hmac<Sha256>;

/// Hex encoded SHA-256 hash of `content`.
pub fn hex_sha256(content: &[u8]) -> String {
	hex::encode(Sha256::digest(content))
}

/// HMAC-SHA256 of `content` under `key`.
pub fn hmac_sha256(key: &[u8], content: &[u8]) -> Result<Vec<u8>, SigningError> {
	let mut mac = HmacSha256::new_from_slice(key)?;

	mac.update(content);

	Ok(mac.finalize().into_bytes().to_vec())
}

/// Hex encoded HMAC-SHA256 of `content` under `key`.
pub fn hex_hmac_sha256(key: &[u8], content: &[u8]) -> Result<String, SigningError> {
	hmac_sha256(key, content).map(hex::encode)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn sha256_of_empty_input_matches_known_digest() {
		assert_eq!(
			hex_sha256(b""),
			"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
		);
	}

	#[test]
	fn hmac_matches_rfc_4231_case_two() {
		let mac = hex_hmac_sha256(b"Jefe", b"what do ya want for nothing?")
			.expect("HMAC should accept any key length.");

		assert_eq!(mac, "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
	}
}
