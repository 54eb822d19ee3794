//! Credential models: redacted secrets, OAuth bearer token sets, and AWS credentials.

pub mod aws;
pub mod bearer;
pub mod secret;

pub use aws::*;
pub use bearer::*;
pub use secret::*;
