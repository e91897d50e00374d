//! Credential models: the caller-supplied credential set, redacted secrets, and access tokens.

pub mod access;
pub mod credentials;
pub mod secret;

pub use access::*;
pub use credentials::*;
pub use secret::*;
