//! Core type definitions for nhub.
//!
//! This crate defines the plain data types shared by the client and the CLI:
//! - Registrations as the hub reports them
//! - Device tokens in their canonical upper-case hex form
//! - Registration-name and tag syntax
//!
//! Nothing here performs I/O.

mod name;
mod registration;
mod token;

pub use name::{validate_tag, validate_template_name, DEFAULT_REGISTRATION_NAME, MAX_TAG_LEN};
pub use registration::Registration;
pub use token::DeviceToken;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when building domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid device token: {0}")]
    InvalidDeviceToken(String),

    #[error("invalid registration name: {0}")]
    InvalidName(String),

    #[error("invalid tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: &'static str },
}
