//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Bearer tokens
//! presented at login travel as [`SecretString`] from the moment they are
//! read until the verifier needs the raw bytes.
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` around a token cannot leak it through `{:?}` or tracing fields.
//! The value is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginAttempt {
//!     user: String,
//!     token: SecretString,
//! }
//!
//! let attempt = LoginAttempt {
//!     user: "jdoe".to_string(),
//!     token: SecretString::from("eyJhbGciOi..."),
//! };
//!
//! assert!(!format!("{attempt:?}").contains("eyJhbGciOi"));
//! let raw: &str = attempt.token.expose_secret();
//! assert!(raw.starts_with("eyJ"));
//! ```

pub use secrecy::{ExposeSecret, SecretString};
