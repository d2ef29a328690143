//! # OIDC Test Utilities
//!
//! Shared test utilities for the pam-oidc workspace.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed Ed25519 keys for reproducible tests)
//! - An ID token claims builder (`TestTokenBuilder`)
//! - A mock OIDC issuer serving discovery and JWKS (`MockIssuer`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oidc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let issuer = MockIssuer::start().await;
//!
//!     let token = issuer.sign(
//!         issuer
//!             .token_builder()
//!             .for_subject("jdoe")
//!             .with_groups(&["eng"]),
//!     );
//!
//!     let args = issuer.args(&["authorized_groups=eng"]);
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
