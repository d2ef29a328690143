//! OIDC claims authorization for local logins.
//!
//! A presented ID token is verified against the configured issuer, then a
//! policy decides whether its claims authorize the asserted local user:
//!
//! - the identity template rendered against the claims must equal the user
//! - if configured, the user must be in one of the authorized groups
//! - if configured, the token's `acr` must equal the required value
//!
//! [`policy::evaluate`] is the pure decision function;
//! [`Authenticator`] adds token verification in front of it, and [`host`]
//! wires both to process arguments, environment and standard input.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod authenticator;
pub mod claims;
pub mod config;
pub mod host;
pub mod oidc;
pub mod policy;
pub mod template;

pub use authenticator::Authenticator;
pub use claims::{ClaimValue, Claims, Scalar};
pub use config::{Config, ConfigError};
pub use policy::{Decision, DenyReason, GroupDenial, PolicyConfig};
