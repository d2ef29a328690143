//! Login helper glue.
//!
//! Drives one authentication attempt the way a PAM stack invokes the
//! helper (for example through `pam_exec` with `expose_authtok`): options as
//! `key=value` arguments, the asserted user from `PAM_USER`, and the token
//! on standard input. The attempt ends in one of four [`Outcome`]s, each
//! with a fixed exit code.

use crate::authenticator::Authenticator;
use crate::config::Config;
use crate::oidc::{self, DiscoveryError};
use crate::policy::{Decision, DenyReason};
use common::secret::SecretString;
use std::io::{self, Read};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Environment variable carrying the asserted username.
pub const USER_ENV_VAR: &str = "PAM_USER";

/// Upper bound on bytes read from the token input.
///
/// Twice the verifier's limit ([`common::jwt::MAX_JWT_SIZE_BYTES`], 64KB),
/// so an oversized token still reaches the verifier whole and is rejected
/// as too large rather than as a truncated, malformed token.
const MAX_TOKEN_INPUT_BYTES: u64 = 128 * 1024;

/// Result of one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The token authorizes the user.
    Success,
    /// Authentication denied, or the issuer could not be reached.
    AuthError,
    /// Configuration or local service failure.
    ServiceError,
    /// No user was asserted.
    UserUnknown,
}

impl Outcome {
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::AuthError => 1,
            Outcome::ServiceError => 2,
            Outcome::UserUnknown => 3,
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.exit_code())
    }
}

/// Read a token from `input`, dropping trailing NUL, CR and LF bytes.
///
/// # Errors
///
/// Returns an I/O error if the input cannot be read or is not UTF-8.
pub fn read_token(input: impl Read) -> io::Result<SecretString> {
    let mut raw = String::new();
    input.take(MAX_TOKEN_INPUT_BYTES).read_to_string(&mut raw)?;
    let token = raw.trim_end_matches(['\0', '\r', '\n']);
    Ok(SecretString::from(token))
}

/// Run one login attempt.
///
/// Options are parsed and validated before anything else, so configuration
/// errors never reach the network.
pub async fn run<I, S>(args: I, user: Option<&str>, token_input: impl Read) -> Outcome
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let config = match Config::from_args(args).and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(e) => {
            error!(target: "pam_oidc.host", error = %e, "Invalid module options");
            return Outcome::ServiceError;
        }
    };

    let Some(user) = user.filter(|u| !u.is_empty()) else {
        warn!(target: "pam_oidc.host", "No user asserted");
        return Outcome::UserUnknown;
    };

    let token = match read_token(token_input) {
        Ok(token) => token,
        Err(e) => {
            error!(target: "pam_oidc.host", error = %e, "Failed to read token");
            return Outcome::ServiceError;
        }
    };

    let authenticator = match build_authenticator(&config).await {
        Ok(authenticator) => authenticator,
        Err(e @ DiscoveryError::HttpClient(_)) => {
            error!(target: "pam_oidc.host", error = %e, "Failed to set up HTTP client");
            return Outcome::ServiceError;
        }
        Err(e) => {
            error!(target: "pam_oidc.host", issuer = %config.issuer, error = %e, "Issuer discovery failed");
            return Outcome::AuthError;
        }
    };

    match authenticator.authenticate(user, &token).await {
        Decision::Accept => {
            info!(target: "pam_oidc.host", user = %user, "Authenticated");
            Outcome::Success
        }
        Decision::Deny(DenyReason::TokenInvalid(e)) if e.is_unavailable() => {
            error!(target: "pam_oidc.host", issuer = %config.issuer, error = %e, "Issuer keys unavailable");
            Outcome::AuthError
        }
        Decision::Deny(reason) => {
            warn!(target: "pam_oidc.host", user = %user, reason = %reason, "Authentication denied");
            Outcome::AuthError
        }
    }
}

/// Discover the configured issuer and bind its verifier to the policy.
///
/// # Errors
///
/// Returns a [`DiscoveryError`] if the HTTP client cannot be built or the
/// issuer cannot be discovered.
pub async fn build_authenticator(config: &Config) -> Result<Authenticator, DiscoveryError> {
    let http_client = oidc::build_http_client(config.http_proxy.as_deref())?;
    let verifier = oidc::discover(&config.issuer, http_client)
        .await?
        .with_clock_skew(config.clock_skew);

    Ok(Authenticator::new(
        Arc::new(verifier),
        config.aud.clone(),
        config.policy(),
    ))
}
