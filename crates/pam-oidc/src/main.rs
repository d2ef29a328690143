//! pam-oidc
//!
//! Login helper that authorizes a local user with an OIDC ID token.
//!
//! ```text
//! auth required pam_exec.so expose_authtok quiet /usr/local/bin/pam-oidc \
//!     issuer=https://idp.example.com aud=login authorized_groups=eng
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to change the level.

use pam_oidc::host::{self, Outcome, USER_ENV_VAR};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pam_oidc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let user = std::env::var(USER_ENV_VAR).ok();

    let outcome: Outcome = host::run(&args, user.as_deref(), std::io::stdin().lock()).await;
    outcome.into()
}
