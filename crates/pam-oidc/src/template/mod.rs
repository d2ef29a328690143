//! Identity templates.
//!
//! An identity template maps verified claims to the local username the
//! token is allowed to log in as. The language is the subset of Go-style
//! `text/template` that operators already write for this option:
//!
//! ```text
//! {{.Subject}}
//! {{ .Subject | trimSuffix "@example.com" }}
//! {{ index .Extra "preferred_username" }}
//! ```
//!
//! Templates are parsed once into an [`IdentityTemplate`] so syntax errors
//! surface before any claims are seen. Rendering is pure: it reads the
//! claims, never mutates them, and has no side effects.

mod eval;
mod lexer;
mod parser;

use crate::claims::Claims;
use parser::Node;
use thiserror::Error;

/// Template used when none is configured.
pub const DEFAULT_USER_TEMPLATE: &str = "{{.Subject}}";

/// Errors raised while parsing or rendering an identity template.
///
/// Messages reference template syntax (field names, keys, types) and never
/// the values of claims.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("parsing user template: {0}")]
    Parse(String),

    #[error("executing user template: {0}")]
    Exec(String),
}

/// A parsed identity template.
#[derive(Debug, Clone)]
pub struct IdentityTemplate {
    nodes: Vec<Node>,
}

impl IdentityTemplate {
    /// Parse a template. An empty source parses as [`DEFAULT_USER_TEMPLATE`].
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Parse`] for malformed syntax, unknown
    /// functions or unsupported keywords.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let source = if source.is_empty() {
            DEFAULT_USER_TEMPLATE
        } else {
            source
        };
        let nodes = parser::parse(lexer::lex(source)?)?;
        Ok(Self { nodes })
    }

    /// Render against `claims`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Exec`] when the template references a field
    /// or key the claims do not carry, or produces a value with no textual
    /// form.
    pub fn render(&self, claims: &Claims) -> Result<String, TemplateError> {
        eval::execute(&self.nodes, claims)
    }
}

/// Parse `template` and render it against `claims` in one step.
///
/// # Errors
///
/// Returns any parse or execution error from [`IdentityTemplate`].
pub fn render(template: &str, claims: &Claims) -> Result<String, TemplateError> {
    IdentityTemplate::parse(template)?.render(claims)
}
