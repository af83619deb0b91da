// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostic error types for configuration failures.
//!
//! Figment errors are flattened into one `ConfigError` per failing key so
//! the operator sees every problem in a single run, rendered through
//! miette at startup.

use miette::Diagnostic;
use thiserror::Error;

/// A single configuration problem, suitable for user-facing rendering.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The TOML/env input could not be deserialized into the model.
    #[error("{message}")]
    #[diagnostic(
        code(filaq::config::parse),
        help("check `filaq.toml` against the documented configuration keys")
    )]
    Parse { message: String },

    /// The input deserialized but violates a semantic constraint.
    #[error("{message}")]
    #[diagnostic(code(filaq::config::validation))]
    Validation { message: String },
}

/// Flatten a figment error (which may aggregate several failures) into
/// one `ConfigError` per underlying problem.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    err.into_iter()
        .map(|e| {
            let path = e.path.join(".");
            let message = if path.is_empty() {
                e.kind.to_string()
            } else {
                format!("`{path}`: {}", e.kind)
            };
            ConfigError::Parse { message }
        })
        .collect()
}

/// Render collected configuration errors to stderr.
///
/// Called by the binary before exiting with a non-zero status.
pub fn render_errors(errors: &[ConfigError]) {
    eprintln!(
        "filaq: configuration invalid ({} error{})",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    );
    for err in errors {
        eprintln!("  - {err}");
    }
}
