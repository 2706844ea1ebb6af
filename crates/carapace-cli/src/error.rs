//! CLI error types.

use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// A PKI operation failed.
    #[error(transparent)]
    Pki(#[from] carapace_pki::Error),

    /// The user declined a confirmation prompt.
    #[error("aborted: {0}")]
    Aborted(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
