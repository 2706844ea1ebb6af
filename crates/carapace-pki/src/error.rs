//! PKI error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::EntityType;

/// Result type for PKI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// PKI error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// The PKI directory does not exist or is not a directory.
    #[error("PKI directory not initialized: {0}")]
    NotInitialized(PathBuf),

    /// `init` was called on an existing PKI directory without force.
    #[error("PKI directory already exists: {0}")]
    AlreadyInitialized(PathBuf),

    /// A signing operation was attempted before `build-ca`.
    #[error("no certificate authority found in {0}")]
    NoCertificateAuthority(PathBuf),

    /// No stored certificate request for the given common name.
    #[error("no certificate request found for '{0}'")]
    RequestNotFound(String),

    /// The stored CSR failed parsing or self-signature verification.
    #[error("invalid certificate request: {0}")]
    InvalidRequest(String),

    /// The template has no policy for the requested entity type.
    #[error("template '{template}' does not support entity type '{entity}'")]
    UnsupportedEntityType {
        /// Name of the active template.
        template: &'static str,
        /// The unsupported entity type.
        entity: EntityType,
    },

    /// The serial counter or ledger file is unreadable or unparsable.
    #[error("serial ledger corrupt: {0}")]
    LedgerCorrupt(String),

    /// No common name supplied where one is required.
    #[error("missing common name")]
    MissingIdentity,

    /// A name that cannot be used as an on-disk artifact name.
    #[error("invalid name '{0}': must not be empty or contain path separators")]
    InvalidName(String),

    /// No template registered under the configured name.
    #[error("unknown template '{0}' (known: vpn, ssl, mdm)")]
    UnknownTemplate(String),

    /// The configured template does not match the one this PKI was initialized with.
    #[error("template mismatch: PKI was initialized with '{expected}', got '{requested}'")]
    TemplateMismatch {
        /// Template recorded in the PKI metadata.
        expected: String,
        /// Template supplied by the caller.
        requested: String,
    },

    /// The certificate's `notAfter` is in the past.
    #[error("certificate has expired")]
    Expired,

    /// The certificate's `notBefore` is in the future.
    #[error("certificate is not yet valid")]
    NotYetValid,

    /// A certificate failed validation against its issuing CA.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Key or certificate generation failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Certificate, CSR, or key parsing failed.
    #[error("parsing failed: {0}")]
    Parse(String),

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
