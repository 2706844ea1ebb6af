//! Certificate authority management for Carapace.
#![forbid(unsafe_code)]
//!
//! This crate provides directory-backed certificate authority
//! management: initializing a PKI directory, building a self-signed
//! root (or a subordinate-CA request), generating certificate
//! requests, and signing them into template-shaped certificates with
//! a serial ledger recording every issuance.
//!
//! # Overview
//!
//! The `carapace-pki` crate enables:
//! - Initializing and laying out a PKI directory
//! - Building a self-signed root CA or a subordinate-CA request
//! - Generating key pairs and certificate signing requests
//! - Signing stored requests under a named template policy
//! - Tracking issued certificates in a serial ledger
//!
//! # Example
//!
//! ```no_run
//! use carapace_pki::{EntityType, IssuanceEngine, PkiConfig, Subject};
//!
//! let engine = IssuanceEngine::new(PkiConfig::default());
//!
//! // Lay out the PKI directory and build the root CA.
//! engine.init_pki(false).unwrap();
//! engine.build_ca(&Subject::new("Example Root CA"), None).unwrap();
//!
//! // Generate a request and sign it as a client certificate.
//! engine.gen_req(&Subject::new("alice"), None).unwrap();
//! let issued = engine
//!     .sign_req(EntityType::Client, &Subject::new("alice"), None)
//!     .unwrap();
//! println!("issued {}", issued.certificate.serial());
//! ```
//!
//! # Modules
//!
//! - [`engine`] - The issuance engine orchestrating all operations
//! - [`template`] - Named X.509v3 extension policies
//! - [`store`] - PKI directory layout and file persistence
//! - [`ledger`] - Serial allocation and the issuance ledger
//! - [`keys`] - Key-pair generation
//! - [`validation`] - Certificate validation utilities
//! - [`types`] - Core types (Certificate, `PrivateKey`, etc.)
//! - [`error`] - Error types

pub mod engine;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod store;
pub mod template;
pub mod types;
pub mod validation;

// Re-export commonly used types at crate root
pub use engine::{CaOutcome, GeneratedRequest, IssuanceEngine, IssuedCertificate, PkiConfig};
pub use error::{Error, Result};
pub use keys::KeyAlgorithm;
pub use ledger::{LedgerEntry, SerialLedger, SerialMode};
pub use store::{PkiMeta, PkiStore};
pub use template::Template;
pub use types::{Certificate, EntityType, PrivateKey, Serial, Subject};
pub use validation::{
    is_expired, is_not_yet_valid, is_valid_now, remaining_validity, validate_certificate,
    validate_self_signed,
};
