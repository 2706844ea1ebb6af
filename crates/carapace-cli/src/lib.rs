//! # carapace-cli
//!
//! Carapace command-line interface.
//!
//! Provides commands for:
//! - PKI directory initialization
//! - CA creation (self-signed root or subordinate-CA request)
//! - Certificate request generation
//! - Request signing under a template policy
//!
//! All state lives in the PKI directory selected with `--pki-dir`;
//! the binary itself is stateless between invocations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::{Algo, Cli, Commands, EntityArg, SubjectArgs};
pub use commands::{BuildCaCommand, GenReqCommand, InitPkiCommand, SignReqCommand};
pub use error::CliError;
