//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use carapace_pki::{
    EntityType, KeyAlgorithm, PkiConfig, SerialMode, Subject, Template,
};

use crate::error::CliError;

/// Carapace CLI - certificate authority management.
#[derive(Parser, Debug, Clone)]
#[command(name = "carapace")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// PKI directory to operate on.
    #[arg(long, env = "CARAPACE_PKI_DIR", default_value = "./pki")]
    pub pki_dir: PathBuf,

    /// Extension template (vpn, ssl, or mdm).
    #[arg(short, long, env = "CARAPACE_TEMPLATE", default_value = "vpn")]
    pub template: String,

    /// Key algorithm for fresh key pairs.
    #[arg(long, value_enum, default_value_t = Algo::Rsa)]
    pub algo: Algo,

    /// RSA key size in bits. Ignored with `--algo ec`.
    #[arg(long, default_value_t = 2048)]
    pub keysize: u32,

    /// Certificate validity in days.
    #[arg(long, default_value_t = 3650)]
    pub days: u32,

    /// Allocate random 128-bit serials instead of sequential ones.
    #[arg(long)]
    pub random_serials: bool,

    /// Never prompt; operations that would ask for confirmation fail.
    #[arg(long)]
    pub batch: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Key algorithm options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Algo {
    /// RSA at the configured `--keysize`.
    #[default]
    Rsa,
    /// ECDSA over P-256.
    Ec,
}

impl std::fmt::Display for Algo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rsa => write!(f, "rsa"),
            Self::Ec => write!(f, "ec"),
        }
    }
}

/// Entity type options for `sign-req`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityArg {
    /// Client (user/device) certificate.
    Client,
    /// Server certificate.
    Server,
}

impl From<EntityArg> for EntityType {
    fn from(arg: EntityArg) -> Self {
        match arg {
            EntityArg::Client => Self::Client,
            EntityArg::Server => Self::Server,
        }
    }
}

/// Optional distinguished-name attributes shared by subject-bearing
/// subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct SubjectArgs {
    /// Country (C) attribute.
    #[arg(long)]
    pub country: Option<String>,

    /// State or province (ST) attribute.
    #[arg(long)]
    pub province: Option<String>,

    /// Locality (L) attribute.
    #[arg(long)]
    pub locality: Option<String>,

    /// Organization (O) attribute.
    #[arg(long = "org")]
    pub organization: Option<String>,

    /// Organizational unit (OU) attribute.
    #[arg(long = "ou")]
    pub organizational_unit: Option<String>,
}

impl SubjectArgs {
    /// Builds a subject from the common name and any supplied attributes.
    #[must_use]
    pub fn to_subject(&self, common_name: &str) -> Subject {
        let mut subject = Subject::new(common_name);
        if let Some(v) = &self.country {
            subject = subject.country(v);
        }
        if let Some(v) = &self.province {
            subject = subject.province(v);
        }
        if let Some(v) = &self.locality {
            subject = subject.locality(v);
        }
        if let Some(v) = &self.organization {
            subject = subject.organization(v);
        }
        if let Some(v) = &self.organizational_unit {
            subject = subject.organizational_unit(v);
        }
        subject
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize (or re-initialize) the PKI directory.
    InitPki,

    /// Build a self-signed root CA, or a subordinate-CA request.
    BuildCa {
        /// CA common name.
        #[arg(default_value = "Carapace CA")]
        common_name: String,

        /// Build a subordinate-CA request instead of a self-signed root.
        #[arg(long)]
        subca: bool,

        /// Leave the CA key unencrypted.
        #[arg(long)]
        nopass: bool,

        /// Distinguished-name attributes.
        #[command(flatten)]
        subject: SubjectArgs,
    },

    /// Generate a key pair and certificate request.
    GenReq {
        /// Common name for the request.
        common_name: String,

        /// Leave the private key unencrypted.
        #[arg(long)]
        nopass: bool,

        /// Distinguished-name attributes.
        #[command(flatten)]
        subject: SubjectArgs,
    },

    /// Sign a stored request into a certificate.
    SignReq {
        /// Entity type for the issued certificate.
        #[arg(value_enum)]
        entity: EntityArg,

        /// Common name of the stored request.
        common_name: String,

        /// Distinguished-name attributes for the issued certificate.
        #[command(flatten)]
        subject: SubjectArgs,
    },
}

impl Cli {
    /// Builds the engine configuration from the parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown template names.
    pub fn to_config(&self) -> Result<PkiConfig, CliError> {
        let template = Template::from_name(&self.template)?;
        let key_algorithm = match self.algo {
            Algo::Rsa => KeyAlgorithm::Rsa(self.keysize),
            Algo::Ec => KeyAlgorithm::EcdsaP256,
        };
        let serial_mode = if self.random_serials {
            SerialMode::Random
        } else {
            SerialMode::Sequential
        };
        let (subca, nopass) = match &self.command {
            Commands::BuildCa { subca, nopass, .. } => (*subca, *nopass),
            Commands::GenReq { nopass, .. } => (false, *nopass),
            _ => (false, false),
        };

        Ok(PkiConfig {
            pki_dir: self.pki_dir.clone(),
            template,
            key_algorithm,
            days: self.days,
            serial_mode,
            subca,
            nopass,
        })
    }
}
