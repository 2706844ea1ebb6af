//! Key-pair generation.
//!
//! The issuance engine only needs "give me a fresh asymmetric key
//! pair"; this module provides that capability as a closed algorithm
//! enum producing [`rcgen::KeyPair`] values ready for signing.

use rcgen::KeyPair;
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use tracing::debug;

use crate::error::{Error, Result};

/// Supported key algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA with the given modulus length in bits.
    Rsa(u32),
    /// ECDSA over P-256. Faster to generate; used heavily by tests.
    EcdsaP256,
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        Self::Rsa(2048)
    }
}

impl KeyAlgorithm {
    /// Generates a fresh key pair for this algorithm.
    pub fn generate(self) -> Result<KeyPair> {
        match self {
            Self::Rsa(bits) => generate_rsa(bits),
            Self::EcdsaP256 => KeyPair::generate()
                .map_err(|e| Error::Generation(format!("failed to generate key pair: {e}"))),
        }
    }
}

/// Generates an RSA key pair and imports it into rcgen as PKCS#8 DER.
fn generate_rsa(bits: u32) -> Result<KeyPair> {
    // The signing backend only accepts 2048-8192 bit RSA keys.
    if !(2048..=8192).contains(&bits) {
        return Err(Error::Generation(format!(
            "unsupported RSA key size {bits}: must be between 2048 and 8192 bits"
        )));
    }

    debug!(bits, "generating RSA key pair");

    let key = RsaPrivateKey::new(&mut rand::thread_rng(), bits as usize)
        .map_err(|e| Error::Generation(format!("failed to generate RSA key: {e}")))?;
    let der = key
        .to_pkcs8_der()
        .map_err(|e| Error::Generation(format!("failed to encode RSA key: {e}")))?;

    KeyPair::try_from(der.as_bytes())
        .map_err(|e| Error::Generation(format!("failed to load RSA key: {e}")))
}
