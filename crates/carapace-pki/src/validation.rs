//! Certificate validation utilities.

use chrono::Utc;
use tracing::debug;
use x509_parser::prelude::*;

use crate::error::{Error, Result};
use crate::types::Certificate;

/// Validates a certificate against its issuing CA certificate.
///
/// This performs the following checks:
/// - The certificate is not expired
/// - The certificate is not yet valid (`not_before` check)
/// - The issuer matches the CA's subject
/// - The certificate was signed by the CA
///
/// # Errors
///
/// Returns an error if validation fails.
pub fn validate_certificate(cert: &Certificate, ca_cert: &Certificate) -> Result<()> {
    debug!("validating certificate: {}", cert.subject());

    if is_expired(cert) {
        return Err(Error::Expired);
    }
    if is_not_yet_valid(cert) {
        return Err(Error::NotYetValid);
    }

    if cert.issuer() != ca_cert.subject() {
        return Err(Error::Validation(format!(
            "issuer '{}' does not match CA subject '{}'",
            cert.issuer(),
            ca_cert.subject()
        )));
    }

    verify_signature(cert, ca_cert)?;

    debug!("certificate validated: {}", cert.subject());
    Ok(())
}

/// Validates a self-signed root certificate.
///
/// # Errors
///
/// Returns an error if the certificate is not self-signed or its
/// self-signature does not verify.
pub fn validate_self_signed(cert: &Certificate) -> Result<()> {
    if cert.issuer() != cert.subject() {
        return Err(Error::Validation("certificate is not self-signed".into()));
    }
    verify_signature(cert, cert)
}

/// Checks if a certificate is expired.
#[must_use]
pub fn is_expired(cert: &Certificate) -> bool {
    cert.not_after() < Utc::now()
}

/// Checks if a certificate is not yet valid.
#[must_use]
pub fn is_not_yet_valid(cert: &Certificate) -> bool {
    cert.not_before() > Utc::now()
}

/// Checks if a certificate is currently valid (not expired and `not_before` has passed).
#[must_use]
pub fn is_valid_now(cert: &Certificate) -> bool {
    !is_expired(cert) && !is_not_yet_valid(cert)
}

/// Calculates the remaining validity period.
///
/// Returns the duration until expiry, or None if already expired.
#[must_use]
pub fn remaining_validity(cert: &Certificate) -> Option<chrono::Duration> {
    let now = Utc::now();
    if cert.not_after() > now {
        Some(cert.not_after() - now)
    } else {
        None
    }
}

/// Verifies that a certificate was signed by the given issuer.
fn verify_signature(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    let (_, parsed_cert) = X509Certificate::from_der(cert.der())
        .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

    let (_, parsed_issuer) = X509Certificate::from_der(issuer.der())
        .map_err(|e| Error::Parse(format!("failed to parse issuer certificate: {e}")))?;

    parsed_cert
        .verify_signature(Some(parsed_issuer.public_key()))
        .map_err(|e| {
            Error::Validation(format!(
                "signature verification failed for '{}': {e:?}",
                cert.subject()
            ))
        })
}
