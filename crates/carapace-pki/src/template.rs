//! Template policies.
//!
//! A template decides which X.509v3 extensions and key-usage bits
//! apply to a CA, a request, or a signed certificate of a given
//! entity type. Templates are a closed set selected by name at
//! configuration time; they differ only in the extensions they
//! attach, never in control flow.

use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, ExtendedKeyUsagePurpose, IsCa,
    KeyUsagePurpose,
};

use crate::error::{Error, Result};
use crate::types::EntityType;

/// Apple MDM certificate signing marker extension.
const APPLE_MDM_SIGNING_OID: &[u64] = &[1, 2, 840, 113_635, 100, 6, 10, 2];

/// A named extension policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// Conservative VPN-peer policy (the default).
    Vpn,
    /// TLS server/client policy.
    Ssl,
    /// Mobile-device-management identity policy.
    Mdm,
}

impl Template {
    /// Looks up a template by its configured name.
    ///
    /// Unknown names fail fast with [`Error::UnknownTemplate`] rather
    /// than at first use.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "vpn" => Ok(Self::Vpn),
            "ssl" => Ok(Self::Ssl),
            "mdm" => Ok(Self::Mdm),
            other => Err(Error::UnknownTemplate(other.to_string())),
        }
    }

    /// Returns the template's configured name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vpn => "vpn",
            Self::Ssl => "ssl",
            Self::Mdm => "mdm",
        }
    }

    /// Applies the CA extension set for a `build-ca` operation.
    ///
    /// Every template marks the certificate as a CA with at least
    /// `keyCertSign` and `cRLSign`; the subject and authority key
    /// identifiers are attached at signing time from the CA key.
    pub fn apply_build_ca(self, params: &mut CertificateParams) {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.use_authority_key_identifier_extension = true;
        params.key_usages = match self {
            Self::Vpn | Self::Mdm => {
                vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign]
            }
            Self::Ssl => vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyCertSign,
                KeyUsagePurpose::CrlSign,
            ],
        };
    }

    /// Applies the extension-request set for a `gen-req` operation.
    ///
    /// None of the built-in templates solicit extensions in the CSR.
    pub fn apply_gen_req(self, _params: &mut CertificateParams) {}

    /// Applies the leaf extension set for a `sign-req` operation.
    ///
    /// The authority key identifier is derived from the signing CA's
    /// own key, never regenerated independently.
    pub fn apply_sign_req(self, entity: EntityType, params: &mut CertificateParams) -> Result<()> {
        params.is_ca = IsCa::ExplicitNoCa;
        params.use_authority_key_identifier_extension = true;
        params.custom_extensions.clear();

        match (self, entity) {
            (Self::Vpn, EntityType::Client) => {
                params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
                params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
            }
            (Self::Vpn, EntityType::Server) => {
                params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
                params.key_usages = vec![
                    KeyUsagePurpose::DigitalSignature,
                    KeyUsagePurpose::KeyEncipherment,
                ];
            }
            (Self::Ssl, EntityType::Client) => {
                params.extended_key_usages = vec![
                    ExtendedKeyUsagePurpose::ClientAuth,
                    ExtendedKeyUsagePurpose::ServerAuth,
                ];
                params.key_usages = vec![
                    KeyUsagePurpose::DigitalSignature,
                    KeyUsagePurpose::KeyEncipherment,
                ];
            }
            (Self::Ssl, EntityType::Server) => {
                params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
                params.key_usages = vec![
                    KeyUsagePurpose::DigitalSignature,
                    KeyUsagePurpose::KeyEncipherment,
                ];
            }
            (Self::Mdm, EntityType::Client) => {
                params.extended_key_usages = vec![
                    ExtendedKeyUsagePurpose::ServerAuth,
                    ExtendedKeyUsagePurpose::ClientAuth,
                ];
                params.key_usages = vec![
                    KeyUsagePurpose::DigitalSignature,
                    KeyUsagePurpose::KeyEncipherment,
                ];
                // DER NULL content; the marker's presence is what MDM checks.
                params
                    .custom_extensions
                    .push(CustomExtension::from_oid_content(
                        APPLE_MDM_SIGNING_OID,
                        vec![0x05, 0x00],
                    ));
            }
            (Self::Mdm, entity) => {
                return Err(Error::UnsupportedEntityType {
                    template: self.name(),
                    entity,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
