//! The issuance engine.
//!
//! Orchestrates CA creation, request generation, and request signing
//! over the store, ledger, template, and key provider. The engine
//! itself holds no mutable state: CA material is loaded into a value
//! scoped to a single signing call, and the PKI directory is only
//! mutated as the terminal side effect of a successful operation.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use rcgen::{CertificateParams, CertificateSigningRequestParams, KeyPair};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::keys::KeyAlgorithm;
use crate::ledger::{SerialLedger, SerialMode};
use crate::store::{PkiMeta, PkiStore};
use crate::template::Template;
use crate::types::{Certificate, EntityType, PrivateKey, Serial, Subject};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct PkiConfig {
    /// PKI root directory.
    pub pki_dir: PathBuf,
    /// Active template policy.
    pub template: Template,
    /// Key algorithm for fresh key pairs.
    pub key_algorithm: KeyAlgorithm,
    /// Validity length in days for CA and issued certificates.
    pub days: u32,
    /// Leaf serial allocation strategy, persisted at CA-build time.
    pub serial_mode: SerialMode,
    /// Build a subordinate-CA request instead of a self-signed root.
    pub subca: bool,
    /// Skip private-key encryption. Accepted and recorded; keys are
    /// currently always written unencrypted (reserved).
    pub nopass: bool,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            pki_dir: PathBuf::from("./pki"),
            template: Template::Vpn,
            key_algorithm: KeyAlgorithm::default(),
            days: 3650,
            serial_mode: SerialMode::Sequential,
            subca: false,
            nopass: false,
        }
    }
}

/// Outcome of a `build-ca` operation.
#[derive(Debug)]
pub enum CaOutcome {
    /// A self-signed root CA was created.
    Root {
        /// The CA certificate.
        certificate: Certificate,
        /// Path of the published CA certificate.
        certificate_path: PathBuf,
    },
    /// A subordinate-CA request was created instead of a root.
    SubCaRequest(GeneratedRequest),
}

/// Artifacts of a `gen-req` operation.
#[derive(Debug)]
pub struct GeneratedRequest {
    /// Path of the CSR.
    pub request_path: PathBuf,
    /// Path of the private key.
    pub key_path: PathBuf,
}

/// Artifacts of a `sign-req` operation.
#[derive(Debug)]
pub struct IssuedCertificate {
    /// The issued certificate.
    pub certificate: Certificate,
    /// Path of the certificate under its common-name lookup.
    pub certificate_path: PathBuf,
}

/// CA material loaded for one signing call, never retained.
struct CaMaterial {
    /// Issuer descriptor rebuilt from the stored CA certificate.
    issuer: rcgen::Certificate,
    /// The CA signing key.
    key: KeyPair,
}

/// Certificate authority management engine.
#[derive(Debug)]
pub struct IssuanceEngine {
    config: PkiConfig,
    store: PkiStore,
    ledger: SerialLedger,
}

impl IssuanceEngine {
    /// Creates an engine for the configured PKI directory.
    #[must_use]
    pub fn new(config: PkiConfig) -> Self {
        let store = PkiStore::new(&config.pki_dir);
        let ledger = SerialLedger::new(&config.pki_dir);
        Self {
            config,
            store,
            ledger,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &PkiConfig {
        &self.config
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &PkiStore {
        &self.store
    }

    /// Returns the underlying ledger.
    #[must_use]
    pub fn ledger(&self) -> &SerialLedger {
        &self.ledger
    }

    /// Initializes the PKI directory.
    ///
    /// Fails with [`Error::AlreadyInitialized`] if the directory exists
    /// and `force` is false; callers may resolve that interactively and
    /// retry with `force`. Records the active template in the PKI
    /// metadata.
    pub fn init_pki(&self, force: bool) -> Result<PathBuf> {
        self.store.init(force)?;
        self.store.write_metadata(&PkiMeta {
            template: self.config.template.name().to_string(),
            serial_mode: None,
            created_at: Utc::now(),
        })?;
        info!(dir = %self.store.root().display(), template = %self.config.template, "init-pki complete");
        Ok(self.store.root().to_path_buf())
    }

    /// Creates the CA for this PKI directory.
    ///
    /// With `subca` configured, a CA key pair and CA-style request are
    /// produced instead of a self-signed root. Otherwise the root is
    /// self-signed with SHA-256-family parameters and persisted along
    /// with a fresh ledger and a counter seeded at `01`.
    ///
    /// Calling this twice overwrites the existing CA silently; callers
    /// must guard against accidental re-issuance.
    pub fn build_ca(&self, subject: &Subject, serial: Option<Serial>) -> Result<CaOutcome> {
        self.store.verify_ready()?;
        self.check_template()?;
        subject.validate()?;

        info!(common_name = %subject.common_name, template = %self.config.template, "building CA");
        let key = self.config.key_algorithm.generate()?;
        let key_pem = PrivateKey::new(key.serialize_der()).pem();

        let mut params = CertificateParams::default();
        params.distinguished_name = subject.to_distinguished_name();
        self.config.template.apply_build_ca(&mut params);

        if self.config.subca {
            let csr = params
                .serialize_request(&key)
                .map_err(|e| Error::Generation(format!("failed to build sub-CA request: {e}")))?;
            let csr_pem = csr
                .pem()
                .map_err(|e| Error::Generation(format!("failed to encode sub-CA request: {e}")))?;
            self.store.write_request("ca", &csr_pem, &key_pem)?;
            info!(path = %self.store.request_path("ca").display(), "sub-CA request created");
            return Ok(CaOutcome::SubCaRequest(GeneratedRequest {
                request_path: self.store.request_path("ca"),
                key_path: self.store.private_key_path("ca"),
            }));
        }

        self.store.ensure_issued_layout()?;

        let ca_serial = match serial {
            Some(serial) => serial,
            None => Serial::random(16),
        };
        params.serial_number = Some(rcgen::SerialNumber::from(ca_serial.to_bytes()));
        let (not_before, not_after) = validity_window(self.config.days)?;
        params.not_before = not_before;
        params.not_after = not_after;

        let cert = params
            .self_signed(&key)
            .map_err(|e| Error::Generation(format!("failed to self-sign CA certificate: {e}")))?;
        let certificate = Certificate::from_der(cert.der())?;

        // Persist CA material, then seed ledger state and record the
        // serial allocation strategy for the directory's lifetime.
        self.store.write_ca(&cert.pem(), &key_pem)?;
        self.ledger.seed()?;
        let mut meta = self.store.load_metadata()?.unwrap_or_else(|| PkiMeta {
            template: self.config.template.name().to_string(),
            serial_mode: None,
            created_at: Utc::now(),
        });
        meta.serial_mode = Some(self.config.serial_mode);
        self.store.write_metadata(&meta)?;

        info!(
            common_name = %subject.common_name,
            serial = %certificate.serial(),
            "build-ca complete"
        );
        Ok(CaOutcome::Root {
            certificate,
            certificate_path: self.store.ca_cert_path(),
        })
    }

    /// Generates a key pair and certificate request for an entity.
    ///
    /// Does not require a CA. An existing private key PEM may be
    /// supplied to re-request over a previously generated key.
    pub fn gen_req(
        &self,
        subject: &Subject,
        existing_key_pem: Option<&str>,
    ) -> Result<GeneratedRequest> {
        self.store.verify_ready()?;
        self.check_template()?;
        subject.validate()?;

        let key = match existing_key_pem {
            Some(pem) => KeyPair::from_pem(pem)
                .map_err(|e| Error::Parse(format!("failed to parse supplied key: {e}")))?,
            None => self.config.key_algorithm.generate()?,
        };
        let key_pem = PrivateKey::new(key.serialize_der()).pem();

        let mut params = CertificateParams::default();
        params.distinguished_name = subject.to_distinguished_name();
        self.config.template.apply_gen_req(&mut params);

        let csr = params
            .serialize_request(&key)
            .map_err(|e| Error::Generation(format!("failed to build request: {e}")))?;
        let csr_pem = csr
            .pem()
            .map_err(|e| Error::Generation(format!("failed to encode request: {e}")))?;

        self.store
            .write_request(&subject.common_name, &csr_pem, &key_pem)?;

        info!(common_name = %subject.common_name, "gen-req complete");
        Ok(GeneratedRequest {
            request_path: self.store.request_path(&subject.common_name),
            key_path: self.store.private_key_path(&subject.common_name),
        })
    }

    /// Signs a stored certificate request into an issued certificate.
    ///
    /// Steps, each a precondition for the next: verify the store is
    /// ready, load CA material, load and authenticate the CSR (its
    /// self-signature is the sole authentication check), allocate a
    /// serial, build and sign the certificate, persist it under both
    /// lookup paths, and commit the ledger entry last. Any failure
    /// before the persistence step leaves no durable artifact; a
    /// failure at the ledger commit removes the just-written
    /// certificate files again, so the ledger-to-certificate count
    /// invariant holds and a retry is safe under a fresh serial.
    pub fn sign_req(
        &self,
        entity: EntityType,
        subject: &Subject,
        serial: Option<Serial>,
    ) -> Result<IssuedCertificate> {
        self.store.verify_ready()?;
        self.check_template()?;
        subject.validate()?;
        let common_name = subject.common_name.as_str();

        let ca = self.load_ca()?;

        let csr_pem = self.store.read_request(common_name)?;
        verify_csr_signature(&csr_pem)?;
        let mut csr_params = CertificateSigningRequestParams::from_pem(&csr_pem)
            .map_err(|e| Error::InvalidRequest(format!("failed to parse request: {e}")))?;

        let mode = self.serial_mode()?;
        let allocated = self.ledger.allocate(mode, serial)?;
        debug!(common_name, serial = %allocated, mode = mode_name(mode), "allocated serial");

        csr_params.params.serial_number = Some(rcgen::SerialNumber::from(allocated.to_bytes()));
        csr_params.params.distinguished_name = subject.to_distinguished_name();
        let (not_before, not_after) = validity_window(self.config.days)?;
        csr_params.params.not_before = not_before;
        csr_params.params.not_after = not_after;
        self.config
            .template
            .apply_sign_req(entity, &mut csr_params.params)?;

        let cert = csr_params
            .signed_by(&ca.issuer, &ca.key)
            .map_err(|e| Error::Generation(format!("failed to sign certificate: {e}")))?;
        let certificate = Certificate::from_der(cert.der())?;
        let key_id = certificate
            .extensions()
            .subject_key_id
            .clone()
            .unwrap_or_default();

        // Persistence: certificate files first, ledger commit strictly
        // last. A commit failure takes the certificate files back out;
        // otherwise the orphans would never be reconciled (a random-mode
        // retry allocates a fresh serial).
        self.store.ensure_issued_layout()?;
        self.store
            .write_issued(common_name, &allocated, &cert.pem())?;
        if let Err(e) = self
            .ledger
            .commit(mode, &allocated, &key_id, &subject.one_line())
        {
            self.store.remove_issued(common_name, &allocated);
            return Err(e);
        }

        info!(common_name, entity = %entity, serial = %allocated, "sign-req complete");
        Ok(IssuedCertificate {
            certificate,
            certificate_path: self.store.issued_path(common_name),
        })
    }

    /// Loads CA material for a single signing call.
    fn load_ca(&self) -> Result<CaMaterial> {
        let ca_pem = self.store.read_ca_cert()?;
        let key_pem = self.store.read_ca_key()?;

        let key = KeyPair::from_pem(&key_pem)
            .map_err(|e| Error::Parse(format!("failed to parse CA key: {e}")))?;
        let issuer_params = CertificateParams::from_ca_cert_pem(&ca_pem)
            .map_err(|e| Error::Parse(format!("failed to parse CA certificate: {e}")))?;
        let issuer = issuer_params
            .self_signed(&key)
            .map_err(|e| Error::Generation(format!("failed to rebuild issuer: {e}")))?;

        Ok(CaMaterial { issuer, key })
    }

    /// Validates the configured template against the persisted one.
    fn check_template(&self) -> Result<()> {
        if let Some(meta) = self.store.load_metadata()? {
            if meta.template != self.config.template.name() {
                return Err(Error::TemplateMismatch {
                    expected: meta.template,
                    requested: self.config.template.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resolves the directory's serial allocation strategy.
    ///
    /// The strategy persisted at CA-build time wins; directories
    /// predating metadata fall back to the configured default.
    fn serial_mode(&self) -> Result<SerialMode> {
        Ok(self
            .store
            .load_metadata()?
            .and_then(|meta| meta.serial_mode)
            .unwrap_or(self.config.serial_mode))
    }
}

/// Short name for logging.
const fn mode_name(mode: SerialMode) -> &'static str {
    match mode {
        SerialMode::Sequential => "sequential",
        SerialMode::Random => "random",
    }
}

/// Computes `[now, now + days]` in UTC at rcgen's time type.
fn validity_window(days: u32) -> Result<(time::OffsetDateTime, time::OffsetDateTime)> {
    let now = Utc::now();
    let not_after = now + Duration::days(i64::from(days));
    Ok((to_rcgen_time(now)?, to_rcgen_time(not_after)?))
}

/// Converts a chrono `DateTime` to rcgen's `OffsetDateTime`.
fn to_rcgen_time(dt: DateTime<Utc>) -> Result<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| Error::Generation(format!("invalid timestamp: {e}")))
}

/// Verifies a CSR's self-signature.
///
/// This is the sole authentication check on a stored request; there is
/// no human review step before signing.
fn verify_csr_signature(csr_pem: &str) -> Result<()> {
    use x509_parser::certification_request::X509CertificationRequest;
    use x509_parser::prelude::FromDer;

    let (_, parsed) = x509_parser::pem::parse_x509_pem(csr_pem.as_bytes())
        .map_err(|e| Error::InvalidRequest(format!("not a valid PEM request: {e}")))?;
    let (_, csr) = X509CertificationRequest::from_der(&parsed.contents)
        .map_err(|e| Error::InvalidRequest(format!("not a valid X.509 request: {e}")))?;
    csr.verify_signature()
        .map_err(|e| Error::InvalidRequest(format!("self-signature verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir) -> PkiConfig {
        PkiConfig {
            pki_dir: tmp.path().join("pki"),
            key_algorithm: KeyAlgorithm::EcdsaP256,
            ..PkiConfig::default()
        }
    }

    fn engine_with_ca(tmp: &TempDir) -> IssuanceEngine {
        let engine = IssuanceEngine::new(test_config(tmp));
        engine.init_pki(false).unwrap();
        engine.build_ca(&Subject::new("Test CA"), None).unwrap();
        engine
    }

    #[test]
    fn operations_fail_before_init() {
        let tmp = TempDir::new().unwrap();
        let engine = IssuanceEngine::new(test_config(&tmp));

        let result = engine.build_ca(&Subject::new("Test CA"), None);
        assert!(matches!(result.unwrap_err(), Error::NotInitialized(_)));

        let result = engine.gen_req(&Subject::new("alice"), None);
        assert!(matches!(result.unwrap_err(), Error::NotInitialized(_)));
    }

    #[test]
    fn init_twice_conflicts_then_force_succeeds() {
        let tmp = TempDir::new().unwrap();
        let engine = IssuanceEngine::new(test_config(&tmp));

        engine.init_pki(false).unwrap();
        let result = engine.init_pki(false);
        assert!(matches!(result.unwrap_err(), Error::AlreadyInitialized(_)));

        engine.init_pki(true).unwrap();
        engine.store().verify_ready().unwrap();
    }

    #[test]
    fn build_ca_produces_self_signed_root() {
        let tmp = TempDir::new().unwrap();
        let engine = IssuanceEngine::new(test_config(&tmp));
        engine.init_pki(false).unwrap();

        let outcome = engine.build_ca(&Subject::new("Test CA"), None).unwrap();
        let CaOutcome::Root { certificate, .. } = outcome else {
            panic!("expected a self-signed root");
        };

        assert_eq!(certificate.subject(), "Test CA");
        assert_eq!(certificate.issuer(), "Test CA");
        assert!(certificate.extensions().is_ca);
        assert!(certificate.extensions().key_cert_sign);
        assert!(certificate.extensions().crl_sign);

        assert!(engine.store().has_ca());
        assert_eq!(engine.ledger().current_serial().unwrap().as_str(), "01");
        assert_eq!(engine.ledger().count().unwrap(), 0);
    }

    #[test]
    fn build_ca_honors_serial_override() {
        let tmp = TempDir::new().unwrap();
        let engine = IssuanceEngine::new(test_config(&tmp));
        engine.init_pki(false).unwrap();

        let serial = Serial::from_hex("cc3f3ee26d9a574e").unwrap();
        let outcome = engine
            .build_ca(&Subject::new("Test CA"), Some(serial.clone()))
            .unwrap();
        let CaOutcome::Root { certificate, .. } = outcome else {
            panic!("expected a self-signed root");
        };
        assert_eq!(certificate.serial(), &serial);
    }

    #[test]
    fn subca_builds_request_instead_of_root() {
        let tmp = TempDir::new().unwrap();
        let config = PkiConfig {
            subca: true,
            ..test_config(&tmp)
        };
        let engine = IssuanceEngine::new(config);
        engine.init_pki(false).unwrap();

        let outcome = engine.build_ca(&Subject::new("Sub CA"), None).unwrap();
        let CaOutcome::SubCaRequest(request) = outcome else {
            panic!("expected a sub-CA request");
        };

        assert!(request.request_path.is_file());
        assert!(request.key_path.is_file());
        assert!(!engine.store().has_ca());
    }

    #[test]
    fn gen_req_writes_request_and_key() {
        let tmp = TempDir::new().unwrap();
        let engine = IssuanceEngine::new(test_config(&tmp));
        engine.init_pki(false).unwrap();

        let artifacts = engine.gen_req(&Subject::new("alice"), None).unwrap();

        let csr_pem = std::fs::read_to_string(&artifacts.request_path).unwrap();
        assert!(csr_pem.contains("BEGIN CERTIFICATE REQUEST"));
        let key_pem = std::fs::read_to_string(&artifacts.key_path).unwrap();
        assert!(key_pem.contains("BEGIN PRIVATE KEY"));

        verify_csr_signature(&csr_pem).unwrap();
    }

    #[test]
    fn gen_req_reuses_supplied_key() {
        let tmp = TempDir::new().unwrap();
        let engine = IssuanceEngine::new(test_config(&tmp));
        engine.init_pki(false).unwrap();

        let key = KeyAlgorithm::EcdsaP256.generate().unwrap();
        let key_pem = PrivateKey::new(key.serialize_der()).pem();

        let artifacts = engine
            .gen_req(&Subject::new("alice"), Some(&key_pem))
            .unwrap();

        let stored = std::fs::read_to_string(&artifacts.key_path).unwrap();
        assert_eq!(stored, key_pem);
    }

    #[test]
    fn sign_req_issues_chained_certificate() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with_ca(&tmp);
        engine.gen_req(&Subject::new("alice"), None).unwrap();

        let issued = engine
            .sign_req(EntityType::Client, &Subject::new("alice"), None)
            .unwrap();
        let cert = &issued.certificate;

        assert_eq!(cert.subject(), "alice");
        assert_eq!(cert.issuer(), "Test CA");
        assert_eq!(cert.serial().as_str(), "01");

        // The leaf chains to the exact CA key.
        let ca_pem = engine.store().read_ca_cert().unwrap();
        let ca_cert = Certificate::from_pem(&ca_pem).unwrap();
        assert_eq!(
            cert.extensions().authority_key_id,
            ca_cert.extensions().subject_key_id
        );
    }

    #[test]
    fn vpn_client_template_fidelity() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with_ca(&tmp);
        engine.gen_req(&Subject::new("alice"), None).unwrap();

        let issued = engine
            .sign_req(EntityType::Client, &Subject::new("alice"), None)
            .unwrap();
        let ext = issued.certificate.extensions();

        assert!(!ext.is_ca);
        assert!(ext.client_auth);
        assert!(!ext.key_cert_sign);
        assert!(!ext.crl_sign);
        assert!(ext.digital_signature);
    }

    #[test]
    fn sequential_serials_and_ledger_stay_consistent() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with_ca(&tmp);

        let mut serials = Vec::new();
        for name in ["alice", "bob", "carol"] {
            engine.gen_req(&Subject::new(name), None).unwrap();
            let issued = engine
                .sign_req(EntityType::Client, &Subject::new(name), None)
                .unwrap();
            serials.push(issued.certificate.serial().as_str().to_string());
        }

        assert_eq!(serials, vec!["01", "02", "03"]);
        assert_eq!(engine.ledger().count().unwrap(), 3);
        assert_eq!(engine.store().count_by_serial().unwrap(), 3);

        let entries = engine.ledger().entries().unwrap();
        assert_eq!(entries.last().unwrap().serial.as_str(), "03");
        assert_eq!(entries.last().unwrap().subject, "/CN=carol");
    }

    #[test]
    fn random_mode_allocates_distinct_serials() {
        let tmp = TempDir::new().unwrap();
        let config = PkiConfig {
            serial_mode: SerialMode::Random,
            ..test_config(&tmp)
        };
        let engine = IssuanceEngine::new(config);
        engine.init_pki(false).unwrap();
        engine.build_ca(&Subject::new("Test CA"), None).unwrap();

        engine.gen_req(&Subject::new("alice"), None).unwrap();
        engine.gen_req(&Subject::new("bob"), None).unwrap();
        let a = engine
            .sign_req(EntityType::Client, &Subject::new("alice"), None)
            .unwrap();
        let b = engine
            .sign_req(EntityType::Client, &Subject::new("bob"), None)
            .unwrap();

        assert_ne!(a.certificate.serial(), b.certificate.serial());
        assert_eq!(a.certificate.serial().as_str().len(), 32);
        // Counter untouched in random mode.
        assert_eq!(engine.ledger().current_serial().unwrap().as_str(), "01");
    }

    #[test]
    fn sign_req_without_request_leaves_no_files() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with_ca(&tmp);

        let result = engine.sign_req(EntityType::Client, &Subject::new("ghost"), None);
        assert!(matches!(result.unwrap_err(), Error::RequestNotFound(_)));

        assert_eq!(engine.ledger().count().unwrap(), 0);
        assert_eq!(engine.store().count_by_serial().unwrap(), 0);
        assert!(!engine.store().issued_path("ghost").exists());
    }

    #[test]
    fn sign_req_without_ca_fails() {
        let tmp = TempDir::new().unwrap();
        let engine = IssuanceEngine::new(test_config(&tmp));
        engine.init_pki(false).unwrap();
        engine.gen_req(&Subject::new("alice"), None).unwrap();

        let result = engine.sign_req(EntityType::Client, &Subject::new("alice"), None);
        assert!(matches!(
            result.unwrap_err(),
            Error::NoCertificateAuthority(_)
        ));
    }

    #[test]
    fn sign_req_rejects_tampered_request() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with_ca(&tmp);
        engine.gen_req(&Subject::new("alice"), None).unwrap();

        // Overwrite the stored request with one whose body no longer
        // matches its signature.
        let path = engine.store().request_path("alice");
        let pem = std::fs::read_to_string(&path).unwrap();
        let tampered = pem.replacen('M', "N", 1);
        std::fs::write(&path, tampered).unwrap();

        let result = engine.sign_req(EntityType::Client, &Subject::new("alice"), None);
        assert!(matches!(result.unwrap_err(), Error::InvalidRequest(_)));
        assert_eq!(engine.ledger().count().unwrap(), 0);
    }

    #[test]
    fn template_mismatch_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with_ca(&tmp);

        let ssl_engine = IssuanceEngine::new(PkiConfig {
            template: Template::Ssl,
            ..test_config(&tmp)
        });
        let result = ssl_engine.gen_req(&Subject::new("alice"), None);
        assert!(matches!(
            result.unwrap_err(),
            Error::TemplateMismatch { .. }
        ));
    }

    #[test]
    fn commit_failure_removes_issued_files() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with_ca(&tmp);
        engine.gen_req(&Subject::new("alice"), None).unwrap();

        // Fail the ledger commit after the certificate is signed.
        std::fs::remove_file(engine.store().index_path()).unwrap();

        let result = engine.sign_req(EntityType::Client, &Subject::new("alice"), None);
        assert!(matches!(result.unwrap_err(), Error::LedgerCorrupt(_)));
        assert_eq!(engine.store().count_by_serial().unwrap(), 0);
        assert!(!engine.store().issued_path("alice").exists());

        // With the ledger restored, a retry leaves the counts aligned.
        std::fs::write(engine.store().index_path(), b"").unwrap();
        engine
            .sign_req(EntityType::Client, &Subject::new("alice"), None)
            .unwrap();
        assert_eq!(engine.ledger().count().unwrap(), 1);
        assert_eq!(engine.store().count_by_serial().unwrap(), 1);
    }

    #[test]
    fn corrupt_serial_counter_surfaces() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with_ca(&tmp);
        engine.gen_req(&Subject::new("alice"), None).unwrap();

        std::fs::write(engine.store().serial_path(), "zz-not-hex").unwrap();

        let result = engine.sign_req(EntityType::Client, &Subject::new("alice"), None);
        assert!(matches!(result.unwrap_err(), Error::LedgerCorrupt(_)));
    }

    #[test]
    fn validity_window_spans_configured_days() {
        let tmp = TempDir::new().unwrap();
        let config = PkiConfig {
            days: 30,
            ..test_config(&tmp)
        };
        let engine = IssuanceEngine::new(config);
        engine.init_pki(false).unwrap();
        engine.build_ca(&Subject::new("Test CA"), None).unwrap();
        engine.gen_req(&Subject::new("alice"), None).unwrap();

        let issued = engine
            .sign_req(EntityType::Client, &Subject::new("alice"), None)
            .unwrap();
        let cert = &issued.certificate;

        let lifetime = cert.not_after() - cert.not_before();
        assert_eq!(lifetime.num_days(), 30);
    }

    #[test]
    fn mdm_server_entity_is_unsupported() {
        let tmp = TempDir::new().unwrap();
        let config = PkiConfig {
            template: Template::Mdm,
            ..test_config(&tmp)
        };
        let engine = IssuanceEngine::new(config);
        engine.init_pki(false).unwrap();
        engine.build_ca(&Subject::new("MDM CA"), None).unwrap();
        engine.gen_req(&Subject::new("device"), None).unwrap();

        let result = engine.sign_req(EntityType::Server, &Subject::new("device"), None);
        assert!(matches!(
            result.unwrap_err(),
            Error::UnsupportedEntityType { .. }
        ));
        assert_eq!(engine.ledger().count().unwrap(), 0);
    }
}
