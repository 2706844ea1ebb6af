//! On-disk PKI directory layout and lifecycle.
//!
//! The store owns the fixed layout relative to a configurable root:
//!
//! ```text
//! <root>/
//!   ca.crt                        CA certificate, PEM
//!   serial                        current serial counter, hex, even length
//!   index.txt                     ledger, one line per issued cert
//!   pki.json                      PKI metadata (template, serial mode)
//!   private/ca.key                CA private key, PEM
//!   private/<CN>.key              per-entity private key, PEM
//!   reqs/<CN>.req                 CSR, PEM
//!   issued/<CN>.crt               issued certificate, PEM
//!   certs_by_serial/<serial>.pem  issued certificate, PEM, keyed by serial
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ledger::SerialMode;
use crate::types::Serial;

/// Restrictive mode for private key files.
#[cfg(unix)]
const KEY_FILE_MODE: u32 = 0o600;

/// Metadata persisted with the PKI directory.
///
/// The template is recorded at `init` time and validated on every
/// later call; the serial allocation strategy is recorded when the CA
/// is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkiMeta {
    /// Name of the template this PKI was initialized with.
    pub template: String,
    /// Serial allocation strategy, decided at CA-build time.
    pub serial_mode: Option<SerialMode>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Owns the PKI directory layout and its lifecycle.
#[derive(Debug, Clone)]
pub struct PkiStore {
    root: PathBuf,
}

impl PkiStore {
    /// Creates a store handle for the given root path.
    ///
    /// No filesystem access happens until an operation is called.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the PKI root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the CA certificate.
    #[must_use]
    pub fn ca_cert_path(&self) -> PathBuf {
        self.root.join("ca.crt")
    }

    /// Path of the CA private key.
    #[must_use]
    pub fn ca_key_path(&self) -> PathBuf {
        self.root.join("private").join("ca.key")
    }

    /// Path of the serial counter file.
    #[must_use]
    pub fn serial_path(&self) -> PathBuf {
        self.root.join("serial")
    }

    /// Path of the issuance ledger.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.txt")
    }

    /// Path of the PKI metadata file.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join("pki.json")
    }

    /// Path of an entity's private key.
    #[must_use]
    pub fn private_key_path(&self, common_name: &str) -> PathBuf {
        self.root.join("private").join(format!("{common_name}.key"))
    }

    /// Path of an entity's certificate request.
    #[must_use]
    pub fn request_path(&self, common_name: &str) -> PathBuf {
        self.root.join("reqs").join(format!("{common_name}.req"))
    }

    /// Path of an entity's issued certificate.
    #[must_use]
    pub fn issued_path(&self, common_name: &str) -> PathBuf {
        self.root.join("issued").join(format!("{common_name}.crt"))
    }

    /// Path of an issued certificate keyed by serial.
    #[must_use]
    pub fn by_serial_path(&self, serial: &Serial) -> PathBuf {
        self.root
            .join("certs_by_serial")
            .join(format!("{serial}.pem"))
    }

    /// Fails unless the root path exists and is a directory.
    ///
    /// Side-effect-free.
    pub fn verify_ready(&self) -> Result<()> {
        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(Error::NotInitialized(self.root.clone())),
        }
    }

    /// Creates the root, `private/` and `reqs/` directories.
    ///
    /// Fails with [`Error::AlreadyInitialized`] if the root exists and
    /// `force` is false; with `force`, the existing root is recursively
    /// deleted first. A child-creation failure is fatal to the whole
    /// call and rolls the root back so no partial layout survives as a
    /// steady state.
    pub fn init(&self, force: bool) -> Result<()> {
        if self.root.exists() {
            if !force {
                return Err(Error::AlreadyInitialized(self.root.clone()));
            }
            warn!(dir = %self.root.display(), "removing existing PKI directory");
            fs::remove_dir_all(&self.root)?;
        }

        fs::create_dir_all(&self.root)?;
        for child in ["private", "reqs"] {
            if let Err(e) = fs::create_dir(self.root.join(child)) {
                // All-or-nothing: do not leave a half-built layout behind.
                let _ = fs::remove_dir_all(&self.root);
                return Err(e.into());
            }
        }

        info!(dir = %self.root.display(), "initialized PKI directory");
        Ok(())
    }

    /// Idempotently creates `issued/` and `certs_by_serial/`.
    ///
    /// Invoked lazily by CA creation so directories built before these
    /// subfolders existed still work.
    pub fn ensure_issued_layout(&self) -> Result<()> {
        for child in ["issued", "certs_by_serial"] {
            match fs::create_dir(self.root.join(child)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Persists the PKI metadata.
    pub fn write_metadata(&self, meta: &PkiMeta) -> Result<()> {
        let json = serde_json::to_vec_pretty(meta)
            .map_err(|e| Error::Parse(format!("failed to encode PKI metadata: {e}")))?;
        atomic_write(&self.metadata_path(), &json)?;
        Ok(())
    }

    /// Loads the PKI metadata, if present.
    ///
    /// Directories created before metadata existed return `None`.
    pub fn load_metadata(&self) -> Result<Option<PkiMeta>> {
        let bytes = match fs::read(self.metadata_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Parse(format!("failed to parse PKI metadata: {e}")))?;
        Ok(Some(meta))
    }

    /// Returns true if a CA certificate exists in this directory.
    #[must_use]
    pub fn has_ca(&self) -> bool {
        self.ca_cert_path().is_file()
    }

    /// Reads the CA certificate PEM.
    pub fn read_ca_cert(&self) -> Result<String> {
        read_or(self.ca_cert_path(), || {
            Error::NoCertificateAuthority(self.root.clone())
        })
    }

    /// Reads the CA private key PEM.
    pub fn read_ca_key(&self) -> Result<String> {
        read_or(self.ca_key_path(), || {
            Error::NoCertificateAuthority(self.root.clone())
        })
    }

    /// Reads a stored certificate request PEM.
    pub fn read_request(&self, common_name: &str) -> Result<String> {
        read_or(self.request_path(common_name), || {
            Error::RequestNotFound(common_name.to_string())
        })
    }

    /// Persists CA material at its fixed paths.
    pub fn write_ca(&self, cert_pem: &str, key_pem: &str) -> Result<()> {
        atomic_write(&self.ca_cert_path(), cert_pem.as_bytes())?;
        write_key_file(&self.ca_key_path(), key_pem)?;
        debug!(path = %self.ca_cert_path().display(), "wrote CA certificate");
        Ok(())
    }

    /// Persists a certificate request and its private key.
    pub fn write_request(&self, common_name: &str, csr_pem: &str, key_pem: &str) -> Result<()> {
        atomic_write(&self.request_path(common_name), csr_pem.as_bytes())?;
        write_key_file(&self.private_key_path(common_name), key_pem)?;
        debug!(common_name, "wrote certificate request");
        Ok(())
    }

    /// Persists an issued certificate under both lookup paths.
    pub fn write_issued(&self, common_name: &str, serial: &Serial, cert_pem: &str) -> Result<()> {
        atomic_write(&self.by_serial_path(serial), cert_pem.as_bytes())?;
        atomic_write(&self.issued_path(common_name), cert_pem.as_bytes())?;
        debug!(common_name, %serial, "wrote issued certificate");
        Ok(())
    }

    /// Best-effort removal of an issued certificate's files.
    ///
    /// Used to unwind `write_issued` when the ledger commit fails;
    /// removal errors are ignored since the files may not all exist.
    pub fn remove_issued(&self, common_name: &str, serial: &Serial) {
        let _ = fs::remove_file(self.by_serial_path(serial));
        let _ = fs::remove_file(self.issued_path(common_name));
        debug!(common_name, %serial, "removed issued certificate files");
    }

    /// Counts the certificates stored by serial.
    pub fn count_by_serial(&self) -> Result<usize> {
        let dir = self.root.join("certs_by_serial");
        let mut count = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.path().extension().is_some_and(|ext| ext == "pem") {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Reads a file to a string, mapping a missing file to `missing()`.
fn read_or(path: PathBuf, missing: impl FnOnce() -> Error) -> Result<String> {
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(missing()),
        Err(e) => Err(e.into()),
    }
}

/// Writes a private key with restrictive permissions.
///
/// The mode is tightened on the temporary file before the rename, so
/// the key is never observable at the final path with a wider mode.
fn write_key_file(path: &Path, key_pem: &str) -> Result<()> {
    let tmp = tmp_sibling(path)?;
    fs::write(&tmp, key_pem.as_bytes())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(KEY_FILE_MODE))?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Writes a file via a temporary sibling and an atomic rename.
///
/// A crash mid-write leaves at worst a stale `.tmp` file; the
/// destination is either absent or fully written.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = tmp_sibling(path)?;
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}

/// Builds the `.tmp` sibling path used for atomic writes.
fn tmp_sibling(path: &Path) -> io::Result<PathBuf> {
    match path.file_name() {
        Some(name) => {
            let mut tmp_name = name.to_os_string();
            tmp_name.push(".tmp");
            Ok(path.with_file_name(tmp_name))
        }
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot write to '{}'", path.display()),
        )),
    }
}
