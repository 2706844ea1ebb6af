//! Serial allocation and the issuance ledger.
//!
//! The ledger owns two files: `serial`, the current counter as an
//! even-length hex string, and `index.txt`, one line per issued
//! certificate. A commit is the final durable write of any signing
//! transaction; a crash before it is a no-op, a crash after it a
//! completed transaction.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::atomic_write;
use crate::types::{hex_encode, Serial};

/// Serial allocation strategy, a persisted property of the PKI
/// directory decided at CA-build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialMode {
    /// Consecutive integers seeded at `01`.
    Sequential,
    /// Cryptographically random 16-byte serials.
    Random,
}

/// Number of random bytes per serial in [`SerialMode::Random`].
const RANDOM_SERIAL_BYTES: usize = 16;

/// One line of the issuance ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Certificate status (`V` for valid).
    pub status: String,
    /// Subject key identifier, hex.
    pub key_id: String,
    /// Certificate serial.
    pub serial: Serial,
    /// Subject as an openssl-style one-line string.
    pub subject: String,
}

/// Owns the serial counter and the human-readable issuance ledger.
#[derive(Debug, Clone)]
pub struct SerialLedger {
    root: PathBuf,
}

impl SerialLedger {
    /// Creates a ledger handle rooted at the PKI directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn serial_path(&self) -> PathBuf {
        self.root.join("serial")
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.txt")
    }

    /// Writes a fresh empty ledger and a counter seeded at `01`.
    ///
    /// Called once by CA creation.
    pub fn seed(&self) -> Result<()> {
        atomic_write(&self.index_path(), b"")?;
        atomic_write(&self.serial_path(), b"01")?;
        debug!(dir = %self.root.display(), "seeded serial ledger");
        Ok(())
    }

    /// Reads the persisted counter as a normalized serial.
    pub fn current_serial(&self) -> Result<Serial> {
        let raw = fs::read_to_string(self.serial_path()).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::LedgerCorrupt("serial counter file missing".into())
            } else {
                Error::Io(e)
            }
        })?;
        Serial::from_hex(&raw)
            .map_err(|_| Error::LedgerCorrupt(format!("unparsable serial counter '{}'", raw.trim())))
    }

    /// Returns the serial to stamp on the next certificate.
    ///
    /// An explicit serial is used verbatim (caller-controlled, e.g.
    /// for the root CA's own certificate); otherwise allocation
    /// follows the directory's persisted mode.
    pub fn allocate(&self, mode: SerialMode, explicit: Option<Serial>) -> Result<Serial> {
        if let Some(serial) = explicit {
            return Ok(serial);
        }
        match mode {
            SerialMode::Sequential => self.current_serial(),
            SerialMode::Random => Ok(Serial::random(RANDOM_SERIAL_BYTES)),
        }
    }

    /// Records an issued certificate.
    ///
    /// For sequential mode the incremented counter is persisted first;
    /// the ledger line is the last durable write of the transaction.
    pub fn commit(
        &self,
        mode: SerialMode,
        serial: &Serial,
        key_id: &[u8],
        subject: &str,
    ) -> Result<()> {
        let mut index = fs::read_to_string(self.index_path()).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::LedgerCorrupt("ledger file missing".into())
            } else {
                Error::Io(e)
            }
        })?;

        if mode == SerialMode::Sequential {
            let next = serial.next()?;
            atomic_write(&self.serial_path(), next.as_str().as_bytes())?;
        }

        index.push_str(&format!(
            "V\t{}\t{serial}\tunknown\t{subject}\n",
            hex_encode(key_id)
        ));
        atomic_write(&self.index_path(), index.as_bytes())?;

        debug!(%serial, subject, "committed ledger entry");
        Ok(())
    }

    /// Parses all ledger entries.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let index = fs::read_to_string(self.index_path()).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::LedgerCorrupt("ledger file missing".into())
            } else {
                Error::Io(e)
            }
        })?;

        index
            .lines()
            .map(|line| {
                let fields: Vec<&str> = line.split('\t').collect();
                if fields.len() != 5 {
                    return Err(Error::LedgerCorrupt(format!("malformed ledger line '{line}'")));
                }
                Ok(LedgerEntry {
                    status: fields[0].to_string(),
                    key_id: fields[1].to_string(),
                    serial: Serial::from_hex(fields[2])
                        .map_err(|_| Error::LedgerCorrupt(format!("bad serial in line '{line}'")))?,
                    subject: fields[4].to_string(),
                })
            })
            .collect()
    }

    /// Returns the number of ledger entries.
    pub fn count(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded_ledger(tmp: &TempDir) -> SerialLedger {
        let ledger = SerialLedger::new(tmp.path());
        ledger.seed().unwrap();
        ledger
    }

    #[test]
    fn seed_starts_at_one() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded_ledger(&tmp);

        assert_eq!(ledger.current_serial().unwrap().as_str(), "01");
        assert_eq!(ledger.count().unwrap(), 0);
    }

    #[test]
    fn missing_counter_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let ledger = SerialLedger::new(tmp.path());

        let result = ledger.current_serial();
        assert!(matches!(result.unwrap_err(), Error::LedgerCorrupt(_)));
    }

    #[test]
    fn garbage_counter_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded_ledger(&tmp);
        fs::write(tmp.path().join("serial"), "not-hex").unwrap();

        let result = ledger.current_serial();
        assert!(matches!(result.unwrap_err(), Error::LedgerCorrupt(_)));
    }

    #[test]
    fn sequential_allocation_reads_counter() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded_ledger(&tmp);

        let serial = ledger.allocate(SerialMode::Sequential, None).unwrap();
        assert_eq!(serial.as_str(), "01");
    }

    #[test]
    fn explicit_serial_wins() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded_ledger(&tmp);

        let explicit = Serial::from_hex("cc3f3ee26d9a574e").unwrap();
        let serial = ledger
            .allocate(SerialMode::Sequential, Some(explicit.clone()))
            .unwrap();
        assert_eq!(serial, explicit);
    }

    #[test]
    fn random_allocation_is_sixteen_bytes() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded_ledger(&tmp);

        let serial = ledger.allocate(SerialMode::Random, None).unwrap();
        assert_eq!(serial.as_str().len(), 32);
    }

    #[test]
    fn commit_advances_sequential_counter() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded_ledger(&tmp);

        let serial = ledger.allocate(SerialMode::Sequential, None).unwrap();
        ledger
            .commit(SerialMode::Sequential, &serial, &[0xab, 0xcd], "/CN=alice")
            .unwrap();

        assert_eq!(ledger.current_serial().unwrap().as_str(), "02");
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn commit_in_random_mode_keeps_counter() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded_ledger(&tmp);

        let serial = ledger.allocate(SerialMode::Random, None).unwrap();
        ledger
            .commit(SerialMode::Random, &serial, &[0x01], "/CN=alice")
            .unwrap();

        assert_eq!(ledger.current_serial().unwrap().as_str(), "01");
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn entries_round_trip() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded_ledger(&tmp);

        let serial = Serial::from_hex("02af").unwrap();
        ledger
            .commit(SerialMode::Random, &serial, &[0xde, 0xad], "/CN=bob")
            .unwrap();

        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, "V");
        assert_eq!(entries[0].key_id, "dead");
        assert_eq!(entries[0].serial, serial);
        assert_eq!(entries[0].subject, "/CN=bob");
    }

    #[test]
    fn malformed_ledger_line_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded_ledger(&tmp);
        fs::write(tmp.path().join("index.txt"), "V only-two-fields\n").unwrap();

        let result = ledger.entries();
        assert!(matches!(result.unwrap_err(), Error::LedgerCorrupt(_)));
    }

    #[test]
    fn sequential_serials_are_consecutive() {
        let tmp = TempDir::new().unwrap();
        let ledger = seeded_ledger(&tmp);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let serial = ledger.allocate(SerialMode::Sequential, None).unwrap();
            ledger
                .commit(SerialMode::Sequential, &serial, &[0x00], "/CN=x")
                .unwrap();
            seen.push(serial.as_str().to_string());
        }
        assert_eq!(seen, vec!["01", "02", "03"]);
    }
}
