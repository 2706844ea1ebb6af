//! PKI directory initialization command.

use std::io::{BufRead, Write};

use tracing::debug;

use carapace_pki::{Error, IssuanceEngine};

use crate::error::CliError;

/// Handler for the `init-pki` subcommand.
pub struct InitPkiCommand<'a> {
    engine: &'a IssuanceEngine,
}

impl<'a> InitPkiCommand<'a> {
    /// Creates a new init-pki command handler.
    #[must_use]
    pub const fn new(engine: &'a IssuanceEngine) -> Self {
        Self { engine }
    }

    /// Executes the command.
    ///
    /// If the directory already exists, the user is asked to confirm
    /// removal before re-initializing; with `batch` set the conflict
    /// is reported as an error instead.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails or the user declines.
    pub fn execute<W: Write, R: BufRead>(
        &self,
        out: &mut W,
        input: &mut R,
        batch: bool,
    ) -> Result<(), CliError> {
        debug!(batch, "executing init-pki");
        match self.engine.init_pki(false) {
            Ok(dir) => {
                write_success(out, &dir)?;
                Ok(())
            }
            Err(Error::AlreadyInitialized(dir)) => {
                if batch {
                    return Err(Error::AlreadyInitialized(dir).into());
                }
                writeln!(
                    out,
                    "WARNING!!! You are about to remove the existing PKI at: {}",
                    dir.display()
                )?;
                write!(out, "Type the word 'yes' to continue, or any other input to abort: ")?;
                out.flush()?;

                let mut line = String::new();
                input.read_line(&mut line)?;
                if line.trim() != "yes" {
                    return Err(CliError::Aborted(
                        "init-pki declined; existing PKI left in place".into(),
                    ));
                }

                let dir = self.engine.init_pki(true)?;
                write_success(out, &dir)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn write_success<W: Write>(out: &mut W, dir: &std::path::Path) -> Result<(), CliError> {
    writeln!(out, "init-pki complete; you may now create a CA or requests.")?;
    writeln!(out, "Your newly created PKI dir is: {}", dir.display())?;
    Ok(())
}
