//! CA creation command.

use std::io::Write;

use tracing::debug;

use carapace_pki::{CaOutcome, IssuanceEngine, Subject};

use crate::error::CliError;

/// Handler for the `build-ca` subcommand.
pub struct BuildCaCommand<'a> {
    engine: &'a IssuanceEngine,
}

impl<'a> BuildCaCommand<'a> {
    /// Creates a new build-ca command handler.
    #[must_use]
    pub const fn new(engine: &'a IssuanceEngine) -> Self {
        Self { engine }
    }

    /// Executes the command.
    ///
    /// # Errors
    ///
    /// Returns an error if CA creation fails.
    pub fn execute<W: Write>(&self, out: &mut W, subject: &Subject) -> Result<(), CliError> {
        debug!(common_name = %subject.common_name, "executing build-ca");
        match self.engine.build_ca(subject, None)? {
            CaOutcome::Root {
                certificate,
                certificate_path,
            } => {
                writeln!(
                    out,
                    "CA creation complete and you may now import and sign cert requests."
                )?;
                writeln!(
                    out,
                    "Your new CA certificate file for publishing is at: {}",
                    certificate_path.display()
                )?;
                writeln!(out, "CA serial: {}", certificate.serial())?;
            }
            CaOutcome::SubCaRequest(request) => {
                writeln!(
                    out,
                    "Your subordinate-CA request is ready for signing by a parent CA."
                )?;
                writeln!(out, "req: {}", request.request_path.display())?;
                writeln!(out, "key: {}", request.key_path.display())?;
            }
        }
        Ok(())
    }
}
