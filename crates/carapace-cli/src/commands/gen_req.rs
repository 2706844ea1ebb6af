//! Key pair and certificate request generation command.

use std::io::Write;

use tracing::debug;

use carapace_pki::{IssuanceEngine, Subject};

use crate::error::CliError;

/// Handler for the `gen-req` subcommand.
pub struct GenReqCommand<'a> {
    engine: &'a IssuanceEngine,
}

impl<'a> GenReqCommand<'a> {
    /// Creates a new gen-req command handler.
    #[must_use]
    pub const fn new(engine: &'a IssuanceEngine) -> Self {
        Self { engine }
    }

    /// Executes the command.
    ///
    /// # Errors
    ///
    /// Returns an error if request generation fails.
    pub fn execute<W: Write>(&self, out: &mut W, subject: &Subject) -> Result<(), CliError> {
        debug!(common_name = %subject.common_name, "executing gen-req");
        let request = self.engine.gen_req(subject, None)?;

        writeln!(out, "Keypair and certificate request completed. Your files are:")?;
        writeln!(out, "req: {}", request.request_path.display())?;
        writeln!(out, "key: {}", request.key_path.display())?;
        Ok(())
    }
}
