//! Certificate request signing command.

use std::io::Write;

use tracing::debug;

use carapace_pki::{EntityType, IssuanceEngine, Subject};

use crate::error::CliError;

/// Handler for the `sign-req` subcommand.
pub struct SignReqCommand<'a> {
    engine: &'a IssuanceEngine,
}

impl<'a> SignReqCommand<'a> {
    /// Creates a new sign-req command handler.
    #[must_use]
    pub const fn new(engine: &'a IssuanceEngine) -> Self {
        Self { engine }
    }

    /// Executes the command.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        entity: EntityType,
        subject: &Subject,
    ) -> Result<(), CliError> {
        debug!(common_name = %subject.common_name, entity = %entity, "executing sign-req");
        let issued = self.engine.sign_req(entity, subject, None)?;

        writeln!(out, "Certificate created at: {}", issued.certificate_path.display())?;
        writeln!(out, "serial: {}", issued.certificate.serial())?;
        writeln!(out, "expires: {}", issued.certificate.not_after())?;
        Ok(())
    }
}
