//! Carapace CLI binary entrypoint.
//!
//! This is the main entry point for the `carapace` command-line tool.

use std::io;
use std::io::BufRead;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use carapace_pki::IssuanceEngine;

use carapace_cli::cli::{Cli, Commands};
use carapace_cli::commands::{BuildCaCommand, GenReqCommand, InitPkiCommand, SignReqCommand};
use carapace_cli::error::CliError;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut stdin = io::stdin().lock();
    match run(&cli, &mut stdin) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run<R: BufRead>(cli: &Cli, input: &mut R) -> Result<(), CliError> {
    let engine = IssuanceEngine::new(cli.to_config()?);
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::InitPki => {
            let cmd = InitPkiCommand::new(&engine);
            cmd.execute(&mut stdout, input, cli.batch)?;
        }
        Commands::BuildCa {
            common_name,
            subject,
            ..
        } => {
            let cmd = BuildCaCommand::new(&engine);
            cmd.execute(&mut stdout, &subject.to_subject(common_name))?;
        }
        Commands::GenReq {
            common_name,
            subject,
            ..
        } => {
            let cmd = GenReqCommand::new(&engine);
            cmd.execute(&mut stdout, &subject.to_subject(common_name))?;
        }
        Commands::SignReq {
            entity,
            common_name,
            subject,
        } => {
            let cmd = SignReqCommand::new(&engine);
            cmd.execute(
                &mut stdout,
                (*entity).into(),
                &subject.to_subject(common_name),
            )?;
        }
    }

    Ok(())
}
