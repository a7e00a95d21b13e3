//! Helper binary for managing generated EO protocol code.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use eolib::gen::{GenError, ProtocolCodeGenerator};

#[derive(Parser)]
#[command(name = "eo-protocol-gen", about = "Manages generated EO protocol code.")]
struct Cli {
    /// Directory tree containing the protocol.xml schema files
    #[arg(long, default_value = "eo-protocol/xml")]
    protocol_dir: PathBuf,

    /// Directory the generated source tree is written to
    #[arg(long, default_value = "src/protocol/generated")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove the output tree, then run a full regeneration
    Generate,
    /// Remove the output tree
    Clean,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{}", error);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), GenError> {
    clean(&cli.out_dir)?;

    if let Command::Generate = cli.command {
        info!(
            "Generating protocol code from {} into {}",
            cli.protocol_dir.display(),
            cli.out_dir.display()
        );
        ProtocolCodeGenerator::new(cli.protocol_dir.clone()).generate(&cli.out_dir)?;
    }

    Ok(())
}

fn clean(out_dir: &Path) -> Result<(), GenError> {
    info!("Removing: {}", out_dir.display());
    match fs::remove_dir_all(out_dir) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(GenError::Io {
            path: out_dir.to_owned(),
            source,
        }),
    }
}
