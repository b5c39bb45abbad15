use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use kasane::{Config, Entry, KasaneError, init_logging, pipeline};
use tracing::error;

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    /// Build into `.dev`, serve it and rebuild on change.
    Dev,
    /// Production build into `build`.
    Build,
    /// Production build into `docs`.
    Docs,
}

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    #[clap(value_enum, index = 1, default_value = "dev")]
    mode: Mode,

    /// Config file, `kasane.toml` in the working directory by default.
    #[clap(long)]
    config: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging() {
        eprintln!("{}", KasaneError::Logging(e));
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode, KasaneError> {
    let config = Arc::new(Config::load(args.config.as_deref())?);

    let entry = match args.mode {
        #[cfg(feature = "live")]
        Mode::Dev => {
            pipeline::serve(config)?;
            return Ok(ExitCode::SUCCESS);
        }
        #[cfg(not(feature = "live"))]
        Mode::Dev => Entry::Development,
        Mode::Build => Entry::Build,
        Mode::Docs => Entry::Docs,
    };

    let diagnostics = pipeline::run(config, entry)?;

    if entry.target().is_production() && diagnostics.failed() > 0 {
        error!("{} inputs failed to build", diagnostics.failed());
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
