//! `session-codec`: command-line entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured logging on stderr.
//! 3. Build the [`SessionCodec`] from the configured secret.
//! 4. Run the requested command.
//!
//! A failure exits with a status naming the failing stage; see
//! `cli::exit_code_for_kind`.
//!
//! [`Config`]: codec::config::Config
//! [`SessionCodec`]: codec::SessionCodec

mod cli;

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use codec::config::Config;
use codec::{telemetry, SessionCodec};

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let args = Cli::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = cli::exit_code(&e);
            error!(kind = cli::error_kind(&e).unwrap_or("other"), code, "command failed");
            eprintln!("ERROR: {e:#}");
            ExitCode::from(code)
        }
    }
}

fn run(args: Cli) -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().context("configuration invalid")?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;

    // -----------------------------------------------------------------------
    // 3. Codec
    // -----------------------------------------------------------------------
    let compress = args.compress.unwrap_or(cfg.session_compress);
    let key = cfg.cookie_secret.key_bytes()?;
    let codec = SessionCodec::new(&key, compress).context("failed to build session cipher")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        key_bits = key.len() * 8,
        compress,
        "session-codec starting"
    );
    drop(key);

    // -----------------------------------------------------------------------
    // 4. Command
    // -----------------------------------------------------------------------
    let stdout = io::stdout().lock();
    match args.command {
        Commands::Decode {
            input,
            cookie,
            json,
        } => cli::decode(
            &codec,
            &cfg.cookie_name,
            input,
            cookie,
            json,
            io::stdin().lock(),
            stdout,
        ),
        Commands::Encode { input } => {
            cli::encode(&codec, input.as_deref(), io::stdin().lock(), stdout)
        }
    }
}
