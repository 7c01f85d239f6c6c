//! Command-line front end for secprop.
//!
//! Usage:
//!   secprop apply job.json
//!   secprop edit -f app.properties -e LOGIN_ATTEMPTS:int+=1
//!   secprop value -n db.password --value secret -p "$PW"

use std::env;

use clap::Parser;
use secprop::config::{load_job, JobError};
use secprop::{EditError, PropertyFileEdit, RunSummary, SecureValue};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod args;
use args::{Cli, Commands, CryptoArgs};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("environment variable {0} is required but missing")]
    MissingPasswordVar(String),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Apply { job } => {
            debug!(job = %job.display(), "loading job");
            let summary = load_job(&job)?.run()?;
            report(&summary);
        }
        Commands::Edit {
            file,
            mode,
            crypto,
            comment,
            skip_empty,
            entries,
        } => {
            let mut edit = PropertyFileEdit::new(file)
                .mode(mode)
                .algorithm(crypto.algorithm)
                .skip_empty_values(skip_empty)
                .entries(entries);
            if let Some(password) = password(&crypto)? {
                edit = edit.password(password);
            }
            if let Some(comment) = comment {
                edit = edit.comment(comment);
            }
            let summary = edit.run()?;
            report(&summary);
        }
        Commands::Value {
            name,
            value,
            mode,
            crypto,
        } => {
            let mut secure = SecureValue::new(name, value)
                .mode(mode)
                .algorithm(crypto.algorithm);
            if let Some(password) = password(&crypto)? {
                secure = secure.password(password);
            }
            let (name, value) = secure.resolve()?;
            println!("{name}={value}");
        }
    }
    Ok(())
}

fn password(crypto: &CryptoArgs) -> Result<Option<String>, AppError> {
    match (&crypto.password, &crypto.password_env) {
        (Some(password), _) => Ok(Some(password.clone())),
        (None, Some(var)) => env::var(var)
            .map(Some)
            .map_err(|_| AppError::MissingPasswordVar(var.clone())),
        (None, None) => Ok(None),
    }
}

fn report(summary: &RunSummary) {
    info!(
        path = %summary.path.display(),
        entries = summary.entries_applied,
        properties = summary.properties_written,
        "done"
    );
}
