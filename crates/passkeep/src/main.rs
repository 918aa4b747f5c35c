//! passkeep - Local credential store
//!
//! Prints the stored password for a service, or generates, stores and
//! prints a new one.
//!
//! Store file errors never stop the password from being shown: a failed
//! read continues with what was recovered, a failed write is reported
//! after the fact.

use anyhow::Result;
use clap::Parser;
use passkeep::{validate_service, Config, CredentialStore, Retrieved};
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "passkeep")]
#[command(about = "Local credential store - look up or generate a strong password per service")]
#[command(version)]
#[command(after_help = r#"EXAMPLES:
    passkeep Facebook                   # Show or create the Facebook password
    passkeep --file ~/vault.txt GitHub  # Use another store file

STORE FILE:
    Default: .passwords in the current directory
    Override with --file, PASSKEEP_FILE, or store_file in
    ~/.config/passkeep/config.yaml

SECURITY:
    Passwords are 16 characters from A-Z a-z 0-9 !@#$%^&*()-_=+
    The store file is plaintext (mode 0600 on Unix)"#)]
struct Cli {
    /// Service name (e.g., Facebook, github)
    service: Option<String>,

    /// Store file to use
    #[arg(long, env = "PASSKEEP_FILE")]
    file: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only the result line
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut stdout = io::stdout().lock();

    let Some(service) = cli.service else {
        print_usage(&mut stdout)?;
        return Ok(());
    };

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("warning: {:#}", e);
        Config::default()
    });
    let path = config.store_path(cli.file.as_deref());

    run(service.trim(), &path, &mut OsRng, &mut stdout)?;
    Ok(())
}

/// Load, look up or generate, persist, then print the result line
fn run<R, W>(service: &str, path: &Path, rng: &mut R, out: &mut W) -> Result<Retrieved>
where
    R: Rng + CryptoRng,
    W: Write,
{
    // Checked before loading so a bad name never creates the store file
    validate_service(service)?;

    let mut store = CredentialStore::load(path).unwrap_or_else(|partial| {
        eprintln!("error: {}", partial);
        partial.into_store()
    });

    let retrieved = store.lookup_or_generate(service, rng)?;

    if let Err(e) = store.persist(path) {
        eprintln!("error: {}", e);
    }

    writeln!(out, "{}", render(service, &retrieved))?;
    Ok(retrieved)
}

fn render(service: &str, retrieved: &Retrieved) -> String {
    match retrieved {
        Retrieved::Existing(password) => format!("Password for {}: {}", service, password),
        Retrieved::Generated(password) => {
            format!("New password generated for {}: {}", service, password)
        }
    }
}

fn print_usage<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "passkeep - please provide a service name.")?;
    writeln!(out, "Usage: passkeep <service>")?;
    writeln!(out, "Example: passkeep Facebook")
}
