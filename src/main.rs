//! Main entry point for the labzip CLI application.
//!
//! Loads an archive from disk or HTTP, resolves its password and prints
//! the patient blocks found in its LAB files.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use labzip::archive::list_members;
use labzip::batch::BatchReport;
use labzip::cli::password_file_candidates;
use labzip::source::open_source;
use labzip::{Cli, PasswordCandidates, process_archive};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let source = open_source(&cli.file)?;
    let bytes = source.fetch().await?;
    debug!(location = source.location(), size = bytes.len(), "archive loaded");

    let format = cli
        .format
        .clone()
        .or_else(|| source.format_hint())
        .unwrap_or_else(|| "zip".to_string());

    if cli.list {
        let entries = list_members(&bytes, &format)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }
        for entry in entries {
            println!(
                "{:>10}  {}  {}",
                entry.uncompressed_size,
                if entry.is_encrypted() { "*" } else { " " },
                entry.file_name
            );
        }
        return Ok(());
    }

    let candidates = load_candidates(&cli).await?;
    let report = match process_archive(&bytes, &format, &candidates, &cli.limits(), &cli.extension)
    {
        Ok(report) => report,
        Err(e) => {
            for attempt in e.attempts() {
                debug!("{attempt}");
            }
            return Err(e).context(format!("cannot extract {}", source.location()));
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, &cli);
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `labzip=info`, lowered by `-q`).
fn init_tracing(cli: &Cli) -> Result<()> {
    let default_level = if cli.is_very_quiet() {
        "labzip=error"
    } else if cli.is_quiet() {
        "labzip=warn"
    } else {
        "labzip=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(default_level.parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// `-P` values, then `--password-list`, then the password file in line order.
async fn load_candidates(cli: &Cli) -> Result<PasswordCandidates> {
    let mut passwords = cli.password_candidates();

    if let Some(path) = &cli.password_file {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read password file {}", path.display()))?;
        passwords.extend(password_file_candidates(&content));
    }

    Ok(PasswordCandidates::new(passwords))
}

fn print_summary(report: &BatchReport, cli: &Cli) {
    for member in &report.processed {
        println!("{}", member.path);
        for block in &member.parse.blocks {
            let admin = &block.admin;
            println!(
                "  {:<12} {:<24} {:>3} results",
                block.protocol(),
                format!(
                    "{} {}",
                    admin.surname.as_deref().unwrap_or("-"),
                    admin.first_name.as_deref().unwrap_or("")
                )
                .trim_end(),
                block.results.len()
            );
        }
        if !cli.is_quiet() {
            for diagnostic in &member.parse.diagnostics {
                println!("  ! {diagnostic}");
            }
        }
    }

    for failure in &report.failed {
        println!("failed: {}: {}", failure.path, failure.reason);
    }

    if !cli.is_very_quiet() {
        println!(
            "{} files processed, {} blocks, {} ignored, {} failed",
            report.processed.len(),
            report.block_count(),
            report.ignored.len(),
            report.failed.len()
        );
    }
}
