use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prevadb::storage::{CommandLog, SnapshotStore, disk};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "prevadb-tool")]
#[command(about = "Developer tooling for inspecting prevadb store locations")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize the durable state at a store location
    Info { location: PathBuf },
    /// List logged commands (sequence, execution time, payload size)
    Log { location: PathBuf },
    /// Walk the snapshot and log and report corruption
    Verify { location: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Info { location } => info(&location),
        Command::Log { location } => list_log(&location),
        Command::Verify { location } => verify(&location),
    }
}

fn info(location: &Path) -> Result<()> {
    if !disk::exists(location) {
        println!("no durable store at {}", location.display());
        return Ok(());
    }
    match SnapshotStore::read(&disk::snapshot_path(location))
        .with_context(|| format!("reading snapshot at {}", location.display()))?
    {
        Some(snapshot) => println!(
            "snapshot: seq {} taken at {} ({} bytes)",
            snapshot.seq,
            snapshot.taken_at,
            snapshot.payload.len()
        ),
        None => println!("snapshot: none"),
    }
    let entries = CommandLog::read_entries(&disk::log_path(location))
        .with_context(|| format!("reading command log at {}", location.display()))?;
    match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => println!(
            "log: {} entries, seq {}..={}",
            entries.len(),
            first.seq,
            last.seq
        ),
        _ => println!("log: empty"),
    }
    Ok(())
}

fn list_log(location: &Path) -> Result<()> {
    let entries = CommandLog::read_entries(&disk::log_path(location))
        .with_context(|| format!("reading command log at {}", location.display()))?;
    if entries.is_empty() {
        println!("log: empty");
        return Ok(());
    }
    for entry in entries {
        println!(
            "seq {:>8}  {}  {}  {} bytes",
            entry.seq,
            entry.ctx.executed_at,
            entry.ctx.execution_id,
            entry.payload.len()
        );
    }
    Ok(())
}

fn verify(location: &Path) -> Result<()> {
    if !disk::exists(location) {
        println!("no durable store at {}", location.display());
        return Ok(());
    }
    let snapshot = SnapshotStore::read(&disk::snapshot_path(location))
        .context("snapshot is unreadable")?;
    let base = match &snapshot {
        Some(snapshot) => snapshot.seq,
        None => {
            anyhow::bail!("store has a command log but no snapshot");
        }
    };
    let entries = CommandLog::read_entries_since(&disk::log_path(location), base)
        .context("command log fails verification")?;
    println!(
        "ok: snapshot at seq {}, {} replayable entries",
        base,
        entries.len()
    );
    Ok(())
}
