//! Archive Agent - Main entry point
//!
//! Runs single archive steps against a manifest, with both storage sides
//! served by local directory trees.

use anyhow::{Context, Result};
use archive_agent::backend::LocalBackend;
use archive_agent::manifest::ManifestReader;
use archive_agent::{utils, ArchiveSession, Config, DeleteTarget, Direction, VerifyOutcome};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Archive manifest
    #[arg(short, long, value_name = "FILE")]
    manifest: PathBuf,

    /// Transfer direction: put (disk to tape) or get (tape to disk)
    #[arg(short, long, value_enum, default_value_t = DirectionArg::Put)]
    direction: DirectionArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the destination root before a transfer
    CheckRoot,
    /// Create every manifest directory on the destination
    Mkdirs,
    /// Verify every manifest entry on the destination
    Verify,
    /// Drop the immutability marker from the disk side directories
    MakeMutable,
    /// Delete every manifest entry
    Delete {
        #[arg(long, value_enum, default_value_t = TargetArg::Follow)]
        target: TargetArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    Put,
    Get,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Put => Direction::DiskToTape,
            DirectionArg::Get => Direction::TapeToDisk,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TargetArg {
    Follow,
    Origin,
    Destination,
}

impl From<TargetArg> for DeleteTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Follow => DeleteTarget::FollowDirection,
            TargetArg::Origin => DeleteTarget::ForceOrigin,
            TargetArg::Destination => DeleteTarget::ForceDestination,
        }
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting archive-agent v{} (agent_id: {})",
        env!("CARGO_PKG_VERSION"),
        config.agent.id
    );

    let direction = Direction::from(args.direction);
    let manifest = ManifestReader::open(&args.manifest)
        .with_context(|| format!("reading manifest {}", args.manifest.display()))?;

    let disk = LocalBackend::new(manifest.header().src.clone(), &config.storage.disk_dir);
    let tape = LocalBackend::new(manifest.header().dst.clone(), &config.storage.tape_dir);
    let session = ArchiveSession::from_manifest(manifest, direction, disk, tape)
        .with_options(config.archive.clone());

    match args.command {
        Command::CheckRoot => {
            session.check_root_dir()?;
            println!("root ok");
        }
        Command::Mkdirs => {
            let created = session.make_directories()?;
            println!("created {} directories", created);
        }
        Command::Verify => match session.verify_archive()? {
            VerifyOutcome::Verified { entries } => {
                println!("verified {} entries", entries);
            }
            VerifyOutcome::Failed { entry, error } => {
                println!("failed at entry {}: {}", entry, error);
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::MakeMutable => {
            let changed = session.make_mutable()?;
            println!("made {} directories mutable", changed);
        }
        Command::Delete { target } => {
            let deleted = session.delete_all(target.into())?;
            println!("deleted {} entries", deleted);
        }
    }

    Ok(ExitCode::SUCCESS)
}
