use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use symcat::commands::{
    add_artifact_command, artifact_info_command, delete_artifact_command, ingest_macho_command,
    ingest_symbols_command, init_command, list_artifacts_command, prune_symbols_command,
    resolve_command, stats_command, symbols_command, CatalogArgs,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Firmware symbol catalog CLI.
///
/// A thin wrapper around `symcat-core`: every command opens the catalog,
/// performs one operation and exits.
#[derive(Parser, Debug)]
#[command(name = "symcat", version, about = "Firmware symbol catalog", long_about = None)]
struct Cli {
    /// Catalog database file.
    #[arg(long, global = true, default_value = "symcat.db")]
    db: PathBuf,

    /// Rows per write transaction during bulk ingest.
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// JSON catalog config (`{"path": ..., "batch_size": ...}`). Overrides --db and --batch-size.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the catalog (or migrate an existing one) and report its schema version.
    Init,

    /// Register a firmware artifact and the devices it targets.
    AddArtifact {
        /// Unique artifact name (e.g. the IPSW file name).
        #[arg(long)]
        name: String,

        #[arg(long)]
        version: Option<String>,

        #[arg(long)]
        build_id: Option<String>,

        /// Device identifier; repeat for several devices.
        #[arg(long = "device")]
        devices: Vec<String>,

        /// Archive on disk to hash with SHA-256.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Extract a Mach-O's image record and symbols and add them to the catalog.
    IngestMacho {
        #[arg(long)]
        path: PathBuf,

        /// Image UUID to use instead of (or in the absence of) LC_UUID.
        #[arg(long)]
        uuid: Option<String>,

        /// Name of an already-registered artifact to attach the image to.
        #[arg(long)]
        artifact: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Add symbols for an image from a JSON array of {name, start, end}.
    IngestSymbols {
        #[arg(long)]
        uuid: String,

        /// Image name (install name or file name).
        #[arg(long)]
        name: String,

        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        artifact: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Resolve an address inside an image to its enclosing symbol.
    Resolve {
        #[arg(long)]
        uuid: String,

        /// Address as hex (0x...) or decimal.
        #[arg(long)]
        address: String,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the symbols of an image, ordered by address.
    Symbols {
        #[arg(long)]
        uuid: String,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List registered artifacts.
    ListArtifacts {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show an artifact with its devices, caches and images.
    ArtifactInfo {
        #[arg(long)]
        name: String,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Delete an artifact. Its devices, caches and images are kept, detached.
    DeleteArtifact {
        #[arg(long)]
        name: String,
    },

    /// Delete symbols no image links to.
    PruneSymbols,

    /// Show row counts per table.
    Stats {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let args = CatalogArgs { db: cli.db, batch_size: cli.batch_size, config: cli.config };

    match cli.command {
        Command::Init => init_command(&args)?,
        Command::AddArtifact { name, version, build_id, devices, file } => {
            add_artifact_command(&args, &name, version, build_id, &devices, file.as_deref())?
        }
        Command::IngestMacho { path, uuid, artifact, json } => {
            ingest_macho_command(&args, &path, uuid, artifact.as_deref(), json)?
        }
        Command::IngestSymbols { uuid, name, file, artifact, json } => {
            ingest_symbols_command(&args, &uuid, &name, &file, artifact.as_deref(), json)?
        }
        Command::Resolve { uuid, address, json } => resolve_command(&args, &uuid, &address, json)?,
        Command::Symbols { uuid, json } => symbols_command(&args, &uuid, json)?,
        Command::ListArtifacts { json } => list_artifacts_command(&args, json)?,
        Command::ArtifactInfo { name, json } => artifact_info_command(&args, &name, json)?,
        Command::DeleteArtifact { name } => delete_artifact_command(&args, &name)?,
        Command::PruneSymbols => prune_symbols_command(&args)?,
        Command::Stats { json } => stats_command(&args, json)?,
    }

    Ok(())
}
