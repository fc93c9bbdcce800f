use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use persistoid_core::{
    load_stored_state, purge_stored_state, read_record, FileStorage, PersistConfig,
    SqliteStorage, Storage, DEFAULT_KEY_PREFIX,
};
use std::path::PathBuf;
use std::sync::Arc;

mod replay;

/// Persistoid CLI - Inspect and exercise persisted state records
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database holding the records
    #[arg(long, value_name = "FILE", global = true, conflicts_with = "dir")]
    sqlite: Option<PathBuf>,

    /// Directory holding one file per record
    #[arg(long, value_name = "DIR", global = true)]
    dir: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Identifies one stored record
#[derive(Args)]
struct RecordKey {
    /// Key name (without prefix)
    #[arg(short, long)]
    key: String,

    /// Storage key prefix
    #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
    prefix: String,
}

impl RecordKey {
    fn config(&self) -> PersistConfig {
        PersistConfig::new(self.key.clone()).with_key_prefix(self.prefix.clone())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the decoded record stored under a key
    Inspect {
        #[command(flatten)]
        record: RecordKey,

        /// Output in JSON format for integrations
        #[arg(long)]
        json: bool,

        /// Values were stored pre-encoded (codec disabled)
        #[arg(long)]
        raw: bool,
    },

    /// Remove the record stored under a key
    Purge {
        #[command(flatten)]
        record: RecordKey,
    },

    /// Feed JSON lines as successive snapshots through a persistoid
    Replay {
        /// Persistoid configuration (TOML or JSON)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// One JSON object per line
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Pause between lines, in milliseconds
        #[arg(long, default_value = "0")]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_target(false)
            .init();
    }

    let storage = open_storage(&cli)?;

    match cli.command {
        Commands::Inspect { record, json, raw } => {
            let config = record.config().with_codec_enabled(!raw);
            inspect(storage.as_ref(), &config, json).await?;
        }
        Commands::Purge { record } => {
            let config = record.config();
            purge_stored_state(storage.as_ref(), &config)
                .await
                .with_context(|| format!("Failed to purge '{}'", config.storage_key()))?;
            println!("Purged '{}'", config.storage_key());
        }
        Commands::Replay {
            config,
            input,
            interval_ms,
        } => {
            let config = PersistConfig::from_file(&config)
                .with_context(|| format!("Failed to load config {:?}", config))?;
            let summary = replay::run(storage, config, &input, interval_ms).await?;
            println!(
                "Replayed {} snapshots into '{}': {} writes",
                summary.snapshots, summary.storage_key, summary.writes
            );
        }
    }

    Ok(())
}

fn open_storage(cli: &Cli) -> anyhow::Result<Arc<dyn Storage>> {
    match (&cli.sqlite, &cli.dir) {
        (Some(path), _) => {
            let storage = SqliteStorage::open(path)
                .with_context(|| format!("Failed to open SQLite database {:?}", path))?;
            Ok(Arc::new(storage))
        }
        (None, Some(dir)) => {
            let storage = FileStorage::open(dir)
                .with_context(|| format!("Failed to open storage directory {:?}", dir))?;
            Ok(Arc::new(storage))
        }
        (None, None) => bail!("No storage selected: pass --sqlite <FILE> or --dir <DIR>"),
    }
}

async fn inspect(storage: &dyn Storage, config: &PersistConfig, json: bool) -> anyhow::Result<()> {
    let storage_key = config.storage_key();

    if json {
        let state = load_stored_state::<serde_json::Value>(storage, config)
            .await
            .with_context(|| format!("Failed to load '{}'", storage_key))?;
        match state {
            Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
            None => println!("null"),
        }
        return Ok(());
    }

    let Some(record) = read_record(storage, config)
        .await
        .with_context(|| format!("Failed to read '{}'", storage_key))?
    else {
        println!("No record stored under '{}'", storage_key);
        return Ok(());
    };

    println!("RECORD: {}", storage_key);
    println!("KEYS: {}", record.len());
    let codec = config.codec();
    for (key, encoded) in &record {
        match codec.decode_value::<serde_json::Value>(encoded) {
            Ok(value) => println!("  {} = {}", key, value),
            Err(_) => println!("  {} = {} (undecodable)", key, encoded),
        }
    }
    Ok(())
}
