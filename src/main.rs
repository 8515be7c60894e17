use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use visitdb::config::Config;
use visitdb::email::relay::ConfiguredRelay;
use visitdb::email::EmailManager;
use visitdb::error::Result;
use visitdb::hotels::HotelDirectory;
use visitdb::manager;
use visitdb::parser;
use visitdb::shell::Shell;
use visitdb::storage::{FileStore, KvStore};
use visitdb::VisitDb;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON config file; flags below override it
    #[clap(long)]
    config: Option<PathBuf>,

    #[clap(long)]
    data_dir: Option<PathBuf>,

    #[clap(long)]
    quota_bytes: Option<u64>,

    /// fsync every write
    #[clap(long)]
    strict: bool,

    /// Log emails instead of sending them
    #[clap(long)]
    dry_run: bool,

    /// Skip the background maintenance thread
    #[clap(long)]
    no_maintenance: bool,
}

const DEFAULT_DATA_DIR: &str = "visitdb-data";

fn main() -> ExitCode {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,visitdb=info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Could not start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if config.data_dir.as_os_str().is_empty() {
        config.data_dir = PathBuf::from(DEFAULT_DATA_DIR);
    }
    if args.quota_bytes.is_some() {
        config.quota_bytes = args.quota_bytes;
    }
    config.strict_durability |= args.strict;
    config.relay.dry_run |= args.dry_run;

    config.validate()?;
    Ok(config)
}

async fn async_main(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    println!("--- visitdb ---");
    println!("Data Dir: {}", config.data_dir.display());
    println!("Durability Mode: {}", if config.strict_durability { "Strict (Fsync)" } else { "OS Buffered" });
    println!("Email Relay: {}", if config.relay.dry_run { "Dry Run" } else { config.relay.endpoint.as_str() });
    println!("---------------");

    let store: Arc<dyn KvStore> =
        Arc::new(FileStore::open(&config.data_dir, config.quota_bytes, config.strict_durability)?);
    let db = Arc::new(VisitDb::open(store.clone(), config.storage.clone())?);

    let hotels = HotelDirectory::new(store.clone());
    hotels.ensure_seeded()?;

    let relay = ConfiguredRelay::from_config(&config.relay)?;
    let emails = EmailManager::new(store, relay, config.relay.clone(), config.sender.clone())?;

    let maintenance = if args.no_maintenance {
        None
    } else {
        Some(manager::start_maintenance_thread(db.clone(), &config.maintenance))
    };

    let shell = Shell::new(db, hotels, emails);
    info!("Ready. Type 'HELP' for supported commands or 'EXIT' to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"visitdb> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else { break };
        if line.trim().is_empty() {
            continue;
        }

        match parser::parse_command(&line) {
            Ok(cmd) => match shell.execute(cmd).await {
                Ok(Some(out)) => println!("{}", out),
                Ok(None) => break,
                Err(e) => println!("[Error] {}", e),
            },
            Err(e) => {
                println!("[Syntax Error] {}", e);
                if line.to_uppercase().starts_with("SCHEDULE") {
                    println!("    Hint: Try SCHEDULE 'hotel_001' ON 2026-11-02 AT 14:00");
                }
            }
        }
    }

    if let Some(handle) = maintenance {
        handle.stop();
    }
    println!("Shutting down.");
    Ok(())
}
