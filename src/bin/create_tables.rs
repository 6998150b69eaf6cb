//! Drop and recreate the Sparkify star schema.
//! Usage: create-tables [--database <path>]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sparkify_etl::config::EtlConfig;
use sparkify_etl::progress::{create_spinner, set_log_only};
use sparkify_etl::schema::CREATE_ORDER;
use sparkify_etl::store::Warehouse;

#[derive(Parser)]
#[command(name = "create-tables")]
#[command(about = "Drop and recreate the songplays, users, songs, artists and time tables")]
struct Args {
    #[arg(long, env = "SPARKIFY_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "SPARKIFY_DATABASE")]
    database: Option<PathBuf>,

    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    set_log_only(args.log_only);

    let database = match (args.database, args.config) {
        (Some(path), _) => path,
        (None, Some(config)) => EtlConfig::from_file(&config)?.database,
        (None, None) => EtlConfig::default().database,
    };

    info!(database = %database.display(), "Recreating tables");
    let spinner = create_spinner("Recreating tables");
    let warehouse = Warehouse::open(&database)
        .with_context(|| format!("Failed to open {}", database.display()))?;
    warehouse.drop_tables().context("Failed to drop tables")?;
    warehouse.create_tables().context("Failed to create tables")?;
    spinner.finish_with_message("Tables recreated");

    for table in CREATE_ORDER {
        println!("  {}", table.name);
    }

    Ok(())
}
