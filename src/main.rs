use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use sparkify_etl::config::EtlConfig;
use sparkify_etl::load;
use sparkify_etl::progress::{format_duration, set_log_only};

#[derive(Parser)]
#[command(name = "sparkify-etl")]
#[command(about = "Load song metadata and listening logs into the Sparkify star schema")]
struct Args {
    /// TOML config file; flags and env vars override its values
    #[arg(long, env = "SPARKIFY_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "SPARKIFY_DATABASE")]
    database: Option<PathBuf>,

    #[arg(long, env = "SPARKIFY_SONG_DATA")]
    song_data: Option<PathBuf>,

    #[arg(long, env = "SPARKIFY_LOG_DATA")]
    log_data: Option<PathBuf>,

    /// Record failing files and keep going instead of stopping
    #[arg(long, env = "SPARKIFY_CONTINUE_ON_ERROR")]
    continue_on_error: bool,

    /// Hide progress bars, print plain progress lines only
    #[arg(long)]
    log_only: bool,

    /// Write run statistics as JSON to this file
    #[arg(long)]
    stats_file: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<(EtlConfig, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => EtlConfig::from_file(path)?,
            None => EtlConfig::default(),
        };
        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(song_data) = self.song_data {
            config.song_data = song_data;
        }
        if let Some(log_data) = self.log_data {
            config.log_data = log_data;
        }
        if self.continue_on_error {
            config.continue_on_error = true;
        }
        Ok((config, self.stats_file))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    set_log_only(args.log_only);
    let (config, stats_file) = args.into_config()?;

    let stats = load::run(&config)
        .with_context(|| format!("ETL run against {} failed", config.database.display()))?;

    stats.log_summary();
    if let Some(path) = stats_file {
        stats
            .write_to_file(&path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
    }

    println!("\n{:=<60}", "");
    println!("Load complete!");
    println!("  Song files: {}", stats.song_files);
    println!("  Log files: {}", stats.log_files);
    println!(
        "  Songplays: {} ({:.1}% matched to the catalog)",
        stats.songplays_written,
        stats.resolve_rate()
    );
    if !stats.failures.is_empty() {
        println!("  Failed files: {}", stats.failures.len());
        for failure in &stats.failures {
            println!("    {}: {}", failure.path.display(), failure.error);
        }
    }
    println!("  Elapsed: {}", format_duration(Duration::from_secs_f64(stats.elapsed_seconds)));
    println!("{:=<60}", "");

    Ok(())
}
