use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use devconsul::config_loader;
use devconsul::orchestrator;
use devconsul::utils::DirectoryStore;

/// Generate a local multi-datacenter Consul test cluster
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the cluster configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Directory the manifest and cache files are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Log every synthesized node
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Configuration file: {:?}", args.config);
    info!("Output directory: {:?}", args.output);

    let config = config_loader::load_config(&args.config)?;

    let mut store = DirectoryStore::new(&args.output);
    let report = orchestrator::generate(&config, &mut store, args.verbose)
        .wrap_err("Failed to generate cluster files")?;

    if report.written == 0 {
        info!("Everything up to date");
    }
    Ok(())
}
