//! # Phantom Client Configuration Validator
//!
//! Loads client configuration the way the library does and reports problems
//! before anything talks to the server.
//!
//! ```text
//! config-validator                 # default file locations + PHANTOM_* env
//! config-validator path/to.toml    # explicit file + PHANTOM_* env
//! config-validator --probe         # also count containers on the server
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

use phantom_client::{ClientConfig, PhantomClient, Query};

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate Phantom client configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (default: standard locations)
    config: Option<PathBuf>,

    /// Count containers on the server after loading
    #[arg(long)]
    probe: bool,
}

fn load(cli: &Cli) -> Result<ClientConfig> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::load().context("loading default configuration")?,
    };
    Ok(config)
}

async fn probe(config: ClientConfig) -> Result<()> {
    let client = PhantomClient::new(config).context("building client")?;
    let count = client
        .get_container_count(&Query::containers())
        .await
        .context("counting containers")?;
    println!("Server reachable: {} containers", count.count);
    Ok(())
}

#[tokio::main]
async fn main() {
    phantom_client::logging::init_structured_logging();
    let cli = Cli::parse();

    let result = async {
        let config = load(&cli)?;
        println!("{config:#?}");
        if config.auth_token.is_none() {
            println!("warning: no auth_token set; requests will be unauthenticated");
        }
        if cli.probe {
            probe(config).await?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}
