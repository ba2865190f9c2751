//! Trust Hub Node: entry point.
//!
//! Serves the attestation and prior-authorization agents with configuration
//! from a TOML file.

mod api;
mod config;
mod node;
mod state;
mod storage;
mod validator;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::TrustHubConfig;
use node::TrustHubNode;
use trusthub_crypto::KeyPair;
use trusthub_identity::IssuerRecord;

/// Trust Hub Node
#[derive(Parser, Debug)]
#[command(name = "trusthub-node", version, about = "Trust Hub Node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "trusthub.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Write a signing seed for each configured agent that lacks one, add
    /// the matching registry entries to the config, then exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(config: &TrustHubConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Generate a seed for every configured agent that lacks one and register
/// the matching public keys.
fn init(path: &std::path::Path) -> anyhow::Result<()> {
    let mut config = TrustHubConfig::load(path)?;

    let mut generated = 0;
    for agent in &config.agents {
        if agent.seed_path.exists() {
            tracing::info!(
                kind = %agent.kind,
                seed = %agent.seed_path.display(),
                "signing seed present, keeping it"
            );
            continue;
        }

        let keypair = KeyPair::generate();
        node::save_keypair(&agent.seed_path, &keypair)?;

        config
            .registry
            .issuers
            .retain(|entry| entry.id != agent.issuer_id);
        config.registry.issuers.push(
            IssuerRecord::new(
                agent.issuer_id.clone(),
                keypair.public_key(),
                agent.kind.issuer_role(),
            )
            .with_display_name(format!("Trust Hub {} agent", agent.kind))
            .to_entry(),
        );
        generated += 1;

        tracing::info!(
            kind = %agent.kind,
            seed = %agent.seed_path.display(),
            issuer = %agent.issuer_id,
            "wrote signing seed"
        );
    }

    if generated == 0 {
        anyhow::bail!("every configured agent already has a signing seed; nothing to do");
    }
    config.save(path)?;
    tracing::info!(path = %path.display(), generated, "wrote config");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TrustHubConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(api_port) = args.api_port {
        config.api.port = api_port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config);

    if args.init {
        return init(&args.config);
    }

    tracing::info!("Trust Hub Node v{}", env!("CARGO_PKG_VERSION"));

    let node = TrustHubNode::new(config)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "API server error");
            }
        }
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    node.shutdown().await?;
    tracing::info!("Trust Hub node exited cleanly");
    Ok(())
}
