use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use peering_api::{LoggingReporter, NoopReporter};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::{PeeringConfig, Sandboxes};

/// Peer two cluster networks and open the ports Submariner needs
#[derive(Debug, Parser)]
#[command(name = "peering-ctl", version)]
struct Cli {
    /// Path to the YAML description of both clusters
    #[arg(short, long, default_value = "peering.yaml")]
    config: PathBuf,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Peer the source network with the target network
    Create,
    /// Remove the peering between the two networks
    Cleanup,
    /// Open the internal Submariner ports on both clusters
    Prepare,
    /// Close the internal Submariner ports on both clusters
    CleanupPrepare,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer().with_target(false)).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = PeeringConfig::load(&cli.config)?;
    info!(
        provider = %config.provider,
        source = %config.source.endpoint.infra_id,
        target = %config.target.endpoint.infra_id,
        "Loaded peering configuration"
    );

    let sandboxes = Sandboxes::new();
    let source = sandboxes.build_cloud(&config, &config.source).await?;
    let target = sandboxes.build_cloud(&config, &config.target).await?;
    let reporter = LoggingReporter::new();
    let input = config.prepare_input();

    // Sandbox state does not outlive the process, so the cleanup commands
    // first recreate what they remove.
    match cli.command {
        Command::Create => source.create_vpc_peering(&target, &reporter).await?,
        Command::Cleanup => {
            source.create_vpc_peering(&target, &NoopReporter).await?;
            source.cleanup_vpc_peering(&target, &reporter).await?;
        }
        Command::Prepare => {
            for cloud in [&source, &target] {
                cloud.prepare_for_submariner(&input, &reporter).await?;
            }
        }
        Command::CleanupPrepare => {
            for cloud in [&source, &target] {
                cloud.prepare_for_submariner(&input, &NoopReporter).await?;
                cloud.cleanup_after_submariner(&input, &reporter).await?;
            }
        }
    }

    info!("Done");
    Ok(())
}
