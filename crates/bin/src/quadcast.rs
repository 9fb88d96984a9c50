//! quadcast - simulate a scalar field and stream its quadrants to consumers.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use server::{Config, FailurePolicy, SourceKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quadcast")]
#[command(version)]
#[command(about = "Advect and diffuse a grid, sending one quadrant per step to each consumer")]
struct Cli {
    /// Grid rows
    nx: Option<i32>,

    /// Grid columns
    ny: Option<i32>,

    /// Number of timesteps to run
    max_timesteps: Option<i32>,

    /// Configuration file (TOML), created with defaults if missing
    #[arg(short, long, env = "QUADCAST_CONFIG", default_value = "quadcast.toml")]
    config: PathBuf,

    /// Address to listen on
    #[arg(long, env = "QUADCAST_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "QUADCAST_PORT")]
    port: Option<u16>,

    /// Number of consumers to wait for (1 or 4)
    #[arg(short = 'k', long, env = "QUADCAST_CONSUMERS")]
    consumers: Option<u32>,

    /// What each step sends
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// Root of the image-sequence layout
    #[arg(long)]
    images: Option<PathBuf>,

    /// What to do when a consumer fails mid-run
    #[arg(long, value_enum)]
    on_failure: Option<PolicyArg>,

    /// Random seed for the initial grid
    #[arg(long)]
    seed: Option<u64>,

    /// Pause between steps in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Wait for Enter after every consumer has registered
    #[arg(long)]
    wait: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Field,
    Images,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Drop,
    Abort,
}

impl Cli {
    /// Apply command-line overrides on top of the file config.
    fn apply(self, mut config: Config) -> Config {
        if let Some(nx) = self.nx {
            config.simulation.nx = nx;
        }
        if let Some(ny) = self.ny {
            config.simulation.ny = ny;
        }
        if let Some(steps) = self.max_timesteps {
            config.simulation.max_timesteps = steps;
        }
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(k) = self.consumers {
            config.server.consumers = k;
        }
        if let Some(source) = self.source {
            config.simulation.source = match source {
                SourceArg::Field => SourceKind::Field,
                SourceArg::Images => SourceKind::Images,
            };
        }
        if let Some(root) = self.images {
            config.images.root = root;
        }
        if let Some(policy) = self.on_failure {
            config.server.failure_policy = match policy {
                PolicyArg::Drop => FailurePolicy::Drop,
                PolicyArg::Abort => FailurePolicy::Abort,
            };
        }
        if let Some(seed) = self.seed {
            config.simulation.seed = seed;
        }
        if let Some(ms) = self.interval_ms {
            config.simulation.step_interval_ms = ms;
        }
        if self.wait {
            config.server.wait_for_start = true;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("quadcast v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let config = cli.apply(config);

    info!(
        "Grid {}x{}, {} timesteps, {} consumer(s) on {}:{}",
        config.simulation.nx,
        config.simulation.ny,
        config.simulation.max_timesteps,
        config.server.consumers,
        config.server.bind,
        config.server.port
    );

    if let Err(e) = server::run(config).await {
        error!("Producer stopped: {:#}", e);
        return Err(e);
    }
    Ok(())
}
