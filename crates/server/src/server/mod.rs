//! Producer: registration phase followed by the barrier-synchronised run.

use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{Config, SourceKind};
use crate::source::{FieldSource, ImageSequenceSource, StepSource};

pub mod consumer;
pub mod distributor;
pub mod registry;

pub use consumer::Consumer;
pub use distributor::{DistributionSettings, Distributor, RunReport};
pub use registry::{accept_registrations, RegistrationSettings, SlotTable};

/// Run the producer: validate, bind, register every slot, distribute, report.
pub async fn run(config: Config) -> anyhow::Result<RunReport> {
    // Dimension errors are fatal before any socket is opened.
    config.validate()?;

    match config.simulation.source {
        SourceKind::Field => {
            let source = FieldSource::from_config(&config)?;
            serve(&config, source).await
        }
        SourceKind::Images => {
            let steps = config.simulation.max_timesteps.max(0) as u32;
            let source = ImageSequenceSource::new(&config.images, steps);
            serve(&config, source).await
        }
    }
}

/// Bind the configured address and run `source` to completion.
pub async fn serve<S: StepSource>(config: &Config, source: S) -> anyhow::Result<RunReport> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    serve_on(listener, config, source).await
}

/// Run `source` against consumers connecting to an already-bound listener.
pub async fn serve_on<S: StepSource>(
    listener: TcpListener,
    config: &Config,
    source: S,
) -> anyhow::Result<RunReport> {
    let registration = RegistrationSettings {
        handshake_timeout: config.server.handshake_timeout(),
        send_timeout: config.server.send_timeout(),
    };
    let table = accept_registrations(
        &listener,
        config.server.consumers as usize,
        source.handshake(),
        registration,
    )
    .await?;
    // Registration is closed; late joiners are refused by the OS.
    drop(listener);

    if config.server.wait_for_start {
        wait_for_start().await?;
    }

    let settings = DistributionSettings {
        send_timeout: config.server.send_timeout(),
        step_interval: config.simulation.step_interval(),
        failure_policy: config.server.failure_policy,
    };
    let report = Distributor::new(source, table.into_slots(), settings)
        .run()
        .await?;
    report.log();
    Ok(report)
}

async fn wait_for_start() -> std::io::Result<()> {
    info!("All consumers registered. Press Enter to start...");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    lines.next_line().await?;
    Ok(())
}
