//! quadview - register with a quadcast producer and show the received quadrant.

use std::io;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use client::{AsciiRenderer, FrameWriter, Session, SummarySink, TileSink};
use futures_util::StreamExt;
use protocol::frame::DEFAULT_MAX_FRAME_LEN;
use tokio::net::TcpStream;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quadview")]
#[command(version)]
#[command(about = "Receive one quadrant per timestep from a quadcast producer")]
struct Cli {
    /// Quadrant slot to claim (1 = top-left, 2 = top-right, 3 = bottom-left, 4 = bottom-right)
    slot: u32,

    /// Producer address
    #[arg(short, long, env = "QUADVIEW_ADDR", default_value = "127.0.0.1:5050")]
    addr: String,

    /// Save file frames into this directory instead of decoding tiles
    #[arg(long)]
    files: Option<PathBuf>,

    /// Extension for saved file frames
    #[arg(long, default_value = "png")]
    extension: String,

    /// How decoded tiles are shown
    #[arg(long, value_enum, default_value = "ascii")]
    render: RenderMode,

    /// Largest frame accepted from the producer, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum RenderMode {
    Ascii,
    Summary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let session = Session::connect(cli.addr.as_str(), cli.slot)
        .await?
        .with_max_frame_len(cli.max_frame_len);

    match cli.files {
        Some(dir) => receive_files(session, FrameWriter::new(dir, cli.extension)?).await,
        None => {
            let mut sink: Box<dyn TileSink> = match cli.render {
                RenderMode::Ascii => Box::new(AsciiRenderer::new(io::stdout())),
                RenderMode::Summary => Box::new(SummarySink::default()),
            };
            receive_tiles(session, sink.as_mut()).await
        }
    }
}

async fn receive_tiles(mut session: Session<TcpStream>, sink: &mut dyn TileSink) -> anyhow::Result<()> {
    session.read_constants().await?;

    let mut step = 0u32;
    let mut tiles = std::pin::pin!(session.into_tiles());
    while let Some(tile) = tiles.next().await {
        step += 1;
        sink.render(step, &tile?)?;
    }
    info!("Received {} tiles", step);
    Ok(())
}

async fn receive_files(mut session: Session<TcpStream>, writer: FrameWriter) -> anyhow::Result<()> {
    let mut step = 0u32;
    while let Some(data) = session.next_file().await? {
        step += 1;
        writer.write(step, &data)?;
    }
    info!("Saved {} frames to {}", step, writer.dir().display());
    Ok(())
}
