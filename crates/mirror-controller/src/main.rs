//! mirror-controller entry point.
//!
//! ```text
//! mirror-controller discover                 find a host on the LAN
//! mirror-controller watch [--record FILE]    receive video, report stats
//! mirror-controller pair  [--pin dddd]       pair and keep the link alive
//! ```
//!
//! `watch` and `pair` discover the host first unless `--host` is given.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mirror_controller::control::PendingPairing;
use mirror_controller::discovery::{discover_host, ProbeConfig};
use mirror_controller::video::{VideoReceiver, DEFAULT_MAX_FRAME_LEN};
use mirror_core::protocol::{
    encode_video_frame, DEFAULT_CONTROL_PORT, DEFAULT_DISCOVERY_PORT, DEFAULT_VIDEO_PORT,
};
use mirror_core::PairingCode;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Screen-mirroring controller.
#[derive(Debug, Parser)]
#[command(name = "mirror-controller", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Broadcast discovery probes until a host answers.
    Discover(DiscoverArgs),
    /// Receive the video stream and print per-second statistics.
    Watch(WatchArgs),
    /// Pair with the control channel and send periodic pings.
    Pair(PairArgs),
}

#[derive(Debug, Args)]
struct DiscoverArgs {
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT, env = "MIRROR_DISCOVERY_PORT")]
    discovery_port: u16,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 10, env = "MIRROR_DISCOVERY_TIMEOUT")]
    timeout: u64,
}

#[derive(Debug, Args)]
struct HostArgs {
    /// Host address; discovered on the LAN when omitted.
    #[arg(long, env = "MIRROR_HOST")]
    host: Option<IpAddr>,

    #[command(flatten)]
    discovery: DiscoverArgs,
}

#[derive(Debug, Args)]
struct WatchArgs {
    #[command(flatten)]
    host: HostArgs,

    #[arg(long, default_value_t = DEFAULT_VIDEO_PORT, env = "MIRROR_VIDEO_PORT")]
    video_port: u16,

    /// Append every received frame to this file as a length-prefixed dump.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,
}

#[derive(Debug, Args)]
struct PairArgs {
    #[command(flatten)]
    host: HostArgs,

    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT, env = "MIRROR_CONTROL_PORT")]
    control_port: u16,

    /// The code shown on the host.  Defaults to the code in the challenge.
    #[arg(long, env = "MIRROR_PIN")]
    pin: Option<PairingCode>,

    /// Seconds between pings.
    #[arg(long, default_value_t = 5)]
    ping_interval: u64,
}

impl DiscoverArgs {
    fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            port: self.discovery_port,
            timeout: Duration::from_secs(self.timeout),
            ..ProbeConfig::default()
        }
    }
}

impl HostArgs {
    async fn resolve(&self) -> anyhow::Result<IpAddr> {
        match self.host {
            Some(ip) => Ok(ip),
            None => {
                let found = discover_host(&self.discovery.probe_config())
                    .await
                    .context("discovering host")?;
                Ok(found.ip())
            }
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Discover(args) => {
            let host = discover_host(&args.probe_config()).await?;
            println!("{}", host.ip());
        }
        Command::Watch(args) => watch(args).await?,
        Command::Pair(args) => pair(args).await?,
    }
    Ok(())
}

async fn watch(args: WatchArgs) -> anyhow::Result<()> {
    let addr = SocketAddr::new(args.host.resolve().await?, args.video_port);
    let mut receiver = VideoReceiver::connect(addr, DEFAULT_MAX_FRAME_LEN).await?;
    let mut recording = match &args.record {
        Some(path) => Some(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => None,
    };

    let mut window_start = Instant::now();
    let mut window_frames = 0u64;
    loop {
        let frame = tokio::select! {
            frame = receiver.next_frame() => frame?,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(frame) = frame else {
            info!("host closed the video stream");
            break;
        };

        if let Some(file) = recording.as_mut() {
            file.write_all(&encode_video_frame(&frame)?).await?;
        }

        window_frames += 1;
        let elapsed = window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            info!(
                "{:.1} fps, {} frames, {} bytes total",
                window_frames as f64 / elapsed.as_secs_f64(),
                receiver.frames_received(),
                receiver.bytes_received()
            );
            window_start = Instant::now();
            window_frames = 0;
        }

        if args.frames.is_some_and(|limit| receiver.frames_received() >= limit) {
            break;
        }
    }

    if let Some(mut file) = recording {
        file.flush().await?;
    }
    info!("received {} frames", receiver.frames_received());
    Ok(())
}

async fn pair(args: PairArgs) -> anyhow::Result<()> {
    let addr = SocketAddr::new(args.host.resolve().await?, args.control_port);
    let pending = PendingPairing::connect(addr).await?;
    let code = args.pin.unwrap_or_else(|| pending.advertised_code());
    let mut sender = pending.pair(&code).await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(args.ping_interval.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sender.send_ping().await {
                    Ok(took) => info!("ping sent in {:.2} ms", took.as_secs_f64() * 1000.0),
                    Err(e) => {
                        warn!("control link lost: {e}");
                        return Ok(());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("sent {} events", sender.events_sent());
    sender.shutdown().await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
