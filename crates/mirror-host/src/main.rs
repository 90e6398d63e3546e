//! mirror-host entry point.
//!
//! Loads the configuration, starts a session, prints the pairing code, and
//! runs until Ctrl-C.
//!
//! ```text
//! main()
//!  └─ load_config()            -- file, then CLI / env overrides
//!  └─ SessionController::start()
//!       ├─ discovery      (UDP thread)
//!       ├─ video-accept   (TCP thread + liveness monitor)
//!       └─ control-accept (TCP thread + paired worker)
//!  └─ FrameReplayer           -- only with --frames
//! ```
//!
//! Without `--frames` nothing feeds the video channel; a real deployment
//! links an encoder that calls `SessionController::push_video_frame`.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mirror_host::application::session::SessionController;
use mirror_host::infrastructure::frame_replay::{load_frame_dump, FrameReplayer};
use mirror_host::infrastructure::input_injection::LoggingInputSink;
use mirror_host::infrastructure::storage::config::{
    config_file_path, load_config, save_config, HostConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Screen-mirroring host.
///
/// Answers discovery probes, streams video to one controller, and accepts
/// PIN-gated input events from one controller.
#[derive(Debug, Parser)]
#[command(name = "mirror-host", version)]
struct Cli {
    /// Config file to read instead of the platform default.
    #[arg(long, env = "MIRROR_HOST_CONFIG")]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit.
    #[arg(long)]
    init_config: bool,

    /// IP address to bind every socket to.
    #[arg(long, env = "MIRROR_BIND")]
    bind: Option<IpAddr>,

    #[arg(long, env = "MIRROR_VIDEO_PORT")]
    video_port: Option<u16>,

    #[arg(long, env = "MIRROR_CONTROL_PORT")]
    control_port: Option<u16>,

    #[arg(long, env = "MIRROR_DISCOVERY_PORT")]
    discovery_port: Option<u16>,

    /// Length-prefixed frame dump to replay as the video source.
    #[arg(long, env = "MIRROR_FRAMES")]
    frames: Option<PathBuf>,

    /// Replay rate for `--frames`.
    #[arg(long, default_value_t = 30, env = "MIRROR_FPS")]
    fps: u32,
}

impl Cli {
    /// Applies command-line and environment overrides on top of `config`.
    fn apply(&self, config: &mut HostConfig) {
        if let Some(bind) = self.bind {
            config.network.bind_address = bind.to_string();
        }
        if let Some(port) = self.video_port {
            config.network.video_port = port;
        }
        if let Some(port) = self.control_port {
            config.network.control_port = port;
        }
        if let Some(port) = self.discovery_port {
            config.network.discovery_port = port;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.host.log_level)),
        )
        .init();

    if cli.init_config {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => config_file_path()?,
        };
        save_config(&config, &path)?;
        info!("wrote configuration to {}", path.display());
        return Ok(());
    }

    let session_config = config.to_session_config()?;
    let session = Arc::new(SessionController::new(
        session_config,
        Arc::new(LoggingInputSink::new()),
    )?);
    session.start().context("starting session")?;

    if let Some(code) = session.pairing_code() {
        info!("pairing code: {code}");
    }

    let replayer = match &cli.frames {
        Some(path) => {
            let frames = load_frame_dump(path)?;
            info!("loaded {} frames from {}", frames.len(), path.display());
            let target = Arc::clone(&session);
            Some(FrameReplayer::spawn(frames, cli.fps, move |frame| {
                target.push_video_frame(frame);
            })?)
        }
        None => None,
    };

    info!("mirror-host ready.  Press Ctrl-C to exit.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl-C: {e}");
    }
    info!("shutdown signal received");

    if let Some(replayer) = replayer {
        let pushed = replayer.stop();
        info!("frame replay pushed {pushed} frames");
    }

    let stopping = Arc::clone(&session);
    if let Err(e) = tokio::task::spawn_blocking(move || stopping.stop()).await {
        warn!("session stop task failed: {e}");
    }

    info!("mirror-host stopped ({} frames sent)", session.frames_sent());
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
