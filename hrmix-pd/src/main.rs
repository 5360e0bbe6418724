//! hrmix Program Director (hrmix-pd) - Simulator entry point
//!
//! Loads a playlist and drives the playback service with a scripted
//! heart-rate walk instead of a real sensor. Every engine event is logged.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hrmix_common::config::{resolve_config_file, CONFIG_ENV_VAR};
use hrmix_common::events::{EventBus, HrmixEvent};
use hrmix_pd::config::TomlConfig;
use hrmix_pd::playback::{LoggingPlayer, Orchestrator, PlaybackService, TrackPlayer};
use hrmix_pd::playlist::Playlist;
use hrmix_pd::simulator::{parse_presets, HeartRateWalk};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for hrmix-pd
#[derive(Parser, Debug)]
#[command(name = "hrmix-pd")]
#[command(about = "Heart-rate reactive song selection simulator")]
#[command(version)]
struct Args {
    /// Configuration file (overrides HRMIX_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Playlist JSON file
    #[arg(short, long)]
    playlist: PathBuf,

    /// Comma-separated effort presets to walk through
    #[arg(long, default_value = "rest,walk,jog,run,sprint")]
    presets: String,

    /// Samples fed per preset
    #[arg(long, default_value = "10")]
    samples_per_preset: usize,

    /// Milliseconds between simulated samples
    #[arg(long, default_value = "1000")]
    step_ms: u64,

    /// Maximum random deviation from the preset heart rate
    #[arg(long, default_value = "3")]
    jitter: u16,

    /// Seed for reproducible song selection and jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Reject every play request, as if no playback device were active
    #[arg(long)]
    reject_playback: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let source = resolve_config_file(args.config.as_deref(), CONFIG_ENV_VAR)
        .context("Failed to locate configuration file")?;
    let config = TomlConfig::load(&source).context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "hrmix_pd={0},hrmix_common={0}",
                config.logging.level
            ))
        }))
        .with(fmt::layer())
        .init();

    info!("Starting hrmix program director simulator");
    info!("Configuration source: {:?}", source);

    let playlist = Playlist::load(&args.playlist)
        .with_context(|| format!("Failed to load playlist {}", args.playlist.display()))?;
    let presets = parse_presets(&args.presets).context("Invalid --presets")?;

    let orchestrator = Orchestrator::from_config(&config.matching, args.seed)
        .context("Failed to initialize orchestrator")?;
    let player: Arc<dyn TrackPlayer> = if args.reject_playback {
        warn!("Playback requests will be rejected");
        Arc::new(LoggingPlayer::rejecting())
    } else {
        Arc::new(LoggingPlayer::new())
    };
    let event_bus = EventBus::new(config.events.capacity);
    let logger = tokio::spawn(log_events(event_bus.subscribe()));
    debug!(
        "Event bus ready: capacity {}, {} subscriber(s)",
        event_bus.capacity(),
        event_bus.subscriber_count()
    );

    let service = Arc::new(PlaybackService::new(
        orchestrator,
        event_bus,
        player,
        config.matching.tick_interval(),
    ));

    service
        .on_playlist_loaded(playlist.songs, playlist.features)
        .await;

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let walk = HeartRateWalk::new(presets, args.samples_per_preset, args.jitter, rng);
    let step = Duration::from_millis(args.step_ms.max(1));

    tokio::select! {
        _ = run_walk(&service, walk, step) => {
            info!("Heart-rate script finished");
        },
        _ = shutdown_signal() => {},
    }

    service.on_disconnect().await;
    // Give the logger a moment to drain
    tokio::time::sleep(Duration::from_millis(50)).await;
    logger.abort();

    info!("Simulator shutdown complete");
    Ok(())
}

async fn run_walk(service: &Arc<PlaybackService>, walk: HeartRateWalk<StdRng>, step: Duration) {
    let mut last_label = "";
    for (preset, bpm) in walk {
        if preset.label != last_label {
            info!("Effort: {} (~{} BPM)", preset.label, preset.bpm);
            last_label = preset.label;
        }
        service.on_heart_rate_sample(bpm).await;
        tokio::time::sleep(step).await;
    }
}

async fn log_events(mut events: tokio::sync::broadcast::Receiver<HrmixEvent>) {
    loop {
        match events.recv().await {
            Ok(HrmixEvent::HeartRateSampled { bpm, zone, .. }) => {
                debug!("Heart rate {} BPM ({})", bpm, zone);
            }
            Ok(HrmixEvent::SongSwitched {
                track_id,
                reason,
                bpm,
                ..
            }) => match bpm {
                Some(bpm) => info!("Switched to {} at {} BPM ({})", track_id, bpm, reason),
                None => info!("Switched to {} ({})", track_id, reason),
            },
            Ok(HrmixEvent::EngineError { kind, detail, .. }) => {
                warn!("{}: {}", kind, detail);
            }
            Ok(event) => info!("Event: {}", event.event_type()),
            Err(RecvError::Lagged(skipped)) => warn!("Event logger lagged, {} events skipped", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, disconnecting sensor");
        },
        _ = terminate => {
            info!("Received terminate signal, disconnecting sensor");
        },
    }
}
