//! Playback service
//!
//! Async shell around the orchestrator. Serializes every inbound call
//! through one mutex, runs the periodic evaluation tick while a sensor is
//! connected, and executes the orchestrator's commands: play requests are
//! queued to a single player task that sends them to the `TrackPlayer` in
//! order, reports go out on the `EventBus`.

use super::orchestrator::{Command, Orchestrator};
use super::player::TrackPlayer;
use crate::error::Result;
use crate::matching::FeatureUpdate;
use crate::sensor;
use hrmix_common::events::{EngineErrorKind, EventBus, HrmixEvent};
use hrmix_common::{AudioFeatures, Song, TrackId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct PlaybackService {
    orchestrator: Mutex<Orchestrator>,
    event_bus: EventBus,
    /// Play requests, drained in order by the player task
    play_tx: mpsc::UnboundedSender<TrackId>,
    tick_interval: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackService {
    /// Must be called within a tokio runtime; spawns the player task
    pub fn new(
        orchestrator: Orchestrator,
        event_bus: EventBus,
        player: Arc<dyn TrackPlayer>,
        tick_interval: Duration,
    ) -> Self {
        let (play_tx, play_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_player(player, event_bus.clone(), play_rx));

        Self {
            orchestrator: Mutex::new(orchestrator),
            event_bus,
            play_tx,
            tick_interval,
            ticker: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HrmixEvent> {
        self.event_bus.subscribe()
    }

    // ========================================
    // Inbound entry points
    // ========================================

    /// Feed one heart-rate reading; starts the tick on the first usable one
    ///
    /// The tick is started while the orchestrator lock is held, so a
    /// concurrent disconnect either sees the new ticker or runs first.
    pub async fn on_heart_rate_sample(self: &Arc<Self>, bpm: u16) {
        let mut orch = self.orchestrator.lock().await;
        let commands = orch.on_heart_rate_sample(bpm, now());
        let accepted = orch.latest_bpm() == Some(bpm) && bpm > 0;
        if accepted {
            self.event_bus.emit_lossy(HrmixEvent::HeartRateSampled {
                bpm,
                zone: orch.zone_label(bpm).to_string(),
                timestamp: hrmix_common::time::now(),
            });
        }
        self.execute(commands);

        if accepted && orch.is_connected() {
            self.start_ticking().await;
        }
    }

    /// Feed a raw Heart Rate Measurement notification payload
    ///
    /// Readings taken without skin contact are passed on as 0 BPM and
    /// therefore rejected.
    pub async fn on_measurement(self: &Arc<Self>, payload: &[u8]) -> Result<()> {
        let measurement = sensor::parse_measurement(payload)?;
        let bpm = if measurement.is_reliable() {
            measurement.bpm
        } else {
            0
        };
        self.on_heart_rate_sample(bpm).await;
        Ok(())
    }

    pub async fn on_playlist_loaded(
        &self,
        songs: Vec<Song>,
        features: impl IntoIterator<Item = (TrackId, AudioFeatures)>,
    ) {
        let mut orch = self.orchestrator.lock().await;
        let commands = orch.on_playlist_loaded(songs, features, now());
        self.event_bus.emit_lossy(HrmixEvent::PlaylistLoaded {
            song_count: orch.playlist().len(),
            scoreable_count: orch.scoreable_count(),
            timestamp: hrmix_common::time::now(),
        });
        self.execute(commands);
    }

    pub async fn on_features_updated(
        &self,
        partial: impl IntoIterator<Item = (TrackId, AudioFeatures)>,
    ) -> FeatureUpdate {
        let mut orch = self.orchestrator.lock().await;
        let (update, commands) = orch.on_features_updated(partial);
        self.event_bus.emit_lossy(HrmixEvent::FeaturesUpdated {
            accepted: update.accepted,
            rejected: update.rejected.len(),
            timestamp: hrmix_common::time::now(),
        });
        self.execute(commands);
        update
    }

    /// Stop evaluating; no tick has any effect once this returns
    pub async fn on_disconnect(&self) {
        // Lock order: orchestrator, then ticker
        let mut orch = self.orchestrator.lock().await;
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }

        orch.on_disconnect();
        self.event_bus.emit_lossy(HrmixEvent::SensorDisconnected {
            timestamp: hrmix_common::time::now(),
        });
    }

    pub async fn skip(&self) {
        let mut orch = self.orchestrator.lock().await;
        let commands = orch.skip(now());
        self.execute(commands);
    }

    /// Narrow the pool to recommended tracks; false if none are in the playlist
    pub async fn on_recommendations(&self, track_ids: &[TrackId]) -> bool {
        self.orchestrator.lock().await.on_recommendations(track_ids)
    }

    pub async fn clear_recommendations(&self) {
        self.orchestrator.lock().await.clear_recommendations();
    }

    /// Run one evaluation now
    pub async fn tick(&self) {
        let mut orch = self.orchestrator.lock().await;
        let commands = orch.on_tick(now());
        self.execute(commands);
    }

    // ========================================
    // Queries
    // ========================================

    pub async fn current_track(&self) -> Option<TrackId> {
        self.orchestrator.lock().await.current_track().cloned()
    }

    pub async fn latest_bpm(&self) -> Option<u16> {
        self.orchestrator.lock().await.latest_bpm()
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // ========================================
    // Internals
    // ========================================

    /// Spawn the periodic tick task unless it is already running
    ///
    /// Callers hold the orchestrator lock.
    async fn start_ticking(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock().await;
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        info!("Starting evaluation tick (every {:?})", self.tick_interval);
        let service = Arc::downgrade(self);
        let period = self.tick_interval;

        *ticker = Some(tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                let Some(service) = service.upgrade() else {
                    debug!("Playback service dropped; tick task exiting");
                    break;
                };
                service.tick().await;
            }
        }));
    }

    fn execute(&self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::PlayTrack(track_id) => self.dispatch_play(track_id),
                Command::ReportSwitch {
                    track_id,
                    reason,
                    bpm,
                } => {
                    self.event_bus.emit_lossy(HrmixEvent::SongSwitched {
                        track_id,
                        reason,
                        bpm,
                        timestamp: hrmix_common::time::now(),
                    });
                }
                Command::ReportError { kind, detail } => {
                    self.event_bus.emit_lossy(HrmixEvent::EngineError {
                        kind,
                        detail,
                        timestamp: hrmix_common::time::now(),
                    });
                }
            }
        }
    }

    /// Fire-and-forget: the caller never waits on the player
    fn dispatch_play(&self, track_id: TrackId) {
        if let Err(e) = self.play_tx.send(track_id) {
            warn!("Player task has stopped; dropping play request for {}", e.0);
        }
    }
}

/// Send queued play requests to the player one at a time
///
/// Requests reach the player in the order the orchestrator issued them, so
/// the last one played always names the orchestrator's current song. Exits
/// once the service is dropped.
async fn run_player(
    player: Arc<dyn TrackPlayer>,
    event_bus: EventBus,
    mut requests: mpsc::UnboundedReceiver<TrackId>,
) {
    while let Some(track_id) = requests.recv().await {
        if let Err(e) = player.play_track(&track_id).await {
            warn!("Play request for {} failed: {}", track_id, e);
            event_bus.emit_lossy(HrmixEvent::EngineError {
                kind: EngineErrorKind::PlaybackDispatchFailed,
                detail: format!("{}: {}", track_id, e),
                timestamp: hrmix_common::time::now(),
            });
        }
    }
    debug!("Play request channel closed; player task exiting");
}

/// Orchestrator clock, following tokio's (pausable) clock
fn now() -> std::time::Instant {
    Instant::now().into_std()
}
