//! Playback service tests
//!
//! Run on a paused tokio clock so the evaluation tick can be stepped
//! through deterministically.

use async_trait::async_trait;
use hrmix_common::events::{EngineErrorKind, EventBus, HrmixEvent, SwitchReason};
use hrmix_common::{AudioFeatures, Song, TrackId};
use hrmix_pd::config::MatchingConfig;
use hrmix_pd::playback::{Orchestrator, PlaybackService, PlayerError, TrackPlayer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ========================================
// Test doubles
// ========================================

/// Records every play request; optionally rejects them all
#[derive(Default)]
struct RecordingPlayer {
    requests: Mutex<Vec<TrackId>>,
    reject: AtomicBool,
}

impl RecordingPlayer {
    fn rejecting() -> Self {
        let player = Self::default();
        player.reject.store(true, Ordering::SeqCst);
        player
    }

    fn requests(&self) -> Vec<TrackId> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackPlayer for RecordingPlayer {
    async fn play_track(&self, track_id: &TrackId) -> Result<(), PlayerError> {
        self.requests.lock().unwrap().push(track_id.clone());
        if self.reject.load(Ordering::SeqCst) {
            Err(PlayerError::NoActiveDevice)
        } else {
            Ok(())
        }
    }
}

/// Takes 200 ms over its first request, then answers at once
#[derive(Default)]
struct SlowFirstPlayer {
    calls: AtomicUsize,
    played: Mutex<Vec<TrackId>>,
}

impl SlowFirstPlayer {
    fn last_played(&self) -> Option<TrackId> {
        self.played.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TrackPlayer for SlowFirstPlayer {
    async fn play_track(&self, track_id: &TrackId) -> Result<(), PlayerError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        self.played.lock().unwrap().push(track_id.clone());
        Ok(())
    }
}

/// Never finishes a play request
struct StalledPlayer;

#[async_trait]
impl TrackPlayer for StalledPlayer {
    async fn play_track(&self, _track_id: &TrackId) -> Result<(), PlayerError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

// ========================================
// Helpers
// ========================================

fn id(s: &str) -> TrackId {
    TrackId::new(s).unwrap()
}

fn fast_and_slow() -> (Vec<Song>, Vec<(TrackId, AudioFeatures)>) {
    (
        vec![
            Song::new(id("fast"), "Fast", "A"),
            Song::new(id("slow"), "Slow", "B"),
        ],
        vec![
            (id("fast"), AudioFeatures::new(150.0, 0.7, 0.5, 0.5)),
            (id("slow"), AudioFeatures::new(70.0, 0.3, 0.5, 0.5)),
        ],
    )
}

fn service_with(player: Arc<dyn TrackPlayer>) -> Arc<PlaybackService> {
    let config = MatchingConfig::default();
    let orchestrator = Orchestrator::from_config(&config, Some(1)).unwrap();
    Arc::new(PlaybackService::new(
        orchestrator,
        EventBus::new(64),
        player,
        config.tick_interval(),
    ))
}

/// Let spawned tasks run, then collect everything published so far
async fn drain(rx: &mut broadcast::Receiver<HrmixEvent>) -> Vec<HrmixEvent> {
    tokio::time::sleep(Duration::from_millis(1)).await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn switches(events: &[HrmixEvent]) -> Vec<(TrackId, SwitchReason)> {
    events
        .iter()
        .filter_map(|e| match e {
            HrmixEvent::SongSwitched {
                track_id, reason, ..
            } => Some((track_id.clone(), *reason)),
            _ => None,
        })
        .collect()
}

fn engine_errors(events: &[HrmixEvent]) -> Vec<EngineErrorKind> {
    events
        .iter()
        .filter_map(|e| match e {
            HrmixEvent::EngineError { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect()
}

// ========================================
// Tick scheduling
// ========================================

/// **Given:** the fast song playing and the heart rate dropping to 70
/// **When:** the tick runs on its own
/// **Then:** the slow song plays after the dwell time, not before
#[tokio::test(start_paused = true)]
async fn test_tick_switches_after_dwell() {
    let player = Arc::new(RecordingPlayer::default());
    let service = service_with(player.clone());
    let mut rx = service.subscribe();

    let (songs, features) = fast_and_slow();
    service.on_playlist_loaded(songs, features).await;
    service.on_heart_rate_sample(70).await;
    assert!(service.is_ticking().await);

    tokio::time::sleep(Duration::from_millis(4500)).await;
    assert_eq!(service.current_track().await, Some(id("fast")));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(service.current_track().await, Some(id("slow")));

    let events = drain(&mut rx).await;
    assert_eq!(
        switches(&events),
        vec![
            (id("fast"), SwitchReason::PlaylistLoaded),
            (id("slow"), SwitchReason::TempoOutOfBand),
        ]
    );
    assert_eq!(player.requests(), vec![id("fast"), id("slow")]);
}

/// **Given:** a running tick
/// **When:** the sensor disconnects
/// **Then:** no later tick changes anything
#[tokio::test(start_paused = true)]
async fn test_no_tick_effect_after_disconnect() {
    let player = Arc::new(RecordingPlayer::default());
    let service = service_with(player.clone());
    let mut rx = service.subscribe();

    let (songs, features) = fast_and_slow();
    service.on_playlist_loaded(songs, features).await;
    service.on_heart_rate_sample(70).await;
    service.on_disconnect().await;
    assert!(!service.is_ticking().await);
    assert_eq!(service.latest_bpm().await, None);

    tokio::time::sleep(Duration::from_secs(30)).await;
    let events = drain(&mut rx).await;

    assert_eq!(switches(&events).len(), 1);
    assert!(events
        .iter()
        .any(|e| matches!(e, HrmixEvent::SensorDisconnected { .. })));
    assert_eq!(service.current_track().await, Some(id("fast")));
    assert_eq!(player.requests(), vec![id("fast")]);
}

/// **Given:** a disconnected sensor
/// **When:** a new reading arrives
/// **Then:** the tick starts again
#[tokio::test(start_paused = true)]
async fn test_tick_restarts_on_reconnect() {
    let service = service_with(Arc::new(RecordingPlayer::default()));
    let (songs, features) = fast_and_slow();
    service.on_playlist_loaded(songs, features).await;

    service.on_heart_rate_sample(150).await;
    service.on_disconnect().await;
    assert!(!service.is_ticking().await);

    service.on_heart_rate_sample(70).await;
    assert!(service.is_ticking().await);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(service.current_track().await, Some(id("slow")));
}

// ========================================
// Dispatch
// ========================================

/// **Given:** a player with no active device
/// **When:** a switch is dispatched and later ticks run
/// **Then:** the failure is published once, state keeps the attempted song,
/// and no retry happens
#[tokio::test(start_paused = true)]
async fn test_dispatch_failure_reported_without_retry() {
    let player = Arc::new(RecordingPlayer::rejecting());
    let service = service_with(player.clone());
    let mut rx = service.subscribe();

    let (songs, features) = fast_and_slow();
    service.on_playlist_loaded(songs, features).await;
    service.on_heart_rate_sample(150).await;

    tokio::time::sleep(Duration::from_secs(20)).await;
    let events = drain(&mut rx).await;

    assert_eq!(
        engine_errors(&events),
        vec![EngineErrorKind::PlaybackDispatchFailed]
    );
    assert_eq!(service.current_track().await, Some(id("fast")));
    assert_eq!(player.requests(), vec![id("fast")]);
}

/// **Given:** a player that never answers
/// **When:** a playlist load dispatches a play request
/// **Then:** the call still returns promptly
#[tokio::test(start_paused = true)]
async fn test_play_dispatch_is_fire_and_forget() {
    let service = service_with(Arc::new(StalledPlayer));
    let (songs, features) = fast_and_slow();

    let result = tokio::time::timeout(
        Duration::from_millis(100),
        service.on_playlist_loaded(songs, features),
    )
    .await;
    assert!(result.is_ok());

    let result = tokio::time::timeout(Duration::from_millis(100), service.skip()).await;
    assert!(result.is_ok());
}

/// **Given:** a player that is slow to answer its first request
/// **When:** a playlist load plays one song and a skip plays another
/// before the first request finishes
/// **Then:** the player receives both in order and ends on the current song
#[tokio::test(start_paused = true)]
async fn test_play_requests_reach_player_in_order() {
    let player = Arc::new(SlowFirstPlayer::default());
    let service = service_with(player.clone());
    let (songs, features) = fast_and_slow();

    service.on_playlist_loaded(songs, features).await;
    service.skip().await;
    assert_eq!(service.current_track().await, Some(id("slow")));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        *player.played.lock().unwrap(),
        vec![id("fast"), id("slow")]
    );
    assert_eq!(player.last_played(), service.current_track().await);
}

// ========================================
// Connection lifecycle
// ========================================

/// **Given:** readings and disconnects racing on a multi-threaded runtime
/// **When:** both calls have returned
/// **Then:** a tick is running exactly when a reading is buffered
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tick_state_consistent_under_concurrent_disconnect() {
    for _ in 0..200 {
        let service = service_with(Arc::new(RecordingPlayer::default()));
        let sample = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.on_heart_rate_sample(120).await })
        };
        let disconnect = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.on_disconnect().await })
        };
        sample.await.unwrap();
        disconnect.await.unwrap();

        let connected = service.latest_bpm().await.is_some();
        assert_eq!(service.is_ticking().await, connected);
        service.on_disconnect().await;
    }
}

// ========================================
// Inbound payloads and events
// ========================================

/// **Given:** raw sensor notifications
/// **When:** one has skin contact and one does not
/// **Then:** the first is buffered and the second is rejected
#[tokio::test(start_paused = true)]
async fn test_measurement_payloads() {
    let service = service_with(Arc::new(RecordingPlayer::default()));
    let mut rx = service.subscribe();

    service.on_measurement(&[0x06, 120]).await.unwrap();
    assert_eq!(service.latest_bpm().await, Some(120));

    service.on_measurement(&[0x04, 95]).await.unwrap();
    assert_eq!(service.latest_bpm().await, Some(120));

    assert!(service.on_measurement(&[0x01, 0x50]).await.is_err());

    let events = drain(&mut rx).await;
    assert!(events.iter().any(|e| matches!(
        e,
        HrmixEvent::HeartRateSampled { bpm: 120, zone, .. } if zone == "Cardio"
    )));
    assert!(engine_errors(&events).contains(&EngineErrorKind::InvalidHeartRate));
}

#[tokio::test(start_paused = true)]
async fn test_playlist_and_feature_events() {
    let service = service_with(Arc::new(RecordingPlayer::default()));
    let mut rx = service.subscribe();

    let (songs, mut features) = fast_and_slow();
    features.truncate(1);
    service.on_playlist_loaded(songs, features).await;

    let update = service
        .on_features_updated(vec![
            (id("slow"), AudioFeatures::new(70.0, 0.3, 0.5, 0.5)),
            (id("fast"), AudioFeatures::new(150.0, 2.0, 0.5, 0.5)),
        ])
        .await;
    assert_eq!(update.accepted, 1);
    assert_eq!(update.rejected.len(), 1);

    let events = drain(&mut rx).await;
    assert!(events.iter().any(|e| matches!(
        e,
        HrmixEvent::PlaylistLoaded {
            song_count: 2,
            scoreable_count: 1,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        HrmixEvent::FeaturesUpdated {
            accepted: 1,
            rejected: 1,
            ..
        }
    )));
    assert!(engine_errors(&events).contains(&EngineErrorKind::InvalidFeatures));
}

#[tokio::test(start_paused = true)]
async fn test_recommendations_through_service() {
    let service = service_with(Arc::new(RecordingPlayer::default()));
    let (songs, features) = fast_and_slow();
    service.on_playlist_loaded(songs, features).await;
    service.on_heart_rate_sample(150).await;

    assert!(service.on_recommendations(&[id("slow")]).await);
    service.skip().await;
    assert_eq!(service.current_track().await, Some(id("slow")));

    service.clear_recommendations().await;
    assert!(!service.on_recommendations(&[id("missing")]).await);
}
