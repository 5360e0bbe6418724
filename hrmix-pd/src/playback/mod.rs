//! Playback: orchestration state machine, player seam and async service

pub mod orchestrator;
pub mod player;
pub mod service;

pub use orchestrator::{Command, Orchestrator};
pub use player::{LoggingPlayer, PlayerError, TrackPlayer};
pub use service::PlaybackService;
