//! # hrmix Program Director Library (hrmix-pd)
//!
//! Heart-rate reactive song selection.
//!
//! **Purpose:** Keep the music matched to the listener's current heart rate.
//! Each reading is mapped to a target tempo and energy, songs from the
//! loaded playlist are scored against it, and a debounced switch policy
//! decides when the playing song should change.
//!
//! **Architecture:** A synchronous [`playback::Orchestrator`] state machine
//! wrapped by the async [`playback::PlaybackService`], which owns the
//! evaluation tick and talks to the outside world through a
//! [`playback::TrackPlayer`] and the shared `EventBus`.

pub mod config;
pub mod error;
pub mod matching;
pub mod playback;
pub mod playlist;
pub mod recommendations;
pub mod sensor;
pub mod simulator;

pub use error::{Error, Result};
pub use playback::{Orchestrator, PlaybackService};
