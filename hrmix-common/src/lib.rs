//! # hrmix Common Library
//!
//! Shared code for the hrmix crates including:
//! - Track and audio feature models
//! - Event types (HrmixEvent enum) and the EventBus
//! - Configuration file resolution
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{AudioFeatures, Song, TrackId};
