//! Audio feature store
//!
//! Immutable snapshot of track id → audio features. Updates never mutate a
//! snapshot in place; they produce a new one, so a selection in progress
//! always sees a consistent map.

use hrmix_common::{AudioFeatures, TrackId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Outcome of merging a batch of features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureUpdate {
    pub accepted: usize,
    /// Entries dropped because their values were out of range
    pub rejected: Vec<(TrackId, String)>,
}

/// Snapshot of known audio features
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    features: Arc<HashMap<TrackId, AudioFeatures>>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw entries, dropping invalid ones
    pub fn from_entries(
        entries: impl IntoIterator<Item = (TrackId, AudioFeatures)>,
    ) -> (Self, FeatureUpdate) {
        Self::new().with_updates(entries)
    }

    /// New snapshot with `updates` merged over this one
    ///
    /// Entries that fail validation are left out entirely; a track whose
    /// update is rejected keeps whatever valid features it had before.
    pub fn with_updates(
        &self,
        updates: impl IntoIterator<Item = (TrackId, AudioFeatures)>,
    ) -> (Self, FeatureUpdate) {
        let mut merged = (*self.features).clone();
        let mut report = FeatureUpdate::default();

        for (id, features) in updates {
            match features.validate(&id) {
                Ok(()) => {
                    merged.insert(id, features);
                    report.accepted += 1;
                }
                Err(e) => {
                    warn!("Dropping audio features: {}", e);
                    report.rejected.push((id, e.to_string()));
                }
            }
        }

        (
            Self {
                features: Arc::new(merged),
            },
            report,
        )
    }

    pub fn get(&self, id: &TrackId) -> Option<&AudioFeatures> {
        self.features.get(id)
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.features.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TrackId {
        TrackId::new(s).unwrap()
    }

    #[test]
    fn test_from_entries_drops_invalid() {
        let (store, report) = FeatureStore::from_entries(vec![
            (id("a"), AudioFeatures::new(120.0, 0.5, 0.5, 0.5)),
            (id("b"), AudioFeatures::new(-1.0, 0.5, 0.5, 0.5)),
        ]);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&id("a")));
        assert!(!store.contains(&id("b")));
        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, id("b"));
    }

    #[test]
    fn test_updates_produce_new_snapshot() {
        let (original, _) =
            FeatureStore::from_entries(vec![(id("a"), AudioFeatures::new(100.0, 0.4, 0.5, 0.5))]);
        let (updated, report) = original.with_updates(vec![
            (id("a"), AudioFeatures::new(130.0, 0.8, 0.5, 0.5)),
            (id("c"), AudioFeatures::new(90.0, 0.3, 0.5, 0.5)),
        ]);

        assert_eq!(report.accepted, 2);
        assert_eq!(original.get(&id("a")).unwrap().tempo, 100.0);
        assert!(!original.contains(&id("c")));
        assert_eq!(updated.get(&id("a")).unwrap().tempo, 130.0);
        assert_eq!(updated.len(), 2);
    }

    #[test]
    fn test_rejected_update_keeps_previous_value() {
        let (original, _) =
            FeatureStore::from_entries(vec![(id("a"), AudioFeatures::new(100.0, 0.4, 0.5, 0.5))]);
        let (updated, report) =
            original.with_updates(vec![(id("a"), AudioFeatures::new(100.0, 4.0, 0.5, 0.5))]);
        assert_eq!(report.accepted, 0);
        assert_eq!(updated.get(&id("a")).unwrap().energy, 0.4);
    }

    #[test]
    fn test_empty_store() {
        let store = FeatureStore::new();
        assert!(store.is_empty());
        assert!(store.get(&id("x")).is_none());
    }
}
