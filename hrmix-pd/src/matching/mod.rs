//! Song matching: zones, features, scoring, selection and switch policy

pub mod features;
pub mod history;
pub mod scorer;
pub mod selector;
pub mod state;
pub mod switch_policy;
pub mod zones;

pub use features::{FeatureStore, FeatureUpdate};
pub use history::RecentHistory;
pub use scorer::{ScoreWeights, SongScorer};
pub use selector::{BandMatch, CandidateSelector, Selection, SelectorSettings};
pub use state::{MatchPhase, MatchState};
pub use switch_policy::{StayReason, SwitchDecision, SwitchPolicy};
pub use zones::{Zone, ZoneStep, ZoneTable};
