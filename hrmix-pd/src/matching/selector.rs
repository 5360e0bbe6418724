//! Candidate selection
//!
//! Filters the pool to songs whose tempo sits near the heart rate, drops
//! recently played songs, ranks the rest and draws uniformly among the top
//! few. Selection is pure; the caller records the result.
//!
//! Fallback chain for the tempo filter:
//! 1. strict band (`target ± strict_band`)
//! 2. widened band (`target ± (strict_band + widen_step)`)
//! 3. the whole pool
//!
//! so a non-empty pool always yields a selection.

use super::features::FeatureStore;
use super::history::RecentHistory;
use super::scorer::SongScorer;
use hrmix_common::Song;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Tunables for the candidate filter and the random draw
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    /// Half-width of the strict tempo window in BPM
    pub strict_band: f64,
    /// Extra BPM added to the band for the single retry
    pub widen_step: f64,
    /// How many of the best-scored candidates the draw chooses among
    pub top_n: usize,
    /// Recency exclusion is skipped if it would leave fewer candidates than this
    pub min_candidates_after_recency: usize,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            strict_band: 4.0,
            widen_step: 2.0,
            top_n: 3,
            min_candidates_after_recency: 2,
        }
    }
}

/// Which stage of the tempo filter produced the candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandMatch {
    Strict,
    Widened,
    WholePool,
}

/// A candidate and its score
#[derive(Debug, Clone, Copy)]
pub struct ScoredSong<'a> {
    pub song: &'a Song,
    pub score: f64,
}

/// Candidates after filtering, best first
#[derive(Debug, Clone)]
pub struct Ranking<'a> {
    pub band: BandMatch,
    pub ranked: Vec<ScoredSong<'a>>,
}

/// The song chosen to play next
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub song: Song,
    pub score: f64,
    pub band: BandMatch,
}

impl Selection {
    /// False when the pick was a best-effort choice among songs without features
    pub fn is_scoreable(&self) -> bool {
        self.score.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct CandidateSelector {
    scorer: SongScorer,
    settings: SelectorSettings,
}

impl CandidateSelector {
    pub fn new(scorer: SongScorer, settings: SelectorSettings) -> Self {
        Self { scorer, settings }
    }

    pub fn scorer(&self) -> &SongScorer {
        &self.scorer
    }

    pub fn settings(&self) -> &SelectorSettings {
        &self.settings
    }

    /// Pick a song for `target_bpm`, or `None` if `songs` is empty
    pub fn select<R: Rng + ?Sized>(
        &self,
        songs: &[Song],
        features: &FeatureStore,
        target_bpm: f64,
        recent: &RecentHistory,
        rng: &mut R,
    ) -> Option<Selection> {
        let ranking = self.rank(songs, features, target_bpm, recent)?;
        let pool = self.draw_pool(&ranking.ranked);
        let pick = pool.choose(rng)?;

        trace!(
            "Selected {} (score {:.3}) from {} of {} candidates ({:?})",
            pick.song.id,
            pick.score,
            pool.len(),
            ranking.ranked.len(),
            ranking.band
        );

        Some(Selection {
            song: pick.song.clone(),
            score: pick.score,
            band: ranking.band,
        })
    }

    /// Filter and score the pool without drawing
    pub fn rank<'a>(
        &self,
        songs: &'a [Song],
        features: &FeatureStore,
        target_bpm: f64,
        recent: &RecentHistory,
    ) -> Option<Ranking<'a>> {
        if songs.is_empty() {
            return None;
        }

        let (matching, band) = self.matching_set(songs, features, target_bpm);
        let candidates = self.exclude_recent(matching, recent);

        let mut ranked: Vec<ScoredSong<'a>> = candidates
            .into_iter()
            .map(|song| ScoredSong {
                song,
                score: self.scorer.score(features.get(&song.id), target_bpm),
            })
            .collect();
        // Stable sort keeps playlist order among equal scores
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        Some(Ranking { band, ranked })
    }

    /// Top `top_n` of the ranking; unscoreable songs only take part when
    /// nothing scoreable made it this far
    fn draw_pool<'r, 'a>(&self, ranked: &'r [ScoredSong<'a>]) -> &'r [ScoredSong<'a>] {
        let top = &ranked[..self.settings.top_n.max(1).min(ranked.len())];
        match top.first() {
            Some(best) if best.score.is_finite() => {
                let scoreable = top.iter().take_while(|c| c.score.is_finite()).count();
                &top[..scoreable]
            }
            _ => top,
        }
    }

    fn matching_set<'a>(
        &self,
        songs: &'a [Song],
        features: &FeatureStore,
        target_bpm: f64,
    ) -> (Vec<&'a Song>, BandMatch) {
        let strict = self.settings.strict_band;
        let in_band = |band: f64| -> Vec<&'a Song> {
            songs
                .iter()
                .filter(|song| {
                    features
                        .get(&song.id)
                        .is_some_and(|f| (f.tempo - target_bpm).abs() <= band)
                })
                .collect()
        };

        let matching = in_band(strict);
        if !matching.is_empty() {
            return (matching, BandMatch::Strict);
        }

        let matching = in_band(strict + self.settings.widen_step);
        if !matching.is_empty() {
            return (matching, BandMatch::Widened);
        }

        (songs.iter().collect(), BandMatch::WholePool)
    }

    fn exclude_recent<'a>(&self, matching: Vec<&'a Song>, recent: &RecentHistory) -> Vec<&'a Song> {
        let fresh: Vec<&'a Song> = matching
            .iter()
            .copied()
            .filter(|song| !recent.contains(&song.id))
            .collect();

        if fresh.len() < self.settings.min_candidates_after_recency {
            matching
        } else {
            fresh
        }
    }
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::new(SongScorer::default(), SelectorSettings::default())
    }
}
