//! User-based collaborative filtering over explicit 1–5 ratings.
//!
//! The engine runs as a batch of strictly ordered phases, each one a
//! fan-out/fan-in over the full user population:
//! rating store → mean centering → inverted index → global popularity →
//! neighbor discovery → prediction. See [`pipeline::Model::fit`].

pub mod center;
pub mod config;
pub mod index;
pub mod ingest;
pub mod pipeline;
pub mod pool;
pub mod popularity;
pub mod predict;
pub mod similarity;
pub mod store;

use serde::{Deserialize, Serialize};

pub use center::CenteredProfiles;
pub use config::CfConfig;
pub use index::InvertedIndex;
pub use pipeline::{Model, ModelSummary};
pub use pool::{CancelToken, Cancelled, WorkerPool};
pub use popularity::GlobalPopularity;
pub use predict::PredictionList;
pub use similarity::{Neighbor, NeighborTable};
pub use store::{RatingStore, UserProfile};

pub type UserId = u32;
pub type ItemId = u32;
pub type Score = u8;

pub const MIN_SCORE: Score = 1;
pub const MAX_SCORE: Score = 5;

/// One observed (user, item, score) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub user: UserId,
    pub item: ItemId,
    pub score: Score,
}

impl Rating {
    pub fn new(user: UserId, item: ItemId, score: Score) -> Self {
        Self { user, item, score }
    }

    pub fn is_valid(&self) -> bool {
        (MIN_SCORE..=MAX_SCORE).contains(&self.score)
    }
}

/// An item with a ranking value: a predicted score or a global mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item: ItemId,
    pub score: f64,
}

/// Sort descending by score; equal scores fall back to ascending item id so
/// repeated runs over the same input rank identically.
pub(crate) fn rank_scored(items: &mut [ScoredItem]) {
    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.item.cmp(&b.item))
    });
}
