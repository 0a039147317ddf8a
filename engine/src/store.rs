use crate::pool::WorkerPool;
use crate::{ItemId, Rating, Score, UserId};
use anyhow::Result;
use std::collections::HashMap;

/// One user's sparse ratings: item → raw score. Absence means unrated.
pub type UserProfile = HashMap<ItemId, Score>;

/// Per-user rating profiles. Never contains an empty profile.
#[derive(Debug, Default, Clone)]
pub struct RatingStore {
    pub profiles: HashMap<UserId, UserProfile>,
    /// Records ignored because their score was outside 1..=5.
    pub ignored: usize,
}

impl RatingStore {
    /// Each worker aggregates one contiguous block of `records` into a local map;
    /// the local maps are then merged in block order after all workers finish.
    /// A repeated (user, item) keeps the score that appears last in `records`.
    pub fn build(records: &[Rating], pool: &WorkerPool) -> Result<Self> {
        let locals = pool.map_blocks(records, |block| {
            let mut local: HashMap<UserId, UserProfile> = HashMap::new();
            let mut ignored = 0usize;
            for r in block {
                if !r.is_valid() {
                    ignored += 1;
                    continue;
                }
                local.entry(r.user).or_default().insert(r.item, r.score);
            }
            (local, ignored)
        })?;

        let mut store = RatingStore::default();
        for (local, ignored) in locals {
            store.ignored += ignored;
            for (user, items) in local {
                store.profiles.entry(user).or_default().extend(items);
            }
        }
        if store.ignored > 0 {
            tracing::warn!(ignored = store.ignored, "ignored ratings with out-of-range scores");
        }
        Ok(store)
    }

    pub fn get(&self, user: UserId) -> Option<&UserProfile> { self.profiles.get(&user) }

    pub fn num_users(&self) -> usize { self.profiles.len() }

    pub fn num_ratings(&self) -> usize { self.profiles.values().map(|p| p.len()).sum() }

    /// User ids in ascending order; the stable work order for every later phase.
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.profiles.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
