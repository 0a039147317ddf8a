use crate::store::RatingStore;
use crate::{rank_scored, ItemId, ScoredItem};
use std::collections::HashMap;
use std::sync::Arc;

/// Items ranked by mean score over everyone who rated them. Built once and
/// shared by every cold-start user.
#[derive(Debug, Clone)]
pub struct GlobalPopularity {
    items: Arc<[ScoredItem]>,
}

impl GlobalPopularity {
    pub fn build(store: &RatingStore, top_n: usize) -> Self {
        let mut sums: HashMap<ItemId, (u64, u64)> = HashMap::new();
        for profile in store.profiles.values() {
            for (&item, &score) in profile {
                let e = sums.entry(item).or_insert((0, 0));
                e.0 += u64::from(score);
                e.1 += 1;
            }
        }
        let mut ranked: Vec<ScoredItem> = sums
            .into_iter()
            .map(|(item, (sum, count))| ScoredItem { item, score: sum as f64 / count as f64 })
            .collect();
        rank_scored(&mut ranked);
        ranked.truncate(top_n);
        Self { items: ranked.into() }
    }

    pub fn items(&self) -> &[ScoredItem] { &self.items }

    /// Another handle on the same list; no copy.
    pub fn shared(&self) -> Arc<[ScoredItem]> { Arc::clone(&self.items) }
}
