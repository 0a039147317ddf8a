use crate::config::CfConfig;
use crate::pool::WorkerPool;
use crate::popularity::GlobalPopularity;
use crate::similarity::{Neighbor, NeighborTable};
use crate::store::RatingStore;
use crate::{rank_scored, ItemId, ScoredItem, UserId, MAX_SCORE, MIN_SCORE};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A user's ranked recommendations.
#[derive(Debug, Clone)]
pub enum PredictionList {
    /// Too little history: the shared global popularity list, unfiltered.
    ColdStart(Arc<[ScoredItem]>),
    /// Neighbor-weighted predictions over items the user has not rated.
    Personalized(Vec<ScoredItem>),
}

impl PredictionList {
    pub fn items(&self) -> &[ScoredItem] {
        match self {
            PredictionList::ColdStart(items) => &items[..],
            PredictionList::Personalized(items) => &items[..],
        }
    }

    pub fn is_cold_start(&self) -> bool { matches!(self, PredictionList::ColdStart(_)) }
}

/// Predicted scores for one warm user, best first, at most `top_n`.
///
/// `mean[u] + Σ sim·(r[v][i] − mean[v]) / Σ |sim|` over the neighbors that rated
/// `i`, clipped to the rating scale. Items with no contributing weight are skipped.
pub fn predict_for(
    user: UserId,
    store: &RatingStore,
    means: &HashMap<UserId, f64>,
    neighbors: &[Neighbor],
    top_n: usize,
) -> Vec<ScoredItem> {
    let Some(seen) = store.get(user) else { return Vec::new() };
    let Some(&mean_u) = means.get(&user) else { return Vec::new() };

    let mut candidates: HashSet<ItemId> = HashSet::new();
    for nb in neighbors {
        if let Some(p) = store.get(nb.user) {
            candidates.extend(p.keys().copied().filter(|i| !seen.contains_key(i)));
        }
    }

    let mut preds = Vec::with_capacity(candidates.len());
    for item in candidates {
        let (mut num, mut den) = (0.0f64, 0.0f64);
        for nb in neighbors {
            let (Some(p), Some(&mean_v)) = (store.get(nb.user), means.get(&nb.user)) else { continue };
            if let Some(&rv) = p.get(&item) {
                num += nb.similarity * (f64::from(rv) - mean_v);
                den += nb.similarity.abs();
            }
        }
        if den > 0.0 {
            let score = (mean_u + num / den).clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE));
            preds.push(ScoredItem { item, score });
        }
    }
    rank_scored(&mut preds);
    preds.truncate(top_n);
    preds
}

/// Recommendations for every user in the store.
pub fn predict_all(
    store: &RatingStore,
    means: &HashMap<UserId, f64>,
    neighbors: &NeighborTable,
    fallback: &GlobalPopularity,
    cfg: &CfConfig,
    pool: &WorkerPool,
) -> Result<HashMap<UserId, PredictionList>> {
    pool.map_keys(store.user_ids(), |u| {
        let rated = store.get(u).map_or(0, |p| p.len());
        if rated < cfg.cold_threshold {
            return PredictionList::ColdStart(fallback.shared());
        }
        let nbs = neighbors.get(&u).map(Vec::as_slice).unwrap_or(&[]);
        PredictionList::Personalized(predict_for(u, store, means, nbs, cfg.top_n))
    })
}
