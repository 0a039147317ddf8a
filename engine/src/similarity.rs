use crate::center::CenteredProfiles;
use crate::config::CfConfig;
use crate::index::InvertedIndex;
use crate::pool::WorkerPool;
use crate::{ItemId, UserId};
use anyhow::Result;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub user: UserId,
    pub similarity: f64,
    /// Number of items both users rated.
    pub overlap: usize,
}

/// user → up to K neighbors, best first.
pub type NeighborTable = HashMap<UserId, Vec<Neighbor>>;

/// Pearson correlation of two mean-centered profiles over their co-rated items.
///
/// Returns `(similarity, overlap)`. The similarity is forced to 0 when fewer than
/// `min_overlap` items are shared or either side has no variance on them.
pub fn pearson(u: &HashMap<ItemId, f64>, v: &HashMap<ItemId, f64>, min_overlap: usize) -> (f64, usize) {
    let swapped = u.len() > v.len();
    let (small, large) = if swapped { (v, u) } else { (u, v) };
    let mut shared: Vec<(ItemId, f64, f64)> = small
        .iter()
        .filter_map(|(&item, &rs)| large.get(&item).map(|&rl| if swapped { (item, rl, rs) } else { (item, rs, rl) }))
        .collect();
    let overlap = shared.len();
    if overlap < min_overlap {
        return (0.0, overlap);
    }

    // map iteration order is per-instance; sum in item order so equal inputs give equal bits
    shared.sort_unstable_by_key(|&(item, _, _)| item);
    let (mut num, mut den_u, mut den_v) = (0.0f64, 0.0f64, 0.0f64);
    for &(_, ru, rv) in &shared {
        num += ru * rv;
        den_u += ru * ru;
        den_v += rv * rv;
    }
    if den_u == 0.0 || den_v == 0.0 {
        return (0.0, overlap);
    }
    let sim = num / (den_u.sqrt() * den_v.sqrt());
    (sim.clamp(-1.0, 1.0), overlap)
}

/// Descending similarity, then descending overlap, then ascending user id.
fn rank_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.overlap.cmp(&a.overlap))
        .then_with(|| a.user.cmp(&b.user))
}

/// Top-K neighbors of a single user. Candidates are the users sharing at least
/// one rated item; zero-similarity candidates are dropped.
pub fn neighbors_for(user: UserId, centered: &CenteredProfiles, index: &InvertedIndex, cfg: &CfConfig) -> Vec<Neighbor> {
    let Some(profile) = centered.profile(user) else { return Vec::new() };

    let mut candidates: HashSet<UserId> = HashSet::new();
    for &item in profile.keys() {
        candidates.extend(index.users(item).iter().copied().filter(|&v| v != user));
    }

    let mut sims: Vec<Neighbor> = Vec::with_capacity(candidates.len().min(64));
    for v in candidates {
        let Some(other) = centered.profile(v) else { continue };
        let (similarity, overlap) = pearson(profile, other, cfg.min_overlap);
        if similarity != 0.0 {
            sims.push(Neighbor { user: v, similarity, overlap });
        }
    }
    sims.sort_by(rank_neighbors);
    sims.truncate(cfg.k_neighbors);
    sims
}

/// Neighbor lists for every user, one queued task per user.
pub fn top_k_neighbors(
    centered: &CenteredProfiles,
    index: &InvertedIndex,
    cfg: &CfConfig,
    pool: &WorkerPool,
) -> Result<NeighborTable> {
    let mut users: Vec<UserId> = centered.normalized.keys().copied().collect();
    users.sort_unstable();
    pool.map_keys(users, |u| neighbors_for(u, centered, index, cfg))
}
