use crate::pool::WorkerPool;
use crate::store::RatingStore;
use crate::{ItemId, UserId};
use anyhow::{ensure, Result};
use std::collections::HashMap;

/// Per-user means and mean-centered profiles (item → score − mean).
#[derive(Debug, Default, Clone)]
pub struct CenteredProfiles {
    pub means: HashMap<UserId, f64>,
    pub normalized: HashMap<UserId, HashMap<ItemId, f64>>,
}

impl CenteredProfiles {
    pub fn compute(store: &RatingStore, pool: &WorkerPool) -> Result<Self> {
        let users = store.user_ids();
        let blocks = pool.map_blocks(&users, |block| -> Result<Vec<(UserId, f64, HashMap<ItemId, f64>)>> {
            let mut local = Vec::with_capacity(block.len());
            for &u in block {
                let profile = &store.profiles[&u];
                ensure!(!profile.is_empty(), "user {u} reached mean centering with no ratings");
                let sum: u64 = profile.values().map(|&s| u64::from(s)).sum();
                let mean = sum as f64 / profile.len() as f64;
                let centered = profile.iter().map(|(&i, &s)| (i, f64::from(s) - mean)).collect();
                local.push((u, mean, centered));
            }
            Ok(local)
        })?;

        let mut out = CenteredProfiles {
            means: HashMap::with_capacity(users.len()),
            normalized: HashMap::with_capacity(users.len()),
        };
        for block in blocks {
            for (u, mean, centered) in block? {
                out.means.insert(u, mean);
                out.normalized.insert(u, centered);
            }
        }
        Ok(out)
    }

    pub fn mean(&self, user: UserId) -> Option<f64> { self.means.get(&user).copied() }

    pub fn profile(&self, user: UserId) -> Option<&HashMap<ItemId, f64>> { self.normalized.get(&user) }
}
