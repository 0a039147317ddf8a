use crate::pool::WorkerPool;
use crate::store::RatingStore;
use crate::{ItemId, UserId};
use anyhow::Result;
use std::collections::HashMap;

/// item → users who rated it.
#[derive(Debug, Default, Clone)]
pub struct InvertedIndex {
    pub postings: HashMap<ItemId, Vec<UserId>>, // ascending user ids
}

impl InvertedIndex {
    /// Users are partitioned across workers, so each user is seen by exactly one
    /// worker and the merge can append without de-duplicating.
    pub fn build(store: &RatingStore, pool: &WorkerPool) -> Result<Self> {
        let users = store.user_ids();
        let locals = pool.map_blocks(&users, |block| {
            let mut local: HashMap<ItemId, Vec<UserId>> = HashMap::new();
            for &u in block {
                for &item in store.profiles[&u].keys() {
                    local.entry(item).or_default().push(u);
                }
            }
            local
        })?;

        let mut postings: HashMap<ItemId, Vec<UserId>> = HashMap::new();
        // blocks are in ascending user order, so appending keeps each list sorted
        for local in locals {
            for (item, mut us) in local {
                postings.entry(item).or_default().append(&mut us);
            }
        }
        Ok(Self { postings })
    }

    pub fn users(&self, item: ItemId) -> &[UserId] {
        self.postings.get(&item).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_items(&self) -> usize { self.postings.len() }
}
