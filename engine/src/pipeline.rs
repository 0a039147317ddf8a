use crate::center::CenteredProfiles;
use crate::config::CfConfig;
use crate::index::InvertedIndex;
use crate::pool::{CancelToken, WorkerPool};
use crate::popularity::GlobalPopularity;
use crate::predict::{predict_all, PredictionList};
use crate::similarity::{top_k_neighbors, Neighbor, NeighborTable};
use crate::store::RatingStore;
use crate::{Rating, ScoredItem, UserId};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

/// Counts describing a fitted model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub users: usize,
    pub items: usize,
    pub ratings: usize,
    pub ignored_ratings: usize,
    pub cold_users: usize,
    pub warm_users: usize,
    pub config: CfConfig,
}

/// Every structure produced by one batch run. Immutable once built.
#[derive(Debug)]
pub struct Model {
    config: CfConfig,
    store: RatingStore,
    centered: CenteredProfiles,
    index: InvertedIndex,
    popularity: GlobalPopularity,
    neighbors: NeighborTable,
    predictions: HashMap<UserId, PredictionList>,
}

fn timed<T>(phase: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let out = f().with_context(|| format!("{phase} phase failed"))?;
    tracing::info!(phase, elapsed_s = start.elapsed().as_secs_f64(), "phase complete");
    Ok(out)
}

impl Model {
    pub fn fit(records: &[Rating], config: &CfConfig) -> Result<Self> {
        Self::fit_with_cancel(records, config, CancelToken::new())
    }

    /// Runs the phases in order; each returns only after its workers are joined.
    pub fn fit_with_cancel(records: &[Rating], config: &CfConfig, cancel: CancelToken) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.workers).with_cancel(cancel);
        tracing::info!(
            records = records.len(),
            workers = config.workers,
            k = config.k_neighbors,
            min_overlap = config.min_overlap,
            top_n = config.top_n,
            cold_threshold = config.cold_threshold,
            "fitting user-based model"
        );

        let store = timed("rating store", || RatingStore::build(records, &pool))?;
        let centered = timed("mean centering", || CenteredProfiles::compute(&store, &pool))?;
        let index = timed("inverted index", || InvertedIndex::build(&store, &pool))?;
        let popularity = timed("popularity", || Ok(GlobalPopularity::build(&store, config.top_n)))?;
        tracing::info!(users = store.num_users(), items = index.num_items(), "built rating structures");

        let neighbors = timed("similarity", || top_k_neighbors(&centered, &index, config, &pool))?;
        let predictions = timed("prediction", || {
            predict_all(&store, &centered.means, &neighbors, &popularity, config, &pool)
        })?;

        Ok(Self { config: config.clone(), store, centered, index, popularity, neighbors, predictions })
    }

    pub fn config(&self) -> &CfConfig { &self.config }

    pub fn store(&self) -> &RatingStore { &self.store }

    pub fn centered(&self) -> &CenteredProfiles { &self.centered }

    pub fn index(&self) -> &InvertedIndex { &self.index }

    pub fn popularity(&self) -> &[ScoredItem] { self.popularity.items() }

    pub fn mean(&self, user: UserId) -> Option<f64> { self.centered.mean(user) }

    pub fn neighbors(&self, user: UserId) -> Option<&[Neighbor]> {
        self.neighbors.get(&user).map(Vec::as_slice)
    }

    /// Ranked list for `user`, or `None` if the user never rated anything.
    pub fn recommendations(&self, user: UserId) -> Option<&PredictionList> { self.predictions.get(&user) }

    pub fn summary(&self) -> ModelSummary {
        let cold_users = self.predictions.values().filter(|p| p.is_cold_start()).count();
        ModelSummary {
            users: self.store.num_users(),
            items: self.index.num_items(),
            ratings: self.store.num_ratings(),
            ignored_ratings: self.store.ignored,
            cold_users,
            warm_users: self.predictions.len() - cold_users,
            config: self.config.clone(),
        }
    }
}
