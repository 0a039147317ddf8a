use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use engine::ingest::{read_ratings_path, DEFAULT_DELIMITER};
use engine::{CfConfig, Model, ModelSummary, Neighbor, ScoredItem, UserId};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use std::time::Instant;

#[derive(Parser)]
#[command(name = "recommender")]
#[command(about = "User-based collaborative filtering over a ratings file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the model and print ranked recommendations
    Recommend {
        #[command(flatten)]
        run: RunArgs,
        /// Users to report on (repeatable)
        #[arg(long = "user", default_values_t = [1u32])]
        users: Vec<UserId>,
        /// Show at most this many items per user
        #[arg(long)]
        limit: Option<usize>,
        /// Emit a JSON report instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Fit the model and print a user's nearest neighbors
    Neighbors {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        user: UserId,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Ratings file, or a directory of *.dat files
    #[arg(long)]
    input: String,
    /// Field separator within a record
    #[arg(long, default_value = DEFAULT_DELIMITER)]
    delimiter: String,
    /// JSON file with tunables; flags below override it
    #[arg(long)]
    config: Option<String>,
    /// Neighbors kept per user
    #[arg(long)]
    k: Option<usize>,
    /// Co-rated items required for a similarity
    #[arg(long)]
    min_overlap: Option<usize>,
    /// Length cap for ranked lists
    #[arg(long)]
    top_n: Option<usize>,
    /// Worker threads per phase
    #[arg(long)]
    workers: Option<usize>,
    /// Users with fewer ratings get the popularity list
    #[arg(long)]
    cold_threshold: Option<usize>,
}

impl RunArgs {
    fn config(&self) -> Result<CfConfig> {
        let mut cfg = match &self.config {
            Some(path) => CfConfig::from_json_file(path)?,
            None => CfConfig::default(),
        };
        if let Some(v) = self.k { cfg.k_neighbors = v; }
        if let Some(v) = self.min_overlap { cfg.min_overlap = v; }
        if let Some(v) = self.top_n { cfg.top_n = v; }
        if let Some(v) = self.workers { cfg.workers = v; }
        if let Some(v) = self.cold_threshold { cfg.cold_threshold = v; }
        cfg.validate()?;
        Ok(cfg)
    }

    fn fit(&self) -> Result<Model> {
        let cfg = self.config()?;
        let start = Instant::now();
        let (ratings, stats) = read_ratings_path(&self.input, &self.delimiter)
            .with_context(|| format!("loading ratings from {}", self.input))?;
        tracing::info!(accepted = stats.accepted, dropped = stats.dropped, "ratings loaded");
        let model = Model::fit(&ratings, &cfg)?;
        tracing::info!(elapsed_s = start.elapsed().as_secs_f64(), "model fitted");
        Ok(model)
    }
}

#[derive(Serialize)]
struct Report<'a> {
    generated_at: String,
    summary: ModelSummary,
    users: Vec<UserReport<'a>>,
}

#[derive(Serialize)]
struct UserReport<'a> {
    user: UserId,
    cold_start: bool,
    items: &'a [ScoredItem],
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Recommend { run, users, limit, json } => {
            let model = run.fit()?;
            recommend(&model, &users, limit, json)
        }
        Commands::Neighbors { run, user } => {
            let model = run.fit()?;
            match model.neighbors(user) {
                Some(neighbors) => print_neighbors(neighbors, user),
                None => tracing::warn!(user, "user has no ratings"),
            }
            Ok(())
        }
    }
}

fn recommend(model: &Model, users: &[UserId], limit: Option<usize>, json: bool) -> Result<()> {
    let mut reports = Vec::with_capacity(users.len());
    for &user in users {
        let Some(list) = model.recommendations(user) else {
            tracing::warn!(user, "user has no ratings");
            continue;
        };
        let items = list.items();
        let shown = &items[..limit.unwrap_or(items.len()).min(items.len())];
        reports.push(UserReport { user, cold_start: list.is_cold_start(), items: shown });
    }

    if json {
        let report = Report {
            generated_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "".into()),
            summary: model.summary(),
            users: reports,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let s = model.summary();
    println!("users={} items={} ratings={} cold={} warm={}", s.users, s.items, s.ratings, s.cold_users, s.warm_users);
    for r in reports {
        let tag = if r.cold_start { " (cold start: global popularity)" } else { "" };
        println!("\nTop-{} for user {}{}:", r.items.len(), r.user, tag);
        for (rank, p) in r.items.iter().enumerate() {
            println!("{:3}) item={:<6} score={:.3}", rank + 1, p.item, p.score);
        }
    }
    Ok(())
}

fn print_neighbors(neighbors: &[Neighbor], user: UserId) {
    println!("Neighbors of user {user}:");
    for (rank, n) in neighbors.iter().enumerate() {
        println!("{:3}) user={:<6} similarity={:+.4} overlap={}", rank + 1, n.user, n.similarity, n.overlap);
    }
}
