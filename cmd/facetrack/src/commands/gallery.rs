//! Gallery commands.

use clap::Args;
use serde::Serialize;

use super::util::{get_config, load_embedding, open_recognizer, output_result};
use crate::Cli;

#[derive(Serialize)]
struct IdentitySummary {
    name: String,
    embeddings: usize,
    dims: Vec<usize>,
}

#[derive(Serialize)]
struct ListResult {
    gallery: String,
    identities: Vec<IdentitySummary>,
    total_embeddings: usize,
}

/// Lists identities and their embedding counts.
pub fn list(cli: &Cli) -> anyhow::Result<()> {
    let cfg = get_config(cli)?;
    let rec = open_recognizer(&cfg);
    let gallery = rec.gallery();

    let identities = gallery
        .iter()
        .map(|(name, embs)| {
            let mut dims: Vec<usize> = embs.iter().map(|e| e.dim()).collect();
            dims.sort_unstable();
            dims.dedup();
            IdentitySummary {
                name: name.to_string(),
                embeddings: embs.len(),
                dims,
            }
        })
        .collect();

    output_result(
        &ListResult {
            gallery: cfg.gallery_path.display().to_string(),
            identities,
            total_embeddings: gallery.total_embeddings(),
        },
        cli.json,
    )
}

#[derive(Args)]
pub struct MatchArgs {
    /// Embedding file (JSON or YAML number list)
    #[arg(short = 'e', long)]
    pub embedding: String,

    /// Fit the projection before matching
    #[arg(long)]
    pub retrain: bool,

    /// Acceptance threshold (overrides backend default)
    #[arg(short = 't', long)]
    pub threshold: Option<f32>,
}

#[derive(Serialize)]
struct MatchResult {
    label: String,
    known: bool,
    score: f32,
    threshold: f32,
    projected: bool,
}

impl MatchArgs {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut cfg = get_config(cli)?;
        if let Some(t) = self.threshold {
            cfg = cfg.with_threshold(t);
        }
        let mut rec = open_recognizer(&cfg);
        if self.retrain && !rec.retrain() {
            tracing::warn!("projection not fitted, matching in raw space");
        }

        let raw = load_embedding(&self.embedding)?;
        let dim = raw.len();
        let query = rec.prepare(raw);
        if query.is_none() {
            anyhow::bail!(
                "{}: unusable embedding ({dim} values, at least {} finite and not all zero required)",
                self.embedding,
                cfg.min_embedding_dim
            );
        }
        let m = rec.identify(query.as_deref());

        output_result(
            &MatchResult {
                label: m.label().to_string(),
                known: m.is_known(),
                score: m.score,
                threshold: rec.threshold(),
                projected: rec.projector().is_trained(),
            },
            cli.json,
        )
    }
}

#[derive(Args)]
pub struct EnrollArgs {
    /// Identity name
    #[arg(short = 'n', long)]
    pub name: String,

    /// Embedding file (JSON or YAML number list)
    #[arg(short = 'e', long)]
    pub embedding: String,

    /// Refit the projection after enrolling
    #[arg(long)]
    pub retrain: bool,
}

#[derive(Serialize)]
struct EnrollResult {
    name: String,
    embeddings: usize,
    dim: usize,
    retrained: bool,
}

impl EnrollArgs {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            anyhow::bail!("identity name is empty");
        }

        let cfg = get_config(cli)?;
        let raw = load_embedding(&self.embedding)?;
        if raw.len() < cfg.min_embedding_dim {
            anyhow::bail!(
                "{}: embedding has {} values, the gallery keeps only {} or more",
                self.embedding,
                raw.len(),
                cfg.min_embedding_dim
            );
        }

        let mut rec = open_recognizer(&cfg);
        let Some(emb) = rec.prepare(raw) else {
            anyhow::bail!("{}: embedding is non-finite or all zero", self.embedding);
        };
        let dim = emb.len();
        rec.enroll(name, Some(emb), None, self.retrain);
        rec.save()?;

        output_result(
            &EnrollResult {
                name: name.to_string(),
                embeddings: rec.gallery().count(name),
                dim,
                retrained: rec.projector().is_trained(),
            },
            cli.json,
        )
    }
}

#[derive(Args)]
pub struct PruneArgs {
    /// Embeddings to keep per identity (defaults to the config value)
    #[arg(short = 'k', long)]
    pub keep_best: Option<usize>,
}

#[derive(Serialize)]
struct PruneResult {
    keep_best: usize,
    pruned_identities: usize,
    total_embeddings: usize,
}

impl PruneArgs {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let keep_best = self.keep_best.unwrap_or(cfg.keep_best);
        let mut rec = open_recognizer(&cfg);

        let pruned = rec.prune(keep_best);
        if pruned > 0 {
            rec.save()?;
        }

        output_result(
            &PruneResult {
                keep_best,
                pruned_identities: pruned,
                total_embeddings: rec.gallery().total_embeddings(),
            },
            cli.json,
        )
    }
}

#[derive(Serialize)]
struct RetrainResult {
    trained: bool,
    samples: usize,
    input_dim: Option<usize>,
    output_dim: Option<usize>,
    explained_variance: Vec<f64>,
}

/// Fits the projection and reports its shape. The model is not persisted;
/// every run fits its own.
pub fn retrain(cli: &Cli) -> anyhow::Result<()> {
    let cfg = get_config(cli)?;
    let mut rec = open_recognizer(&cfg);
    let trained = rec.retrain();
    let model = rec.projector().model();

    output_result(
        &RetrainResult {
            trained,
            samples: rec.gallery().total_embeddings(),
            input_dim: model.map(|m| m.input_dim()),
            output_dim: model.map(|m| m.output_dim()),
            explained_variance: model
                .map(|m| m.explained_variance().to_vec())
                .unwrap_or_default(),
        },
        cli.json,
    )
}
