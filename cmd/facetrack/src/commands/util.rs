//! Utility functions for CLI commands.

use std::path::Path;

use anyhow::Context as _;
use facetrack_gallery::{Backend, Config, JsonFileStore, Recognizer};

use crate::Cli;

/// Builds the effective configuration: config file first, then flags.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = match cli.config.as_deref() {
        Some(path) => Config::load(Path::new(path))
            .with_context(|| format!("failed to load config {path}"))?,
        None => Config::default(),
    };

    if let Some(gallery) = &cli.gallery {
        cfg = cfg.with_gallery_path(gallery);
    }
    if let Some(backend) = cli.backend.as_deref() {
        cfg = cfg.with_backend(parse_backend(backend)?);
    }
    Ok(cfg)
}

/// Opens the recognizer over the configured gallery file. No thumbnails
/// are written from the command line, and nothing is saved until the
/// command calls `save`.
pub fn open_recognizer(cfg: &Config) -> Recognizer {
    let store = JsonFileStore::new(&cfg.gallery_path).with_min_dim(cfg.min_embedding_dim);
    Recognizer::new(cfg, Box::new(store)).with_autosave(false)
}

fn parse_backend(s: &str) -> anyhow::Result<Backend> {
    match s.to_lowercase().as_str() {
        "deep_learning" | "deep-learning" | "dl" => Ok(Backend::DeepLearning),
        "classical" => Ok(Backend::Classical),
        other => anyhow::bail!("unknown backend {other:?}, expected deep_learning or classical"),
    }
}

/// Loads an embedding from a JSON or YAML file holding a flat number list.
pub fn load_embedding(path: &str) -> anyhow::Result<Vec<f32>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("json");

    let values: Vec<f32> = match ext.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    if values.is_empty() {
        anyhow::bail!("{path}: embedding is empty");
    }
    Ok(values)
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(result: &T, as_json: bool) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)? + "\n"
    } else {
        serde_yaml::to_string(result)?
    };
    print!("{output}");
    Ok(())
}
