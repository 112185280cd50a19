//! Gallery configuration.
//!
//! Loaded from YAML or JSON, chosen by file extension:
//!
//! ```yaml
//! gallery_path: data/gallery.json
//! thumbnail_dir: data/thumbnails
//! backend: deep_learning
//! keep_best: 10
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::curator::DEFAULT_KEEP_BEST;
use crate::projection::DEFAULT_MAX_COMPONENTS;
use crate::store::MIN_EMBEDDING_DIM;
use crate::GalleryError;

/// Acceptance threshold for deep-learning embedders (ArcFace-style).
pub const DEEP_LEARNING_THRESHOLD: f32 = 0.43;

/// Acceptance threshold for classical embedders (dlib-style).
pub const CLASSICAL_THRESHOLD: f32 = 0.58;

/// Embedding-extraction backend family.
///
/// Chosen once at startup; it only decides the default matching threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    DeepLearning,
    Classical,
}

impl Backend {
    /// Returns the default acceptance threshold for this backend.
    pub fn default_threshold(self) -> f32 {
        match self {
            Self::DeepLearning => DEEP_LEARNING_THRESHOLD,
            Self::Classical => CLASSICAL_THRESHOLD,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeepLearning => write!(f, "deep_learning"),
            Self::Classical => write!(f, "classical"),
        }
    }
}

/// Controls recognizer behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the gallery snapshot is persisted.
    pub gallery_path: PathBuf,

    /// Directory for per-identity thumbnails.
    pub thumbnail_dir: PathBuf,

    /// Embedding backend in use.
    pub backend: Backend,

    /// Overrides the backend's acceptance threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,

    /// Factor by which detector boxes are grown around their centre
    /// before cropping.
    pub crop_scale: f32,

    /// Embeddings kept per identity when pruning.
    pub keep_best: usize,

    /// Shortest embedding accepted from the embedder or the snapshot.
    pub min_embedding_dim: usize,

    /// Upper bound on the projection's reduced dimension.
    pub max_components: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gallery_path: PathBuf::from("gallery.json"),
            thumbnail_dir: PathBuf::from("thumbnails"),
            backend: Backend::default(),
            threshold: None,
            crop_scale: 3.0,
            keep_best: DEFAULT_KEEP_BEST,
            min_embedding_dim: MIN_EMBEDDING_DIM,
            max_components: DEFAULT_MAX_COMPONENTS,
        }
    }
}

impl Config {
    /// Loads configuration from a `.yaml`, `.yml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self, GalleryError> {
        let data = std::fs::read(path)?;
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match ext {
            "json" => Ok(serde_json::from_slice(&data)?),
            "yaml" | "yml" => Ok(serde_yaml::from_slice(&data)?),
            _ => Err(GalleryError::InvalidFormat(format!(
                "unsupported config extension {ext:?}"
            ))),
        }
    }

    /// Returns the effective acceptance threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
            .unwrap_or_else(|| self.backend.default_threshold())
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_gallery_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.gallery_path = path.into();
        self
    }
}
