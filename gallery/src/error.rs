use thiserror::Error;

/// Errors returned by gallery operations.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("gallery: io: {0}")]
    Io(#[from] std::io::Error),

    #[error("gallery: json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("gallery: yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("gallery: image: {0}")]
    Image(#[from] image::ImageError),

    #[error("gallery: invalid format: {0}")]
    InvalidFormat(String),

    #[error("gallery: invalid identity name {0:?}")]
    InvalidName(String),

    #[error("gallery: {0}")]
    Projection(#[from] ProjectionError),

    /// An external collaborator (camera, detector, embedder) failed.
    #[error("gallery: collaborator: {0}")]
    Collaborator(String),

    #[error("gallery: store lock poisoned")]
    Poisoned,
}

/// Errors returned while fitting or applying a projection.
#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("projection: need at least {need} samples, got {got}")]
    TooFewSamples { need: usize, got: usize },

    #[error("projection: need at least 2 components, got {0}")]
    TooFewComponents(usize),

    #[error("projection: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("projection: component {0} has no variance")]
    Degenerate(usize),

    #[error("projection: eigendecomposition did not converge after {0} sweeps")]
    NoConvergence(usize),

    #[error("projection: non-finite value in input")]
    NonFinite,
}
