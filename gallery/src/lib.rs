//! Live face-identity gallery.
//!
//! Keeps a persistent, named collection of reference face embeddings,
//! matches new observations against it with unknown rejection, and
//! periodically compresses the embedding space with PCA.
//!
//! Camera capture, face detection and embedding extraction are external;
//! they plug in through [`FaceDetector`] and [`FaceEmbedder`].
//!
//! # Usage
//!
//! ```
//! use facetrack_gallery::{Config, MemoryStore, Recognizer};
//!
//! let cfg = Config::default();
//! let mut rec = Recognizer::new(&cfg, Box::new(MemoryStore::new()));
//!
//! let mut raw = vec![0.0f32; 128];
//! raw[0] = 1.0;
//! let emb = rec.prepare(raw.clone());
//! rec.enroll("bob", emb, None, false);
//!
//! let query = rec.prepare(raw);
//! let m = rec.identify(query.as_deref());
//! assert_eq!(m.label(), "bob");
//! ```
//!
//! # Pipeline
//!
//! 1. [`crop_face`]: detector box -> face crop (grown about its centre)
//! 2. [`Recognizer::extract`]: crop -> L2-normalized, projected embedding
//! 3. [`Recognizer::identify`]: embedding -> [`Match`] (identity or unknown)
//! 4. [`Recognizer::enroll`] / [`Recognizer::add_embedding`]: grow the gallery
//! 5. [`Recognizer::prune`] and [`Recognizer::retrain`]: keep it compact
//!
//! [`LiveSession`] wires these together for a frame-by-frame capture loop.

mod config;
mod cosine;
mod curator;
mod detector;
mod eigen;
mod embedder;
mod error;
mod gallery;
mod matcher;
mod projection;
mod recognizer;
mod session;
mod store;
mod thumbnail;

pub use config::{Backend, Config, CLASSICAL_THRESHOLD, DEEP_LEARNING_THRESHOLD};
pub use cosine::{cosine_sim, l2_normalize};
pub use curator::{centrality, most_central, DEFAULT_KEEP_BEST};
pub use detector::{crop_face, BoundingBox, Detection, FaceDetector};
pub use embedder::FaceEmbedder;
pub use error::{GalleryError, ProjectionError};
pub use gallery::{Embedding, Gallery};
pub use matcher::{identity_score, Match, Matcher, UNKNOWN};
pub use projection::{Projection, Projector, DEFAULT_MAX_COMPONENTS, MIN_TRAINING_SAMPLES};
pub use recognizer::Recognizer;
pub use session::{LiveSession, Observation};
pub use store::{decode_gallery, encode_gallery, GalleryStore, JsonFileStore, MemoryStore, MIN_EMBEDDING_DIM};
pub use thumbnail::{DirThumbnails, ThumbnailSink};
