use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tracing::{debug, warn};

use crate::gallery::{Embedding, Gallery};
use crate::GalleryError;

/// Minimum embedding length accepted when loading a persisted gallery.
pub const MIN_EMBEDDING_DIM: usize = 100;

/// Persists the gallery snapshot.
///
/// Use [`JsonFileStore`] for durable storage and [`MemoryStore`] for
/// tests or ephemeral sessions.
pub trait GalleryStore: Send {
    /// Reads and validates the persisted snapshot.
    ///
    /// A missing snapshot is an empty gallery, not an error.
    fn read(&self) -> Result<Gallery, GalleryError>;

    /// Writes a snapshot of every identity and its embeddings.
    fn save(&self, gallery: &Gallery) -> Result<(), GalleryError>;

    /// Like [`GalleryStore::read`], but falls back to an empty gallery
    /// when the snapshot cannot be read or parsed.
    fn load(&self) -> Gallery {
        match self.read() {
            Ok(gallery) => gallery,
            Err(e) => {
                warn!("gallery: load failed, starting empty: {e}");
                Gallery::new()
            }
        }
    }
}

/// Decodes a JSON snapshot `{ name: [[f32, ...], ...] }`.
///
/// Entries that are not flat numeric arrays of at least `min_dim` values
/// are dropped, and so are identities left without any valid entry.
pub fn decode_gallery(data: &[u8], min_dim: usize) -> Result<Gallery, GalleryError> {
    let root: Value = serde_json::from_slice(data)?;
    let Value::Object(map) = root else {
        return Err(GalleryError::InvalidFormat(
            "top-level value must be an object".into(),
        ));
    };

    let mut gallery = Gallery::new();
    let mut dropped = 0usize;
    for (name, candidates) in map {
        let Value::Array(candidates) = candidates else {
            dropped += 1;
            continue;
        };
        let total = candidates.len();
        let embs: Vec<Embedding> = candidates
            .iter()
            .filter_map(|c| decode_embedding(c, min_dim))
            .collect();
        dropped += total - embs.len();
        if !embs.is_empty() {
            gallery.insert_identity(name, embs);
        }
    }
    if dropped > 0 {
        debug!("gallery: dropped {dropped} invalid entries while loading");
    }
    Ok(gallery)
}

fn decode_embedding(value: &Value, min_dim: usize) -> Option<Embedding> {
    let items = value.as_array()?;
    if items.len() < min_dim {
        return None;
    }
    let values = items
        .iter()
        .map(|v| v.as_f64().map(|x| x as f32))
        .collect::<Option<Vec<f32>>>()?;
    Some(Embedding::new(values))
}

/// Encodes a gallery as pretty-printed JSON.
pub fn encode_gallery(gallery: &Gallery) -> Result<Vec<u8>, GalleryError> {
    Ok(serde_json::to_vec_pretty(gallery)?)
}

/// [`GalleryStore`] backed by a human-readable JSON file.
///
/// Saves go through a temporary sibling file and a rename, so a crash
/// mid-write never leaves a truncated snapshot behind.
pub struct JsonFileStore {
    path: PathBuf,
    min_dim: usize,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            min_dim: MIN_EMBEDDING_DIM,
        }
    }

    /// Overrides the minimum embedding length accepted on load.
    pub fn with_min_dim(mut self, min_dim: usize) -> Self {
        self.min_dim = min_dim;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "gallery.json".into());
        self.path.with_file_name(format!(".{file_name}.tmp"))
    }
}

impl GalleryStore for JsonFileStore {
    fn read(&self) -> Result<Gallery, GalleryError> {
        if !self.path.exists() {
            return Ok(Gallery::new());
        }
        let data = fs::read(&self.path)?;
        decode_gallery(&data, self.min_dim)
    }

    fn save(&self, gallery: &Gallery) -> Result<(), GalleryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = encode_gallery(gallery)?;
        let tmp = self.temp_path();
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            "gallery: saved {} identities to {}",
            gallery.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// In-memory [`GalleryStore`] implementation.
///
/// Keeps the encoded snapshot rather than the live gallery, so reads go
/// through the same validation as the file store. Data is lost on restart.
pub struct MemoryStore {
    snapshot: Mutex<Option<Vec<u8>>>,
    min_dim: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(None),
            min_dim: MIN_EMBEDDING_DIM,
        }
    }

    /// Creates a store whose snapshot is the given raw bytes.
    pub fn with_snapshot(data: impl Into<Vec<u8>>) -> Self {
        Self {
            snapshot: Mutex::new(Some(data.into())),
            min_dim: MIN_EMBEDDING_DIM,
        }
    }

    pub fn with_min_dim(mut self, min_dim: usize) -> Self {
        self.min_dim = min_dim;
        self
    }

    /// Returns a copy of the raw snapshot, if one was saved.
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GalleryStore for MemoryStore {
    fn read(&self) -> Result<Gallery, GalleryError> {
        let snapshot = self.snapshot.lock().map_err(|_| GalleryError::Poisoned)?;
        match snapshot.as_deref() {
            Some(data) => decode_gallery(data, self.min_dim),
            None => Ok(Gallery::new()),
        }
    }

    fn save(&self, gallery: &Gallery) -> Result<(), GalleryError> {
        let data = encode_gallery(gallery)?;
        let mut snapshot = self.snapshot.lock().map_err(|_| GalleryError::Poisoned)?;
        *snapshot = Some(data);
        Ok(())
    }
}
