use image::RgbImage;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::cosine::l2_normalize;
use crate::curator::prune_gallery;
use crate::embedder::FaceEmbedder;
use crate::gallery::{Embedding, Gallery};
use crate::matcher::{Match, Matcher};
use crate::projection::Projector;
use crate::store::{GalleryStore, JsonFileStore};
use crate::thumbnail::{DirThumbnails, ThumbnailSink};
use crate::GalleryError;

/// Owns the gallery and its projection model and exposes the operations
/// that read or mutate them.
///
/// Nothing else holds a reference into the gallery; every mutation goes
/// through [`Recognizer::enroll`], [`Recognizer::add_embedding`] or
/// [`Recognizer::prune`], each of which persists immediately.
pub struct Recognizer {
    gallery: Gallery,
    store: Box<dyn GalleryStore>,
    projector: Projector,

    /// Gallery as seen through the current projection; `None` while
    /// untrained. Rebuilt on retrain, extended on enrollment.
    view: Option<Gallery>,
    matcher: Matcher,
    thumbnails: Option<Box<dyn ThumbnailSink>>,
    min_embedding_dim: usize,
    autosave: bool,
}

impl Recognizer {
    /// Creates a recognizer over `store`, loading whatever it holds.
    /// An unreadable snapshot yields an empty gallery.
    pub fn new(cfg: &Config, store: Box<dyn GalleryStore>) -> Self {
        let gallery = store.load();
        debug!(
            "gallery: loaded {} identities, {} embeddings",
            gallery.len(),
            gallery.total_embeddings()
        );
        Self {
            gallery,
            store,
            projector: Projector::new(cfg.max_components),
            view: None,
            matcher: Matcher::new(cfg.threshold()),
            thumbnails: None,
            min_embedding_dim: cfg.min_embedding_dim,
            autosave: true,
        }
    }

    /// Creates a recognizer backed by the JSON file and thumbnail
    /// directory named in `cfg`.
    pub fn open(cfg: &Config) -> Self {
        let store = JsonFileStore::new(&cfg.gallery_path).with_min_dim(cfg.min_embedding_dim);
        Self::new(cfg, Box::new(store))
            .with_thumbnails(Box::new(DirThumbnails::new(&cfg.thumbnail_dir)))
    }

    pub fn with_thumbnails(mut self, sink: Box<dyn ThumbnailSink>) -> Self {
        self.thumbnails = Some(sink);
        self
    }

    /// Turns saving after every mutation on or off (on by default). Batch
    /// callers switch it off and call [`Recognizer::save`] once.
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn threshold(&self) -> f32 {
        self.matcher.threshold()
    }

    /// Adjusts matching strictness at runtime.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.matcher.set_threshold(threshold);
    }

    /// Runs the embedder on a face crop and prepares the result for
    /// matching. A missing crop, a crop without a face, and an embedder
    /// failure all yield `None`.
    pub fn extract(&self, embedder: &dyn FaceEmbedder, face: Option<&RgbImage>) -> Option<Vec<f32>> {
        let face = face?;
        if face.width() == 0 || face.height() == 0 || !embedder.is_available() {
            return None;
        }
        match embedder.embed(face) {
            Ok(Some(raw)) => self.prepare(raw),
            Ok(None) => None,
            Err(e) => {
                debug!("gallery: embedder failed, no observation: {e}");
                None
            }
        }
    }

    /// Turns a raw embedder vector into a comparable embedding: rejects
    /// vectors shorter than the configured minimum, with non-finite values
    /// or with zero norm, L2-normalizes, then applies the current
    /// projection.
    pub fn prepare(&self, mut raw: Vec<f32>) -> Option<Vec<f32>> {
        if raw.len() < self.min_embedding_dim {
            debug!(
                "gallery: embedding too short ({} < {}), dropped",
                raw.len(),
                self.min_embedding_dim
            );
            return None;
        }
        if !is_usable(&raw) {
            debug!("gallery: embedding is non-finite or zero, dropped");
            return None;
        }
        l2_normalize(&mut raw);
        Some(self.projector.apply(&raw).into_owned())
    }

    /// Matches a prepared embedding against the gallery.
    pub fn identify(&self, emb: Option<&[f32]>) -> Match {
        let gallery = self.view.as_ref().unwrap_or(&self.gallery);
        self.matcher.identify(gallery, emb)
    }

    /// Appends a prepared embedding to `name`, creating the identity if
    /// new, then persists the gallery.
    ///
    /// A missing embedding, or one with non-finite values or zero norm, is
    /// a no-op. The thumbnail, if given, is written best-effort. With
    /// `retrain_now` the projection is refitted after persisting;
    /// interactive callers usually defer that and call
    /// [`Recognizer::retrain`] once at the end of a session. Returns true
    /// when the embedding was stored.
    pub fn enroll(
        &mut self,
        name: &str,
        emb: Option<Vec<f32>>,
        thumbnail: Option<&RgbImage>,
        retrain_now: bool,
    ) -> bool {
        let Some(emb) = emb else {
            return false;
        };
        if !is_usable(&emb) {
            warn!("gallery: refusing non-finite or zero embedding for {name:?}");
            return false;
        }
        if let Some(view) = &mut self.view {
            view.push(name, Embedding::new(self.projector.apply(&emb).into_owned()));
        }
        let count = self.gallery.push(name, Embedding::new(emb));
        debug!("gallery: enrolled {name:?}, now {count} embeddings");

        if let (Some(face), Some(sink)) = (thumbnail, &self.thumbnails) {
            if let Err(e) = sink.write(name, face) {
                warn!("gallery: thumbnail for {name:?} not written: {e}");
            }
        }

        self.persist();
        if retrain_now {
            self.retrain();
        }
        true
    }

    /// Adds another embedding to an existing identity without retraining.
    /// Returns false when the identity is unknown or the embedding is
    /// missing.
    pub fn add_embedding(&mut self, name: &str, emb: Option<Vec<f32>>, thumbnail: Option<&RgbImage>) -> bool {
        if !self.gallery.contains(name) {
            return false;
        }
        self.enroll(name, emb, thumbnail, false)
    }

    /// Trims each identity to its `keep_best` most central embeddings.
    /// When anything was trimmed, persists and retrains. Returns the number
    /// of identities pruned.
    pub fn prune(&mut self, keep_best: usize) -> usize {
        let pruned = prune_gallery(&mut self.gallery, keep_best);
        if pruned > 0 {
            info!(
                "gallery: pruned {pruned} identities to {} embeddings",
                keep_best.max(1)
            );
            self.persist();
            // Rebuild the view even when the refit fails and the old model stays.
            self.projector.retrain(&self.gallery);
            self.view = self.projector.project_gallery(&self.gallery);
        }
        pruned
    }

    /// Refits the projection from the current gallery. Returns true when a
    /// new model was installed; otherwise the previous one stays.
    pub fn retrain(&mut self) -> bool {
        let trained = self.projector.retrain(&self.gallery);
        if trained {
            self.view = self.projector.project_gallery(&self.gallery);
        }
        trained
    }

    /// Writes the gallery to the store.
    pub fn save(&self) -> Result<(), GalleryError> {
        self.store.save(&self.gallery)
    }

    /// Replaces the in-memory gallery with the store's snapshot and drops
    /// the projection, as on a restart.
    pub fn reload(&mut self) {
        self.gallery = self.store.load();
        self.projector.reset();
        self.view = None;
    }

    /// Saves after a mutation. The in-memory gallery stays authoritative
    /// when the write fails.
    fn persist(&self) {
        if !self.autosave {
            return;
        }
        if let Err(e) = self.save() {
            warn!("gallery: save failed, keeping in-memory state: {e}");
        }
    }
}

/// Finite with a nonzero norm; anything else cannot be normalized or
/// compared.
fn is_usable(emb: &[f32]) -> bool {
    emb.iter().all(|x| x.is_finite()) && emb.iter().any(|&x| x != 0.0)
}
