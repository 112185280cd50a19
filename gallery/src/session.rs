use image::RgbImage;
use tracing::{info, warn};

use crate::config::Config;
use crate::detector::{crop_face, BoundingBox, FaceDetector};
use crate::embedder::FaceEmbedder;
use crate::matcher::UNKNOWN;
use crate::recognizer::Recognizer;

/// What the session saw for one detected face.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub bbox: BoundingBox,
    pub track_id: Option<u32>,

    /// Matched identity, `None` when unknown.
    pub name: Option<String>,

    pub score: f32,

    /// Embeddings enrolled under `name` (0 when unknown).
    pub embedding_count: usize,
}

impl Observation {
    /// Overlay text: `"name (count)"` or `"unknown"`.
    pub fn display_label(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} ({})", self.embedding_count),
            None => UNKNOWN.to_string(),
        }
    }
}

/// The face most recently observed, used as the target of
/// [`LiveSession::rename`] and [`LiveSession::add_current`].
struct Target {
    bbox: BoundingBox,
    name: Option<String>,
}

/// Drives the live capture loop one frame at a time.
///
/// Each frame goes detect -> crop -> extract -> match. Enrollment commands
/// defer retraining; [`LiveSession::finish`] retrains and saves once if the
/// gallery changed during the session.
pub struct LiveSession<D, E> {
    recognizer: Recognizer,
    detector: D,
    embedder: E,
    crop_scale: f32,
    frame: Option<RgbImage>,
    target: Option<Target>,
    dirty: bool,
}

impl<D: FaceDetector, E: FaceEmbedder> LiveSession<D, E> {
    pub fn new(recognizer: Recognizer, detector: D, embedder: E, cfg: &Config) -> Self {
        Self {
            recognizer,
            detector,
            embedder,
            crop_scale: cfg.crop_scale,
            frame: None,
            target: None,
            dirty: false,
        }
    }

    pub fn recognizer(&self) -> &Recognizer {
        &self.recognizer
    }

    /// True when the gallery changed since the last prune.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Label of the current target face, if any face has been seen.
    pub fn current_label(&self) -> Option<&str> {
        self.target
            .as_ref()
            .map(|t| t.name.as_deref().unwrap_or(UNKNOWN))
    }

    /// Processes one frame. A missing frame, an unavailable detector or a
    /// detector failure produce no observations.
    ///
    /// The last face in the frame becomes the current target.
    pub fn process_frame(&mut self, frame: Option<RgbImage>) -> Vec<Observation> {
        let Some(frame) = frame else {
            return Vec::new();
        };
        if !self.detector.is_available() {
            self.frame = Some(frame);
            return Vec::new();
        }
        let detections = match self.detector.track(&frame) {
            Ok(d) => d,
            Err(e) => {
                warn!("gallery: detector failed, skipping frame: {e}");
                Vec::new()
            }
        };

        let mut observations = Vec::with_capacity(detections.len());
        for det in detections {
            let crop = crop_face(&frame, &det.bbox, self.crop_scale);
            let emb = self.recognizer.extract(&self.embedder, crop.as_ref());
            let m = self.recognizer.identify(emb.as_deref());
            let embedding_count = m
                .name
                .as_deref()
                .map_or(0, |n| self.recognizer.gallery().count(n));
            self.target = Some(Target {
                bbox: det.bbox,
                name: m.name.clone(),
            });
            observations.push(Observation {
                bbox: det.bbox,
                track_id: det.track_id,
                name: m.name,
                score: m.score,
                embedding_count,
            });
        }
        self.frame = Some(frame);
        observations
    }

    /// Enrolls the current target face under `new_name`, deferring
    /// retraining. Returns true when an embedding was enrolled.
    pub fn rename(&mut self, new_name: &str) -> bool {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return false;
        }
        let Some(crop) = self.target_crop() else {
            return false;
        };
        let Some(emb) = self.recognizer.extract(&self.embedder, Some(&crop)) else {
            return false;
        };
        if !self.recognizer.enroll(new_name, Some(emb), Some(&crop), false) {
            return false;
        }
        if let Some(target) = &mut self.target {
            target.name = Some(new_name.to_string());
        }
        self.dirty = true;
        info!("gallery: enrolled {new_name:?} (retrain deferred)");
        true
    }

    /// Adds the current target face to its already-known identity.
    /// Returns false when the target is unknown or yields no embedding.
    pub fn add_current(&mut self) -> bool {
        let Some(name) = self.target.as_ref().and_then(|t| t.name.clone()) else {
            return false;
        };
        let Some(crop) = self.target_crop() else {
            return false;
        };
        let emb = self.recognizer.extract(&self.embedder, Some(&crop));
        let ok = self.recognizer.add_embedding(&name, emb, Some(&crop));
        if ok {
            self.dirty = true;
        }
        ok
    }

    /// Prunes the gallery. Pruning persists and retrains on its own, so
    /// the session is no longer dirty afterwards.
    pub fn clean(&mut self, keep_best: usize) -> usize {
        let pruned = self.recognizer.prune(keep_best);
        self.dirty = false;
        pruned
    }

    /// Ends the session: retrains and saves when the gallery changed.
    /// Returns the recognizer for further use.
    pub fn finish(mut self) -> Recognizer {
        if self.dirty {
            info!("gallery: changed during session, retraining and saving");
            self.recognizer.retrain();
            if let Err(e) = self.recognizer.save() {
                warn!("gallery: final save failed: {e}");
            }
        }
        self.recognizer
    }

    fn target_crop(&self) -> Option<RgbImage> {
        let frame = self.frame.as_ref()?;
        let target = self.target.as_ref()?;
        crop_face(frame, &target.bbox, self.crop_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detection;
    use crate::store::MemoryStore;
    use crate::{Backend, GalleryError};

    /// Reports fixed boxes, or fails when `boxes` is `None`.
    struct FixedDetector {
        boxes: Option<Vec<BoundingBox>>,
    }

    impl FaceDetector for FixedDetector {
        fn track(&mut self, _: &RgbImage) -> Result<Vec<Detection>, GalleryError> {
            let boxes = self
                .boxes
                .as_ref()
                .ok_or_else(|| GalleryError::Collaborator("tracker lost".into()))?;
            Ok(boxes
                .iter()
                .enumerate()
                .map(|(i, &bbox)| Detection {
                    bbox,
                    track_id: Some(i as u32),
                })
                .collect())
        }
    }

    /// Embeds a crop as a one-hot vector chosen by its centre pixel's red
    /// channel; a black centre means "no face".
    struct ColorEmbedder;

    impl FaceEmbedder for ColorEmbedder {
        fn embed(&self, face: &RgbImage) -> Result<Option<Vec<f32>>, GalleryError> {
            let red = face.get_pixel(face.width() / 2, face.height() / 2).0[0];
            if red == 0 {
                return Ok(None);
            }
            let mut v = vec![0.0; 128];
            v[red as usize % 128] = 1.0;
            Ok(Some(v))
        }

        fn backend(&self) -> Backend {
            Backend::DeepLearning
        }
    }

    fn solid(red: u8) -> RgbImage {
        RgbImage::from_pixel(120, 120, image::Rgb([red, 0, 0]))
    }

    fn session(boxes: Option<Vec<BoundingBox>>) -> LiveSession<FixedDetector, ColorEmbedder> {
        let cfg = Config::default();
        let recognizer = Recognizer::new(&cfg, Box::new(MemoryStore::new()));
        LiveSession::new(recognizer, FixedDetector { boxes }, ColorEmbedder, &cfg)
    }

    fn centre_box() -> BoundingBox {
        BoundingBox::new(50.0, 50.0, 70.0, 70.0)
    }

    #[test]
    fn missing_frame_is_no_observation() {
        let mut s = session(Some(vec![centre_box()]));
        assert!(s.process_frame(None).is_empty());
        assert!(s.current_label().is_none());
    }

    #[test]
    fn detector_failure_is_no_observation() {
        let mut s = session(None);
        assert!(s.process_frame(Some(solid(7))).is_empty());
    }

    #[test]
    fn unknown_face_then_rename_then_recognized() {
        let mut s = session(Some(vec![centre_box()]));

        let obs = s.process_frame(Some(solid(7)));
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].name, None);
        assert_eq!(obs[0].display_label(), "unknown");
        assert_eq!(obs[0].track_id, Some(0));
        assert_eq!(s.current_label(), Some("unknown"));

        assert!(s.rename("  dana "));
        assert!(s.is_dirty());
        assert_eq!(s.current_label(), Some("dana"));

        let obs = s.process_frame(Some(solid(7)));
        assert_eq!(obs[0].name.as_deref(), Some("dana"));
        assert_eq!(obs[0].display_label(), "dana (1)");
        assert!((obs[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rename_requires_name_and_face() {
        let mut s = session(Some(vec![centre_box()]));
        assert!(!s.rename("dana"), "no face seen yet");

        s.process_frame(Some(solid(0)));
        assert!(!s.rename(""), "blank names are ignored");
        assert!(!s.rename("dana"), "no embedding for a faceless crop");
        assert!(!s.is_dirty());
    }

    #[test]
    fn add_current_appends_to_known_identity() {
        let mut s = session(Some(vec![centre_box()]));
        s.process_frame(Some(solid(9)));
        assert!(!s.add_current(), "unknown target cannot be extended");

        assert!(s.rename("erin"));
        s.process_frame(Some(solid(9)));
        assert!(s.add_current());
        assert_eq!(s.recognizer().gallery().count("erin"), 2);
    }

    #[test]
    fn clean_clears_dirty_flag() {
        let mut s = session(Some(vec![centre_box()]));
        s.process_frame(Some(solid(5)));
        assert!(s.rename("finn"));
        assert!(s.is_dirty());
        assert_eq!(s.clean(10), 0);
        assert!(!s.is_dirty());
    }

    #[test]
    fn finish_retrains_when_dirty() {
        let mut s = session(Some(vec![centre_box()]));
        for (red, name) in [(1, "a"), (2, "b"), (3, "c")] {
            s.process_frame(Some(solid(red)));
            assert!(s.rename(name));
        }
        assert!(!s.recognizer().projector().is_trained(), "retrain is deferred");

        let r = s.finish();
        assert!(r.projector().is_trained());
        assert_eq!(r.gallery().len(), 3);
    }

    #[test]
    fn last_face_becomes_target() {
        let mut s = session(Some(vec![
            BoundingBox::new(10.0, 10.0, 20.0, 20.0),
            centre_box(),
        ]));
        let obs = s.process_frame(Some(solid(4)));
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[1].track_id, Some(1));
        assert!(s.rename("gus"));
        assert_eq!(s.recognizer().gallery().count("gus"), 1);
    }
}
