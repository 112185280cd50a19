use image::RgbImage;

use crate::config::Backend;
use crate::GalleryError;

/// Extracts a face embedding from a cropped face image.
///
/// This is the strategy seam for the embedding backend: one implementation
/// is chosen at startup, and its [`Backend`] decides the matching
/// threshold. Models live outside this crate.
///
/// # Output
///
/// - `Ok(Some(v))`: a raw (not necessarily normalized) embedding
/// - `Ok(None)`: no face was found in the crop
/// - `Err(_)`: the backend failed; callers treat it like `Ok(None)`
pub trait FaceEmbedder {
    fn embed(&self, face: &RgbImage) -> Result<Option<Vec<f32>>, GalleryError>;

    /// The backend family this embedder belongs to.
    fn backend(&self) -> Backend;

    /// Reports whether the underlying model loaded.
    fn is_available(&self) -> bool {
        true
    }
}
