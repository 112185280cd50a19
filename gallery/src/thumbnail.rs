use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};

use crate::GalleryError;

/// Receives a representative face crop per identity.
///
/// Thumbnails are a side channel: the gallery never reads them back.
pub trait ThumbnailSink {
    fn write(&self, name: &str, face: &RgbImage) -> Result<(), GalleryError>;
}

/// Writes `<dir>/<name>.jpg`, overwriting any previous thumbnail.
pub struct DirThumbnails {
    dir: PathBuf,
}

impl DirThumbnails {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the thumbnail path for `name`, rejecting names that are
    /// empty or would leave the directory.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, GalleryError> {
        let bad = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if bad {
            return Err(GalleryError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.jpg")))
    }
}

impl ThumbnailSink for DirThumbnails {
    fn write(&self, name: &str, face: &RgbImage) -> Result<(), GalleryError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)?;
        face.save_with_format(&path, ImageFormat::Jpeg)?;
        Ok(())
    }
}
