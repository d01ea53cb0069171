//! Deterministic output file naming.

use std::path::{Path, PathBuf};

use crate::geo::ImageRef;

/// Resolves where each tile's clip archive is written.
///
/// The file name depends only on the tile id and the image's item and asset
/// types, so a re-run finds the files of the previous run and skips them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipPaths {
    output_dir: PathBuf,
}

impl ClipPaths {
    /// Writes clips into `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory clips are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `Clip <item_type>-<asset_type> <box_id>.zip`
    #[must_use]
    pub fn file_name(box_id: &str, image: &ImageRef) -> String {
        format!("Clip {}-{} {box_id}.zip", image.item_type, image.asset_type)
    }

    /// Full output path for a tile.
    #[must_use]
    pub fn path_for(&self, box_id: &str, image: &ImageRef) -> PathBuf {
        self.output_dir.join(Self::file_name(box_id, image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_format() {
        let image = ImageRef::new("20170101_181255_0e0f", "PSScene3Band", "visual");
        assert_eq!(
            ClipPaths::file_name("tile-0001", &image),
            "Clip PSScene3Band-visual tile-0001.zip"
        );
    }

    #[test]
    fn test_path_for_joins_output_dir() {
        let paths = ClipPaths::new("/data/clips");
        let image = ImageRef::new("img", "PSScene4Band", "analytic");
        assert_eq!(
            paths.path_for("abc", &image),
            PathBuf::from("/data/clips/Clip PSScene4Band-analytic abc.zip")
        );
        assert_eq!(paths.output_dir(), Path::new("/data/clips"));
    }
}
