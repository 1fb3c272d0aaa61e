//! Dataset List Handling
//!
//! Reads and writes the whitespace-delimited manifest format produced by
//! the upstream data-prep tooling (header line `file_name label`, one
//! `path label` pair per line), shuffles and splits lists into folds, and
//! exposes the manifest-backed [`LabeledImageList`] raw image source.

use std::path::{Path, PathBuf};

use image::GenericImageView;
use ndarray::Array3;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::error::{Result, SceneError};

/// A single manifest record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path to the image file
    pub path: PathBuf,
    /// Integer class label
    pub label: usize,
}

/// Read a manifest file into ordered entries
///
/// Expects a header line `file_name label` followed by space-delimited
/// `path label` records.
pub fn read_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<ManifestEntry>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| SceneError::Manifest(format!("{}: {}", path.display(), e)))?;

    let mut entries = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| SceneError::Manifest(format!("{}: {}", path.display(), e)))?;

        let file_name = record.get(0).ok_or_else(|| {
            SceneError::Manifest(format!("{}: line {} has no file name", path.display(), line + 2))
        })?;
        let label = record
            .get(1)
            .ok_or_else(|| {
                SceneError::Manifest(format!("{}: line {} has no label", path.display(), line + 2))
            })?
            .parse::<usize>()
            .map_err(|e| {
                SceneError::Manifest(format!(
                    "{}: line {} has a non-integer label: {}",
                    path.display(),
                    line + 2,
                    e
                ))
            })?;

        entries.push(ManifestEntry {
            path: PathBuf::from(file_name),
            label,
        });
    }

    info!("Read {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Write entries to a manifest file in the standard format
pub fn write_manifest<P: AsRef<Path>>(path: P, entries: &[ManifestEntry]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .from_path(path)
        .map_err(|e| SceneError::Manifest(format!("{}: {}", path.display(), e)))?;

    writer
        .write_record(["file_name", "label"])
        .map_err(|e| SceneError::Manifest(e.to_string()))?;
    for entry in entries {
        let file_name = entry.path.to_string_lossy();
        let label = entry.label.to_string();
        writer
            .write_record([file_name.as_ref(), label.as_str()])
            .map_err(|e| SceneError::Manifest(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| SceneError::Manifest(e.to_string()))?;

    Ok(())
}

/// Shuffle entries and split them into two folds at `ratio`
///
/// The first fold receives `floor(len * ratio)` entries. Shuffling is
/// deterministic for a given seed; with `shuffle = false` the input
/// order is kept.
pub fn shuffle_and_split(
    mut entries: Vec<ManifestEntry>,
    ratio: f64,
    shuffle: bool,
    seed: u64,
) -> (Vec<ManifestEntry>, Vec<ManifestEntry>) {
    if shuffle {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        entries.shuffle(&mut rng);
    }

    let split = (entries.len() as f64 * ratio) as usize;
    let second = entries.split_off(split.min(entries.len()));
    (entries, second)
}

/// A source of raw labeled images, addressed by index
///
/// Implementations must distinguish an out-of-range index from a file
/// that exists in the list but cannot be decoded.
pub trait LabeledImageSource {
    /// Number of records in the source
    fn len(&self) -> usize;

    /// Whether the source is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the raw image and label at `index`
    ///
    /// The image is channel-first `(3, H, W)` with pixel values in
    /// `0.0..=255.0`.
    ///
    /// # Errors
    /// * [`SceneError::IndexOutOfRange`] for an index outside `0..len()`
    /// * [`SceneError::SourceRead`] when the file is missing or corrupt
    /// * [`SceneError::InvalidImage`] for a decodable but zero-area image
    fn get(&self, index: usize) -> Result<(Array3<f32>, usize)>;
}

/// Manifest-backed labeled image source with lazy decoding
#[derive(Debug, Clone)]
pub struct LabeledImageList {
    entries: Vec<ManifestEntry>,
}

impl LabeledImageList {
    /// Open a manifest file
    pub fn open<P: AsRef<Path>>(manifest: P) -> Result<Self> {
        Ok(Self {
            entries: read_manifest(manifest)?,
        })
    }

    /// Build a list from in-memory entries
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// The underlying manifest records
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }
}

impl LabeledImageSource for LabeledImageList {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize) -> Result<(Array3<f32>, usize)> {
        let entry = self
            .entries
            .get(index)
            .ok_or(SceneError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })?;

        let pixels = load_image_chw(&entry.path)?;
        Ok((pixels, entry.label))
    }
}

/// Decode an image file into a channel-first `(3, H, W)` float array
/// with pixel values in `0.0..=255.0`
///
/// # Errors
/// * [`SceneError::SourceRead`] when the file is missing or corrupt
/// * [`SceneError::InvalidImage`] for a zero-area image
pub fn load_image_chw(path: &Path) -> Result<Array3<f32>> {
    let img = image::open(path)
        .map_err(|e| SceneError::SourceRead(path.to_path_buf(), e.to_string()))?;

    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(SceneError::InvalidImage(format!(
            "zero-area image: {}",
            path.display()
        )));
    }

    let rgb = img.to_rgb8();
    let mut pixels = Array3::<f32>::zeros((3, h as usize, w as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            pixels[[c, y as usize, x as usize]] = pixel[c] as f32;
        }
    }

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample_entries(n: usize) -> Vec<ManifestEntry> {
        (0..n)
            .map(|i| ManifestEntry {
                path: PathBuf::from(format!("frames/img_{:03}.png", i)),
                label: i % 2,
            })
            .collect()
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        let entries = sample_entries(5);

        write_manifest(&path, &entries).unwrap();
        let read_back = read_manifest(&path).unwrap();
        assert_eq!(read_back, entries);

        // Header line is present
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("file_name label"));
    }

    #[test]
    fn test_read_manifest_rejects_bad_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "file_name label\nimg.png indoor\n").unwrap();

        let err = read_manifest(&path).unwrap_err();
        assert!(matches!(err, SceneError::Manifest(_)));
    }

    #[test]
    fn test_shuffle_and_split_ratio() {
        let entries = sample_entries(10);
        let (a, b) = shuffle_and_split(entries, 0.7, false, 0);
        assert_eq!(a.len(), 7);
        assert_eq!(b.len(), 3);
        // Unshuffled split preserves order
        assert_eq!(a[0].path, PathBuf::from("frames/img_000.png"));
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let (a1, b1) = shuffle_and_split(sample_entries(20), 0.5, true, 99);
        let (a2, b2) = shuffle_and_split(sample_entries(20), 0.5, true, 99);
        assert_eq!(a1, a2);
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_labeled_image_list_get() {
        let dir = tempfile::tempdir().unwrap();
        let img_path = dir.path().join("red.png");
        let mut img = RgbImage::new(2, 3);
        for pixel in img.pixels_mut() {
            *pixel = Rgb([255, 0, 10]);
        }
        img.save(&img_path).unwrap();

        let list = LabeledImageList::from_entries(vec![ManifestEntry {
            path: img_path,
            label: 1,
        }]);

        assert_eq!(list.len(), 1);
        let (pixels, label) = list.get(0).unwrap();
        assert_eq!(label, 1);
        // Channel-first (3, H, W) with 0..255 values
        assert_eq!(pixels.dim(), (3, 3, 2));
        assert_eq!(pixels[[0, 0, 0]], 255.0);
        assert_eq!(pixels[[1, 2, 1]], 0.0);
        assert_eq!(pixels[[2, 1, 0]], 10.0);
    }

    #[test]
    fn test_labeled_image_list_errors() {
        let list = LabeledImageList::from_entries(vec![ManifestEntry {
            path: PathBuf::from("/nonexistent/file.png"),
            label: 0,
        }]);

        assert!(matches!(
            list.get(5),
            Err(SceneError::IndexOutOfRange { index: 5, len: 1 })
        ));
        assert!(matches!(list.get(0), Err(SceneError::SourceRead(_, _))));
    }
}
