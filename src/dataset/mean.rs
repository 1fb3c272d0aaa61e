//! Mean Image Estimator
//!
//! Streams over a labeled dataset once and accumulates a per-pixel mean
//! image. The first successfully read sample establishes the expected
//! shape; samples of any other shape are excluded from both the sum and
//! the denominator. Persists mean images as JSON in pixel-value units
//! and falls back to a neutral gray mean when no file exists.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::Array3;
use tracing::{info, warn};

use crate::utils::error::{Result, SceneError};
use crate::utils::logging::ProgressLogger;

/// Pixel value used for the neutral fallback mean
const NEUTRAL_PIXEL: f32 = 128.0;

/// Compute the per-pixel mean over a stream of `(image, label)` items
///
/// Iterates the stream exactly once, in order. Items that fail to read
/// are skipped with a warning; items whose shape differs from the first
/// successful item are skipped silently. The divisor is the number of
/// accumulated samples, not the stream length, so malformed entries do
/// not bias the result.
///
/// Values are returned in whatever range the stream produces; callers
/// are responsible for post-scaling (e.g. x255 when the stream yields
/// normalized images) and for persisting the result.
///
/// # Errors
/// Returns [`SceneError::Config`] when not a single item could be
/// accumulated.
pub fn compute_mean<I>(items: I, total: usize) -> Result<Array3<f32>>
where
    I: IntoIterator<Item = Result<(Array3<f32>, usize)>>,
{
    let mut progress = ProgressLogger::new("Computing mean image", total);
    let mut sum: Option<Array3<f32>> = None;
    let mut count = 0usize;

    for item in items {
        progress.increment();

        let (image, _label) = match item {
            Ok(pair) => pair,
            Err(err) => {
                warn!("Skipping unreadable sample during mean computation: {}", err);
                continue;
            }
        };

        match sum.as_mut() {
            None => {
                sum = Some(image);
                count += 1;
            }
            Some(sum) if sum.dim() == image.dim() => {
                *sum += &image;
                count += 1;
            }
            // Mismatched shapes are excluded from sum and denominator
            Some(_) => {}
        }
    }
    progress.finish();

    let sum = sum.ok_or_else(|| {
        SceneError::Config("cannot compute a mean image from an empty dataset".to_string())
    })?;

    info!("Accumulated {} of {} samples", count, total);
    Ok(sum / count as f32)
}

/// Create the neutral constant mean: a `(3, size, size)` array of 128s
pub fn neutral_mean(size: u32) -> Array3<f32> {
    Array3::from_elem((3, size as usize, size as usize), NEUTRAL_PIXEL)
}

/// Save a mean image to a JSON file, in pixel-value units
pub fn save_mean<P: AsRef<Path>>(path: P, mean: &Array3<f32>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    serde_json::to_writer(BufWriter::new(file), mean)
        .map_err(|e| SceneError::Config(format!("failed to serialize mean image: {}", e)))?;
    Ok(())
}

/// Load a mean image from a JSON file
///
/// # Errors
/// Fails when the file cannot be read or does not hold a 3-channel array.
pub fn load_mean<P: AsRef<Path>>(path: P) -> Result<Array3<f32>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mean: Array3<f32> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| SceneError::Config(format!("invalid mean image {}: {}", path.display(), e)))?;

    if mean.dim().0 != 3 {
        return Err(SceneError::Config(format!(
            "mean image {} must have 3 channels, got {}",
            path.display(),
            mean.dim().0
        )));
    }
    Ok(mean)
}

/// Load a mean image, substituting the neutral gray mean when the file
/// is absent
///
/// Mirrors the behavior of every training/eval/inference entry point:
/// a missing mean file is not an error.
pub fn load_mean_or_neutral(path: Option<&Path>, size: u32) -> Result<Array3<f32>> {
    match path {
        Some(path) if path.exists() => {
            info!("Loading mean image from {}", path.display());
            load_mean(path)
        }
        Some(path) => {
            info!(
                "Mean image {} not found, using neutral gray mean",
                path.display()
            );
            Ok(neutral_mean(size))
        }
        None => {
            info!("No mean image configured, using neutral gray mean");
            Ok(neutral_mean(size))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_image(shape: (usize, usize, usize), value: f32) -> Array3<f32> {
        Array3::from_elem(shape, value)
    }

    #[test]
    fn test_compute_mean_basic() {
        let items: Vec<_> = [1.0f32, 2.0, 3.0]
            .iter()
            .map(|&v| Ok((constant_image((3, 4, 4), v), 0)))
            .collect();

        let mean = compute_mean(items, 3).unwrap();
        assert_eq!(mean.dim(), (3, 4, 4));
        assert!(mean.iter().all(|&v| (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_compute_mean_skips_mismatched_shapes() {
        // A fourth, differently shaped image must not change the result
        let items = vec![
            Ok((constant_image((3, 4, 4), 1.0), 0)),
            Ok((constant_image((3, 4, 4), 2.0), 0)),
            Ok((constant_image((3, 4, 4), 3.0), 1)),
            Ok((constant_image((3, 5, 5), 100.0), 1)),
        ];

        let mean = compute_mean(items, 4).unwrap();
        assert_eq!(mean.dim(), (3, 4, 4));
        assert!(mean.iter().all(|&v| (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_compute_mean_skips_read_failures() {
        let items = vec![
            Ok((constant_image((3, 2, 2), 4.0), 0)),
            Err(SceneError::SourceRead(
                "missing.png".into(),
                "no such file".to_string(),
            )),
            Ok((constant_image((3, 2, 2), 6.0), 1)),
        ];

        let mean = compute_mean(items, 3).unwrap();
        assert!(mean.iter().all(|&v| (v - 5.0).abs() < 1e-6));
    }

    #[test]
    fn test_compute_mean_empty_fails() {
        let items: Vec<crate::utils::error::Result<(Array3<f32>, usize)>> = Vec::new();
        assert!(matches!(
            compute_mean(items, 0),
            Err(SceneError::Config(_))
        ));
    }

    #[test]
    fn test_neutral_mean() {
        let mean = neutral_mean(4);
        assert_eq!(mean.dim(), (3, 4, 4));
        assert!(mean.iter().all(|&v| v == 128.0));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mean.json");

        let mean = constant_image((3, 4, 4), 42.5);
        save_mean(&path, &mean).unwrap();
        let loaded = load_mean(&path).unwrap();
        assert_eq!(loaded, mean);
    }

    #[test]
    fn test_load_mean_or_neutral_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");

        let mean = load_mean_or_neutral(Some(&missing), 8).unwrap();
        assert_eq!(mean.dim(), (3, 8, 8));
        assert!(mean.iter().all(|&v| v == 128.0));

        let mean = load_mean_or_neutral(None, 2).unwrap();
        assert_eq!(mean.dim(), (3, 2, 2));
    }

    #[test]
    fn test_load_mean_rejects_wrong_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mean.json");
        save_mean(&path, &constant_image((1, 4, 4), 0.0)).unwrap();

        assert!(matches!(load_mean(&path), Err(SceneError::Config(_))));
    }
}
