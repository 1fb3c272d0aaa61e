//! Geometric Transform Library
//!
//! Pure functions over float pixel arrays for the preprocessing pipeline:
//! aspect-preserving scaling, safe cropping with out-of-bounds padding,
//! random and center square crops, and horizontal flipping.
//!
//! Scaling and cropping operate on channel-last `(H, W, 3)` arrays;
//! [`horizontal_flip`] operates on channel-first `(3, H, W)` arrays since
//! the pipeline flips after the layout conversion. All functions return
//! new buffers and never mutate their input.

use ndarray::{s, Array3};
use rand::Rng;

use crate::utils::error::{Result, SceneError};

/// A candidate crop region in pixel coordinates
///
/// Coordinates may extend outside the image bounds; [`safe_crop`] resolves
/// out-of-bounds edges by padding. `x2`/`y2` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl CropBox {
    /// Create a crop box; coordinates must be ordered (`x1 <= x2`, `y1 <= y2`)
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        debug_assert!(x1 <= x2 && y1 <= y2, "crop box coordinates must be ordered");
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }
}

/// Rescale an image so its shorter side equals `smaller_size`
///
/// The longer side scales proportionally, rounded to the nearest pixel.
/// A square input becomes exactly `smaller_size x smaller_size`. With
/// `None` the image is returned unchanged. Downscaling uses area
/// averaging, upscaling bilinear interpolation.
///
/// # Errors
/// Returns [`SceneError::InvalidImage`] for zero-area inputs or a zero
/// target size.
pub fn scale(image: &Array3<f32>, smaller_size: Option<u32>) -> Result<Array3<f32>> {
    let Some(target) = smaller_size else {
        return Ok(image.clone());
    };

    let (h, w, _) = image.dim();
    if h == 0 || w == 0 {
        return Err(SceneError::InvalidImage(format!(
            "cannot scale zero-area image ({}x{})",
            h, w
        )));
    }
    if target == 0 {
        return Err(SceneError::InvalidImage(
            "scale target must be positive".to_string(),
        ));
    }

    let r = target as f64 / h.min(w) as f64;
    let (new_h, new_w) = if h > w {
        ((h as f64 * r).round() as usize, target as usize)
    } else if h == w {
        (target as usize, target as usize)
    } else {
        (target as usize, (w as f64 * r).round() as usize)
    };

    if new_h == h && new_w == w {
        return Ok(image.clone());
    }

    if r < 1.0 {
        Ok(resample_area(image, new_h, new_w))
    } else {
        Ok(resample_bilinear(image, new_h, new_w))
    }
}

/// Downscale by averaging each output pixel's source footprint,
/// with fractional coverage at the footprint edges.
fn resample_area(image: &Array3<f32>, new_h: usize, new_w: usize) -> Array3<f32> {
    let (h, w, c) = image.dim();
    let sy = h as f64 / new_h as f64;
    let sx = w as f64 / new_w as f64;

    let mut out = Array3::<f32>::zeros((new_h, new_w, c));
    for oy in 0..new_h {
        let y0 = oy as f64 * sy;
        let y1 = y0 + sy;
        let iy0 = y0.floor() as usize;
        let iy1 = (y1.ceil() as usize).min(h);

        for ox in 0..new_w {
            let x0 = ox as f64 * sx;
            let x1 = x0 + sx;
            let ix0 = x0.floor() as usize;
            let ix1 = (x1.ceil() as usize).min(w);

            let mut acc = vec![0.0f64; c];
            let mut area = 0.0f64;

            for y in iy0..iy1 {
                let wy = (y1.min((y + 1) as f64) - y0.max(y as f64)).max(0.0);
                for x in ix0..ix1 {
                    let wx = (x1.min((x + 1) as f64) - x0.max(x as f64)).max(0.0);
                    let weight = wy * wx;
                    for (ch, sum) in acc.iter_mut().enumerate() {
                        *sum += image[[y, x, ch]] as f64 * weight;
                    }
                    area += weight;
                }
            }

            for (ch, sum) in acc.iter().enumerate() {
                out[[oy, ox, ch]] = (sum / area) as f32;
            }
        }
    }
    out
}

/// Upscale with bilinear interpolation, sampling at output pixel centers.
fn resample_bilinear(image: &Array3<f32>, new_h: usize, new_w: usize) -> Array3<f32> {
    let (h, w, c) = image.dim();
    let sy = h as f64 / new_h as f64;
    let sx = w as f64 / new_w as f64;

    let mut out = Array3::<f32>::zeros((new_h, new_w, c));
    for oy in 0..new_h {
        let src_y = ((oy as f64 + 0.5) * sy - 0.5).clamp(0.0, (h - 1) as f64);
        let y0 = src_y.floor() as usize;
        let y1 = (y0 + 1).min(h - 1);
        let fy = src_y - y0 as f64;

        for ox in 0..new_w {
            let src_x = ((ox as f64 + 0.5) * sx - 0.5).clamp(0.0, (w - 1) as f64);
            let x0 = src_x.floor() as usize;
            let x1 = (x0 + 1).min(w - 1);
            let fx = src_x - x0 as f64;

            for ch in 0..c {
                let v00 = image[[y0, x0, ch]] as f64;
                let v10 = image[[y0, x1, ch]] as f64;
                let v01 = image[[y1, x0, ch]] as f64;
                let v11 = image[[y1, x1, ch]] as f64;

                let v = v00 * (1.0 - fx) * (1.0 - fy)
                    + v10 * fx * (1.0 - fy)
                    + v01 * (1.0 - fx) * fy
                    + v11 * fx * fy;

                out[[oy, ox, ch]] = v as f32;
            }
        }
    }
    out
}

/// Extract the region described by `bbox`, padding with zeros where the
/// box extends outside the image
///
/// Padding is added independently per side, only where a coordinate is
/// violated, and the box is shifted by the top/left padding before
/// slicing. The result always has exactly `(bbox.height(), bbox.width())`
/// spatial dimensions; out-of-bounds boxes never fail.
pub fn safe_crop(image: &Array3<f32>, bbox: CropBox) -> Array3<f32> {
    let (h, w, c) = image.dim();
    let CropBox {
        mut x1,
        mut y1,
        mut x2,
        mut y2,
    } = bbox;

    let pad_top = (-y1).max(0) as usize;
    let pad_left = (-x1).max(0) as usize;
    let pad_bottom = (y2 - h as i64).max(0) as usize;
    let pad_right = (x2 - w as i64).max(0) as usize;

    if pad_top + pad_left + pad_bottom + pad_right == 0 {
        return image
            .slice(s![y1 as usize..y2 as usize, x1 as usize..x2 as usize, ..])
            .to_owned();
    }

    let mut padded = Array3::<f32>::zeros((h + pad_top + pad_bottom, w + pad_left + pad_right, c));
    padded
        .slice_mut(s![pad_top..pad_top + h, pad_left..pad_left + w, ..])
        .assign(image);

    y1 += pad_top as i64;
    y2 += pad_top as i64;
    x1 += pad_left as i64;
    x2 += pad_left as i64;

    padded
        .slice(s![y1 as usize..y2 as usize, x1 as usize..x2 as usize, ..])
        .to_owned()
}

/// Crop a random `size x size` square
///
/// The offset along the longer axis is drawn uniformly from
/// `0..=|longer - shorter|`; the box always measures exactly
/// `size x size`, with any shortfall resolved by [`safe_crop`] padding.
/// Reproducible given a seeded `rng`.
pub fn random_square_crop<R: Rng>(image: &Array3<f32>, size: u32, rng: &mut R) -> Array3<f32> {
    let (h, w, _) = image.dim();
    let size = size as i64;

    let bbox = if h > w {
        let offset = rng.gen_range(0..=(h - w)) as i64;
        CropBox::new(0, offset, size, offset + size)
    } else {
        let offset = rng.gen_range(0..=(w - h)) as i64;
        CropBox::new(offset, 0, offset + size, size)
    };

    safe_crop(image, bbox)
}

/// Crop the centered `size x size` square
///
/// The offset along the longer axis is `floor((longer - size) / 2)`;
/// fully deterministic, used for evaluation and inference.
pub fn center_square_crop(image: &Array3<f32>, size: u32) -> Array3<f32> {
    let (h, w, _) = image.dim();
    let size = size as i64;

    let bbox = if h > w {
        let offset = (h as i64 - size).div_euclid(2);
        CropBox::new(0, offset, size, offset + size)
    } else {
        let offset = (w as i64 - size).div_euclid(2);
        CropBox::new(offset, 0, offset + size, size)
    };

    safe_crop(image, bbox)
}

/// Reverse pixel order along the width axis of a channel-first array
pub fn horizontal_flip(image: &Array3<f32>) -> Array3<f32> {
    image.slice(s![.., .., ..;-1]).to_owned()
}

/// Convert a channel-first `(3, H, W)` array to channel-last `(H, W, 3)`
pub fn chw_to_hwc(image: &Array3<f32>) -> Array3<f32> {
    image.view().permuted_axes([1, 2, 0]).to_owned()
}

/// Convert a channel-last `(H, W, 3)` array to channel-first `(3, H, W)`
pub fn hwc_to_chw(image: &Array3<f32>) -> Array3<f32> {
    image.view().permuted_axes([2, 0, 1]).to_owned()
}
