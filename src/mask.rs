//! Mask overlays, compressed mask records and the merged-volume cache.
//!
//! Masks are binary regardless of stored magnitude: any voxel above zero is
//! part of the region. The per-slice overlay is a translucent red raster for
//! layered display; the merged cache pre-blends mask and base for the whole
//! volume so scrubbing through slices is a contiguous buffer read.

use crate::volume::SliceRaster;
use crate::volume::Volume;
use crate::windowing;

use rayon::prelude::*;
use thiserror::Error;

/// Overlay color for set mask voxels: red at roughly half opacity.
pub const OVERLAY_RGBA: [u8; 4] = [255, 0, 0, 128];

/// Opacity of the red tint baked into the merged cache.
const BLEND_ALPHA: f32 = 0.4;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("mask dimensions {mask:?} do not match volume dimensions {base:?}")]
    DimensionMismatch {
        base: (usize, usize, usize),
        mask: (usize, usize, usize),
    },
}

/// Render one axial slice of a mask volume as a red overlay raster:
/// translucent red where the mask is set, fully transparent elsewhere.
pub fn rasterize_overlay(mask: &Volume, index: usize) -> SliceRaster {
    let slice = mask.slice_view(index);
    let (height, width) = slice.dim();
    let pixels: Vec<u8> = slice
        .into_par_iter()
        .flat_map_iter(|&value| if value > 0.0 { OVERLAY_RGBA } else { [0; 4] })
        .collect();
    SliceRaster::from_raw(width as u32, height as u32, pixels)
        .expect("pixel buffer matches slice dimensions")
}

/// Compact one-byte-per-pixel binary mask for a single slice. This is the
/// transport/storage form handed to external collaborators; display rasters
/// are derived from it, never the other way around.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskRecord {
    pub width: u32,
    pub height: u32,
    /// Row-major, one byte per pixel, 0 or 1.
    pub values: Vec<u8>,
}

impl MaskRecord {
    /// Compress an edited mask raster by thresholding its alpha channel.
    pub fn from_raster(raster: &SliceRaster) -> Self {
        Self {
            width: raster.width(),
            height: raster.height(),
            values: raster
                .pixels()
                .map(|pixel| u8::from(pixel.0[3] > 0))
                .collect(),
        }
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.values[(y * self.width + x) as usize]
    }

    /// Number of set pixels.
    pub fn set_count(&self) -> usize {
        self.values.iter().filter(|&&v| v > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.set_count() == 0
    }
}

/// Expand a compressed record back into an overlay raster.
pub fn overlay_from_record(record: &MaskRecord) -> SliceRaster {
    let pixels: Vec<u8> = record
        .values
        .iter()
        .flat_map(|&value| if value > 0 { OVERLAY_RGBA } else { [0; 4] })
        .collect();
    SliceRaster::from_raw(record.width, record.height, pixels)
        .expect("pixel buffer matches record dimensions")
}

/// Whole-volume composite of base and mask, pre-windowed over the global
/// value range of the base volume.
///
/// Building it is one O(volume) pass; afterwards every slice read is a plain
/// contiguous copy, which is what makes fast scroll-through cheap. The cache
/// is pure: identical inputs produce byte-identical buffers. It is discarded
/// and rebuilt whenever either source volume is replaced.
pub struct MergedVolume {
    dims: (usize, usize, usize),
    pixels: Vec<[u8; 4]>,
}

impl MergedVolume {
    /// Blend `mask` over `base` for every voxel.
    ///
    /// # Errors
    ///
    /// Fails if the two volumes do not share dimensions; the caller is
    /// expected to fall back to per-slice overlay rendering.
    pub fn build(base: &Volume, mask: &Volume) -> Result<Self, MergeError> {
        if base.dims() != mask.dims() {
            return Err(MergeError::DimensionMismatch {
                base: base.dims(),
                mask: mask.dims(),
            });
        }

        let (low, high) = base.value_range();
        let pixels: Vec<[u8; 4]> = base
            .flat()
            .par_iter()
            .zip(mask.flat().par_iter())
            .map(|(&value, &mask_value)| {
                let base_val = windowing::apply(value, low, high);
                if mask_value > 0.0 {
                    blend_red(base_val)
                } else {
                    [base_val, base_val, base_val, 255]
                }
            })
            .collect();

        Ok(Self {
            dims: base.dims(),
            pixels,
        })
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    /// Copy one axial slice of the composite out as a raster.
    pub fn slice(&self, index: usize) -> SliceRaster {
        let (x, y, z) = self.dims;
        assert!(index < z, "slice index {index} out of range (depth {z})");
        let slice_len = x * y;
        let start = index * slice_len;
        let pixels: Vec<u8> =
            bytemuck::cast_slice(&self.pixels[start..start + slice_len]).to_vec();
        SliceRaster::from_raw(x as u32, y as u32, pixels)
            .expect("pixel buffer matches slice dimensions")
    }
}

/// Tint one pre-windowed base intensity with 40%-opacity red.
#[inline]
fn blend_red(base_val: u8) -> [u8; 4] {
    let shaded = base_val as f32 * (1.0 - BLEND_ALPHA);
    let r = (255.0 * BLEND_ALPHA + shaded).min(255.0) as u8;
    [r, shaded as u8, shaded as u8, 255]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::ElementType;
    use ndarray::Array3;

    fn volume_from(values: Vec<f32>, dims: (usize, usize, usize)) -> Volume {
        let (x, y, z) = dims;
        let array = Array3::from_shape_vec((z, y, x), values).unwrap();
        Volume::new(array, ElementType::Float32, (1.0, 1.0, 1.0))
    }

    #[test]
    fn overlay_is_red_where_mask_set() {
        let mask = volume_from(vec![0.0, 2.0, 0.5, 0.0], (2, 2, 1));
        let raster = rasterize_overlay(&mask, 0);
        assert_eq!(raster.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(raster.get_pixel(1, 0).0, OVERLAY_RGBA);
        assert_eq!(raster.get_pixel(0, 1).0, OVERLAY_RGBA);
    }

    #[test]
    fn record_round_trips_through_overlay() {
        let mask = volume_from(vec![0.0, 1.0, 1.0, 0.0], (2, 2, 1));
        let record = MaskRecord::from_raster(&rasterize_overlay(&mask, 0));
        assert_eq!(record.values, vec![0, 1, 1, 0]);
        assert_eq!(record.set_count(), 2);

        let overlay = overlay_from_record(&record);
        assert_eq!(overlay.get_pixel(1, 0).0, OVERLAY_RGBA);
        assert_eq!(overlay.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn merged_cache_is_deterministic() {
        let base = volume_from((0..8).map(|i| i as f32).collect(), (2, 2, 2));
        let mask = volume_from(vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0], (2, 2, 2));
        let first = MergedVolume::build(&base, &mask).unwrap();
        let second = MergedVolume::build(&base, &mask).unwrap();
        assert_eq!(first.pixels, second.pixels);
    }

    #[test]
    fn unmasked_voxels_are_plain_grayscale() {
        let base = volume_from((0..8).map(|i| i as f32).collect(), (2, 2, 2));
        let mask = volume_from(vec![0.0; 8], (2, 2, 2));
        let merged = MergedVolume::build(&base, &mask).unwrap();

        // Voxel 7 is the global max: windowed to 255.
        assert_eq!(merged.pixels[7], [255, 255, 255, 255]);
        // Voxel 0 is the global min.
        assert_eq!(merged.pixels[0], [0, 0, 0, 255]);
        // Voxel 4 windows to floor(4/7 * 255) = 145.
        assert_eq!(merged.pixels[4], [145, 145, 145, 255]);
    }

    #[test]
    fn masked_voxels_blend_red() {
        let base = volume_from((0..8).map(|i| i as f32).collect(), (2, 2, 2));
        let mask = volume_from(vec![1.0; 8], (2, 2, 2));
        let merged = MergedVolume::build(&base, &mask).unwrap();

        // Darkest voxel: pure 40% red.
        assert_eq!(merged.pixels[0], [102, 0, 0, 255]);
        // Brightest voxel: 102 + 255*0.6 = 255.
        assert_eq!(merged.pixels[7], [255, 153, 153, 255]);
    }

    #[test]
    fn merged_slice_reads_contiguously() {
        let base = volume_from((0..8).map(|i| i as f32).collect(), (2, 2, 2));
        let mask = volume_from(vec![0.0; 8], (2, 2, 2));
        let merged = MergedVolume::build(&base, &mask).unwrap();
        let raster = merged.slice(1);
        assert_eq!(raster.width(), 2);
        assert_eq!(raster.height(), 2);
        // First pixel of slice 1 is voxel 4.
        assert_eq!(raster.get_pixel(0, 0).0, [145, 145, 145, 255]);
    }

    #[test]
    fn mismatched_dimensions_refuse_to_merge() {
        let base = volume_from(vec![0.0; 8], (2, 2, 2));
        let mask = volume_from(vec![0.0; 4], (2, 2, 1));
        assert!(matches!(
            MergedVolume::build(&base, &mask),
            Err(MergeError::DimensionMismatch { .. })
        ));
    }
}
