use crate::enums::ElementType;
use crate::windowing;
use crate::windowing::Windowing;

use image::ImageBuffer;
use image::Rgba;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;
use rayon::prelude::*;

/// RGBA raster of one rendered slice, sized to the slice's data dimensions.
pub type SliceRaster = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Validated header fields that travel with a loaded volume, e.g. across the
/// render-worker boundary. Plain data, trivially copyable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeHeader {
    /// Spatial dimensions `(x, y, z)`. A trailing time dimension in the
    /// source file is not sliced and not recorded here.
    pub dims: (usize, usize, usize),
    pub element_type: ElementType,
    /// Voxel spacing `(x, y, z)` in millimeters.
    pub spacing: (f32, f32, f32),
}

/// Immutable decoded representation of one 3-D scan.
///
/// Voxels are stored in `(z, y, x)` order so every axial slice occupies a
/// contiguous sub-range of the flat buffer. Scalars are widened to `f32` once
/// at decode time, which represents all three supported element types
/// losslessly; the declared type is kept in the header for round-tripping.
pub struct Volume {
    data: Array3<f32>,
    header: VolumeHeader,
}

impl Volume {
    pub fn new(data: Array3<f32>, element_type: ElementType, spacing: (f32, f32, f32)) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        let (z, y, x) = data.dim();
        Self {
            data,
            header: VolumeHeader {
                dims: (x, y, z),
                element_type,
                spacing,
            },
        }
    }

    pub fn header(&self) -> VolumeHeader {
        self.header
    }

    /// Spatial dimensions of the volume `(x, y, z)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        self.header.dims
    }

    /// Number of axial slices.
    pub fn depth(&self) -> usize {
        self.header.dims.2
    }

    /// Index of the center slice, the usual starting point after a load.
    pub fn middle_slice(&self) -> usize {
        self.depth() / 2
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Flat z-major view of the voxel buffer.
    pub(crate) fn flat(&self) -> &[f32] {
        self.data
            .as_slice()
            .expect("volume data is standard layout")
    }

    /// View of one axial slice. An out-of-range index is a programming
    /// error; callers clamp before asking.
    pub fn slice_view(&self, index: usize) -> ArrayView2<'_, f32> {
        assert!(
            index < self.depth(),
            "slice index {index} out of range (depth {})",
            self.depth()
        );
        self.data.slice(s![index, .., ..])
    }

    /// Min/max over the whole volume, in one linear pass.
    pub fn value_range(&self) -> (f32, f32) {
        min_max(self.flat().iter().copied())
    }

    /// Render one axial slice as an opaque grayscale RGBA raster under the
    /// given windowing configuration.
    pub fn extract_slice(&self, index: usize, windowing: Windowing) -> SliceRaster {
        let slice = self.slice_view(index);
        let (data_min, data_max) = match windowing {
            Windowing::Auto => min_max(slice.iter().copied()),
            Windowing::Fixed { .. } => (0.0, 0.0),
        };
        let (low, high) = windowing.bounds(data_min, data_max);

        let (height, width) = slice.dim();
        let pixels: Vec<u8> = slice
            .into_par_iter()
            .flat_map_iter(|&value| {
                let v = windowing::apply(value, low, high);
                [v, v, v, 255]
            })
            .collect();

        SliceRaster::from_raw(width as u32, height as u32, pixels)
            .expect("pixel buffer matches slice dimensions")
    }
}

pub(crate) fn min_max(values: impl Iterator<Item = f32>) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for value in values {
        if value < min {
            min = value;
        }
        if value > max {
            max = value;
        }
    }
    if min > max { (0.0, 0.0) } else { (min, max) }
}
