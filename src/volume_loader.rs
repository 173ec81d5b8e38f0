use crate::enums::ElementType;
use crate::volume::Volume;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use byteorder::LittleEndian;
use flate2::read::GzDecoder;
use ndarray::Array3;
use std::borrow::Cow;
use std::io::Read;
use thiserror::Error;

// NIfTI-1 fixed header layout.
const HEADER_LEN: usize = 348;
const MIN_FILE_LEN: usize = 352;
const OFFSET_DIM: usize = 40;
const OFFSET_DATATYPE: usize = 70;
const OFFSET_PIXDIM: usize = 76;
const OFFSET_VOX_OFFSET: usize = 108;
const OFFSET_MAGIC: usize = 344;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("data is not a NIfTI-1 volume")]
    NotNifti,

    #[error("unsupported NIfTI datatype code {0}")]
    UnsupportedDataType(i16),

    #[error("volume data truncated: expected {expected} bytes after header, found {found}")]
    TruncatedData { expected: usize, found: usize },

    #[error("invalid volume dimensions ({0}, {1}, {2})")]
    InvalidDimensions(usize, usize, usize),

    #[error("decompression error: {0}")]
    Decompress(#[from] std::io::Error),
}

/// Decodes raw NIfTI-1 file bytes into a [`Volume`].
///
/// Handles optional gzip transport compression, both byte orders (detected
/// from the declared header size) and the three supported element types.
/// Header-only `.hdr`/`.img` pairs (`ni1` magic) carry no voxel data in the
/// loaded buffer and are rejected.
pub struct VolumeLoader;

impl VolumeLoader {
    /// Decode a volume from raw file bytes, decompressing first if the
    /// payload is gzip-wrapped.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a recognized NIfTI-1 volume,
    /// use an unsupported datatype, or are shorter than the header declares.
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Volume, VolumeLoaderError> {
        let bytes = if Self::is_gzip(bytes) {
            Cow::Owned(Self::decompress(bytes)?)
        } else {
            Cow::Borrowed(bytes)
        };
        Self::decode(&bytes)
    }

    fn is_gzip(bytes: &[u8]) -> bool {
        bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
    }

    fn decompress(bytes: &[u8]) -> Result<Vec<u8>, VolumeLoaderError> {
        let mut decompressed = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut decompressed)?;
        Ok(decompressed)
    }

    fn decode(bytes: &[u8]) -> Result<Volume, VolumeLoaderError> {
        if bytes.len() < MIN_FILE_LEN {
            return Err(VolumeLoaderError::NotNifti);
        }
        // The header size field doubles as the byte-order probe.
        match LittleEndian::read_i32(&bytes[0..4]) {
            x if x == HEADER_LEN as i32 => Self::decode_with::<LittleEndian>(bytes),
            _ if BigEndian::read_i32(&bytes[0..4]) == HEADER_LEN as i32 => {
                Self::decode_with::<BigEndian>(bytes)
            }
            _ => Err(VolumeLoaderError::NotNifti),
        }
    }

    fn decode_with<B: ByteOrder>(bytes: &[u8]) -> Result<Volume, VolumeLoaderError> {
        if &bytes[OFFSET_MAGIC..OFFSET_MAGIC + 4] != b"n+1\0" {
            return Err(VolumeLoaderError::NotNifti);
        }

        let ndim = B::read_i16(&bytes[OFFSET_DIM..]);
        if !(1..=7).contains(&ndim) {
            return Err(VolumeLoaderError::NotNifti);
        }
        // Unused trailing axes are stored as 0 or 1; treat both as 1.
        let dim = |axis: usize| B::read_i16(&bytes[OFFSET_DIM + 2 * axis..]).max(1) as usize;
        let (x, y, z) = (dim(1), dim(2), dim(3));

        let datatype = B::read_i16(&bytes[OFFSET_DATATYPE..]);
        let element_type = ElementType::from_code(datatype)
            .ok_or(VolumeLoaderError::UnsupportedDataType(datatype))?;

        let pixdim = |axis: usize| B::read_f32(&bytes[OFFSET_PIXDIM + 4 * axis..]);
        let spacing = (pixdim(1), pixdim(2), pixdim(3));

        let vox_offset = B::read_f32(&bytes[OFFSET_VOX_OFFSET..]) as usize;
        if vox_offset < HEADER_LEN {
            return Err(VolumeLoaderError::NotNifti);
        }

        // Trailing time/vector dimensions are not sliced; only the first
        // spatial frame is decoded.
        let voxels = x * y * z;
        let expected = voxels * element_type.bytes_per_voxel();
        let found = bytes.len().saturating_sub(vox_offset);
        if found < expected {
            return Err(VolumeLoaderError::TruncatedData { expected, found });
        }

        let raw = &bytes[vox_offset..vox_offset + expected];
        let scalars = Self::decode_scalars::<B>(raw, element_type);

        let data = Array3::from_shape_vec((z, y, x), scalars)
            .map_err(|_| VolumeLoaderError::InvalidDimensions(x, y, z))?;
        Ok(Volume::new(data, element_type, spacing))
    }

    // Single exhaustive dispatch on the element type; everything downstream
    // sees a uniform f32 buffer.
    fn decode_scalars<B: ByteOrder>(raw: &[u8], element_type: ElementType) -> Vec<f32> {
        match element_type {
            ElementType::UInt8 => raw.iter().map(|&v| v as f32).collect(),
            ElementType::Int16 => raw
                .chunks_exact(2)
                .map(|chunk| B::read_i16(chunk) as f32)
                .collect(),
            ElementType::Float32 => raw
                .chunks_exact(4)
                .map(|chunk| B::read_f32(chunk))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal single-file NIfTI-1 byte stream around `data`.
    pub(crate) fn synthetic_nifti<B: ByteOrder>(
        dims: (u16, u16, u16),
        element_type: ElementType,
        data: &[u8],
    ) -> Vec<u8> {
        let mut bytes = vec![0u8; MIN_FILE_LEN];
        B::write_i32(&mut bytes[0..4], HEADER_LEN as i32);
        B::write_i16(&mut bytes[OFFSET_DIM..], 3);
        B::write_i16(&mut bytes[OFFSET_DIM + 2..], dims.0 as i16);
        B::write_i16(&mut bytes[OFFSET_DIM + 4..], dims.1 as i16);
        B::write_i16(&mut bytes[OFFSET_DIM + 6..], dims.2 as i16);
        B::write_i16(&mut bytes[OFFSET_DATATYPE..], element_type.code());
        for axis in 1..=3 {
            B::write_f32(&mut bytes[OFFSET_PIXDIM + 4 * axis..], 1.0);
        }
        B::write_f32(&mut bytes[OFFSET_VOX_OFFSET..], MIN_FILE_LEN as f32);
        bytes[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(b"n+1\0");
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn decodes_uint8_little_endian() {
        let data: Vec<u8> = (0..8).collect();
        let bytes = synthetic_nifti::<LittleEndian>((2, 2, 2), ElementType::UInt8, &data);
        let volume = VolumeLoader::load_from_bytes(&bytes).unwrap();
        assert_eq!(volume.dims(), (2, 2, 2));
        assert_eq!(volume.header().element_type, ElementType::UInt8);
        assert_eq!(volume.slice_view(1)[[0, 0]], 4.0);
    }

    #[test]
    fn decodes_int16_big_endian() {
        let values: Vec<i16> = vec![-100, 0, 100, 200];
        let mut data = vec![0u8; values.len() * 2];
        for (chunk, &v) in data.chunks_exact_mut(2).zip(&values) {
            BigEndian::write_i16(chunk, v);
        }
        let bytes = synthetic_nifti::<BigEndian>((2, 2, 1), ElementType::Int16, &data);
        let volume = VolumeLoader::load_from_bytes(&bytes).unwrap();
        assert_eq!(volume.slice_view(0)[[0, 0]], -100.0);
        assert_eq!(volume.slice_view(0)[[1, 1]], 200.0);
    }

    #[test]
    fn decodes_float32() {
        let values = [0.5f32, -1.5, 2.25, 4.0];
        let mut data = vec![0u8; values.len() * 4];
        for (chunk, &v) in data.chunks_exact_mut(4).zip(values.iter()) {
            LittleEndian::write_f32(chunk, v);
        }
        let bytes = synthetic_nifti::<LittleEndian>((2, 2, 1), ElementType::Float32, &data);
        let volume = VolumeLoader::load_from_bytes(&bytes).unwrap();
        assert_eq!(volume.slice_view(0)[[0, 1]], -1.5);
    }

    #[test]
    fn decodes_gzip_wrapped_volume() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let data: Vec<u8> = (0..8).collect();
        let bytes = synthetic_nifti::<LittleEndian>((2, 2, 2), ElementType::UInt8, &data);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        let compressed = encoder.finish().unwrap();

        let volume = VolumeLoader::load_from_bytes(&compressed).unwrap();
        assert_eq!(volume.dims(), (2, 2, 2));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            VolumeLoader::load_from_bytes(b"definitely not a volume"),
            Err(VolumeLoaderError::NotNifti)
        ));
    }

    #[test]
    fn rejects_bad_magic() {
        let data: Vec<u8> = (0..8).collect();
        let mut bytes = synthetic_nifti::<LittleEndian>((2, 2, 2), ElementType::UInt8, &data);
        bytes[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(b"ni1\0");
        assert!(matches!(
            VolumeLoader::load_from_bytes(&bytes),
            Err(VolumeLoaderError::NotNifti)
        ));
    }

    #[test]
    fn rejects_unsupported_datatype() {
        let bytes = synthetic_nifti::<LittleEndian>((2, 2, 2), ElementType::UInt8, &[0; 8]);
        let mut bytes = bytes;
        // Datatype 8 (int32) is outside the supported set.
        LittleEndian::write_i16(&mut bytes[OFFSET_DATATYPE..], 8);
        assert!(matches!(
            VolumeLoader::load_from_bytes(&bytes),
            Err(VolumeLoaderError::UnsupportedDataType(8))
        ));
    }

    #[test]
    fn rejects_truncated_data() {
        let bytes = synthetic_nifti::<LittleEndian>((4, 4, 4), ElementType::UInt8, &[0; 10]);
        assert!(matches!(
            VolumeLoader::load_from_bytes(&bytes),
            Err(VolumeLoaderError::TruncatedData { expected: 64, .. })
        ));
    }
}
