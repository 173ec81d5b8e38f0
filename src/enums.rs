/// Scalar encoding of a voxel buffer, as declared by the NIfTI `datatype`
/// header field. Only the three codes the viewer pipeline produces are
/// supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    UInt8,
    Int16,
    Float32,
}

impl ElementType {
    /// Map a NIfTI datatype code to an element type.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            2 => Some(ElementType::UInt8),
            4 => Some(ElementType::Int16),
            16 => Some(ElementType::Float32),
            _ => None,
        }
    }

    pub fn code(&self) -> i16 {
        match self {
            ElementType::UInt8 => 2,
            ElementType::Int16 => 4,
            ElementType::Float32 => 16,
        }
    }

    pub fn bytes_per_voxel(&self) -> usize {
        match self {
            ElementType::UInt8 => 1,
            ElementType::Int16 => 2,
            ElementType::Float32 => 4,
        }
    }
}

/// Active pointer tool of the interaction controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    BoundingBox,
    Brush,
    Eraser,
}
