use crate::pool::{GeometryKey, MaterialKey, TextureKey};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("geometry {0:?} not found")]
    GeometryNotFound(GeometryKey),
    #[error("material {0:?} not found")]
    MaterialNotFound(MaterialKey),
    #[error("texture {0:?} not found")]
    TextureNotFound(TextureKey),
    #[error("{index} is an invalid group index, there are {groups} groups")]
    InvalidGroupIndex { index: usize, groups: usize },
    #[error("texture data is {actual} bytes, expected {expected}")]
    InvalidTextureData { expected: usize, actual: usize },
}
