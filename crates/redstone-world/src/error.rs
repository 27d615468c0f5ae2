//! World and chunk errors.

use redstone_buf::BufError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error(transparent)]
    Buf(#[from] BufError),

    #[error("invalid bits per block: {0}")]
    InvalidBitsPerBlock(u8),

    #[error("block data too short: {words} longs for {bits_per_block} bits per block")]
    TruncatedBlockData { words: usize, bits_per_block: u8 },

    #[error("palette index {index} out of range ({size} entries)")]
    PaletteIndex { index: u32, size: usize },

    #[error("{left} bytes left over after chunk decode")]
    TrailingData { left: usize },

    #[error("section is not loaded")]
    AbsentSection,
}

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("chunk ({x}, {z}) is not loaded")]
    UnknownChunk { x: i32, z: i32 },

    #[error(transparent)]
    Chunk(#[from] ChunkError),
}
