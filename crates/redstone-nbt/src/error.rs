//! NBT decoding errors.

use redstone_buf::BufError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NbtError {
    #[error("unknown tag type {0}")]
    UnknownTagType(u8),

    #[error("negative length: {0}")]
    NegativeLength(i32),

    #[error("nesting deeper than {limit} levels")]
    NestingTooDeep { limit: usize },

    #[error(transparent)]
    Buf(#[from] BufError),
}
