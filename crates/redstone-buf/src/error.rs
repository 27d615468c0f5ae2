//! Buffer-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BufError {
    #[error("short read: need {needed} more bytes, have {remaining}")]
    ShortRead { needed: usize, remaining: usize },

    #[error("variable-length integer is too long (more than {max_bytes} bytes)")]
    VarintTooLong { max_bytes: usize },

    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("invalid UTF-8 string")]
    InvalidUtf8,
}
