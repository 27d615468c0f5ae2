//! Packet-level errors.

use redstone_buf::BufError;
use redstone_nbt::NbtError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error(transparent)]
    Buf(#[from] BufError),

    #[error(transparent)]
    Nbt(#[from] NbtError),

    #[error("invalid entity metadata kind {0}")]
    InvalidMetadata(i32),

    #[error("missing value for conditional field `{0}`")]
    MissingField(&'static str),

    #[error("invalid status JSON: {0}")]
    Json(#[from] serde_json::Error),
}
