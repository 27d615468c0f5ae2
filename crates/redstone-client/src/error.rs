//! Connection- and session-level errors.

use redstone_buf::BufError;
use redstone_proto::ProtoError;
use thiserror::Error;

use crate::auth::AuthError;

/// Transport and framing failures. All of them tear the connection down.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),

    #[error(transparent)]
    Buf(#[from] BufError),

    #[error("compressed payload declares {size} bytes, below the {threshold} threshold")]
    ThresholdViolation { size: i32, threshold: i32 },

    #[error("decompressed to {got} bytes but {declared} were declared")]
    LengthMismatch { declared: i32, got: usize },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("unexpected packet 0x{got:x} during {stage}")]
    UnexpectedPacket { got: i32, stage: &'static str },

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("invalid server public key: {0}")]
    PublicKey(String),

    #[error("rsa: {0}")]
    Rsa(#[from] rsa::Error),
}
