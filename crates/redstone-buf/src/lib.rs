//! Binary read/write primitives for the Minecraft Java Edition wire format.

pub mod cursor;
pub mod error;
pub mod types;

pub use cursor::ByteCursor;
pub use error::BufError;
pub use types::{Position, Uuid};
