//! Named Binary Tag codec, Java Edition flavor: big-endian scalars,
//! i16-length-prefixed names, End-terminated compounds.

pub mod error;
pub mod io;
pub mod tag;

pub use error::NbtError;
pub use tag::{Tag, Value};
