//! The MBM packet-schema language: a parser producing a validated AST and a
//! generator emitting Rust read constructors and write builders from it.
//!
//! One statement per `;`, `//` line comments, whitespace-separated tokens:
//!
//! ```text
//! chunk_data#20 x:i32 z:i32 new_chunk:bool bit_mask:vari32
//!               data:vari32+u8 block_entities:vari32+nbt -> ChunkData;
//! ```

pub mod codegen;
pub mod error;
pub mod parser;

pub use error::{CodegenError, SchemaError};
pub use parser::{parse, ArgDef, ArgForm, Condition, Definition};
