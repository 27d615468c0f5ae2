//! Client-side world state: chunk decoding, the chunk-indexed block
//! registry, and the entity registry.

pub mod chunk;
pub mod entities;
pub mod error;
pub mod world;

pub use chunk::{BiomeInfo, Chunk, LightData, Section};
pub use entities::{Entities, Entity};
pub use error::{ChunkError, WorldError};
pub use world::World;
