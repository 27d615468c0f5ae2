//! The chunk-indexed block registry.

use std::collections::HashMap;

use crate::chunk::Chunk;
use crate::error::WorldError;

/// All chunks the server has sent so far, addressed by world coordinates.
#[derive(Default)]
pub struct World {
    chunks: HashMap<(i32, i32), Chunk>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or replaces) a chunk.
    pub fn feed_chunk(&mut self, chunk: Chunk) {
        self.chunks.insert((chunk.x, chunk.z), chunk);
    }

    /// Block id at world coordinates; 0 for unknown chunks or out-of-range y.
    pub fn block(&self, x: i32, y: i32, z: i32) -> i32 {
        if !(0..256).contains(&y) {
            return 0;
        }
        let (chunk_x, local_x) = (x.div_euclid(16), x.rem_euclid(16));
        let (chunk_z, local_z) = (z.div_euclid(16), z.rem_euclid(16));
        self.chunks
            .get(&(chunk_x, chunk_z))
            .map_or(0, |chunk| chunk.block(local_x as usize, y as usize, local_z as usize))
    }

    /// Overwrites a block; unknown chunks reject the write.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: i32) -> Result<(), WorldError> {
        let (chunk_x, local_x) = (x.div_euclid(16), x.rem_euclid(16));
        let (chunk_z, local_z) = (z.div_euclid(16), z.rem_euclid(16));
        let chunk = self
            .chunks
            .get_mut(&(chunk_x, chunk_z))
            .ok_or(WorldError::UnknownChunk {
                x: chunk_x,
                z: chunk_z,
            })?;
        chunk.set_block(local_x as usize, y.max(0) as usize, local_z as usize, id)?;
        Ok(())
    }

    pub fn chunk(&self, chunk_x: i32, chunk_z: i32) -> Option<&Chunk> {
        self.chunks.get(&(chunk_x, chunk_z))
    }

    pub fn chunk_mut(&mut self, chunk_x: i32, chunk_z: i32) -> Option<&mut Chunk> {
        self.chunks.get_mut(&(chunk_x, chunk_z))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
