//! The entity registry: kinematic state for entities the server announced.

use std::collections::HashMap;

use redstone_buf::Uuid;
use redstone_proto::clientbound::SpawnPlayer;

/// Fixed-point divisor for relative move deltas (1/128 of 1/32 block).
const RELATIVE_MOVE_SCALE: f64 = 128.0 * 32.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: i32,
    pub uuid: Uuid,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: u8,
    pub pitch: u8,
}

#[derive(Default)]
pub struct Entities {
    entities: HashMap<i32, Entity>,
}

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_player_spawn(&mut self, packet: &SpawnPlayer) {
        self.entities.insert(
            packet.entity_id,
            Entity {
                id: packet.entity_id,
                uuid: packet.player_uuid,
                x: packet.x,
                y: packet.y,
                z: packet.z,
                yaw: packet.yaw,
                pitch: packet.pitch,
            },
        );
    }

    /// Absolute move: replaces the coordinates.
    pub fn feed_move(&mut self, id: i32, x: f64, y: f64, z: f64) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.x = x;
            entity.y = y;
            entity.z = z;
        }
    }

    /// Relative move: deltas are fixed-point in 1/4096 of a block.
    pub fn feed_relative_move(&mut self, id: i32, dx: i16, dy: i16, dz: i16) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.x += f64::from(dx) / RELATIVE_MOVE_SCALE;
            entity.y += f64::from(dy) / RELATIVE_MOVE_SCALE;
            entity.z += f64::from(dz) / RELATIVE_MOVE_SCALE;
        }
    }

    pub fn get(&self, id: i32) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
