//! Clientbound play-state packets, generated at build time from
//! `protocol/clientbound.mbm`.

#[allow(unused_imports, unused_variables, unused_mut, dead_code, clippy::all)]
mod generated {
    include!(concat!(env!("OUT_DIR"), "/clientbound.rs"));
}

pub use generated::*;

#[cfg(test)]
mod tests {
    use super::*;
    use redstone_buf::{ByteCursor, Position};
    use redstone_nbt::{Tag, Value};

    fn decode(pid: i32, payload: Vec<u8>) -> Clientbound {
        let mut buf = ByteCursor::from_vec(payload);
        let packet = Clientbound::decode(pid, &mut buf)
            .unwrap()
            .expect("known packet id");
        assert_eq!(buf.remaining(), 0, "packet did not consume its payload");
        packet
    }

    #[test]
    fn unknown_id_is_none() {
        let mut buf = ByteCursor::new();
        assert!(Clientbound::decode(0x7e, &mut buf).unwrap().is_none());
    }

    #[test]
    fn keep_alive() {
        let mut buf = ByteCursor::new();
        buf.write_i64(0x1234_5678);
        match decode(0x1f, buf.into_vec()) {
            Clientbound::KeepAlive(packet) => assert_eq!(packet.id, 0x1234_5678),
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn block_change() {
        let mut buf = ByteCursor::new();
        buf.write_pos(Position::new(100, 64, -5));
        buf.write_varint32(33 << 4 | 2);
        match decode(0xb, buf.into_vec()) {
            Clientbound::BlockChange(packet) => {
                assert_eq!(packet.location, Position::new(100, 64, -5));
                assert_eq!(packet.id >> 4, 33);
            }
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn chunk_data_reads_blob_and_block_entities() {
        let mut buf = ByteCursor::new();
        buf.write_i32(3);
        buf.write_i32(-7);
        buf.write_bool(true);
        buf.write_varint32(0b1);
        buf.write_varint32(4);
        buf.write_bytes(&[0xde, 0xad, 0xbe, 0xef]);
        buf.write_varint32(1);
        crate::types::write_nbt(
            &Tag::new("x", Value::Compound(vec![Tag::new("id", Value::Int(9))])),
            &mut buf,
        );

        match decode(0x20, buf.into_vec()) {
            Clientbound::ChunkData(packet) => {
                assert_eq!(packet.x, 3);
                assert_eq!(packet.z, -7);
                assert!(packet.new_chunk);
                assert_eq!(packet.bit_mask, 1);
                assert_eq!(packet.data, vec![0xde, 0xad, 0xbe, 0xef]);
                assert_eq!(packet.block_entities.len(), 1);
            }
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn multi_block_change_records() {
        let mut buf = ByteCursor::new();
        buf.write_i32(1);
        buf.write_i32(2);
        buf.write_varint32(2);
        for (h_pos, y, block) in [(0x12u8, 70u8, 33), (0xf0, 64, 0)] {
            buf.write_u8(h_pos);
            buf.write_u8(y);
            buf.write_varint32(block);
        }
        match decode(0x10, buf.into_vec()) {
            Clientbound::MultiBlockChange(packet) => {
                assert_eq!(packet.records.len(), 2);
                assert_eq!(packet.records[0].h_pos, 0x12);
                assert_eq!(packet.records[0].y, 70);
                assert_eq!(packet.records[1].block_id, 0);
            }
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn map_without_update_leaves_tail_empty() {
        let mut buf = ByteCursor::new();
        buf.write_varint32(7); // item_damage
        buf.write_i8(2); // scale
        buf.write_bool(true); // tracking_position
        buf.write_varint32(0); // icons
        buf.write_i8(0); // columns: no update follows
        match decode(0x24, buf.into_vec()) {
            Clientbound::Map(packet) => {
                assert_eq!(packet.columns, 0);
                assert!(packet.rows.is_none());
                assert!(packet.data.is_none());
            }
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn map_with_update_reads_the_conditional_tail() {
        let mut buf = ByteCursor::new();
        buf.write_varint32(7);
        buf.write_i8(2);
        buf.write_bool(false);
        buf.write_varint32(1); // one icon
        buf.write_u8(0x34);
        buf.write_u8(1);
        buf.write_u8(2);
        buf.write_i8(2); // columns
        buf.write_i8(3); // rows
        buf.write_i8(4); // x
        buf.write_i8(5); // z
        buf.write_varint32(6); // data length
        buf.write_bytes(&[1, 2, 3, 4, 5, 6]);
        match decode(0x24, buf.into_vec()) {
            Clientbound::Map(packet) => {
                assert_eq!(packet.icons.len(), 1);
                assert_eq!(packet.icons[0].direction_and_type, 0x34);
                assert_eq!(packet.rows, Some(3));
                assert_eq!(packet.x, Some(4));
                assert_eq!(packet.z, Some(5));
                assert_eq!(packet.data.as_deref(), Some(&[1, 2, 3, 4, 5, 6][..]));
            }
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn window_items_slots() {
        let mut buf = ByteCursor::new();
        buf.write_u8(0);
        buf.write_i16(2);
        buf.write_i16(-1); // empty slot
        buf.write_i16(276); // diamond sword, no nbt
        buf.write_i8(1);
        buf.write_i16(0);
        buf.write_u8(0); // TAG_End: no nbt
        match decode(0x14, buf.into_vec()) {
            Clientbound::WindowItems(packet) => {
                assert_eq!(packet.slots.len(), 2);
                assert!(packet.slots[0].is_none());
                assert_eq!(packet.slots[1].as_ref().unwrap().id, 276);
            }
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn spawn_player_with_metadata() {
        let mut buf = ByteCursor::new();
        buf.write_varint32(42);
        buf.write_uuid(redstone_buf::Uuid::from_bytes([7; 16]));
        buf.write_f64(1.5);
        buf.write_f64(64.0);
        buf.write_f64(-3.25);
        buf.write_angle(64);
        buf.write_angle(0);
        buf.write_u8(0xff); // empty metadata
        match decode(0x5, buf.into_vec()) {
            Clientbound::SpawnPlayer(packet) => {
                assert_eq!(packet.entity_id, 42);
                assert_eq!(packet.x, 1.5);
                assert_eq!(packet.yaw, 64);
                assert!(packet.metadata.0.is_empty());
            }
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn player_position_and_look_fields() {
        let mut buf = ByteCursor::new();
        buf.write_f64(10.0);
        buf.write_f64(70.0);
        buf.write_f64(-10.0);
        buf.write_f32(90.0);
        buf.write_f32(-15.0);
        buf.write_i8(0);
        buf.write_varint32(7);
        match decode(0x2f, buf.into_vec()) {
            Clientbound::PlayerPositionAndLook(packet) => {
                assert_eq!(packet.teleport_id, 7);
                assert_eq!(packet.yaw, 90.0);
            }
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn plugin_message_takes_the_rest() {
        let mut buf = ByteCursor::new();
        buf.write_str("MC|Brand");
        buf.write_bytes(b"vanilla");
        match decode(0x18, buf.into_vec()) {
            Clientbound::PluginMessage(packet) => {
                assert_eq!(packet.channel, "MC|Brand");
                assert_eq!(packet.data, b"vanilla");
            }
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn names_follow_the_schema() {
        let mut buf = ByteCursor::new();
        buf.write_i64(1);
        let packet = decode(0x1f, buf.into_vec());
        assert_eq!(packet.name(), "keep_alive");
        assert_eq!(KeepAlive::ID, 0x1f);
        assert_eq!(ChunkData::ID, 0x20);
    }

    #[test]
    fn short_payload_is_an_error() {
        let mut buf = ByteCursor::from_vec(vec![0x01]);
        assert!(Clientbound::decode(0x1f, &mut buf).is_err());
    }
}
