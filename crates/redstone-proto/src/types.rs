//! Hand-written wire types the generated packets lean on: item slots and
//! entity metadata, plus the small reader helpers the generator emits calls
//! to.

use redstone_buf::{ByteCursor, Position, Uuid};
use redstone_nbt::{io, Tag};

use crate::error::ProtoError;

/// An item stack. An id of -1 on the wire means the slot is empty and is
/// represented as `None` by [`read_slot`].
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub id: i16,
    pub count: i8,
    pub damage: i16,
    /// `Value::End` when the item carries no extra data.
    pub nbt: Tag,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Entity metadata: `(index, value)` entries terminated by index 0xff.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityMeta(pub Vec<MetaEntry>);

#[derive(Debug, Clone, PartialEq)]
pub struct MetaEntry {
    pub index: u8,
    pub value: MetaValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Byte(u8),
    VarInt(i32),
    Float(f32),
    String(String),
    Chat(String),
    Slot(Option<Slot>),
    Bool(bool),
    Rotation(Rotation),
    Position(Position),
    OptPosition(Option<Position>),
    Direction(i32),
    OptUuid(Option<Uuid>),
    OptVarInt(Option<i32>),
    Nbt(Tag),
}

pub fn read_nbt(buf: &mut ByteCursor) -> Result<Tag, ProtoError> {
    Ok(io::read(buf)?)
}

pub fn write_nbt(tag: &Tag, buf: &mut ByteCursor) {
    io::write(tag, buf);
}

pub fn read_slot(buf: &mut ByteCursor) -> Result<Option<Slot>, ProtoError> {
    let id = buf.read_i16()?;
    if id == -1 {
        return Ok(None);
    }
    let count = buf.read_i8()?;
    let damage = buf.read_i16()?;
    let nbt = read_nbt(buf)?;
    Ok(Some(Slot {
        id,
        count,
        damage,
        nbt,
    }))
}

pub fn write_slot(slot: Option<&Slot>, buf: &mut ByteCursor) {
    match slot {
        None => buf.write_i16(-1),
        Some(slot) => {
            buf.write_i16(slot.id);
            buf.write_i8(slot.count);
            buf.write_i16(slot.damage);
            write_nbt(&slot.nbt, buf);
        }
    }
}

pub fn read_entity_meta(buf: &mut ByteCursor) -> Result<EntityMeta, ProtoError> {
    let mut entries = Vec::new();
    loop {
        let index = buf.read_u8()?;
        if index == 0xff {
            return Ok(EntityMeta(entries));
        }
        let kind = buf.read_varint32()?;
        let value = match kind {
            0 => MetaValue::Byte(buf.read_u8()?),
            1 => MetaValue::VarInt(buf.read_varint32()?),
            2 => MetaValue::Float(buf.read_f32()?),
            3 => MetaValue::String(buf.read_str()?),
            4 => MetaValue::Chat(buf.read_str()?),
            5 => MetaValue::Slot(read_slot(buf)?),
            6 => MetaValue::Bool(buf.read_bool()?),
            7 => MetaValue::Rotation(Rotation {
                x: buf.read_f32()?,
                y: buf.read_f32()?,
                z: buf.read_f32()?,
            }),
            8 => MetaValue::Position(buf.read_pos()?),
            9 => MetaValue::OptPosition(if buf.read_bool()? {
                Some(buf.read_pos()?)
            } else {
                None
            }),
            10 => MetaValue::Direction(buf.read_varint32()?),
            11 => MetaValue::OptUuid(if buf.read_bool()? {
                Some(buf.read_uuid()?)
            } else {
                None
            }),
            12 => MetaValue::OptVarInt(if buf.read_bool()? {
                Some(buf.read_varint32()?)
            } else {
                None
            }),
            13 => MetaValue::Nbt(read_nbt(buf)?),
            other => return Err(ProtoError::InvalidMetadata(other)),
        };
        entries.push(MetaEntry { index, value });
    }
}

/// Reads `count` elements with the given reader; the generated packet code
/// calls this for every non-byte vector field.
pub fn read_vec<T>(
    buf: &mut ByteCursor,
    count: usize,
    mut read: impl FnMut(&mut ByteCursor) -> Result<T, ProtoError>,
) -> Result<Vec<T>, ProtoError> {
    let mut items = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        items.push(read(buf)?);
    }
    Ok(items)
}
