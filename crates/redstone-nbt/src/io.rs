//! Wire codec: named tags, unnamed list children, End-terminated compounds.

use redstone_buf::{BufError, ByteCursor};

use crate::error::NbtError;
use crate::tag::{Tag, Value};

/// Maximum nesting depth to prevent stack overflow on hostile input.
const MAX_DEPTH: usize = 512;

/// Reads one named tag (the usual root form).
///
/// A lone `End` byte yields an unnamed `Value::End` tag, which is how empty
/// item slots encode "no NBT".
pub fn read(buf: &mut ByteCursor) -> Result<Tag, NbtError> {
    read_tag(buf, true, 0)
}

/// Writes one named tag, mirroring [`read`].
pub fn write(tag: &Tag, buf: &mut ByteCursor) {
    buf.write_u8(tag.kind());
    if matches!(tag.value, Value::End) {
        return;
    }
    write_name(tag.name.as_deref(), buf);
    write_payload(&tag.value, buf);
}

/// Convenience wrapper returning the encoded bytes.
pub fn write_to_vec(tag: &Tag) -> Vec<u8> {
    let mut buf = ByteCursor::new();
    write(tag, &mut buf);
    buf.into_vec()
}

fn read_tag(buf: &mut ByteCursor, named: bool, depth: usize) -> Result<Tag, NbtError> {
    let kind = buf.read_u8()?;
    if kind == 0 {
        return Ok(Tag::unnamed(Value::End));
    }
    let name = if named { read_name(buf)? } else { None };
    let value = read_payload(kind, buf, depth)?;
    Ok(Tag { name, value })
}

fn read_payload(kind: u8, buf: &mut ByteCursor, depth: usize) -> Result<Value, NbtError> {
    if depth > MAX_DEPTH {
        return Err(NbtError::NestingTooDeep { limit: MAX_DEPTH });
    }

    match kind {
        0 => Ok(Value::End),
        1 => Ok(Value::Byte(buf.read_i8()?)),
        2 => Ok(Value::Short(buf.read_i16()?)),
        3 => Ok(Value::Int(buf.read_i32()?)),
        4 => Ok(Value::Long(buf.read_i64()?)),
        5 => Ok(Value::Float(buf.read_f32()?)),
        6 => Ok(Value::Double(buf.read_f64()?)),
        7 => {
            let len = read_len(buf)?;
            Ok(Value::ByteArray(buf.read_exact(len)?.to_vec()))
        }
        8 => Ok(Value::String(read_str16(buf)?)),
        9 => {
            let element_kind = buf.read_u8()?;
            let len = read_len(buf)?;
            let mut items = Vec::with_capacity(len.min(65536));
            for _ in 0..len {
                items.push(read_payload(element_kind, buf, depth + 1)?);
            }
            Ok(Value::List(items))
        }
        10 => {
            let mut children = Vec::new();
            loop {
                let child = read_tag(buf, true, depth + 1)?;
                if matches!(child.value, Value::End) {
                    break;
                }
                children.push(child);
            }
            Ok(Value::Compound(children))
        }
        11 => {
            let len = read_len(buf)?;
            let mut items = Vec::with_capacity(len.min(65536));
            for _ in 0..len {
                items.push(buf.read_i32()?);
            }
            Ok(Value::IntArray(items))
        }
        12 => {
            let len = read_len(buf)?;
            let mut items = Vec::with_capacity(len.min(65536));
            for _ in 0..len {
                items.push(buf.read_i64()?);
            }
            Ok(Value::LongArray(items))
        }
        other => Err(NbtError::UnknownTagType(other)),
    }
}

fn write_payload(value: &Value, buf: &mut ByteCursor) {
    match value {
        Value::End => {}
        Value::Byte(v) => buf.write_i8(*v),
        Value::Short(v) => buf.write_i16(*v),
        Value::Int(v) => buf.write_i32(*v),
        Value::Long(v) => buf.write_i64(*v),
        Value::Float(v) => buf.write_f32(*v),
        Value::Double(v) => buf.write_f64(*v),
        Value::ByteArray(bytes) => {
            buf.write_i32(bytes.len() as i32);
            buf.write_bytes(bytes);
        }
        Value::String(s) => write_str16(s, buf),
        Value::List(items) => {
            // An empty list writes element kind End and length 0.
            let element_kind = items.first().map_or(0, Value::kind);
            buf.write_u8(element_kind);
            buf.write_i32(items.len() as i32);
            for item in items {
                write_payload(item, buf);
            }
        }
        Value::Compound(children) => {
            for child in children {
                buf.write_u8(child.kind());
                write_name(child.name.as_deref(), buf);
                write_payload(&child.value, buf);
            }
            buf.write_u8(0);
        }
        Value::IntArray(items) => {
            buf.write_i32(items.len() as i32);
            for v in items {
                buf.write_i32(*v);
            }
        }
        Value::LongArray(items) => {
            buf.write_i32(items.len() as i32);
            for v in items {
                buf.write_i64(*v);
            }
        }
    }
}

fn read_len(buf: &mut ByteCursor) -> Result<usize, NbtError> {
    let len = buf.read_i32()?;
    if len < 0 {
        return Err(NbtError::NegativeLength(len));
    }
    Ok(len as usize)
}

fn read_name(buf: &mut ByteCursor) -> Result<Option<String>, NbtError> {
    let name = read_str16(buf)?;
    Ok(if name.is_empty() { None } else { Some(name) })
}

fn read_str16(buf: &mut ByteCursor) -> Result<String, NbtError> {
    let len = buf.read_i16()?;
    if len < 0 {
        return Err(NbtError::NegativeLength(i32::from(len)));
    }
    let bytes = buf.read_exact(len as usize)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| NbtError::Buf(BufError::InvalidUtf8))
}

fn write_name(name: Option<&str>, buf: &mut ByteCursor) {
    write_str16(name.unwrap_or(""), buf);
}

fn write_str16(s: &str, buf: &mut ByteCursor) {
    buf.write_i16(s.len() as i16);
    buf.write_bytes(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_hex(hex: &str) -> Vec<u8> {
        let digits: String = hex.chars().filter(|c| c.is_ascii_hexdigit()).collect();
        digits
            .as_bytes()
            .chunks(2)
            .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
            .collect()
    }

    fn roundtrip(data: &[u8]) -> Tag {
        let mut buf = ByteCursor::from_vec(data.to_vec());
        let tag = read(&mut buf).unwrap();
        assert_eq!(buf.remaining(), 0, "trailing bytes after tag");
        assert_eq!(write_to_vec(&tag), data, "re-encoding differs");
        tag
    }

    #[test]
    fn short_tag() {
        let data = from_hex(
            "02
             00 09
             73 68 6F 72 74 54 65 73 74
             7F FF",
        );
        let tag = roundtrip(&data);
        assert_eq!(tag, Tag::new("shortTest", Value::Short(32767)));
    }

    #[test]
    fn hello_world_compound() {
        let data = from_hex(
            "0a
             00 0b
             68 65 6c 6c 6f 20 77 6f 72 6c 64
             08
             00 04
             6e 61 6d 65
             00 09
             42 61 6e 61 6e 72 61 6d 61
             00",
        );
        let tag = roundtrip(&data);
        assert_eq!(
            tag,
            Tag::new(
                "hello world",
                Value::Compound(vec![Tag::new("name", Value::String("Bananrama".into()))]),
            )
        );
    }

    #[test]
    fn empty_list_writes_end_kind() {
        let tag = Tag::new("empty", Value::List(vec![]));
        let encoded = write_to_vec(&tag);
        // kind 9, name "empty", element kind 0, length 0
        assert_eq!(
            encoded,
            [9, 0, 5, b'e', b'm', b'p', b't', b'y', 0, 0, 0, 0, 0]
        );
        let mut buf = ByteCursor::from_vec(encoded);
        assert_eq!(read(&mut buf).unwrap(), tag);
    }

    #[test]
    fn lone_end_byte_reads_as_end() {
        let mut buf = ByteCursor::from_vec(vec![0]);
        let tag = read(&mut buf).unwrap();
        assert_eq!(tag.value, Value::End);
        assert_eq!(write_to_vec(&tag), vec![0]);
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut buf = ByteCursor::from_vec(vec![13, 0, 0]);
        assert!(matches!(
            read(&mut buf),
            Err(NbtError::UnknownTagType(13))
        ));
    }

    #[test]
    fn truncated_compound_rejected() {
        let data = from_hex("0a 00 01 61 02 00 01 62");
        let mut buf = ByteCursor::from_vec(data);
        assert!(read(&mut buf).is_err());
    }

    /// The canonical "bigtest" structure, gzipped. Must round-trip
    /// byte-for-byte through read then write.
    #[test]
    fn bigtest() {
        use base64::Engine;
        use std::io::Read;

        const BLOB: &str = "\
H4sIAAAAAAAAAO1Uz08aQRR+wgLLloKxxBBjzKu1hKXbzUIRibGIFiyaDRrYqDGGuCvDgi67Znew\
8dRLe2x66z/TI39Dz732v6DDL3tpz73wMsn35r1v5ntvJnkCBFRyTywOeMuxTY149ONwYj4Iex3H\
pZMYD4JH3e6EAmK1oqrHeHZcV8uoVQ8byNYeapWGhg2tflh7j4PPg0+Db88DEG5bjj6+pThMZP0Q\
6tp0piNA3GYuaeG107tz+nYLKdsL4O/oPR44W+8RCFb13l3fC0DgXrf6ZLcEAIxBTHPGCFVM0yAu\
faTAyMIQs7reWAtTo+5EjkUDMLEnU4xM8ekUo1OMheHZn+Oz8kSBpXwz3di7x6p1E18oHAjXLtFZ\
P68dG2AhWd/68QX+wc78nb0AvPFAyfiFQkBG/p7r6g+TOmiHYLvrMjejKAqOu/XQaWPKTtvp7Obm\
Kzu9Jb5kSQk9qruU/Rh+6NIO2m8VTLFoPivhm5yEmbyEBQllWRZFAP8vKK4v8sKypC4dIHdaO7mM\
yucp31FByRa1xW2hKq0sxTF/unqSjl6dX/gSBSMb0fa3d6rNlXK8nt9YXUuXrpIXuUTQgMj6Pr+z\
3FTLB3Vuo7Z2WZKTqdxRUJlrzDXmGv9XIwhCy+kb1njC7P78evt9eNOE39TypPsIBgAA";

        let gz = base64::engine::general_purpose::STANDARD
            .decode(BLOB)
            .unwrap();
        let mut data = Vec::new();
        flate2::read::GzDecoder::new(&gz[..])
            .read_to_end(&mut data)
            .unwrap();

        fn f(n: i64) -> u8 {
            ((n * n * 255 + n * 7) % 100) as u8
        }

        let target = Tag::new(
            "Level",
            Value::Compound(vec![
                Tag::new("longTest", Value::Long(9223372036854775807)),
                Tag::new("shortTest", Value::Short(32767)),
                Tag::new(
                    "stringTest",
                    Value::String("HELLO WORLD THIS IS A TEST STRING ÅÄÖ!".into()),
                ),
                Tag::new("floatTest", Value::Float(0.49823147)),
                Tag::new("intTest", Value::Int(2147483647)),
                Tag::new(
                    "nested compound test",
                    Value::Compound(vec![
                        Tag::new(
                            "ham",
                            Value::Compound(vec![
                                Tag::new("name", Value::String("Hampus".into())),
                                Tag::new("value", Value::Float(0.75)),
                            ]),
                        ),
                        Tag::new(
                            "egg",
                            Value::Compound(vec![
                                Tag::new("name", Value::String("Eggbert".into())),
                                Tag::new("value", Value::Float(0.5)),
                            ]),
                        ),
                    ]),
                ),
                Tag::new(
                    "listTest (long)",
                    Value::List(vec![
                        Value::Long(11),
                        Value::Long(12),
                        Value::Long(13),
                        Value::Long(14),
                        Value::Long(15),
                    ]),
                ),
                Tag::new(
                    "listTest (compound)",
                    Value::List(vec![
                        Value::Compound(vec![
                            Tag::new("name", Value::String("Compound tag #0".into())),
                            Tag::new("created-on", Value::Long(1264099775885)),
                        ]),
                        Value::Compound(vec![
                            Tag::new("name", Value::String("Compound tag #1".into())),
                            Tag::new("created-on", Value::Long(1264099775885)),
                        ]),
                    ]),
                ),
                Tag::new("byteTest", Value::Byte(127)),
                Tag::new(
                    "byteArrayTest (the first 1000 values of (n*n*255+n*7)%100, \
                     starting with n=0 (0, 62, 34, 16, 8, ...))",
                    Value::ByteArray((0..1000).map(f).collect()),
                ),
                Tag::new("doubleTest", Value::Double(0.4931287132182315)),
            ]),
        );

        let mut buf = ByteCursor::from_vec(data.clone());
        let got = read(&mut buf).unwrap();
        assert_eq!(got, target);
        assert_eq!(write_to_vec(&got), data);
    }
}
