//! Network flavour of the NBT tag tree.
//!
//! Values are `fastnbt::Value` trees. On the wire shorts, floats and doubles are
//! little-endian, ints and longs (including array lengths and int array elements)
//! are zigzag varints, and string lengths are unsigned varints. Compound fields
//! are written in key order.

use std::collections::HashMap;

use fastnbt::{ByteArray, IntArray, LongArray, Value};

use crate::network::error::{EncodeError, WireError};
use crate::network::wire::ByteCursor;

pub type Compound = HashMap<String, Value>;

pub const MAX_DEPTH: usize = 512;
const MAX_STRING_LEN: usize = 0x7fff;

const END: u8 = 0;
const BYTE: u8 = 1;
const SHORT: u8 = 2;
const INT: u8 = 3;
const LONG: u8 = 4;
const FLOAT: u8 = 5;
const DOUBLE: u8 = 6;
const BYTE_ARRAY: u8 = 7;
const STRING: u8 = 8;
const LIST: u8 = 9;
const COMPOUND: u8 = 10;
const INT_ARRAY: u8 = 11;
const LONG_ARRAY: u8 = 12;

pub fn tag_id(value: &Value) -> u8 {
    match value {
        Value::Byte(_) => BYTE,
        Value::Short(_) => SHORT,
        Value::Int(_) => INT,
        Value::Long(_) => LONG,
        Value::Float(_) => FLOAT,
        Value::Double(_) => DOUBLE,
        Value::ByteArray(_) => BYTE_ARRAY,
        Value::String(_) => STRING,
        Value::List(_) => LIST,
        Value::Compound(_) => COMPOUND,
        Value::IntArray(_) => INT_ARRAY,
        Value::LongArray(_) => LONG_ARRAY,
    }
}

/// Reads a named root tag.
pub fn read_root(cur: &mut ByteCursor) -> Result<(String, Value), WireError> {
    let id = cur.get_u8()?;
    if id == END {
        return Err(WireError::Unexpected("root tag is TAG_End".into()));
    }
    let name = read_string(cur)?;
    let value = read_payload(cur, id, 0)?;
    Ok((name, value))
}

/// Reads a root tag which must be a compound. The root name is discarded.
pub fn read_compound_root(cur: &mut ByteCursor) -> Result<Compound, WireError> {
    match read_root(cur)? {
        (_, Value::Compound(map)) => Ok(map),
        (_, other) => Err(WireError::Unexpected(format!("expected root compound, got tag type {}", tag_id(&other)))),
    }
}

pub fn write_root(cur: &mut ByteCursor, name: &str, value: &Value) -> Result<(), EncodeError> {
    cur.put_u8(tag_id(value));
    write_string(cur, name)?;
    write_payload(cur, value)
}

pub fn write_compound_root(cur: &mut ByteCursor, map: &Compound) -> Result<(), EncodeError> {
    cur.put_u8(COMPOUND);
    write_string(cur, "")?;
    write_compound(cur, map)
}

fn read_string(cur: &mut ByteCursor) -> Result<String, WireError> {
    let len = cur.get_unsigned_var_int()? as usize;
    if len > MAX_STRING_LEN {
        return Err(WireError::Unexpected(format!("tag string of {len} bytes is too long")));
    }
    String::from_utf8(cur.get(len)?.to_vec()).map_err(|_| WireError::InvalidUtf8)
}

fn write_string(cur: &mut ByteCursor, s: &str) -> Result<(), EncodeError> {
    if s.len() > MAX_STRING_LEN {
        return Err(EncodeError::TagStringTooLong(s.len()));
    }
    cur.put_string(s);
    Ok(())
}

fn read_len(cur: &mut ByteCursor) -> Result<usize, WireError> {
    let len = cur.get_var_int()?;
    usize::try_from(len).map_err(|_| WireError::Unexpected(format!("negative length {len}")))
}

fn read_payload(cur: &mut ByteCursor, id: u8, depth: usize) -> Result<Value, WireError> {
    if depth > MAX_DEPTH {
        return Err(WireError::TooDeep(MAX_DEPTH));
    }
    Ok(match id {
        BYTE => Value::Byte(cur.get_i8()?),
        SHORT => Value::Short(cur.get_i16_le()?),
        INT => Value::Int(cur.get_var_int()?),
        LONG => Value::Long(cur.get_var_long()?),
        FLOAT => Value::Float(cur.get_f32_le()?),
        DOUBLE => Value::Double(cur.get_f64_le()?),
        BYTE_ARRAY => {
            let len = read_len(cur)?;
            Value::ByteArray(ByteArray::new(cur.get(len)?.iter().map(|&b| b as i8).collect()))
        }
        STRING => Value::String(read_string(cur)?),
        LIST => {
            let elem = cur.get_u8()?;
            let len = read_len(cur)?;
            if elem == END && len > 0 {
                return Err(WireError::Unexpected("non-empty list of TAG_End".into()));
            }
            let mut items = Vec::with_capacity(len.min(cur.remaining()));
            for _ in 0..len {
                items.push(read_payload(cur, elem, depth + 1)?);
            }
            Value::List(items)
        }
        COMPOUND => {
            let mut map = Compound::new();
            loop {
                let id = cur.get_u8()?;
                if id == END {
                    break;
                }
                let name = read_string(cur)?;
                map.insert(name, read_payload(cur, id, depth + 1)?);
            }
            Value::Compound(map)
        }
        INT_ARRAY => {
            let len = read_len(cur)?;
            let mut ints = Vec::with_capacity(len.min(cur.remaining()));
            for _ in 0..len {
                ints.push(cur.get_var_int()?);
            }
            Value::IntArray(IntArray::new(ints))
        }
        LONG_ARRAY => {
            let len = read_len(cur)?;
            let mut longs = Vec::with_capacity(len.min(cur.remaining()));
            for _ in 0..len {
                longs.push(cur.get_var_long()?);
            }
            Value::LongArray(LongArray::new(longs))
        }
        other => return Err(WireError::UnknownTagType(other)),
    })
}

fn write_compound(cur: &mut ByteCursor, map: &Compound) -> Result<(), EncodeError> {
    let mut fields: Vec<_> = map.iter().collect();
    fields.sort_unstable_by(|a, b| a.0.cmp(b.0));
    for (name, value) in fields {
        cur.put_u8(tag_id(value));
        write_string(cur, name)?;
        write_payload(cur, value)?;
    }
    cur.put_u8(END);
    Ok(())
}

fn write_payload(cur: &mut ByteCursor, value: &Value) -> Result<(), EncodeError> {
    match value {
        Value::Byte(v) => cur.put_i8(*v),
        Value::Short(v) => cur.put_i16_le(*v),
        Value::Int(v) => cur.put_var_int(*v),
        Value::Long(v) => cur.put_var_long(*v),
        Value::Float(v) => cur.put_f32_le(*v),
        Value::Double(v) => cur.put_f64_le(*v),
        Value::ByteArray(bytes) => {
            cur.put_var_int(bytes.len() as i32);
            for b in bytes.iter() {
                cur.put_i8(*b);
            }
        }
        Value::String(s) => write_string(cur, s)?,
        Value::List(items) => {
            let elem = items.first().map_or(END, tag_id);
            if items.iter().any(|v| tag_id(v) != elem) {
                return Err(EncodeError::MixedList);
            }
            cur.put_u8(elem);
            cur.put_var_int(items.len() as i32);
            for v in items {
                write_payload(cur, v)?;
            }
        }
        Value::Compound(map) => write_compound(cur, map)?,
        Value::IntArray(ints) => {
            cur.put_var_int(ints.len() as i32);
            for v in ints.iter() {
                cur.put_var_int(*v);
            }
        }
        Value::LongArray(longs) => {
            cur.put_var_int(longs.len() as i32);
            for v in longs.iter() {
                cur.put_var_long(*v);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_bytes_do_not_depend_on_insertion_order() {
        let mut forward = Compound::new();
        let mut backward = Compound::new();
        let keys = ["b", "a", "d", "c", "f", "e"];
        for (i, key) in keys.iter().enumerate() {
            forward.insert(key.to_string(), Value::Byte(i as i8));
        }
        for (i, key) in keys.iter().enumerate().rev() {
            backward.insert(key.to_string(), Value::Byte(i as i8));
        }

        let mut a = ByteCursor::new();
        write_compound_root(&mut a, &forward).unwrap();
        let mut b = ByteCursor::new();
        write_compound_root(&mut b, &backward).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());

        // root tag and empty name, then (tag, name length, name, payload) per field
        let names: Vec<u8> = a.as_bytes()[2..].chunks(4).take(keys.len()).map(|field| field[2]).collect();
        assert_eq!(names, b"abcdef");
    }

    fn round_trip(value: &Value) -> Value {
        let mut cur = ByteCursor::new();
        write_root(&mut cur, "root", value).unwrap();
        let (name, decoded) = read_root(&mut cur).unwrap();
        assert_eq!(name, "root");
        assert!(cur.is_exhausted());
        decoded
    }

    #[test]
    fn nested_tree_round_trips() {
        let value = fastnbt::nbt!({
            "byte": 3i8,
            "short": -300i16,
            "int": 123456,
            "long": -9_000_000_000i64,
            "float": 1.25f32,
            "double": 2.5f64,
            "name": "minecraft:stone",
            "list": [1, 2, 3],
            "nested": { "deeper": { "flag": 1i8 } },
            "empty": [],
        });
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn arrays_round_trip() {
        let mut map = Compound::new();
        map.insert("bytes".into(), Value::ByteArray(ByteArray::new(vec![-1, 0, 1])));
        map.insert("ints".into(), Value::IntArray(IntArray::new(vec![i32::MIN, 0, i32::MAX])));
        map.insert("longs".into(), Value::LongArray(LongArray::new(vec![i64::MIN, i64::MAX])));
        let value = Value::Compound(map);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn ints_are_zigzag_varints() {
        let mut cur = ByteCursor::new();
        write_root(&mut cur, "", &Value::Int(-1)).unwrap();
        assert_eq!(cur.into_inner(), [INT, 0, 0x01]);
    }

    #[test]
    fn mixed_list_is_rejected() {
        let value = Value::List(vec![Value::Int(1), Value::Byte(1)]);
        let mut cur = ByteCursor::new();
        assert!(matches!(write_root(&mut cur, "", &value), Err(EncodeError::MixedList)));
    }

    #[test]
    fn unknown_tag_type_fails() {
        let mut cur = ByteCursor::from(vec![COMPOUND, 0, 42, 1, b'x']);
        assert!(matches!(read_root(&mut cur), Err(WireError::UnknownTagType(42))));
    }

    #[test]
    fn truncated_compound_fails() {
        let mut cur = ByteCursor::new();
        write_root(&mut cur, "", &fastnbt::nbt!({ "a": "bcd" })).unwrap();
        let mut bytes = cur.into_inner();
        bytes.pop();
        assert!(matches!(read_root(&mut bytes.into()), Err(WireError::OutOfBounds { .. })));
    }

    #[test]
    fn nesting_is_capped() {
        let mut bytes = vec![LIST, 0];
        for _ in 0..=MAX_DEPTH + 1 {
            bytes.extend([LIST, 2]);
        }
        assert!(matches!(read_root(&mut bytes.into()), Err(WireError::TooDeep(MAX_DEPTH))));
    }
}
