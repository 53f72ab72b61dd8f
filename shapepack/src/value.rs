//! The dynamic variant-tree model for msgpack of unknown schema.

use core::hash::{Hash, Hasher};
use std::collections::HashMap;
use std::collections::hash_map::RandomState;

use crate::context::SerializationContext;
use crate::converters::{Converter, with_depth};
use crate::errors::{Error, ErrorKind};
use crate::reader::{MsgPackReader, Token};
use crate::shape::{Shape, Shaped};
use crate::timestamp::Timestamp;
use crate::writer::MsgPackWriter;

/// Any msgpack value, decoded without a schema.
///
/// Integers are normalized at construction and on decode: non-negative
/// values live in `UInt`, negative ones in `SInt`, so `Value::from(45u8)`
/// and `Value::from(45i64)` are the same key. Floats compare and hash by
/// bit pattern.
#[derive(Debug, Clone)]
pub enum Value {
    /// nil
    Nil,
    /// true / false
    Bool(bool),
    /// Any non-negative integer.
    UInt(u64),
    /// Any negative integer.
    SInt(i64),
    /// float 32
    F32(f32),
    /// float 64
    F64(f64),
    /// A UTF-8 string.
    Str(String),
    /// Binary data.
    Bin(Vec<u8>),
    /// An array of values.
    Array(Vec<Value>),
    /// A map preserving insertion order.
    Map(ValueMap),
    /// An extension value other than a timestamp.
    Ext(i8, Vec<u8>),
    /// Extension type −1.
    Timestamp(Timestamp),
}

enum NumKey {
    U(u64),
    S(i64),
}

impl Value {
    fn num_key(&self) -> Option<NumKey> {
        match *self {
            Value::UInt(u) => Some(NumKey::U(u)),
            Value::SInt(s) if s >= 0 => Some(NumKey::U(s as u64)),
            Value::SInt(s) => Some(NumKey::S(s)),
            _ => None,
        }
    }

    /// Looks up a map entry or array element. Any integer width works as
    /// a key; signed and unsigned coercions of the same number find the
    /// same entry.
    pub fn get(&self, key: impl Into<Value>) -> Option<&Value> {
        let key = key.into();
        match self {
            Value::Map(map) => map.get(&key),
            Value::Array(items) => match key {
                Value::UInt(i) => items.get(i as usize),
                _ => None,
            },
            _ => None,
        }
    }

    /// The string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a `u64`, if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::UInt(u) => Some(u),
            _ => None,
        }
    }

    /// The value as an `i64`, if it is any integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::UInt(u) => i64::try_from(u).ok(),
            Value::SInt(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean payload, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// The value widened to `f64`, if it is any float.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(f) => Some(f as f64),
            Value::F64(f) => Some(f),
            _ => None,
        }
    }

    /// The array elements, if this is an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The map, if this is a map.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::UInt(_) | Value::SInt(_), Value::UInt(_) | Value::SInt(_)) => {
                match (self.num_key(), other.num_key()) {
                    (Some(NumKey::U(a)), Some(NumKey::U(b))) => a == b,
                    (Some(NumKey::S(a)), Some(NumKey::S(b))) => a == b,
                    _ => false,
                }
            }
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bin(a), Value::Bin(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Ext(ac, ad), Value::Ext(bc, bd)) => ac == bc && ad == bd,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Nil => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::UInt(_) | Value::SInt(_) => match self.num_key() {
                Some(NumKey::U(u)) => {
                    2u8.hash(state);
                    u.hash(state);
                }
                Some(NumKey::S(s)) => {
                    3u8.hash(state);
                    s.hash(state);
                }
                None => unreachable!(),
            },
            Value::F32(f) => {
                4u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::F64(f) => {
                5u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Str(s) => {
                6u8.hash(state);
                s.hash(state);
            }
            Value::Bin(b) => {
                7u8.hash(state);
                b.hash(state);
            }
            Value::Array(items) => {
                8u8.hash(state);
                items.hash(state);
            }
            Value::Map(map) => {
                9u8.hash(state);
                map.hash(state);
            }
            Value::Ext(code, data) => {
                10u8.hash(state);
                code.hash(state);
                data.hash(state);
            }
            Value::Timestamp(ts) => {
                11u8.hash(state);
                ts.hash(state);
            }
        }
    }
}

macro_rules! value_from_unsigned {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Value {
                Value::UInt(v as u64)
            }
        }
    )*};
}

macro_rules! value_from_signed {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Value {
                let v = v as i64;
                if v >= 0 {
                    Value::UInt(v as u64)
                } else {
                    Value::SInt(v)
                }
            }
        }
    )*};
}

value_from_unsigned!(u8, u16, u32, u64, usize);
value_from_signed!(i8, i16, i32, i64, isize);

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::F64(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Value {
        Value::Timestamp(v)
    }
}

/// A msgpack map: insertion-ordered entries with hashed lookup.
///
/// Keys may be any value, integer keys of any width included. Lookup goes
/// through the standard collision-resistant hasher, so maps built from
/// untrusted keys keep their performance. Equality is entry order
/// sensitive, matching the wire.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: Vec<(Value, Value)>,
    index: HashMap<Value, usize, RandomState>,
}

impl ValueMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts an entry, replacing and returning the previous value for
    /// an equal key.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        match self.index.get(&key) {
            Some(&i) => Some(core::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Whether an equal key is present.
    pub fn contains_key(&self, key: &Value) -> bool {
        self.index.contains_key(key)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for ValueMap {}

impl Hash for ValueMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entries.hash(state);
    }
}

impl FromIterator<(Value, Value)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

pub(crate) struct ValueConverter;

impl Converter<Value> for ValueConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &Value,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        match value {
            Value::Nil => writer.write_nil(),
            Value::Bool(b) => writer.write_bool(*b),
            Value::UInt(u) => writer.write_u64(*u),
            Value::SInt(s) => writer.write_i64(*s),
            Value::F32(f) => writer.write_f32(*f),
            Value::F64(f) => writer.write_f64(*f),
            Value::Str(s) => writer.write_str(s),
            Value::Bin(b) => writer.write_bin(b),
            Value::Array(items) => with_depth(ctx, |ctx| {
                writer.write_array_header(items.len())?;
                for (i, item) in items.iter().enumerate() {
                    self.write(writer, item, ctx).map_err(|e| e.with_index(i))?;
                }
                Ok(())
            }),
            Value::Map(map) => with_depth(ctx, |ctx| {
                writer.write_map_header(map.len())?;
                for (k, v) in map.iter() {
                    self.write(writer, k, ctx)?;
                    self.write(writer, v, ctx)?;
                }
                Ok(())
            }),
            Value::Ext(code, data) => {
                let len = u32::try_from(data.len())
                    .map_err(|_| Error::invalid_operation("extension longer than u32::MAX"))?;
                writer.write_ext_header_any(*code, len)?;
                writer.write_raw(data)
            }
            Value::Timestamp(ts) => writer.write_timestamp(*ts),
        }
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<Value, Error> {
        let token = reader.read_token()?;
        match token {
            Token::Nil => Ok(Value::Nil),
            Token::Bool(b) => Ok(Value::Bool(b)),
            Token::UInt(u) => Ok(Value::UInt(u)),
            Token::SInt(s) => Ok(Value::SInt(s)),
            Token::F32(f) => Ok(Value::F32(f)),
            Token::F64(f) => Ok(Value::F64(f)),
            Token::Str(s) => Ok(Value::Str(s.into_owned())),
            Token::Bin(b) => Ok(Value::Bin(b.into_owned())),
            Token::Ext { code, data } => Ok(Value::Ext(code, data.into_owned())),
            Token::Timestamp(ts) => Ok(Value::Timestamp(ts)),
            Token::ArrayHeader(len) => with_depth(ctx, |ctx| {
                let mut items = Vec::with_capacity(len.min(4096));
                for i in 0..len {
                    items.push(self.read(reader, ctx).map_err(|e| e.with_index(i))?);
                }
                Ok(Value::Array(items))
            }),
            Token::MapHeader(len) => with_depth(ctx, |ctx| {
                let mut map = ValueMap::new();
                for _ in 0..len {
                    let key = self.read(reader, ctx)?;
                    let value = self.read(reader, ctx)?;
                    if map.insert(key.clone(), value).is_some()
                        && ctx.options().reject_duplicate_keys
                    {
                        return Err(Error::new(ErrorKind::DuplicateProperty(format!(
                            "{key:?}"
                        ))));
                    }
                }
                Ok(Value::Map(map))
            }),
        }
    }
}

impl Shaped for Value {
    fn shape() -> Shape<Self> {
        Shape::converter(ValueConverter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_keys_normalize_across_widths() {
        let mut map = ValueMap::new();
        map.insert(Value::from(45u8), Value::from("u8"));
        assert!(map.contains_key(&Value::from(45i64)));
        assert!(map.contains_key(&Value::from(45u32)));
        assert_eq!(map.get(&Value::from(45i16)).unwrap().as_str(), Some("u8"));
        map.insert(Value::from(-45i32), Value::Bool(false));
        assert!(map.contains_key(&Value::from(-45i8)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn maps_preserve_insertion_order() {
        let mut map = ValueMap::new();
        map.insert(Value::from("b"), Value::from(1u8));
        map.insert(Value::from("a"), Value::from(2u8));
        let keys: Vec<&Value> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, [&Value::from("b"), &Value::from("a")]);
    }
}
