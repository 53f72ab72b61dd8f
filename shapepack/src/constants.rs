//! MessagePack format marker bytes.
//!
//! Ref: <https://github.com/msgpack/msgpack/blob/master/spec.md#formats>

/// nil
pub const MSGPACK_NIL: u8 = 0xc0;
/// false
pub const MSGPACK_FALSE: u8 = 0xc2;
/// true
pub const MSGPACK_TRUE: u8 = 0xc3;
/// bin 8
pub const MSGPACK_BIN8: u8 = 0xc4;
/// bin 16
pub const MSGPACK_BIN16: u8 = 0xc5;
/// bin 32
pub const MSGPACK_BIN32: u8 = 0xc6;
/// ext 8
pub const MSGPACK_EXT8: u8 = 0xc7;
/// ext 16
pub const MSGPACK_EXT16: u8 = 0xc8;
/// ext 32
pub const MSGPACK_EXT32: u8 = 0xc9;
/// float 32
pub const MSGPACK_FLOAT32: u8 = 0xca;
/// float 64
pub const MSGPACK_FLOAT64: u8 = 0xcb;
/// uint 8
pub const MSGPACK_UINT8: u8 = 0xcc;
/// uint 16
pub const MSGPACK_UINT16: u8 = 0xcd;
/// uint 32
pub const MSGPACK_UINT32: u8 = 0xce;
/// uint 64
pub const MSGPACK_UINT64: u8 = 0xcf;
/// int 8
pub const MSGPACK_INT8: u8 = 0xd0;
/// int 16
pub const MSGPACK_INT16: u8 = 0xd1;
/// int 32
pub const MSGPACK_INT32: u8 = 0xd2;
/// int 64
pub const MSGPACK_INT64: u8 = 0xd3;
/// fixext 1
pub const MSGPACK_FIXEXT1: u8 = 0xd4;
/// fixext 2
pub const MSGPACK_FIXEXT2: u8 = 0xd5;
/// fixext 4
pub const MSGPACK_FIXEXT4: u8 = 0xd6;
/// fixext 8
pub const MSGPACK_FIXEXT8: u8 = 0xd7;
/// fixext 16
pub const MSGPACK_FIXEXT16: u8 = 0xd8;
/// str 8
pub const MSGPACK_STR8: u8 = 0xd9;
/// str 16
pub const MSGPACK_STR16: u8 = 0xda;
/// str 32
pub const MSGPACK_STR32: u8 = 0xdb;
/// array 16
pub const MSGPACK_ARRAY16: u8 = 0xdc;
/// array 32
pub const MSGPACK_ARRAY32: u8 = 0xdd;
/// map 16
pub const MSGPACK_MAP16: u8 = 0xde;
/// map 32
pub const MSGPACK_MAP32: u8 = 0xdf;

/// Largest positive fixint (`0x00..=0x7f` encodes `0..=127`).
pub const MSGPACK_POSFIXINT_MAX: u8 = 0x7f;
/// First fixmap marker (`0x80..=0x8f` carries the length in the low nibble).
pub const MSGPACK_FIXMAP_MIN: u8 = 0x80;
/// Last fixmap marker.
pub const MSGPACK_FIXMAP_MAX: u8 = 0x8f;
/// First fixarray marker (`0x90..=0x9f`).
pub const MSGPACK_FIXARRAY_MIN: u8 = 0x90;
/// Last fixarray marker.
pub const MSGPACK_FIXARRAY_MAX: u8 = 0x9f;
/// First fixstr marker (`0xa0..=0xbf` carries the length in the low five bits).
pub const MSGPACK_FIXSTR_MIN: u8 = 0xa0;
/// Last fixstr marker.
pub const MSGPACK_FIXSTR_MAX: u8 = 0xbf;
/// First negative fixint marker (`0xe0..=0xff` encodes `-32..=-1`).
pub const MSGPACK_NEGFIXINT_MIN: u8 = 0xe0;

/// Extension type code for timestamps.
pub const EXT_TIMESTAMP: i8 = -1;
