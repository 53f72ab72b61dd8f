//! The wire-level MessagePack reader over segmented buffers.
//!
//! Every read either succeeds and advances, or fails and leaves the
//! position untouched. A failure with code `InsufficientBuffer` carries
//! the minimum total buffered length (counted from where the reader
//! started) that could let the same decode succeed, which is the signal
//! the streaming layer uses to fetch more input and retry.

use std::borrow::Cow;

use crate::buffer::SegmentedBuf;
use crate::constants::*;
use crate::errors::Error;
use crate::timestamp::Timestamp;

/// One decoded MessagePack token.
///
/// Integer tokens are normalized: any encoding of a non-negative value
/// decodes as `UInt`, any negative value as `SInt`, regardless of which
/// wire family carried it.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// nil
    Nil,
    /// true / false
    Bool(bool),
    /// Any non-negative integer encoding.
    UInt(u64),
    /// Any negative integer encoding.
    SInt(i64),
    /// float 32
    F32(f32),
    /// float 64
    F64(f64),
    /// Any string encoding; borrowed when the payload sits in one segment.
    Str(Cow<'a, str>),
    /// Any binary encoding.
    Bin(Cow<'a, [u8]>),
    /// An array header carrying the element count.
    ArrayHeader(usize),
    /// A map header carrying the entry count.
    MapHeader(usize),
    /// An extension value other than a timestamp.
    Ext {
        /// The extension type code.
        code: i8,
        /// The extension body.
        data: Cow<'a, [u8]>,
    },
    /// Extension type −1 in any of its three canonical sizes.
    Timestamp(Timestamp),
}

#[derive(Debug, Clone, Copy)]
enum IntRepr {
    U(u64),
    S(i64),
}

impl IntRepr {
    fn normalize(v: i64) -> IntRepr {
        if v >= 0 {
            IntRepr::U(v as u64)
        } else {
            IntRepr::S(v)
        }
    }
}

/// Reads MessagePack tokens from a [`SegmentedBuf`].
#[derive(Debug, Clone)]
pub struct MsgPackReader<'a> {
    buf: SegmentedBuf<'a>,
}

impl<'a> MsgPackReader<'a> {
    /// A reader over one contiguous slice.
    pub fn new(bytes: &'a [u8]) -> Self {
        MsgPackReader {
            buf: SegmentedBuf::new(bytes),
        }
    }

    /// A reader over a list of segments in order.
    pub fn from_segments(segments: &'a [&'a [u8]]) -> Self {
        MsgPackReader {
            buf: SegmentedBuf::from_segments(segments),
        }
    }

    /// Total bytes consumed since the reader was created.
    pub fn consumed(&self) -> u64 {
        self.buf.consumed()
    }

    /// Bytes left in the window.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub(crate) fn window(&self) -> SegmentedBuf<'a> {
        self.buf
    }

    pub(crate) fn advance_by(&mut self, n: usize) -> bool {
        self.buf.skip(n)
    }

    fn start(&self) -> Result<SegmentedBuf<'a>, Error> {
        if self.buf.remaining() == 0 {
            Err(Error::empty_buffer())
        } else {
            Ok(self.buf)
        }
    }

    fn short(probe: &SegmentedBuf<'a>, more: usize) -> Error {
        Error::insufficient(probe.consumed() + more as u64)
    }

    fn take1(probe: &mut SegmentedBuf<'a>) -> Result<u8, Error> {
        match probe.read_u8() {
            Some(byte) => Ok(byte),
            None => Err(Self::short(probe, 1)),
        }
    }

    fn take<const N: usize>(probe: &mut SegmentedBuf<'a>) -> Result<[u8; N], Error> {
        match probe.read_array::<N>() {
            Some(bytes) => Ok(bytes),
            None => Err(Self::short(probe, N)),
        }
    }

    fn take_bytes(probe: &mut SegmentedBuf<'a>, n: usize) -> Result<Cow<'a, [u8]>, Error> {
        match probe.read_bytes(n) {
            Some(bytes) => Ok(bytes),
            None => Err(Self::short(probe, n)),
        }
    }

    fn skip_n(probe: &mut SegmentedBuf<'a>, n: usize) -> Result<(), Error> {
        if probe.skip(n) {
            Ok(())
        } else {
            Err(Self::short(probe, n))
        }
    }

    /// The next marker byte without consuming it.
    pub fn peek_marker(&self) -> Result<u8, Error> {
        let probe = self.start()?;
        probe.peek().ok_or_else(Error::empty_buffer)
    }

    /// Whether the next token is nil, without consuming anything.
    pub fn peek_nil(&self) -> Result<bool, Error> {
        Ok(self.peek_marker()? == MSGPACK_NIL)
    }

    /// Reads nil.
    pub fn read_nil(&mut self) -> Result<(), Error> {
        let mut probe = self.start()?;
        let marker = Self::take1(&mut probe)?;
        if marker != MSGPACK_NIL {
            return Err(Error::unexpected_token(marker, "nil"));
        }
        self.buf = probe;
        Ok(())
    }

    /// Consumes a nil if one is next; reports whether it did.
    pub fn try_read_nil(&mut self) -> Result<bool, Error> {
        if self.peek_nil()? {
            self.read_nil()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Reads a boolean.
    pub fn read_bool(&mut self) -> Result<bool, Error> {
        let mut probe = self.start()?;
        let marker = Self::take1(&mut probe)?;
        let value = match marker {
            MSGPACK_TRUE => true,
            MSGPACK_FALSE => false,
            _ => return Err(Error::unexpected_token(marker, "bool")),
        };
        self.buf = probe;
        Ok(value)
    }

    fn parse_int(probe: &mut SegmentedBuf<'a>) -> Result<IntRepr, Error> {
        let marker = Self::take1(probe)?;
        let repr = match marker {
            0..=MSGPACK_POSFIXINT_MAX => IntRepr::U(marker as u64),
            MSGPACK_NEGFIXINT_MIN..=0xff => IntRepr::S(marker as i8 as i64),
            MSGPACK_UINT8 => IntRepr::U(Self::take1(probe)? as u64),
            MSGPACK_UINT16 => IntRepr::U(u16::from_be_bytes(Self::take(probe)?) as u64),
            MSGPACK_UINT32 => IntRepr::U(u32::from_be_bytes(Self::take(probe)?) as u64),
            MSGPACK_UINT64 => IntRepr::U(u64::from_be_bytes(Self::take(probe)?)),
            MSGPACK_INT8 => IntRepr::normalize(Self::take1(probe)? as i8 as i64),
            MSGPACK_INT16 => IntRepr::normalize(i16::from_be_bytes(Self::take(probe)?) as i64),
            MSGPACK_INT32 => IntRepr::normalize(i32::from_be_bytes(Self::take(probe)?) as i64),
            MSGPACK_INT64 => IntRepr::normalize(i64::from_be_bytes(Self::take(probe)?)),
            _ => return Err(Error::unexpected_token(marker, "integer")),
        };
        Ok(repr)
    }

    fn read_int_with<T>(
        &mut self,
        wanted: &'static str,
        fit: impl FnOnce(IntRepr) -> Option<T>,
    ) -> Result<T, Error> {
        let mut probe = self.start()?;
        let repr = Self::parse_int(&mut probe)?;
        match fit(repr) {
            Some(value) => {
                self.buf = probe;
                Ok(value)
            }
            None => Err(Error::overflow(wanted)),
        }
    }

    /// Reads any integer encoding whose value fits a `u64`.
    pub fn read_u64(&mut self) -> Result<u64, Error> {
        self.read_int_with("u64", |repr| match repr {
            IntRepr::U(u) => Some(u),
            IntRepr::S(_) => None,
        })
    }

    /// Reads any integer encoding whose value fits a `u32`.
    pub fn read_u32(&mut self) -> Result<u32, Error> {
        self.read_int_with("u32", |repr| match repr {
            IntRepr::U(u) => u32::try_from(u).ok(),
            IntRepr::S(_) => None,
        })
    }

    /// Reads any integer encoding whose value fits a `u16`.
    pub fn read_u16(&mut self) -> Result<u16, Error> {
        self.read_int_with("u16", |repr| match repr {
            IntRepr::U(u) => u16::try_from(u).ok(),
            IntRepr::S(_) => None,
        })
    }

    /// Reads any integer encoding whose value fits a `u8`.
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        self.read_int_with("u8", |repr| match repr {
            IntRepr::U(u) => u8::try_from(u).ok(),
            IntRepr::S(_) => None,
        })
    }

    /// Reads any integer encoding whose value fits an `i64`.
    pub fn read_i64(&mut self) -> Result<i64, Error> {
        self.read_int_with("i64", |repr| match repr {
            IntRepr::U(u) => i64::try_from(u).ok(),
            IntRepr::S(s) => Some(s),
        })
    }

    /// Reads any integer encoding whose value fits an `i32`.
    pub fn read_i32(&mut self) -> Result<i32, Error> {
        self.read_int_with("i32", |repr| match repr {
            IntRepr::U(u) => i32::try_from(u).ok(),
            IntRepr::S(s) => i32::try_from(s).ok(),
        })
    }

    /// Reads any integer encoding whose value fits an `i16`.
    pub fn read_i16(&mut self) -> Result<i16, Error> {
        self.read_int_with("i16", |repr| match repr {
            IntRepr::U(u) => i16::try_from(u).ok(),
            IntRepr::S(s) => i16::try_from(s).ok(),
        })
    }

    /// Reads any integer encoding whose value fits an `i8`.
    pub fn read_i8(&mut self) -> Result<i8, Error> {
        self.read_int_with("i8", |repr| match repr {
            IntRepr::U(u) => i8::try_from(u).ok(),
            IntRepr::S(s) => i8::try_from(s).ok(),
        })
    }

    /// Reads a float64, widening float32 and integer encodings.
    pub fn read_f64(&mut self) -> Result<f64, Error> {
        let mut probe = self.start()?;
        let marker = Self::take1(&mut probe)?;
        let value = match marker {
            MSGPACK_FLOAT32 => f32::from_be_bytes(Self::take(&mut probe)?) as f64,
            MSGPACK_FLOAT64 => f64::from_be_bytes(Self::take(&mut probe)?),
            _ => {
                let mut retry = self.buf;
                let repr = Self::parse_int(&mut retry).map_err(|e| match e.code() {
                    crate::ErrorCode::UnexpectedToken => {
                        Error::unexpected_token(marker, "float")
                    }
                    _ => e,
                })?;
                self.buf = retry;
                return Ok(match repr {
                    IntRepr::U(u) => u as f64,
                    IntRepr::S(s) => s as f64,
                });
            }
        };
        self.buf = probe;
        Ok(value)
    }

    /// Reads a float32. A float64 encoding is accepted when the value is
    /// losslessly representable; integers are widened.
    pub fn read_f32(&mut self) -> Result<f32, Error> {
        let mut probe = self.start()?;
        let marker = Self::take1(&mut probe)?;
        let value = match marker {
            MSGPACK_FLOAT32 => f32::from_be_bytes(Self::take(&mut probe)?),
            MSGPACK_FLOAT64 => {
                let wide = f64::from_be_bytes(Self::take(&mut probe)?);
                let narrow = wide as f32;
                if !wide.is_nan() && narrow as f64 != wide {
                    return Err(Error::overflow("f32"));
                }
                narrow
            }
            _ => {
                let mut retry = self.buf;
                let repr = Self::parse_int(&mut retry).map_err(|e| match e.code() {
                    crate::ErrorCode::UnexpectedToken => {
                        Error::unexpected_token(marker, "float")
                    }
                    _ => e,
                })?;
                self.buf = retry;
                return Ok(match repr {
                    IntRepr::U(u) => u as f32,
                    IntRepr::S(s) => s as f32,
                });
            }
        };
        self.buf = probe;
        Ok(value)
    }

    fn parse_str_len(probe: &mut SegmentedBuf<'a>) -> Result<usize, Error> {
        let marker = Self::take1(probe)?;
        match marker {
            MSGPACK_FIXSTR_MIN..=MSGPACK_FIXSTR_MAX => Ok((marker & 0x1f) as usize),
            MSGPACK_STR8 => Ok(Self::take1(probe)? as usize),
            MSGPACK_STR16 => Ok(u16::from_be_bytes(Self::take(probe)?) as usize),
            MSGPACK_STR32 => Ok(u32::from_be_bytes(Self::take(probe)?) as usize),
            _ => Err(Error::unexpected_token(marker, "string")),
        }
    }

    /// Reads a string token as raw UTF-8 bytes, without validation.
    pub fn read_str_bytes(&mut self) -> Result<Cow<'a, [u8]>, Error> {
        let mut probe = self.start()?;
        let len = Self::parse_str_len(&mut probe)?;
        let bytes = Self::take_bytes(&mut probe, len)?;
        self.buf = probe;
        Ok(bytes)
    }

    /// Reads a string token, validating UTF-8.
    pub fn read_str(&mut self) -> Result<Cow<'a, str>, Error> {
        let mut probe = self.start()?;
        let len = Self::parse_str_len(&mut probe)?;
        let bytes = Self::take_bytes(&mut probe, len)?;
        let text = match bytes {
            Cow::Borrowed(slice) => Cow::Borrowed(
                core::str::from_utf8(slice).map_err(|_| Error::new(crate::ErrorKind::InvalidUtf8))?,
            ),
            Cow::Owned(vec) => Cow::Owned(
                String::from_utf8(vec).map_err(|_| Error::new(crate::ErrorKind::InvalidUtf8))?,
            ),
        };
        self.buf = probe;
        Ok(text)
    }

    /// Reads a binary token.
    pub fn read_bin(&mut self) -> Result<Cow<'a, [u8]>, Error> {
        let mut probe = self.start()?;
        let marker = Self::take1(&mut probe)?;
        let len = match marker {
            MSGPACK_BIN8 => Self::take1(&mut probe)? as usize,
            MSGPACK_BIN16 => u16::from_be_bytes(Self::take(&mut probe)?) as usize,
            MSGPACK_BIN32 => u32::from_be_bytes(Self::take(&mut probe)?) as usize,
            _ => return Err(Error::unexpected_token(marker, "binary")),
        };
        let bytes = Self::take_bytes(&mut probe, len)?;
        self.buf = probe;
        Ok(bytes)
    }

    /// Reads an array header, returning the element count.
    pub fn read_array_header(&mut self) -> Result<usize, Error> {
        let mut probe = self.start()?;
        let marker = Self::take1(&mut probe)?;
        let len = match marker {
            MSGPACK_FIXARRAY_MIN..=MSGPACK_FIXARRAY_MAX => (marker & 0x0f) as usize,
            MSGPACK_ARRAY16 => u16::from_be_bytes(Self::take(&mut probe)?) as usize,
            MSGPACK_ARRAY32 => u32::from_be_bytes(Self::take(&mut probe)?) as usize,
            _ => return Err(Error::unexpected_token(marker, "array")),
        };
        self.buf = probe;
        Ok(len)
    }

    /// Reads a map header, returning the entry count.
    pub fn read_map_header(&mut self) -> Result<usize, Error> {
        let mut probe = self.start()?;
        let marker = Self::take1(&mut probe)?;
        let len = match marker {
            MSGPACK_FIXMAP_MIN..=MSGPACK_FIXMAP_MAX => (marker & 0x0f) as usize,
            MSGPACK_MAP16 => u16::from_be_bytes(Self::take(&mut probe)?) as usize,
            MSGPACK_MAP32 => u32::from_be_bytes(Self::take(&mut probe)?) as usize,
            _ => return Err(Error::unexpected_token(marker, "map")),
        };
        self.buf = probe;
        Ok(len)
    }

    fn parse_ext_header(probe: &mut SegmentedBuf<'a>) -> Result<(i8, u32), Error> {
        let marker = Self::take1(probe)?;
        let (len, code) = match marker {
            MSGPACK_FIXEXT1 => (1, Self::take1(probe)? as i8),
            MSGPACK_FIXEXT2 => (2, Self::take1(probe)? as i8),
            MSGPACK_FIXEXT4 => (4, Self::take1(probe)? as i8),
            MSGPACK_FIXEXT8 => (8, Self::take1(probe)? as i8),
            MSGPACK_FIXEXT16 => (16, Self::take1(probe)? as i8),
            MSGPACK_EXT8 => {
                let len = Self::take1(probe)? as u32;
                (len, Self::take1(probe)? as i8)
            }
            MSGPACK_EXT16 => {
                let len = u16::from_be_bytes(Self::take(probe)?) as u32;
                (len, Self::take1(probe)? as i8)
            }
            MSGPACK_EXT32 => {
                let len = u32::from_be_bytes(Self::take(probe)?);
                (len, Self::take1(probe)? as i8)
            }
            _ => return Err(Error::unexpected_token(marker, "extension")),
        };
        Ok((code, len))
    }

    /// Reads an extension header, returning the type code and body length.
    pub fn read_ext_header(&mut self) -> Result<(i8, u32), Error> {
        let mut probe = self.start()?;
        let header = Self::parse_ext_header(&mut probe)?;
        self.buf = probe;
        Ok(header)
    }

    /// Reads a whole extension value.
    pub fn read_ext(&mut self) -> Result<(i8, Cow<'a, [u8]>), Error> {
        let mut probe = self.start()?;
        let (code, len) = Self::parse_ext_header(&mut probe)?;
        let data = Self::take_bytes(&mut probe, len as usize)?;
        self.buf = probe;
        Ok((code, data))
    }

    fn timestamp_from_ext(data: &[u8]) -> Result<Timestamp, Error> {
        match data.len() {
            4 => {
                let secs = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                Timestamp::new(secs as i64, 0)
            }
            8 => {
                let packed = u64::from_be_bytes([
                    data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
                ]);
                let nanos = (packed >> 34) as u32;
                let secs = (packed & ((1 << 34) - 1)) as i64;
                Timestamp::new(secs, nanos)
            }
            12 => {
                let nanos = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                let secs = i64::from_be_bytes([
                    data[4], data[5], data[6], data[7], data[8], data[9], data[10], data[11],
                ]);
                Timestamp::new(secs, nanos)
            }
            _ => Err(Error::msg("malformed timestamp extension length")),
        }
    }

    /// Reads extension type −1 in any of its three canonical sizes.
    pub fn read_timestamp(&mut self) -> Result<Timestamp, Error> {
        let marker = self.peek_marker()?;
        let mut probe = self.buf;
        let (code, len) = Self::parse_ext_header(&mut probe)?;
        if code != EXT_TIMESTAMP {
            return Err(Error::unexpected_token(marker, "timestamp"));
        }
        let data = Self::take_bytes(&mut probe, len as usize)?;
        let ts = Self::timestamp_from_ext(&data)?;
        self.buf = probe;
        Ok(ts)
    }

    /// Reads whatever token is next.
    pub fn read_token(&mut self) -> Result<Token<'a>, Error> {
        let marker = self.peek_marker()?;
        match marker {
            MSGPACK_NIL => {
                self.read_nil()?;
                Ok(Token::Nil)
            }
            MSGPACK_TRUE | MSGPACK_FALSE => Ok(Token::Bool(self.read_bool()?)),
            0..=MSGPACK_POSFIXINT_MAX
            | MSGPACK_NEGFIXINT_MIN..=0xff
            | MSGPACK_UINT8..=MSGPACK_INT64 => {
                let mut probe = self.start()?;
                let repr = Self::parse_int(&mut probe)?;
                self.buf = probe;
                Ok(match repr {
                    IntRepr::U(u) => Token::UInt(u),
                    IntRepr::S(s) => Token::SInt(s),
                })
            }
            MSGPACK_FLOAT32 => {
                let mut probe = self.start()?;
                let _ = Self::take1(&mut probe)?;
                let value = f32::from_be_bytes(Self::take(&mut probe)?);
                self.buf = probe;
                Ok(Token::F32(value))
            }
            MSGPACK_FLOAT64 => {
                let mut probe = self.start()?;
                let _ = Self::take1(&mut probe)?;
                let value = f64::from_be_bytes(Self::take(&mut probe)?);
                self.buf = probe;
                Ok(Token::F64(value))
            }
            MSGPACK_FIXSTR_MIN..=MSGPACK_FIXSTR_MAX
            | MSGPACK_STR8
            | MSGPACK_STR16
            | MSGPACK_STR32 => Ok(Token::Str(self.read_str()?)),
            MSGPACK_BIN8 | MSGPACK_BIN16 | MSGPACK_BIN32 => Ok(Token::Bin(self.read_bin()?)),
            MSGPACK_FIXARRAY_MIN..=MSGPACK_FIXARRAY_MAX | MSGPACK_ARRAY16 | MSGPACK_ARRAY32 => {
                Ok(Token::ArrayHeader(self.read_array_header()?))
            }
            MSGPACK_FIXMAP_MIN..=MSGPACK_FIXMAP_MAX | MSGPACK_MAP16 | MSGPACK_MAP32 => {
                Ok(Token::MapHeader(self.read_map_header()?))
            }
            MSGPACK_FIXEXT1..=MSGPACK_FIXEXT16 | MSGPACK_EXT8 | MSGPACK_EXT16 | MSGPACK_EXT32 => {
                let mut probe = self.start()?;
                let (code, len) = Self::parse_ext_header(&mut probe)?;
                let data = Self::take_bytes(&mut probe, len as usize)?;
                if code == EXT_TIMESTAMP && matches!(data.len(), 4 | 8 | 12) {
                    let ts = Self::timestamp_from_ext(&data)?;
                    self.buf = probe;
                    return Ok(Token::Timestamp(ts));
                }
                self.buf = probe;
                Ok(Token::Ext { code, data })
            }
            _ => Err(Error::unexpected_token(marker, "any msgpack value")),
        }
    }

    /// Skips one whole value, nested structures included. Iterative, so
    /// hostile nesting cannot overflow the stack.
    pub fn skip_value(&mut self) -> Result<(), Error> {
        let mut probe = self.start()?;
        let mut pending: u64 = 1;
        while pending > 0 {
            pending -= 1;
            let marker = Self::take1(&mut probe)?;
            match marker {
                MSGPACK_NIL | MSGPACK_TRUE | MSGPACK_FALSE => {}
                0..=MSGPACK_POSFIXINT_MAX | MSGPACK_NEGFIXINT_MIN..=0xff => {}
                MSGPACK_UINT8 | MSGPACK_INT8 => Self::skip_n(&mut probe, 1)?,
                MSGPACK_UINT16 | MSGPACK_INT16 => Self::skip_n(&mut probe, 2)?,
                MSGPACK_UINT32 | MSGPACK_INT32 | MSGPACK_FLOAT32 => {
                    Self::skip_n(&mut probe, 4)?
                }
                MSGPACK_UINT64 | MSGPACK_INT64 | MSGPACK_FLOAT64 => {
                    Self::skip_n(&mut probe, 8)?
                }
                MSGPACK_FIXSTR_MIN..=MSGPACK_FIXSTR_MAX => {
                    Self::skip_n(&mut probe, (marker & 0x1f) as usize)?
                }
                MSGPACK_STR8 | MSGPACK_BIN8 => {
                    let len = Self::take1(&mut probe)? as usize;
                    Self::skip_n(&mut probe, len)?;
                }
                MSGPACK_STR16 | MSGPACK_BIN16 => {
                    let len = u16::from_be_bytes(Self::take(&mut probe)?) as usize;
                    Self::skip_n(&mut probe, len)?;
                }
                MSGPACK_STR32 | MSGPACK_BIN32 => {
                    let len = u32::from_be_bytes(Self::take(&mut probe)?) as usize;
                    Self::skip_n(&mut probe, len)?;
                }
                MSGPACK_FIXARRAY_MIN..=MSGPACK_FIXARRAY_MAX => {
                    pending += (marker & 0x0f) as u64;
                }
                MSGPACK_ARRAY16 => {
                    pending += u16::from_be_bytes(Self::take(&mut probe)?) as u64;
                }
                MSGPACK_ARRAY32 => {
                    pending += u32::from_be_bytes(Self::take(&mut probe)?) as u64;
                }
                MSGPACK_FIXMAP_MIN..=MSGPACK_FIXMAP_MAX => {
                    pending += 2 * (marker & 0x0f) as u64;
                }
                MSGPACK_MAP16 => {
                    pending += 2 * u16::from_be_bytes(Self::take(&mut probe)?) as u64;
                }
                MSGPACK_MAP32 => {
                    pending += 2 * u32::from_be_bytes(Self::take(&mut probe)?) as u64;
                }
                MSGPACK_FIXEXT1 => Self::skip_n(&mut probe, 2)?,
                MSGPACK_FIXEXT2 => Self::skip_n(&mut probe, 3)?,
                MSGPACK_FIXEXT4 => Self::skip_n(&mut probe, 5)?,
                MSGPACK_FIXEXT8 => Self::skip_n(&mut probe, 9)?,
                MSGPACK_FIXEXT16 => Self::skip_n(&mut probe, 17)?,
                MSGPACK_EXT8 => {
                    let len = Self::take1(&mut probe)? as usize;
                    Self::skip_n(&mut probe, 1 + len)?;
                }
                MSGPACK_EXT16 => {
                    let len = u16::from_be_bytes(Self::take(&mut probe)?) as usize;
                    Self::skip_n(&mut probe, 1 + len)?;
                }
                MSGPACK_EXT32 => {
                    let len = u32::from_be_bytes(Self::take(&mut probe)?) as usize;
                    Self::skip_n(&mut probe, 1 + len)?;
                }
                _ => return Err(Error::unexpected_token(marker, "any msgpack value")),
            }
        }
        self.buf = probe;
        Ok(())
    }

    /// Captures the next whole value as raw bytes, borrowed when it sits
    /// in one segment.
    pub fn read_raw(&mut self) -> Result<Cow<'a, [u8]>, Error> {
        let mut measure = self.clone();
        measure.skip_value()?;
        let len = (measure.consumed() - self.consumed()) as usize;
        let mut probe = self.buf;
        let bytes = Self::take_bytes(&mut probe, len)?;
        self.buf = probe;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    #[test]
    fn insufficient_buffer_does_not_advance() {
        // str16 header announcing 5 bytes, only 2 present
        let bytes = [0xda, 0x00, 0x05, b'a', b'b'];
        let mut reader = MsgPackReader::new(&bytes);
        let err = reader.read_str().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientBuffer);
        assert_eq!(reader.consumed(), 0);
        // retry with the full input succeeds from the same position
        let full = [0xda, 0x00, 0x05, b'a', b'b', b'c', b'd', b'e'];
        let mut reader = MsgPackReader::new(&full);
        assert_eq!(reader.read_str().unwrap(), "abcde");
    }

    #[test]
    fn integers_normalize_across_encodings() {
        // 3 as uint8
        let mut reader = MsgPackReader::new(&[0xcc, 0x03]);
        assert!(matches!(reader.read_token().unwrap(), Token::UInt(3)));
        // 3 as int16
        let mut reader = MsgPackReader::new(&[0xd1, 0x00, 0x03]);
        assert!(matches!(reader.read_token().unwrap(), Token::UInt(3)));
        // -3 as int32
        let mut reader = MsgPackReader::new(&[0xd2, 0xff, 0xff, 0xff, 0xfd]);
        assert!(matches!(reader.read_token().unwrap(), Token::SInt(-3)));
    }

    #[test]
    fn negative_fixint_reads_at_any_signed_width() {
        for marker in [0xe0u8, 0xff, 0xf0] {
            let expected = marker as i8 as i64;
            let mut reader = MsgPackReader::new(std::slice::from_ref(&marker));
            assert_eq!(reader.read_i8().unwrap() as i64, expected);
            let mut reader = MsgPackReader::new(std::slice::from_ref(&marker));
            assert_eq!(reader.read_i16().unwrap() as i64, expected);
            let mut reader = MsgPackReader::new(std::slice::from_ref(&marker));
            assert_eq!(reader.read_i64().unwrap(), expected);
        }
    }

    #[test]
    fn overflow_is_distinct_from_mismatch() {
        let mut reader = MsgPackReader::new(&[0xcd, 0x01, 0x00]);
        assert_eq!(reader.read_u8().unwrap_err().code(), ErrorCode::Overflow);
        let mut reader = MsgPackReader::new(&[0xa1, b'x']);
        assert_eq!(
            reader.read_u8().unwrap_err().code(),
            ErrorCode::UnexpectedToken
        );
    }

    #[test]
    fn empty_buffer_is_terminal_at_value_boundaries() {
        let mut reader = MsgPackReader::new(&[]);
        assert_eq!(reader.read_bool().unwrap_err().code(), ErrorCode::EmptyBuffer);
    }

    #[test]
    fn skip_handles_nested_structures() {
        // {"a": [1, {"b": nil}]} followed by 0x07
        let bytes = [
            0x81, 0xa1, b'a', 0x92, 0x01, 0x81, 0xa1, b'b', 0xc0, 0x07,
        ];
        let mut reader = MsgPackReader::new(&bytes);
        reader.skip_value().unwrap();
        assert_eq!(reader.read_u8().unwrap(), 7);
    }

    #[test]
    fn read_raw_captures_one_value_exactly() {
        let bytes = [0x92, 0x01, 0x02, 0xc3];
        let mut reader = MsgPackReader::new(&bytes);
        let raw = reader.read_raw().unwrap();
        assert_eq!(&*raw, &[0x92, 0x01, 0x02]);
        assert!(reader.read_bool().unwrap());
    }
}
