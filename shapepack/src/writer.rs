//! The wire-level MessagePack writer.
//!
//! Every write picks the shortest valid encoding for its value, so two
//! writers producing the same logical values produce the same bytes.

use crate::buffer::BufferWriter;
use crate::constants::*;
use crate::errors::Error;
use crate::timestamp::Timestamp;

/// Writes MessagePack tokens into a [`BufferWriter`].
pub struct MsgPackWriter<'w> {
    out: &'w mut dyn BufferWriter,
}

impl<'w> MsgPackWriter<'w> {
    /// Wraps a buffer writer.
    pub fn new(out: &'w mut dyn BufferWriter) -> Self {
        MsgPackWriter { out }
    }

    fn write_all(&mut self, mut data: &[u8]) -> Result<(), Error> {
        while !data.is_empty() {
            let span = self.out.span(data.len());
            if span.is_empty() {
                return Err(Error::invalid_operation(
                    "buffer writer granted a zero-length span",
                ));
            }
            let step = span.len().min(data.len());
            span[..step].copy_from_slice(&data[..step]);
            self.out.advance(step);
            data = &data[step..];
        }
        Ok(())
    }

    /// Writes nil.
    pub fn write_nil(&mut self) -> Result<(), Error> {
        self.write_all(&[MSGPACK_NIL])
    }

    /// Writes a boolean.
    pub fn write_bool(&mut self, value: bool) -> Result<(), Error> {
        self.write_all(&[if value { MSGPACK_TRUE } else { MSGPACK_FALSE }])
    }

    /// Writes an unsigned integer in its shortest form.
    pub fn write_u64(&mut self, n: u64) -> Result<(), Error> {
        match n {
            0..=127 => {
                // positive fixint
                self.write_all(&[n as u8])
            }
            128..=255 => {
                self.write_all(&[MSGPACK_UINT8, n as u8])
            }
            256..=65535 => {
                self.write_all(&[MSGPACK_UINT16])?;
                self.write_all(&(n as u16).to_be_bytes())
            }
            65536..=4294967295 => {
                self.write_all(&[MSGPACK_UINT32])?;
                self.write_all(&(n as u32).to_be_bytes())
            }
            _ => {
                self.write_all(&[MSGPACK_UINT64])?;
                self.write_all(&n.to_be_bytes())
            }
        }
    }

    /// Writes a signed integer in its shortest form. Non-negative values
    /// reuse the unsigned encodings.
    pub fn write_i64(&mut self, n: i64) -> Result<(), Error> {
        match n {
            0..=i64::MAX => self.write_u64(n as u64),
            -32..=-1 => {
                // negative fixint
                self.write_all(&[n as u8])
            }
            -128..=-33 => {
                self.write_all(&[MSGPACK_INT8, n as u8])
            }
            -32768..=-129 => {
                self.write_all(&[MSGPACK_INT16])?;
                self.write_all(&(n as i16).to_be_bytes())
            }
            -2147483648..=-32769 => {
                self.write_all(&[MSGPACK_INT32])?;
                self.write_all(&(n as i32).to_be_bytes())
            }
            _ => {
                self.write_all(&[MSGPACK_INT64])?;
                self.write_all(&n.to_be_bytes())
            }
        }
    }

    /// Writes a 32-bit float.
    pub fn write_f32(&mut self, n: f32) -> Result<(), Error> {
        self.write_all(&[MSGPACK_FLOAT32])?;
        self.write_all(&n.to_be_bytes())
    }

    /// Writes a 64-bit float.
    pub fn write_f64(&mut self, n: f64) -> Result<(), Error> {
        self.write_all(&[MSGPACK_FLOAT64])?;
        self.write_all(&n.to_be_bytes())
    }

    /// Writes a string, choosing fixstr/str8/str16/str32 by byte length.
    pub fn write_str(&mut self, s: &str) -> Result<(), Error> {
        self.write_str_header(s.len())?;
        self.write_all(s.as_bytes())
    }

    pub(crate) fn write_str_header(&mut self, len: usize) -> Result<(), Error> {
        match len {
            0..=31 => self.write_all(&[MSGPACK_FIXSTR_MIN | len as u8]),
            32..=255 => self.write_all(&[MSGPACK_STR8, len as u8]),
            256..=65535 => {
                self.write_all(&[MSGPACK_STR16])?;
                self.write_all(&(len as u16).to_be_bytes())
            }
            _ => {
                let len = u32::try_from(len)
                    .map_err(|_| Error::invalid_operation("string longer than u32::MAX bytes"))?;
                self.write_all(&[MSGPACK_STR32])?;
                self.write_all(&len.to_be_bytes())
            }
        }
    }

    /// Writes binary data, choosing bin8/bin16/bin32 by length.
    pub fn write_bin(&mut self, bytes: &[u8]) -> Result<(), Error> {
        match bytes.len() {
            0..=255 => self.write_all(&[MSGPACK_BIN8, bytes.len() as u8])?,
            256..=65535 => {
                self.write_all(&[MSGPACK_BIN16])?;
                self.write_all(&(bytes.len() as u16).to_be_bytes())?;
            }
            _ => {
                let len = u32::try_from(bytes.len())
                    .map_err(|_| Error::invalid_operation("binary longer than u32::MAX bytes"))?;
                self.write_all(&[MSGPACK_BIN32])?;
                self.write_all(&len.to_be_bytes())?;
            }
        }
        self.write_all(bytes)
    }

    /// Writes an array header.
    pub fn write_array_header(&mut self, len: usize) -> Result<(), Error> {
        match len {
            0..=15 => self.write_all(&[MSGPACK_FIXARRAY_MIN | len as u8]),
            16..=65535 => {
                self.write_all(&[MSGPACK_ARRAY16])?;
                self.write_all(&(len as u16).to_be_bytes())
            }
            _ => {
                let len = u32::try_from(len)
                    .map_err(|_| Error::invalid_operation("array longer than u32::MAX"))?;
                self.write_all(&[MSGPACK_ARRAY32])?;
                self.write_all(&len.to_be_bytes())
            }
        }
    }

    /// Writes a map header.
    pub fn write_map_header(&mut self, len: usize) -> Result<(), Error> {
        match len {
            0..=15 => self.write_all(&[MSGPACK_FIXMAP_MIN | len as u8]),
            16..=65535 => {
                self.write_all(&[MSGPACK_MAP16])?;
                self.write_all(&(len as u16).to_be_bytes())
            }
            _ => {
                let len = u32::try_from(len)
                    .map_err(|_| Error::invalid_operation("map longer than u32::MAX"))?;
                self.write_all(&[MSGPACK_MAP32])?;
                self.write_all(&len.to_be_bytes())
            }
        }
    }

    /// Writes an extension header followed by nothing; the caller supplies
    /// the body bytes next. Negative type codes are reserved for the
    /// predefined extensions and rejected here.
    pub fn write_ext_header(&mut self, code: i8, len: u32) -> Result<(), Error> {
        if code < 0 {
            return Err(Error::invalid_operation(
                "negative extension type codes are reserved",
            ));
        }
        self.write_ext_header_any(code, len)
    }

    /// Writes a whole extension value.
    pub fn write_ext(&mut self, code: i8, data: &[u8]) -> Result<(), Error> {
        let len = u32::try_from(data.len())
            .map_err(|_| Error::invalid_operation("extension longer than u32::MAX bytes"))?;
        self.write_ext_header(code, len)?;
        self.write_all(data)
    }

    pub(crate) fn write_ext_header_any(&mut self, code: i8, len: u32) -> Result<(), Error> {
        match len {
            1 => self.write_all(&[MSGPACK_FIXEXT1, code as u8]),
            2 => self.write_all(&[MSGPACK_FIXEXT2, code as u8]),
            4 => self.write_all(&[MSGPACK_FIXEXT4, code as u8]),
            8 => self.write_all(&[MSGPACK_FIXEXT8, code as u8]),
            16 => self.write_all(&[MSGPACK_FIXEXT16, code as u8]),
            0..=255 => self.write_all(&[MSGPACK_EXT8, len as u8, code as u8]),
            256..=65535 => {
                self.write_all(&[MSGPACK_EXT16])?;
                self.write_all(&(len as u16).to_be_bytes())?;
                self.write_all(&[code as u8])
            }
            _ => {
                self.write_all(&[MSGPACK_EXT32])?;
                self.write_all(&len.to_be_bytes())?;
                self.write_all(&[code as u8])
            }
        }
    }

    /// Writes a timestamp as extension type −1 in its smallest lossless
    /// form.
    pub fn write_timestamp(&mut self, ts: Timestamp) -> Result<(), Error> {
        let secs = ts.seconds();
        let nanos = ts.nanoseconds();
        if secs >= 0 && (secs >> 34) == 0 {
            if nanos == 0 && u32::try_from(secs).is_ok() {
                // timestamp 32
                self.write_ext_header_any(EXT_TIMESTAMP, 4)?;
                return self.write_all(&(secs as u32).to_be_bytes());
            }
            // timestamp 64
            let packed = ((nanos as u64) << 34) | secs as u64;
            self.write_ext_header_any(EXT_TIMESTAMP, 8)?;
            return self.write_all(&packed.to_be_bytes());
        }
        // timestamp 96
        self.write_ext_header_any(EXT_TIMESTAMP, 12)?;
        self.write_all(&nanos.to_be_bytes())?;
        self.write_all(&secs.to_be_bytes())
    }

    /// Copies bytes already known to encode exactly one msgpack value.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.write_all(bytes)
    }
}
