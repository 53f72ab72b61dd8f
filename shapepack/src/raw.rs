//! Raw msgpack passthrough.

use bytes::Bytes;

use crate::context::SerializationContext;
use crate::converters::Converter;
use crate::errors::Error;
use crate::reader::MsgPackReader;
use crate::shape::{Shape, Shaped};
use crate::writer::MsgPackWriter;

/// An owned buffer known to hold exactly one msgpack value, passed
/// through without decoding.
///
/// Reading one out of a segmented source copies the segments into a
/// single contiguous buffer, so the value stays usable after its source
/// is gone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RawMsgPack {
    bytes: Bytes,
}

impl RawMsgPack {
    /// Validates that `bytes` holds exactly one msgpack value and wraps
    /// it.
    pub fn from_bytes(bytes: Bytes) -> Result<Self, Error> {
        let mut reader = MsgPackReader::new(&bytes);
        reader
            .skip_value()
            .map_err(Error::for_complete_sequence)?;
        if reader.remaining() != 0 {
            return Err(Error::msg("trailing bytes after the msgpack value"));
        }
        Ok(RawMsgPack { bytes })
    }

    /// Copies a borrowed slice into an owned raw value.
    pub fn copy_from_slice(bytes: &[u8]) -> Result<Self, Error> {
        Self::from_bytes(Bytes::copy_from_slice(bytes))
    }

    /// The encoded value.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Unwraps the owned buffer.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

pub(crate) struct RawConverter;

impl Converter<RawMsgPack> for RawConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &RawMsgPack,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_raw(value.as_bytes())
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<RawMsgPack, Error> {
        let raw = reader.read_raw()?;
        Ok(RawMsgPack {
            bytes: Bytes::copy_from_slice(&raw),
        })
    }
}

impl Shaped for RawMsgPack {
    fn shape() -> Shape<Self> {
        Shape::converter(RawConverter)
    }
}
