#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

use std::sync::Arc;

use log::trace;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

mod buffer;
pub mod constants;
mod context;
mod converters;
mod dispatch;
mod errors;
mod json;
mod naming;
mod options;
mod prefmt;
mod raw;
mod reader;
mod shape;
mod shape_impls;
mod stream;
mod timestamp;
mod value;
mod writer;

pub use buffer::{BufferWriter, BytesMutWriter, SegmentedBuf, VecBufferWriter};
pub use context::SerializationContext;
pub use converters::{BoxFut, Converter};
pub use dispatch::Dispatch;
pub use errors::{Error, ErrorCode, ErrorKind, PathSegment};
pub use json::{JsonOptions, convert_to_json};
pub use naming::NamingPolicy;
pub use options::{EnumFormat, SerializerOptions};
pub use prefmt::PreformattedString;
pub use raw::RawMsgPack;
pub use reader::{MsgPackReader, Token};
pub use shape::{
    BuildConverterFn, BuiltShape, Constructor, EnumShape, EnumVariantShape, ObjectShape,
    Property, PropertyBuilder, SelfShape, Shape, ShapeKind, ShapeProvider, Shaped, SlotSet,
    UnionAlias, UnionCaseShape, UnionShape,
};
pub use stream::{AsyncReadSource, ByteSource, StreamingReader};
pub use timestamp::Timestamp;
pub use value::{Value, ValueMap};
pub use writer::MsgPackWriter;

pub use tokio_util::sync::CancellationToken;

use crate::dispatch::ConverterCache;

/// A serializer instance: the options snapshot plus the converter cache
/// shared by every operation run through it.
///
/// Independent operations may run in parallel on one instance; the cache
/// is safe for concurrent reads with single-flight construction. The free
/// functions [`to_vec`] and [`from_slice`] build a throwaway instance,
/// which is convenient but recomposes converters every call.
pub struct Serializer {
    options: SerializerOptions,
    cache: ConverterCache,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    /// An instance with default options.
    pub fn new() -> Self {
        Self::with_options(SerializerOptions::default())
    }

    /// An instance with the given options.
    pub fn with_options(options: SerializerOptions) -> Self {
        Serializer {
            options,
            cache: ConverterCache::default(),
        }
    }

    /// The options this instance runs under.
    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    fn converter<T: Shaped>(&self) -> Result<Arc<dyn Converter<T>>, Error> {
        self.cache
            .converter_for::<T, SelfShape<T>>(&self.options)
    }

    /// Serializes `value` into a buffer writer.
    pub fn serialize<T: Shaped>(
        &self,
        out: &mut dyn BufferWriter,
        value: &T,
    ) -> Result<(), Error> {
        self.serialize_with_cancellation(out, value, CancellationToken::new())
    }

    /// Serializes `value`, observing `cancel` at every depth step.
    pub fn serialize_with_cancellation<T: Shaped>(
        &self,
        out: &mut dyn BufferWriter,
        value: &T,
        cancel: CancellationToken,
    ) -> Result<(), Error> {
        let converter = self.converter::<T>()?;
        let mut ctx = SerializationContext::new(&self.options, Some(&self.cache), cancel);
        let mut writer = MsgPackWriter::new(out);
        converter.write(&mut writer, value, &mut ctx)
    }

    /// Serializes `value` to a fresh byte vector.
    pub fn to_vec<T: Shaped>(&self, value: &T) -> Result<Vec<u8>, Error> {
        let mut out = VecBufferWriter::new();
        self.serialize(&mut out, value)?;
        Ok(out.into_vec())
    }

    /// Deserializes one value from an open reader, leaving the reader
    /// positioned after it.
    pub fn deserialize<T: Shaped>(&self, reader: &mut MsgPackReader<'_>) -> Result<T, Error> {
        self.deserialize_with_cancellation(reader, CancellationToken::new())
    }

    /// Deserializes one value, observing `cancel` at every depth step.
    pub fn deserialize_with_cancellation<T: Shaped>(
        &self,
        reader: &mut MsgPackReader<'_>,
        cancel: CancellationToken,
    ) -> Result<T, Error> {
        let converter = self.converter::<T>()?;
        let mut ctx = SerializationContext::new(&self.options, Some(&self.cache), cancel);
        converter.read(reader, &mut ctx)
    }

    /// Deserializes a value from a complete byte slice.
    pub fn from_slice<T: Shaped>(&self, bytes: &[u8]) -> Result<T, Error> {
        let mut reader = MsgPackReader::new(bytes);
        self.deserialize(&mut reader)
            .map_err(Error::for_complete_sequence)
    }

    /// Deserializes a value from a complete list of segments.
    pub fn from_segments<T: Shaped>(&self, segments: &[&[u8]]) -> Result<T, Error> {
        let mut reader = MsgPackReader::from_segments(segments);
        self.deserialize(&mut reader)
            .map_err(Error::for_complete_sequence)
    }

    /// Serializes `value` through a witness that supplies its shape.
    pub fn to_vec_via<P, T>(&self, value: &T) -> Result<Vec<u8>, Error>
    where
        T: Send + 'static,
        P: ShapeProvider<T>,
    {
        let converter = self.cache.converter_for::<T, P>(&self.options)?;
        let mut out = VecBufferWriter::new();
        let mut ctx = SerializationContext::new(
            &self.options,
            Some(&self.cache),
            CancellationToken::new(),
        );
        converter.write(&mut MsgPackWriter::new(&mut out), value, &mut ctx)?;
        Ok(out.into_vec())
    }

    /// Deserializes a value through a witness that supplies its shape.
    pub fn from_slice_via<P, T>(&self, bytes: &[u8]) -> Result<T, Error>
    where
        T: Send + 'static,
        P: ShapeProvider<T>,
    {
        let converter = self.cache.converter_for::<T, P>(&self.options)?;
        let mut ctx = SerializationContext::new(
            &self.options,
            Some(&self.cache),
            CancellationToken::new(),
        );
        let mut reader = MsgPackReader::new(bytes);
        converter
            .read(&mut reader, &mut ctx)
            .map_err(Error::for_complete_sequence)
    }

    /// Deserializes a value from an async byte source, suspending between
    /// tokens whenever bytes run out.
    pub async fn deserialize_from_stream<T: Shaped>(
        &self,
        source: &mut dyn ByteSource,
    ) -> Result<T, Error> {
        self.deserialize_from_stream_with_cancellation(source, CancellationToken::new())
            .await
    }

    /// Deserializes from an async byte source, observing `cancel` at
    /// every suspension and depth step.
    ///
    /// Input within the `max_async_buffer` threshold is buffered ahead;
    /// when the whole stream fits, the converter runs synchronously over
    /// the buffered bytes.
    pub async fn deserialize_from_stream_with_cancellation<T: Shaped>(
        &self,
        source: &mut dyn ByteSource,
        cancel: CancellationToken,
    ) -> Result<T, Error> {
        let converter = self.converter::<T>()?;
        let mut ctx =
            SerializationContext::new(&self.options, Some(&self.cache), cancel.clone());
        let mut reader = StreamingReader::with_cancellation(source, cancel);
        reader.prime(self.options.max_async_buffer).await?;
        if reader.source_exhausted() {
            trace!("whole stream buffered, taking the synchronous fast path");
            reader
                .with_buffered(|r| converter.read(r, &mut ctx))
                .map_err(Error::for_complete_sequence)
        } else {
            converter.read_async(&mut reader, &mut ctx).await
        }
    }

    /// Deserializes a value from any `AsyncRead`.
    pub async fn from_async_read<T: Shaped>(
        &self,
        read: impl AsyncRead + Unpin + Send,
    ) -> Result<T, Error> {
        let mut source = AsyncReadSource::new(read);
        self.deserialize_from_stream(&mut source).await
    }

    /// Serializes `value` and writes the bytes to an async sink.
    pub async fn serialize_to_stream<T: Shaped>(
        &self,
        out: &mut (impl AsyncWrite + Unpin + Send),
        value: &T,
    ) -> Result<(), Error> {
        let bytes = self.to_vec(value)?;
        out.write_all(&bytes).await?;
        Ok(())
    }
}

/// Serializes with a throwaway default [`Serializer`].
pub fn to_vec<T: Shaped>(value: &T) -> Result<Vec<u8>, Error> {
    Serializer::new().to_vec(value)
}

/// Deserializes with a throwaway default [`Serializer`].
pub fn from_slice<T: Shaped>(bytes: &[u8]) -> Result<T, Error> {
    Serializer::new().from_slice(bytes)
}
