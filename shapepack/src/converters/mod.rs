//! The converter abstraction and the built-in converters composed by
//! dispatch.

use core::future::Future;
use core::pin::Pin;

use crate::context::SerializationContext;
use crate::errors::Error;
use crate::reader::MsgPackReader;
use crate::stream::StreamingReader;
use crate::writer::MsgPackWriter;

pub(crate) mod containers;
pub(crate) mod object;
pub(crate) mod primitives;
pub(crate) mod union;

/// A boxed future, the return type of async converter entry points.
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A bundle of the two operations that carry one type across the wire.
///
/// Converters are composed from a type's shape by dispatch and cached per
/// (type, options) on the serializer instance; custom implementations can
/// be registered through
/// [`SerializerOptions::with_converter`](crate::SerializerOptions::with_converter)
/// or attached to a single property.
pub trait Converter<T: Send + 'static>: Send + Sync {
    /// Writes `value` as exactly one msgpack value.
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &T,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error>;

    /// Reads exactly one msgpack value.
    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<T, Error>;

    /// Whether the streaming layer should take this converter's async path
    /// even when bytes are already buffered.
    fn prefers_async(&self) -> bool {
        false
    }

    /// Reads one value from a streaming reader, suspending between tokens
    /// when bytes run out.
    ///
    /// The default buffers the whole next value, then delegates to the
    /// synchronous path. Container converters override this to stream
    /// element by element.
    fn read_async<'a>(
        &'a self,
        reader: &'a mut StreamingReader<'_>,
        ctx: &'a mut SerializationContext<'_>,
    ) -> BoxFut<'a, Result<T, Error>> {
        Box::pin(async move {
            reader.ensure_next_value().await?;
            reader.with_buffered(|r| self.read(r, ctx))
        })
    }
}

/// Runs `f` one nesting level deeper, restoring the depth on the way out.
pub(crate) fn with_depth<'op, R>(
    ctx: &mut SerializationContext<'op>,
    f: impl FnOnce(&mut SerializationContext<'op>) -> Result<R, Error>,
) -> Result<R, Error> {
    ctx.depth_step()?;
    let result = f(ctx);
    ctx.depth_exit();
    result
}
