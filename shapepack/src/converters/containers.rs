//! Converters for the container shape kinds: nullable, enumerable,
//! dictionary, surrogate and enum.

use std::marker::PhantomData;
use std::sync::Arc;

use log::trace;

use crate::constants::{MSGPACK_FIXSTR_MAX, MSGPACK_FIXSTR_MIN, MSGPACK_STR8, MSGPACK_STR32};
use crate::context::SerializationContext;
use crate::converters::{BoxFut, Converter, with_depth};
use crate::dispatch::Dispatch;
use crate::errors::{Error, ErrorKind};
use crate::options::EnumFormat;
use crate::reader::MsgPackReader;
use crate::shape::EnumShape;
use crate::stream::StreamingReader;
use crate::writer::MsgPackWriter;

// Capacity hint ceiling; headers are untrusted input.
const PREALLOC_LIMIT: usize = 4096;

pub(crate) struct NullableConverter<U: Send + 'static> {
    inner: Arc<dyn Converter<U>>,
}

impl<U: Send + 'static> NullableConverter<U> {
    pub(crate) fn new(inner: Arc<dyn Converter<U>>) -> Self {
        NullableConverter { inner }
    }
}

impl<U: Send + 'static> Converter<Option<U>> for NullableConverter<U> {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &Option<U>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        match value {
            Some(inner) => self.inner.write(writer, inner, ctx),
            None => writer.write_nil(),
        }
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<Option<U>, Error> {
        if reader.try_read_nil()? {
            Ok(None)
        } else {
            self.inner.read(reader, ctx).map(Some)
        }
    }

    fn prefers_async(&self) -> bool {
        self.inner.prefers_async()
    }

    fn read_async<'a>(
        &'a self,
        reader: &'a mut StreamingReader<'_>,
        ctx: &'a mut SerializationContext<'_>,
    ) -> BoxFut<'a, Result<Option<U>, Error>> {
        Box::pin(async move {
            if reader.decode(|r| r.try_read_nil()).await? {
                Ok(None)
            } else {
                Ok(Some(self.inner.read_async(reader, ctx).await?))
            }
        })
    }
}

pub(crate) struct EnumerableConverter<C, E> {
    element: Arc<dyn Converter<E>>,
    marker: PhantomData<fn() -> (C, E)>,
}

impl<C, E> EnumerableConverter<C, E> {
    pub(crate) fn new(element: Arc<dyn Converter<E>>) -> Self {
        EnumerableConverter {
            element,
            marker: PhantomData,
        }
    }
}

impl<C, E> Converter<C> for EnumerableConverter<C, E>
where
    C: Send + 'static + FromIterator<E>,
    for<'i> &'i C: IntoIterator<Item = &'i E>,
    for<'i> <&'i C as IntoIterator>::IntoIter: ExactSizeIterator,
    E: Send + 'static,
{
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &C,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        with_depth(ctx, |ctx| {
            let iter = value.into_iter();
            writer.write_array_header(iter.len())?;
            for (i, item) in iter.enumerate() {
                self.element
                    .write(writer, item, ctx)
                    .map_err(|e| e.with_index(i))?;
            }
            Ok(())
        })
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<C, Error> {
        with_depth(ctx, |ctx| {
            let len = reader.read_array_header()?;
            let mut items = Vec::with_capacity(len.min(PREALLOC_LIMIT));
            for i in 0..len {
                items.push(
                    self.element
                        .read(reader, ctx)
                        .map_err(|e| e.with_index(i))?,
                );
            }
            Ok(C::from_iter(items))
        })
    }

    fn read_async<'a>(
        &'a self,
        reader: &'a mut StreamingReader<'_>,
        ctx: &'a mut SerializationContext<'_>,
    ) -> BoxFut<'a, Result<C, Error>> {
        Box::pin(async move {
            ctx.depth_step()?;
            let result = async {
                let len = reader.decode(|r| r.read_array_header()).await?;
                let mut items = Vec::with_capacity(len.min(PREALLOC_LIMIT));
                for i in 0..len {
                    let item = if self.element.prefers_async() {
                        self.element.read_async(reader, ctx).await
                    } else {
                        reader.ensure_next_value().await?;
                        reader.with_buffered(|r| self.element.read(r, ctx))
                    };
                    items.push(item.map_err(|e| e.with_index(i))?);
                }
                Ok(C::from_iter(items))
            }
            .await;
            ctx.depth_exit();
            result
        })
    }
}

pub(crate) struct DictionaryConverter<M, K, V> {
    key: Arc<dyn Converter<K>>,
    value: Arc<dyn Converter<V>>,
    marker: PhantomData<fn() -> (M, K, V)>,
}

impl<M, K, V> DictionaryConverter<M, K, V> {
    pub(crate) fn new(key: Arc<dyn Converter<K>>, value: Arc<dyn Converter<V>>) -> Self {
        DictionaryConverter {
            key,
            value,
            marker: PhantomData,
        }
    }
}

impl<M, K, V> Converter<M> for DictionaryConverter<M, K, V>
where
    M: Send + 'static + Default + Extend<(K, V)>,
    for<'i> &'i M: IntoIterator<Item = (&'i K, &'i V)>,
    for<'i> <&'i M as IntoIterator>::IntoIter: ExactSizeIterator,
    K: Send + 'static,
    V: Send + 'static,
{
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &M,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        with_depth(ctx, |ctx| {
            let iter = value.into_iter();
            writer.write_map_header(iter.len())?;
            for (i, (k, v)) in iter.enumerate() {
                self.key.write(writer, k, ctx).map_err(|e| e.with_index(i))?;
                self.value
                    .write(writer, v, ctx)
                    .map_err(|e| e.with_index(i))?;
            }
            Ok(())
        })
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<M, Error> {
        with_depth(ctx, |ctx| {
            let len = reader.read_map_header()?;
            let mut map = M::default();
            for i in 0..len {
                let k = self.key.read(reader, ctx).map_err(|e| e.with_index(i))?;
                let v = self.value.read(reader, ctx).map_err(|e| e.with_index(i))?;
                map.extend(core::iter::once((k, v)));
            }
            Ok(map)
        })
    }

    fn read_async<'a>(
        &'a self,
        reader: &'a mut StreamingReader<'_>,
        ctx: &'a mut SerializationContext<'_>,
    ) -> BoxFut<'a, Result<M, Error>> {
        Box::pin(async move {
            ctx.depth_step()?;
            let result = async {
                let len = reader.decode(|r| r.read_map_header()).await?;
                let mut map = M::default();
                for i in 0..len {
                    reader.ensure_next_value().await?;
                    let k = reader
                        .with_buffered(|r| self.key.read(r, ctx))
                        .map_err(|e| e.with_index(i))?;
                    let v = if self.value.prefers_async() {
                        self.value.read_async(reader, ctx).await
                    } else {
                        reader.ensure_next_value().await?;
                        reader.with_buffered(|r| self.value.read(r, ctx))
                    };
                    map.extend(core::iter::once((k, v.map_err(|e| e.with_index(i))?)));
                }
                Ok(map)
            }
            .await;
            ctx.depth_exit();
            result
        })
    }
}

pub(crate) struct SurrogateConverter<T, S: Send + 'static> {
    inner: Arc<dyn Converter<S>>,
    to: fn(&T) -> S,
    from: fn(S) -> T,
}

impl<T, S: Send + 'static> SurrogateConverter<T, S> {
    pub(crate) fn new(inner: Arc<dyn Converter<S>>, to: fn(&T) -> S, from: fn(S) -> T) -> Self {
        SurrogateConverter { inner, to, from }
    }
}

impl<T, S> Converter<T> for SurrogateConverter<T, S>
where
    T: Send + 'static,
    S: Send + 'static,
{
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &T,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        let stand_in = (self.to)(value);
        self.inner.write(writer, &stand_in, ctx)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<T, Error> {
        self.inner.read(reader, ctx).map(self.from)
    }
}

/// Delegates through a box, keeping recursive shapes finite.
pub(crate) struct BoxConverter<U: Send + 'static> {
    inner: Arc<dyn Converter<U>>,
}

impl<U: Send + 'static> BoxConverter<U> {
    pub(crate) fn new(inner: Arc<dyn Converter<U>>) -> Self {
        BoxConverter { inner }
    }
}

impl<U: Send + 'static> Converter<Box<U>> for BoxConverter<U> {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &Box<U>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        self.inner.write(writer, value, ctx)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<Box<U>, Error> {
        self.inner.read(reader, ctx).map(Box::new)
    }

    fn prefers_async(&self) -> bool {
        self.inner.prefers_async()
    }
}

pub(crate) struct EnumConverter<T> {
    variants: Vec<crate::shape::EnumVariantShape<T>>,
    discriminant: fn(&T) -> i64,
    format: EnumFormat,
}

pub(crate) fn bind_enum<T: Send + 'static>(
    shape: EnumShape<T>,
    dispatch: &Dispatch<'_>,
) -> Result<Arc<dyn Converter<T>>, Error> {
    Ok(Arc::new(EnumConverter {
        variants: shape.variants,
        discriminant: shape.discriminant,
        format: dispatch.options().enum_format,
    }))
}

impl<T: Send + 'static> Converter<T> for EnumConverter<T> {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &T,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        let discriminant = (self.discriminant)(value);
        match self.format {
            EnumFormat::Integer => writer.write_i64(discriminant),
            EnumFormat::Name => {
                let variant = self
                    .variants
                    .iter()
                    .find(|v| v.value == discriminant)
                    .ok_or_else(|| {
                        Error::new(ErrorKind::UnknownEnumVariant(discriminant.to_string()))
                    })?;
                writer.write_str(variant.name)
            }
        }
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<T, Error> {
        // accept either wire form regardless of the configured one
        let marker = reader.peek_marker()?;
        let is_str = matches!(marker, MSGPACK_FIXSTR_MIN..=MSGPACK_FIXSTR_MAX)
            || matches!(marker, MSGPACK_STR8..=MSGPACK_STR32);
        if is_str {
            let name = reader.read_str()?;
            trace!("enum variant by name: {name}");
            let variant = self
                .variants
                .iter()
                .find(|v| v.name == name)
                .ok_or_else(|| Error::new(ErrorKind::UnknownEnumVariant(name.into_owned())))?;
            Ok((variant.make)())
        } else {
            let value = reader.read_i64()?;
            let variant = self
                .variants
                .iter()
                .find(|v| v.value == value)
                .ok_or_else(|| Error::new(ErrorKind::UnknownEnumVariant(value.to_string())))?;
            Ok((variant.make)())
        }
    }
}
