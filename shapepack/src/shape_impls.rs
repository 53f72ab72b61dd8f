//! Shapes for the standard library types the codec understands out of
//! the box.
//!
//! `Vec<u8>` follows the generic sequence shape and serializes as an
//! array of integers; the msgpack bin family is carried by
//! [`bytes::Bytes`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use bytes::Bytes;

use crate::context::SerializationContext;
use crate::converters::containers::BoxConverter;
use crate::converters::primitives::{
    ArcStrConverter, BoolConverter, CharConverter, F32Converter, F64Converter, I8Converter,
    I16Converter, I32Converter, I64Converter, IsizeConverter, StringConverter, U8Converter,
    U16Converter, U32Converter, U64Converter, UnitConverter, UsizeConverter,
};
use crate::converters::{Converter, with_depth};
use crate::dispatch::Dispatch;
use crate::errors::Error;
use crate::reader::MsgPackReader;
use crate::shape::{Shape, Shaped};
use crate::writer::MsgPackWriter;

macro_rules! leaf_shape {
    ($($ty:ty => $converter:expr),* $(,)?) => {$(
        impl Shaped for $ty {
            fn shape() -> Shape<Self> {
                Shape::converter($converter)
            }
        }
    )*};
}

leaf_shape! {
    u8 => U8Converter,
    u16 => U16Converter,
    u32 => U32Converter,
    u64 => U64Converter,
    usize => UsizeConverter,
    i8 => I8Converter,
    i16 => I16Converter,
    i32 => I32Converter,
    i64 => I64Converter,
    isize => IsizeConverter,
    bool => BoolConverter,
    f32 => F32Converter,
    f64 => F64Converter,
    char => CharConverter,
    String => StringConverter,
    () => UnitConverter,
}

impl Shaped for Arc<str> {
    fn shape() -> Shape<Self> {
        Shape::converter(ArcStrConverter)
    }
}

struct BytesConverter;

impl Converter<Bytes> for BytesConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &Bytes,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_bin(value)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<Bytes, Error> {
        Ok(Bytes::copy_from_slice(&reader.read_bin()?))
    }
}

impl Shaped for Bytes {
    fn shape() -> Shape<Self> {
        Shape::converter(BytesConverter)
    }
}

impl<U: Shaped> Shaped for Option<U> {
    fn shape() -> Shape<Self> {
        Shape::nullable()
    }
}

impl<U: Shaped> Shaped for Box<U> {
    fn shape() -> Shape<Self> {
        Shape::custom(|d: &Dispatch<'_>| {
            Ok(Arc::new(BoxConverter::new(d.converter::<U>()?)) as Arc<dyn Converter<Box<U>>>)
        })
    }
}

impl<E: Shaped> Shaped for Vec<E> {
    fn shape() -> Shape<Self> {
        Shape::<Self>::enumerable::<E>()
    }
}

impl<E: Shaped> Shaped for VecDeque<E> {
    fn shape() -> Shape<Self> {
        Shape::<Self>::enumerable::<E>()
    }
}

impl<E: Shaped + Ord> Shaped for BTreeSet<E> {
    fn shape() -> Shape<Self> {
        Shape::<Self>::enumerable::<E>()
    }
}

impl<E, S> Shaped for HashSet<E, S>
where
    E: Shaped + Eq + Hash,
    S: BuildHasher + Default + Send + 'static,
{
    fn shape() -> Shape<Self> {
        Shape::<Self>::enumerable::<E>()
    }
}

impl<K, V, S> Shaped for HashMap<K, V, S>
where
    K: Shaped + Eq + Hash,
    V: Shaped,
    S: BuildHasher + Default + Send + 'static,
{
    fn shape() -> Shape<Self> {
        Shape::<Self>::dictionary::<K, V>()
    }
}

impl<K: Shaped + Ord, V: Shaped> Shaped for BTreeMap<K, V> {
    fn shape() -> Shape<Self> {
        Shape::<Self>::dictionary::<K, V>()
    }
}

struct FixedArrayConverter<E: Send + 'static, const N: usize> {
    element: Arc<dyn Converter<E>>,
}

impl<E: Send + 'static, const N: usize> Converter<[E; N]> for FixedArrayConverter<E, N> {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &[E; N],
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        with_depth(ctx, |ctx| {
            writer.write_array_header(N)?;
            for (i, item) in value.iter().enumerate() {
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
    ) -> Result<[E; N], Error> {
        with_depth(ctx, |ctx| {
            let len = reader.read_array_header()?;
            if len != N {
                return Err(Error::msg(format!(
                    "expected a {N}-element array, found {len}"
                )));
            }
            let mut items = Vec::with_capacity(N);
            for i in 0..N {
                items.push(
                    self.element
                        .read(reader, ctx)
                        .map_err(|e| e.with_index(i))?,
                );
            }
            items
                .try_into()
                .map_err(|_| Error::msg("array length mismatch"))
        })
    }
}

impl<E: Shaped, const N: usize> Shaped for [E; N] {
    fn shape() -> Shape<Self> {
        Shape::custom(|d: &Dispatch<'_>| {
            Ok(Arc::new(FixedArrayConverter::<E, N> {
                element: d.converter::<E>()?,
            }) as Arc<dyn Converter<[E; N]>>)
        })
    }
}

struct Tuple2Converter<A: Send + 'static, B: Send + 'static> {
    first: Arc<dyn Converter<A>>,
    second: Arc<dyn Converter<B>>,
}

impl<A: Send + 'static, B: Send + 'static> Converter<(A, B)> for Tuple2Converter<A, B> {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &(A, B),
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        with_depth(ctx, |ctx| {
            writer.write_array_header(2)?;
            self.first.write(writer, &value.0, ctx)?;
            self.second.write(writer, &value.1, ctx)
        })
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(A, B), Error> {
        with_depth(ctx, |ctx| {
            let len = reader.read_array_header()?;
            if len != 2 {
                return Err(Error::msg(format!(
                    "expected a two-element array, found {len}"
                )));
            }
            let first = self.first.read(reader, ctx)?;
            let second = self.second.read(reader, ctx)?;
            Ok((first, second))
        })
    }
}

impl<A: Shaped, B: Shaped> Shaped for (A, B) {
    fn shape() -> Shape<Self> {
        Shape::custom(|d: &Dispatch<'_>| {
            Ok(Arc::new(Tuple2Converter {
                first: d.converter::<A>()?,
                second: d.converter::<B>()?,
            }) as Arc<dyn Converter<(A, B)>>)
        })
    }
}

struct Tuple3Converter<A: Send + 'static, B: Send + 'static, C: Send + 'static> {
    first: Arc<dyn Converter<A>>,
    second: Arc<dyn Converter<B>>,
    third: Arc<dyn Converter<C>>,
}

impl<A: Send + 'static, B: Send + 'static, C: Send + 'static> Converter<(A, B, C)>
    for Tuple3Converter<A, B, C>
{
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &(A, B, C),
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        with_depth(ctx, |ctx| {
            writer.write_array_header(3)?;
            self.first.write(writer, &value.0, ctx)?;
            self.second.write(writer, &value.1, ctx)?;
            self.third.write(writer, &value.2, ctx)
        })
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(A, B, C), Error> {
        with_depth(ctx, |ctx| {
            let len = reader.read_array_header()?;
            if len != 3 {
                return Err(Error::msg(format!(
                    "expected a three-element array, found {len}"
                )));
            }
            let first = self.first.read(reader, ctx)?;
            let second = self.second.read(reader, ctx)?;
            let third = self.third.read(reader, ctx)?;
            Ok((first, second, third))
        })
    }
}

impl<A: Shaped, B: Shaped, C: Shaped> Shaped for (A, B, C) {
    fn shape() -> Shape<Self> {
        Shape::custom(|d: &Dispatch<'_>| {
            Ok(Arc::new(Tuple3Converter {
                first: d.converter::<A>()?,
                second: d.converter::<B>()?,
                third: d.converter::<C>()?,
            }) as Arc<dyn Converter<(A, B, C)>>)
        })
    }
}

impl Shaped for crate::timestamp::Timestamp {
    fn shape() -> Shape<Self> {
        Shape::converter(TimestampConverter)
    }
}

struct TimestampConverter;

impl Converter<crate::timestamp::Timestamp> for TimestampConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &crate::timestamp::Timestamp,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_timestamp(*value)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<crate::timestamp::Timestamp, Error> {
        reader.read_timestamp()
    }
}
