//! Leaf converters for the primitive types.

use std::sync::Arc;

use crate::context::SerializationContext;
use crate::converters::Converter;
use crate::errors::Error;
use crate::reader::MsgPackReader;
use crate::writer::MsgPackWriter;

macro_rules! unsigned_converter {
    ($name:ident, $ty:ty, $read:ident) => {
        pub(crate) struct $name;

        impl Converter<$ty> for $name {
            fn write(
                &self,
                writer: &mut MsgPackWriter<'_>,
                value: &$ty,
                _ctx: &mut SerializationContext<'_>,
            ) -> Result<(), Error> {
                writer.write_u64(*value as u64)
            }

            fn read(
                &self,
                reader: &mut MsgPackReader<'_>,
                _ctx: &mut SerializationContext<'_>,
            ) -> Result<$ty, Error> {
                reader.$read()
            }
        }
    };
}

macro_rules! signed_converter {
    ($name:ident, $ty:ty, $read:ident) => {
        pub(crate) struct $name;

        impl Converter<$ty> for $name {
            fn write(
                &self,
                writer: &mut MsgPackWriter<'_>,
                value: &$ty,
                _ctx: &mut SerializationContext<'_>,
            ) -> Result<(), Error> {
                writer.write_i64(*value as i64)
            }

            fn read(
                &self,
                reader: &mut MsgPackReader<'_>,
                _ctx: &mut SerializationContext<'_>,
            ) -> Result<$ty, Error> {
                reader.$read()
            }
        }
    };
}

unsigned_converter!(U8Converter, u8, read_u8);
unsigned_converter!(U16Converter, u16, read_u16);
unsigned_converter!(U32Converter, u32, read_u32);
unsigned_converter!(U64Converter, u64, read_u64);
signed_converter!(I8Converter, i8, read_i8);
signed_converter!(I16Converter, i16, read_i16);
signed_converter!(I32Converter, i32, read_i32);
signed_converter!(I64Converter, i64, read_i64);

pub(crate) struct UsizeConverter;

impl Converter<usize> for UsizeConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &usize,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_u64(*value as u64)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<usize, Error> {
        usize::try_from(reader.read_u64()?).map_err(|_| Error::overflow("usize"))
    }
}

pub(crate) struct IsizeConverter;

impl Converter<isize> for IsizeConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &isize,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_i64(*value as i64)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<isize, Error> {
        isize::try_from(reader.read_i64()?).map_err(|_| Error::overflow("isize"))
    }
}

pub(crate) struct BoolConverter;

impl Converter<bool> for BoolConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &bool,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_bool(*value)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<bool, Error> {
        reader.read_bool()
    }
}

pub(crate) struct F32Converter;

impl Converter<f32> for F32Converter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &f32,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_f32(*value)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<f32, Error> {
        reader.read_f32()
    }
}

pub(crate) struct F64Converter;

impl Converter<f64> for F64Converter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &f64,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_f64(*value)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<f64, Error> {
        reader.read_f64()
    }
}

pub(crate) struct UnitConverter;

impl Converter<()> for UnitConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        _value: &(),
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_nil()
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        reader.read_nil()
    }
}

pub(crate) struct StringConverter;

impl Converter<String> for StringConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &String,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_str(value)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<String, Error> {
        Ok(reader.read_str()?.into_owned())
    }
}

pub(crate) struct CharConverter;

impl Converter<char> for CharConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &char,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        let mut buf = [0u8; 4];
        writer.write_str(value.encode_utf8(&mut buf))
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<char, Error> {
        let text = reader.read_str()?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Error::msg("expected a single-character string")),
        }
    }
}

/// Reads go through the per-operation interner when `intern_strings` is
/// on, so repeated keys share one allocation.
pub(crate) struct ArcStrConverter;

impl Converter<Arc<str>> for ArcStrConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &Arc<str>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_str(value)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<Arc<str>, Error> {
        let text = reader.read_str()?;
        if ctx.options().intern_strings {
            Ok(ctx.intern(&text))
        } else {
            Ok(Arc::from(&*text))
        }
    }
}
