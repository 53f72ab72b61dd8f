//! The object-as-map and object-as-array record protocols.

use std::collections::HashMap;
use std::collections::hash_map::RandomState;
use std::sync::Arc;

use log::trace;

use crate::context::SerializationContext;
use crate::converters::{BoxFut, Converter, with_depth};
use crate::dispatch::Dispatch;
use crate::errors::{Error, ErrorKind};
use crate::prefmt::PreformattedString;
use crate::reader::MsgPackReader;
use crate::shape::{BoundProperty, Constructor, ObjectShape, SlotSet};
use crate::stream::StreamingReader;
use crate::writer::MsgPackWriter;

struct PropEntry<T> {
    wire: PreformattedString,
    required: bool,
    ignored: bool,
    bound: BoundProperty<T>,
}

enum Protocol {
    /// Properties keyed by string name. The lookup table is keyed by the
    /// wire name's UTF-8 bytes under the standard collision-resistant
    /// hasher; untrusted keys cannot degenerate it.
    Map {
        lookup: HashMap<Box<[u8]>, usize, RandomState>,
    },
    /// Properties keyed by integer position; the array spans
    /// `0..=max_key` with nil at unclaimed indices.
    Array { by_index: Vec<Option<usize>> },
}

pub(crate) struct ObjectConverter<T: Send + 'static> {
    type_name: &'static str,
    props: Vec<PropEntry<T>>,
    constructor: Constructor<T>,
    protocol: Protocol,
    reject_duplicates: bool,
    serialize_defaults: bool,
}

pub(crate) fn bind_object<T: Send + 'static>(
    shape: ObjectShape<T>,
    dispatch: &Dispatch<'_>,
) -> Result<Arc<dyn Converter<T>>, Error> {
    let ObjectShape {
        type_name,
        properties,
        constructor,
        constructor_arity,
    } = shape;

    let constructor = constructor
        .ok_or_else(|| Error::not_supported(format!("{type_name} declares no constructor")))?;
    if let Some(arity) = constructor_arity {
        if arity > properties.len() {
            return Err(Error::not_supported(format!(
                "{type_name}: a constructor parameter cannot be fed from any property \
                 (arity {arity}, {} properties)",
                properties.len()
            )));
        }
    }

    let policy = dispatch.options().naming_policy;
    let mut props = Vec::with_capacity(properties.len());
    let mut keys = Vec::with_capacity(properties.len());
    for (slot, property) in properties.into_iter().enumerate() {
        let wire_name = match property.explicit_name {
            Some(name) => name.to_string(),
            None => policy.apply(property.member_name).into_owned(),
        };
        let bound = (property.bind)(dispatch, slot)?;
        keys.push(property.key);
        props.push(PropEntry {
            wire: PreformattedString::new(wire_name),
            required: property.required,
            ignored: property.ignored,
            bound,
        });
    }

    let protocol = if keys.iter().any(Option::is_some) {
        if keys.iter().any(Option::is_none) {
            return Err(Error::not_supported(format!(
                "{type_name} mixes keyed and unkeyed properties"
            )));
        }
        let len = keys
            .iter()
            .map(|k| k.map(|k| k as usize + 1).unwrap_or(0))
            .max()
            .unwrap_or(0);
        let mut by_index = vec![None; len];
        for (i, key) in keys.iter().enumerate() {
            let index = key.map(|k| k as usize).unwrap_or(0);
            if by_index[index].is_some() {
                return Err(Error::not_supported(format!(
                    "{type_name} assigns key {index} to more than one property"
                )));
            }
            by_index[index] = Some(i);
        }
        Protocol::Array { by_index }
    } else {
        let mut lookup = HashMap::with_hasher(RandomState::new());
        for (i, prop) in props.iter().enumerate() {
            if prop.ignored {
                continue;
            }
            let previous = lookup.insert(prop.wire.utf8_bytes().to_vec().into_boxed_slice(), i);
            if previous.is_some() {
                return Err(Error::not_supported(format!(
                    "{type_name} declares the wire name {:?} twice",
                    prop.wire.text()
                )));
            }
        }
        Protocol::Map { lookup }
    };

    Ok(Arc::new(ObjectConverter {
        type_name,
        props,
        constructor,
        protocol,
        reject_duplicates: dispatch.options().reject_duplicate_keys,
        serialize_defaults: dispatch.options().serialize_default_values,
    }))
}

impl<T: Send + 'static> ObjectConverter<T> {
    fn finish(&self, mut slots: SlotSet, seen: &[bool]) -> Result<T, Error> {
        for (i, prop) in self.props.iter().enumerate() {
            if seen[i] {
                continue;
            }
            if prop.required && !prop.ignored {
                return Err(Error::new(ErrorKind::MissingRequiredProperty(
                    prop.wire.text().to_string().into(),
                )));
            }
            if let Some(fill) = &prop.bound.fill_default {
                fill(&mut slots);
            }
        }
        (self.constructor)(&mut slots)
    }

    fn bind_map_entry(
        &self,
        index: usize,
        seen: &mut [bool],
        reader: &mut MsgPackReader<'_>,
        slots: &mut SlotSet,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        let prop = &self.props[index];
        if seen[index] && self.reject_duplicates {
            return Err(Error::new(ErrorKind::DuplicateProperty(
                prop.wire.text().to_string(),
            )));
        }
        seen[index] = true;
        (prop.bound.read_value)(reader, slots, ctx)
            .map_err(|e| e.with_property(prop.wire.text().to_string()))
    }
}

impl<T: Send + 'static> Converter<T> for ObjectConverter<T> {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &T,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        with_depth(ctx, |ctx| match &self.protocol {
            Protocol::Map { .. } => {
                let mut emit = Vec::with_capacity(self.props.len());
                for prop in &self.props {
                    let include = !prop.ignored
                        && (self.serialize_defaults
                            || prop.bound.is_default.as_ref().is_none_or(|f| !f(value)));
                    emit.push(include);
                }
                writer.write_map_header(emit.iter().filter(|included| **included).count())?;
                for (prop, included) in self.props.iter().zip(&emit) {
                    if !included {
                        continue;
                    }
                    prop.wire.write(writer)?;
                    (prop.bound.write_value)(writer, value, ctx)
                        .map_err(|e| e.with_property(prop.wire.text().to_string()))?;
                }
                Ok(())
            }
            Protocol::Array { by_index } => {
                writer.write_array_header(by_index.len())?;
                for (index, entry) in by_index.iter().enumerate() {
                    match entry {
                        Some(i) if !self.props[*i].ignored => {
                            (self.props[*i].bound.write_value)(writer, value, ctx)
                                .map_err(|e| e.with_index(index))?;
                        }
                        _ => writer.write_nil()?,
                    }
                }
                Ok(())
            }
        })
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<T, Error> {
        with_depth(ctx, |ctx| {
            let mut slots = SlotSet::new(self.props.len());
            let mut seen = vec![false; self.props.len()];
            match &self.protocol {
                Protocol::Map { lookup } => {
                    let entries = reader.read_map_header()?;
                    for _ in 0..entries {
                        let key = reader.read_str_bytes()?;
                        match lookup.get(key.as_ref()).copied() {
                            Some(i) => {
                                self.bind_map_entry(i, &mut seen, reader, &mut slots, ctx)?
                            }
                            None => {
                                trace!(
                                    "{}: skipping unknown property {:?}",
                                    self.type_name,
                                    String::from_utf8_lossy(&key)
                                );
                                reader.skip_value()?;
                            }
                        }
                    }
                }
                Protocol::Array { by_index } => {
                    let entries = reader.read_array_header()?;
                    for index in 0..entries {
                        match by_index.get(index).copied().flatten() {
                            Some(i) if !self.props[i].ignored => {
                                seen[i] = true;
                                let prop = &self.props[i];
                                (prop.bound.read_value)(reader, &mut slots, ctx)
                                    .map_err(|e| e.with_index(index))?;
                            }
                            _ => reader.skip_value()?,
                        }
                    }
                }
            }
            self.finish(slots, &seen)
        })
    }

    fn read_async<'a>(
        &'a self,
        reader: &'a mut StreamingReader<'_>,
        ctx: &'a mut SerializationContext<'_>,
    ) -> BoxFut<'a, Result<T, Error>> {
        Box::pin(async move {
            ctx.depth_step()?;
            let result = async {
                let mut slots = SlotSet::new(self.props.len());
                let mut seen = vec![false; self.props.len()];
                match &self.protocol {
                    Protocol::Map { lookup } => {
                        let entries = reader.decode(|r| r.read_map_header()).await?;
                        for _ in 0..entries {
                            let matched = reader
                                .decode(|r| {
                                    let key = r.read_str_bytes()?;
                                    Ok(lookup.get(key.as_ref()).copied())
                                })
                                .await?;
                            reader.ensure_next_value().await?;
                            match matched {
                                Some(i) => reader.with_buffered(|r| {
                                    self.bind_map_entry(i, &mut seen, r, &mut slots, ctx)
                                })?,
                                None => reader.with_buffered(|r| r.skip_value())?,
                            }
                        }
                    }
                    Protocol::Array { by_index } => {
                        let entries = reader.decode(|r| r.read_array_header()).await?;
                        for index in 0..entries {
                            reader.ensure_next_value().await?;
                            match by_index.get(index).copied().flatten() {
                                Some(i) if !self.props[i].ignored => {
                                    seen[i] = true;
                                    let prop = &self.props[i];
                                    reader
                                        .with_buffered(|r| {
                                            (prop.bound.read_value)(r, &mut slots, ctx)
                                        })
                                        .map_err(|e| e.with_index(index))?;
                                }
                                _ => reader.with_buffered(|r| r.skip_value())?,
                            }
                        }
                    }
                }
                self.finish(slots, &seen)
            }
            .await;
            ctx.depth_exit();
            result
        })
    }
}
