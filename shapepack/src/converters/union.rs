//! Union dispatch: by explicit alias, or by a decision tree over the
//! members' required properties.

use std::collections::HashSet;
use std::sync::Arc;

use log::trace;

use crate::constants::{MSGPACK_FIXSTR_MAX, MSGPACK_FIXSTR_MIN, MSGPACK_STR8, MSGPACK_STR32};
use crate::context::SerializationContext;
use crate::converters::{Converter, with_depth};
use crate::dispatch::Dispatch;
use crate::errors::{Error, ErrorKind};
use crate::reader::MsgPackReader;
use crate::shape::{BoundUnionCase, UnionAlias, UnionShape};
use crate::writer::MsgPackWriter;

struct CaseEntry<T> {
    alias: Option<UnionAlias>,
    bound: BoundUnionCase<T>,
}

enum Mode {
    /// Two-element array of [discriminator, payload].
    Alias,
    /// Bare payload; the member is recognized by which distinguishing
    /// required property its map carries.
    Tree {
        steps: Vec<(String, usize)>,
        fallback: usize,
    },
}

pub(crate) struct UnionConverter<T: Send + 'static> {
    type_name: &'static str,
    cases: Vec<CaseEntry<T>>,
    mode: Mode,
}

pub(crate) fn bind_union<T: Send + 'static>(
    type_name: &'static str,
    shape: UnionShape<T>,
    dispatch: &Dispatch<'_>,
) -> Result<Arc<dyn Converter<T>>, Error> {
    let mut cases = Vec::with_capacity(shape.cases.len());
    for case in shape.cases {
        cases.push(CaseEntry {
            alias: case.alias,
            bound: (case.bind)(dispatch)?,
        });
    }
    if cases.is_empty() {
        return Err(Error::not_supported(format!(
            "{type_name} declares no union cases"
        )));
    }

    let aliased = cases.iter().filter(|c| c.alias.is_some()).count();
    let mode = if aliased == cases.len() {
        Mode::Alias
    } else if aliased == 0 {
        let (steps, fallback) = build_decision_tree(type_name, &cases)?;
        Mode::Tree { steps, fallback }
    } else {
        return Err(Error::not_supported(format!(
            "{type_name} mixes aliased and alias-free union cases"
        )));
    };

    Ok(Arc::new(UnionConverter {
        type_name,
        cases,
        mode,
    }))
}

/// Repeatedly picks a required property unique to one remaining member;
/// two members that never separate have no converter.
fn build_decision_tree<T>(
    type_name: &str,
    cases: &[CaseEntry<T>],
) -> Result<(Vec<(String, usize)>, usize), Error> {
    let mut remaining: Vec<usize> = (0..cases.len()).collect();
    let mut steps = Vec::new();
    while remaining.len() > 1 {
        let mut found = None;
        'search: for &candidate in &remaining {
            for name in &cases[candidate].bound.required_names {
                let unique = remaining.iter().all(|&other| {
                    other == candidate || !cases[other].bound.required_names.contains(name)
                });
                if unique {
                    found = Some((name.clone(), candidate));
                    break 'search;
                }
            }
        }
        match found {
            Some((name, candidate)) => {
                trace!("{type_name}: property {name:?} identifies {}", cases[candidate].bound.type_name);
                steps.push((name, candidate));
                remaining.retain(|&c| c != candidate);
            }
            None => {
                let names: Vec<&str> = remaining
                    .iter()
                    .map(|&c| cases[c].bound.type_name)
                    .collect();
                return Err(Error::not_supported(format!(
                    "{type_name}: union members {} cannot be distinguished by required \
                     properties; declare explicit aliases",
                    names.join(", ")
                )));
            }
        }
    }
    Ok((steps, remaining[0]))
}

impl<T: Send + 'static> UnionConverter<T> {
    fn case_for_value(&self, value: &T) -> Result<&CaseEntry<T>, Error> {
        self.cases
            .iter()
            .find(|c| (c.bound.matches)(value))
            .ok_or_else(|| {
                Error::not_supported(format!(
                    "{}: no declared union case matches this value",
                    self.type_name
                ))
            })
    }
}

impl<T: Send + 'static> Converter<T> for UnionConverter<T> {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &T,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        with_depth(ctx, |ctx| {
            let case = self.case_for_value(value)?;
            match &self.mode {
                Mode::Alias => {
                    writer.write_array_header(2)?;
                    match case.alias {
                        Some(UnionAlias::Int(alias)) => writer.write_u64(alias as u64)?,
                        Some(UnionAlias::Name(alias)) => writer.write_str(alias)?,
                        None => {
                            return Err(Error::msg("aliased union case lost its alias"));
                        }
                    }
                    (case.bound.write)(writer, value, ctx)
                }
                Mode::Tree { .. } => (case.bound.write)(writer, value, ctx),
            }
        })
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<T, Error> {
        with_depth(ctx, |ctx| match &self.mode {
            Mode::Alias => {
                let len = reader.read_array_header()?;
                if len != 2 {
                    return Err(Error::msg(format!(
                        "{}: a union value is a two-element array, found {len} elements",
                        self.type_name
                    )));
                }
                let marker = reader.peek_marker()?;
                let is_str = matches!(marker, MSGPACK_FIXSTR_MIN..=MSGPACK_FIXSTR_MAX)
                    || matches!(marker, MSGPACK_STR8..=MSGPACK_STR32);
                let case = if is_str {
                    let name = reader.read_str()?;
                    self.cases
                        .iter()
                        .find(|c| matches!(c.alias, Some(UnionAlias::Name(n)) if n == name))
                        .ok_or_else(|| {
                            Error::new(ErrorKind::UnknownUnionDiscriminator(name.into_owned()))
                        })?
                } else {
                    let alias = reader.read_u32()?;
                    self.cases
                        .iter()
                        .find(|c| c.alias == Some(UnionAlias::Int(alias)))
                        .ok_or_else(|| {
                            Error::new(ErrorKind::UnknownUnionDiscriminator(alias.to_string()))
                        })?
                };
                (case.bound.read)(reader, ctx)
            }
            Mode::Tree { steps, fallback } => {
                // peek the map without consuming it
                let mut probe = reader.clone();
                let entries = probe.read_map_header()?;
                let mut keys: HashSet<Vec<u8>> = HashSet::with_capacity(entries.min(64));
                for _ in 0..entries {
                    match probe.read_str_bytes() {
                        Ok(key) => {
                            keys.insert(key.into_owned());
                        }
                        Err(e) if e.code() == crate::ErrorCode::UnexpectedToken => {
                            probe.skip_value()?;
                        }
                        Err(e) => return Err(e),
                    }
                    probe.skip_value()?;
                }
                let chosen = steps
                    .iter()
                    .find(|(name, _)| keys.contains(name.as_bytes()))
                    .map(|(_, case)| *case)
                    .unwrap_or(*fallback);
                trace!(
                    "{}: shape-based dispatch selected {}",
                    self.type_name, self.cases[chosen].bound.type_name
                );
                (self.cases[chosen].bound.read)(reader, ctx)
            }
        })
    }
}
