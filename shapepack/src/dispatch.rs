//! Shape-to-converter composition and the per-serializer cache.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, ThreadId};

use log::trace;

use crate::context::SerializationContext;
use crate::converters::{BoxFut, Converter, containers, object, union};
use crate::errors::Error;
use crate::options::SerializerOptions;
use crate::reader::MsgPackReader;
use crate::shape::{SelfShape, Shape, ShapeKind, ShapeProvider, Shaped};
use crate::stream::StreamingReader;
use crate::writer::MsgPackWriter;

/// The recursion handle shape builders use to obtain converters for their
/// element types.
pub struct Dispatch<'a> {
    cache: &'a ConverterCache,
    options: &'a SerializerOptions,
}

impl Dispatch<'_> {
    /// Looks up or composes the converter for `U`.
    pub fn converter<U: Shaped>(&self) -> Result<Arc<dyn Converter<U>>, Error> {
        self.cache.converter_for::<U, SelfShape<U>>(self.options)
    }

    /// Looks up or composes the converter for `U` through a witness.
    pub fn converter_via<U: Send + 'static, P: ShapeProvider<U>>(
        &self,
    ) -> Result<Arc<dyn Converter<U>>, Error> {
        self.cache.converter_for::<U, P>(self.options)
    }

    /// The options converters are being composed under.
    pub fn options(&self) -> &SerializerOptions {
        self.options
    }
}

type Slot<T> = OnceLock<Result<Arc<dyn Converter<T>>, Arc<Error>>>;

struct CacheEntry {
    slot: Arc<dyn Any + Send + Sync>,
    builder: Option<ThreadId>,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy)]
struct CacheKey {
    value: TypeId,
    provider: TypeId,
    options: u64,
}

/// The converter cache owned by a serializer instance.
///
/// Each entry is written at most once. Construction is single-flight per
/// key: a second thread blocks on the building entry, while the building
/// thread re-entering the same key (a cyclic shape) receives a forwarding
/// converter that resolves once the outer build completes.
#[derive(Default)]
pub(crate) struct ConverterCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

enum Step<T: Send + 'static> {
    Ready(Result<Arc<dyn Converter<T>>, Error>),
    Wait(Arc<Slot<T>>),
    Build(Arc<Slot<T>>),
}

fn finished<T: Send + 'static>(
    result: &Result<Arc<dyn Converter<T>>, Arc<Error>>,
) -> Result<Arc<dyn Converter<T>>, Error> {
    match result {
        Ok(converter) => Ok(converter.clone()),
        Err(error) => Err(error.duplicate()),
    }
}

impl ConverterCache {
    pub(crate) fn converter_for<T: Send + 'static, P: ShapeProvider<T>>(
        &self,
        options: &SerializerOptions,
    ) -> Result<Arc<dyn Converter<T>>, Error> {
        let key = CacheKey {
            value: TypeId::of::<T>(),
            provider: TypeId::of::<P>(),
            options: options.fingerprint(),
        };

        let step: Step<T> = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            match entries.get(&key) {
                Some(entry) => {
                    let slot = entry
                        .slot
                        .clone()
                        .downcast::<Slot<T>>()
                        .map_err(|_| Error::msg("converter cache entry type confusion"))?;
                    match slot.get() {
                        Some(result) => Step::Ready(finished(result)),
                        None if entry.builder == Some(thread::current().id()) => {
                            trace!(
                                "cyclic shape for {}, handing out a forwarding converter",
                                std::any::type_name::<T>()
                            );
                            Step::Ready(Ok(Arc::new(DeferredConverter { slot })))
                        }
                        None => Step::Wait(slot),
                    }
                }
                None => {
                    let fresh: Arc<Slot<T>> = Arc::new(OnceLock::new());
                    entries.insert(
                        key,
                        CacheEntry {
                            slot: fresh.clone(),
                            builder: Some(thread::current().id()),
                        },
                    );
                    Step::Build(fresh)
                }
            }
        };

        match step {
            Step::Ready(result) => result,
            Step::Wait(slot) => finished(slot.wait()),
            Step::Build(slot) => {
                let built = self.build::<T, P>(options);
                let result = match built {
                    Ok(converter) => {
                        let _ = slot.set(Ok(converter.clone()));
                        Ok(converter)
                    }
                    Err(error) => {
                        let shared = Arc::new(error);
                        let _ = slot.set(Err(shared.clone()));
                        Err(shared.duplicate())
                    }
                };
                let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(entry) = entries.get_mut(&key) {
                    entry.builder = None;
                }
                result
            }
        }
    }

    fn build<T: Send + 'static, P: ShapeProvider<T>>(
        &self,
        options: &SerializerOptions,
    ) -> Result<Arc<dyn Converter<T>>, Error> {
        if let Some(overridden) = options.converter_override::<T>() {
            trace!(
                "using registered converter override for {}",
                std::any::type_name::<T>()
            );
            return Ok(overridden);
        }
        if options.preserve_references {
            return Err(Error::not_supported(
                "PreserveReferences is not supported by this serializer",
            ));
        }

        let Shape { name, kind } = P::shape();
        trace!("composing converter for {name}");
        let dispatch = Dispatch {
            cache: self,
            options,
        };
        match kind {
            ShapeKind::Object(shape) => object::bind_object(shape, &dispatch),
            ShapeKind::Enumerable(built)
            | ShapeKind::Dictionary(built)
            | ShapeKind::Nullable(built)
            | ShapeKind::Surrogate(built) => {
                trace!("{name} delegates to {}", built.element);
                (built.build)(&dispatch)
            }
            ShapeKind::Enum(shape) => containers::bind_enum(shape, &dispatch),
            ShapeKind::Union(shape) => union::bind_union(name, shape, &dispatch),
            ShapeKind::Custom(build) => build(&dispatch),
            ShapeKind::None => Err(Error::not_supported(format!(
                "{name} has no serializable shape; implement Shaped for it or supply a \
                 shape witness (see https://docs.rs/shapepack/latest/shapepack/#shapes-and-witnesses)"
            ))),
        }
    }
}

/// Stands in for a converter whose own shape is still being built.
/// Resolves through the cache slot once the outer build completes.
struct DeferredConverter<T: Send + 'static> {
    slot: Arc<Slot<T>>,
}

impl<T: Send + 'static> DeferredConverter<T> {
    fn resolve(&self) -> Result<Arc<dyn Converter<T>>, Error> {
        match self.slot.get() {
            Some(result) => finished(result),
            None => Err(Error::invalid_operation(
                "converter used before its cyclic shape finished building",
            )),
        }
    }
}

impl<T: Send + 'static> Converter<T> for DeferredConverter<T> {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &T,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        self.resolve()?.write(writer, value, ctx)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<T, Error> {
        self.resolve()?.read(reader, ctx)
    }

    fn prefers_async(&self) -> bool {
        self.resolve().map(|c| c.prefers_async()).unwrap_or(false)
    }

    fn read_async<'a>(
        &'a self,
        reader: &'a mut StreamingReader<'_>,
        ctx: &'a mut SerializationContext<'_>,
    ) -> BoxFut<'a, Result<T, Error>> {
        Box::pin(async move {
            let converter = self.resolve()?;
            converter.read_async(reader, ctx).await
        })
    }
}
