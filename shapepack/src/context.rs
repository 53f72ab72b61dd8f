//! Per-operation state threaded through the converter call graph.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::converters::Converter;
use crate::dispatch::ConverterCache;
use crate::errors::{Error, ErrorKind};
use crate::options::SerializerOptions;
use crate::shape::{SelfShape, Shaped};

/// State for one top-level serialize or deserialize call: the depth
/// counter, the cancellation token, a handle to the owning serializer's
/// converter cache, and the options snapshot.
///
/// Created at the outer call, threaded by reference through the call
/// graph, dropped at return.
pub struct SerializationContext<'op> {
    options: &'op SerializerOptions,
    cache: Option<&'op ConverterCache>,
    cancel: CancellationToken,
    depth: u32,
    interner: Option<HashSet<Arc<str>>>,
}

impl<'op> SerializationContext<'op> {
    pub(crate) fn new(
        options: &'op SerializerOptions,
        cache: Option<&'op ConverterCache>,
        cancel: CancellationToken,
    ) -> Self {
        SerializationContext {
            options,
            cache,
            cancel,
            depth: 0,
            interner: None,
        }
    }

    /// A context bound to options but to no serializer, for driving
    /// converters by hand. [`SerializationContext::get_converter`] fails
    /// with `InvalidOperation` on such a context.
    pub fn detached(options: &'op SerializerOptions) -> Self {
        Self::new(options, None, CancellationToken::new())
    }

    /// The options this operation runs under.
    pub fn options(&self) -> &SerializerOptions {
        self.options
    }

    /// The token cancelling this operation.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails with `Cancelled` once the token is signaled.
    pub fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            Err(Error::cancelled())
        } else {
            Ok(())
        }
    }

    /// Steps one nesting level deeper, failing with `DepthLimitExceeded`
    /// past the configured maximum and with `Cancelled` once the token is
    /// signaled.
    pub fn depth_step(&mut self) -> Result<(), Error> {
        self.check_cancelled()?;
        if self.depth >= self.options.max_depth {
            return Err(Error::new(ErrorKind::DepthLimitExceeded {
                max: self.options.max_depth,
            }));
        }
        self.depth += 1;
        Ok(())
    }

    /// Steps back out of a nesting level.
    pub fn depth_exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// The current nesting depth.
    pub fn current_depth(&self) -> u32 {
        self.depth
    }

    /// Looks up or composes the converter for `T`. Fails with
    /// `InvalidOperation` when the context is not bound to a serializer.
    pub fn get_converter<T: Shaped>(&self) -> Result<Arc<dyn Converter<T>>, Error> {
        match self.cache {
            Some(cache) => cache.converter_for::<T, SelfShape<T>>(self.options),
            None => Err(Error::invalid_operation(
                "no serializer is bound to this context",
            )),
        }
    }

    /// Returns a shared copy of `text`, reusing one seen earlier in this
    /// operation.
    pub(crate) fn intern(&mut self, text: &str) -> Arc<str> {
        let set = self.interner.get_or_insert_with(HashSet::new);
        if let Some(existing) = set.get(text) {
            existing.clone()
        } else {
            let fresh: Arc<str> = Arc::from(text);
            set.insert(fresh.clone());
            fresh
        }
    }
}
