//! Per-serializer configuration.

use std::any::{Any, TypeId};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::converters::Converter;
use crate::naming::NamingPolicy;

/// How enum shapes appear on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EnumFormat {
    /// The declared underlying integer.
    #[default]
    Integer,
    /// The declared variant name as a string.
    Name,
}

#[derive(Clone)]
struct OverrideEntry {
    type_id: TypeId,
    converter: Arc<dyn Any + Send + Sync>,
}

/// Options consulted by the context and baked into composed converters.
///
/// Converters are cached per (type, options fingerprint), so two
/// serializers configured alike compose identical converters.
#[derive(Clone)]
pub struct SerializerOptions {
    /// Maximum nesting depth for both directions. The default survives
    /// typical stacks.
    pub max_depth: u32,
    /// Buffered-byte threshold below which a streaming deserialize takes
    /// the async path.
    pub max_async_buffer: usize,
    /// Wire-name normalization for properties without explicit names.
    pub naming_policy: NamingPolicy,
    /// Integer or name serialization for enum shapes.
    pub enum_format: EnumFormat,
    /// Emit properties whose value equals their declared default.
    pub serialize_default_values: bool,
    /// Fail on duplicate map keys instead of letting the last win.
    pub reject_duplicate_keys: bool,
    /// Deduplicate `Arc<str>` reads within one operation.
    pub intern_strings: bool,
    /// Recognized but unsupported; enabling it fails converter
    /// construction explicitly.
    pub preserve_references: bool,
    overrides: Vec<OverrideEntry>,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        SerializerOptions {
            max_depth: 64,
            max_async_buffer: 1 << 20,
            naming_policy: NamingPolicy::Identity,
            enum_format: EnumFormat::Integer,
            serialize_default_values: true,
            reject_duplicate_keys: false,
            intern_strings: false,
            preserve_references: false,
            overrides: Vec::new(),
        }
    }
}

impl SerializerOptions {
    /// The defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the streaming pre-buffer threshold.
    pub fn with_max_async_buffer(mut self, bytes: usize) -> Self {
        self.max_async_buffer = bytes;
        self
    }

    /// Sets the naming policy.
    pub fn with_naming_policy(mut self, policy: NamingPolicy) -> Self {
        self.naming_policy = policy;
        self
    }

    /// Sets the enum wire format.
    pub fn with_enum_format(mut self, format: EnumFormat) -> Self {
        self.enum_format = format;
        self
    }

    /// Controls emission of properties equal to their declared default.
    pub fn with_serialize_default_values(mut self, emit: bool) -> Self {
        self.serialize_default_values = emit;
        self
    }

    /// Enables rejection of duplicate map keys.
    pub fn with_reject_duplicate_keys(mut self, reject: bool) -> Self {
        self.reject_duplicate_keys = reject;
        self
    }

    /// Enables `Arc<str>` interning per operation.
    pub fn with_intern_strings(mut self, intern: bool) -> Self {
        self.intern_strings = intern;
        self
    }

    /// Registers a converter that takes precedence over the composed one
    /// for `T`.
    pub fn with_converter<T: Send + 'static>(mut self, converter: Arc<dyn Converter<T>>) -> Self {
        self.overrides.retain(|e| e.type_id != TypeId::of::<T>());
        self.overrides.push(OverrideEntry {
            type_id: TypeId::of::<T>(),
            converter: Arc::new(converter),
        });
        self
    }

    pub(crate) fn converter_override<T: Send + 'static>(&self) -> Option<Arc<dyn Converter<T>>> {
        self.overrides
            .iter()
            .find(|e| e.type_id == TypeId::of::<T>())
            .and_then(|e| e.converter.downcast_ref::<Arc<dyn Converter<T>>>())
            .cloned()
    }

    /// A stable digest of every option that shapes converter composition.
    pub(crate) fn fingerprint(&self) -> u64 {
        let mut hasher = std::hash::DefaultHasher::new();
        self.naming_policy.hash(&mut hasher);
        self.enum_format.hash(&mut hasher);
        self.serialize_default_values.hash(&mut hasher);
        self.reject_duplicate_keys.hash(&mut hasher);
        self.intern_strings.hash(&mut hasher);
        self.preserve_references.hash(&mut hasher);
        for entry in &self.overrides {
            entry.type_id.hash(&mut hasher);
            (Arc::as_ptr(&entry.converter) as *const () as usize).hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl std::fmt::Debug for SerializerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerOptions")
            .field("max_depth", &self.max_depth)
            .field("max_async_buffer", &self.max_async_buffer)
            .field("naming_policy", &self.naming_policy)
            .field("enum_format", &self.enum_format)
            .field("serialize_default_values", &self.serialize_default_values)
            .field("reject_duplicate_keys", &self.reject_duplicate_keys)
            .field("intern_strings", &self.intern_strings)
            .field("preserve_references", &self.preserve_references)
            .field("overrides", &self.overrides.len())
            .finish()
    }
}
