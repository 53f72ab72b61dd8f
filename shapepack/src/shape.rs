//! The type-shape registry: caller-supplied descriptions of type
//! structure that dispatch composes converters from.
//!
//! A shape is data, not reflection. Types you own implement [`Shaped`];
//! for foreign types a witness type implements [`ShapeProvider`]. The
//! existential element types inside container shapes are erased through
//! monomorphized builder functions, so dispatch stays a case analysis
//! over [`ShapeKind`].

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::SerializationContext;
use crate::converters::Converter;
use crate::converters::containers::{
    DictionaryConverter, EnumerableConverter, NullableConverter, SurrogateConverter,
};
use crate::dispatch::Dispatch;
use crate::errors::Error;
use crate::naming::NamingPolicy;
use crate::reader::MsgPackReader;
use crate::writer::MsgPackWriter;

/// A type that carries its own shape.
pub trait Shaped: Send + Sized + 'static {
    /// Describes this type's structure.
    fn shape() -> Shape<Self>;
}

/// An external declaration of a shape for `T`, for types that cannot be
/// annotated directly.
pub trait ShapeProvider<T: Send + 'static>: 'static {
    /// Describes `T`'s structure.
    fn shape() -> Shape<T>;
}

/// The provider used when `T` describes itself.
pub struct SelfShape<T>(PhantomData<fn() -> T>);

impl<T: Shaped> ShapeProvider<T> for SelfShape<T> {
    fn shape() -> Shape<T> {
        T::shape()
    }
}

/// Composes a converter, recursing through `Dispatch` for element types.
pub type BuildConverterFn<T> =
    Box<dyn Fn(&Dispatch<'_>) -> Result<Arc<dyn Converter<T>>, Error> + Send + Sync>;

/// A shape case whose element types have already been erased into a
/// builder function.
pub struct BuiltShape<T: Send + 'static> {
    pub(crate) element: &'static str,
    pub(crate) build: BuildConverterFn<T>,
}

/// The structure of a user type, as one of the supported kinds.
pub struct Shape<T: Send + 'static> {
    pub(crate) name: &'static str,
    pub(crate) kind: ShapeKind<T>,
}

/// The case analysis dispatch runs over.
pub enum ShapeKind<T: Send + 'static> {
    /// A record with named or integer-keyed properties.
    Object(ObjectShape<T>),
    /// A sequence with a known element count.
    Enumerable(BuiltShape<T>),
    /// A keyed collection.
    Dictionary(BuiltShape<T>),
    /// An optional value, nil on the wire when absent.
    Nullable(BuiltShape<T>),
    /// A closed set of named integer values.
    Enum(EnumShape<T>),
    /// One of several member types, dispatched by alias or by required
    /// properties.
    Union(UnionShape<T>),
    /// A type serialized through a stand-in representation.
    Surrogate(BuiltShape<T>),
    /// A type with its own hand-written converter.
    Custom(BuildConverterFn<T>),
    /// No serializable structure; converter construction fails.
    None,
}

impl<T: Send + 'static> Shape<T> {
    /// The type name carried for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// An object shape.
    pub fn object(object: ObjectShape<T>) -> Self {
        Shape {
            name: object.type_name,
            kind: ShapeKind::Object(object),
        }
    }

    /// A shape whose converter is produced by `build`.
    pub fn custom(
        build: impl Fn(&Dispatch<'_>) -> Result<Arc<dyn Converter<T>>, Error>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Shape {
            name: std::any::type_name::<T>(),
            kind: ShapeKind::Custom(Box::new(build)),
        }
    }

    /// A shape carrying a fixed converter.
    pub fn converter(converter: impl Converter<T> + 'static) -> Self {
        let shared: Arc<dyn Converter<T>> = Arc::new(converter);
        Shape::custom(move |_| Ok(shared.clone()))
    }

    /// A shape that cannot be serialized; converter construction reports
    /// `NotSupported`.
    pub fn unsupported() -> Self {
        Shape {
            name: std::any::type_name::<T>(),
            kind: ShapeKind::None,
        }
    }

    /// A sequence of `E` values written as a msgpack array.
    pub fn enumerable<E>() -> Self
    where
        T: FromIterator<E>,
        for<'i> &'i T: IntoIterator<Item = &'i E>,
        for<'i> <&'i T as IntoIterator>::IntoIter: ExactSizeIterator,
        E: Shaped,
    {
        Shape {
            name: std::any::type_name::<T>(),
            kind: ShapeKind::Enumerable(BuiltShape {
                element: std::any::type_name::<E>(),
                build: Box::new(|d: &Dispatch<'_>| {
                    Ok(Arc::new(EnumerableConverter::<T, E>::new(d.converter::<E>()?))
                        as Arc<dyn Converter<T>>)
                }),
            }),
        }
    }

    /// A keyed collection written as a msgpack map. The collection's own
    /// hasher carries any custom key equality.
    pub fn dictionary<K, V>() -> Self
    where
        T: Default + Extend<(K, V)>,
        for<'i> &'i T: IntoIterator<Item = (&'i K, &'i V)>,
        for<'i> <&'i T as IntoIterator>::IntoIter: ExactSizeIterator,
        K: Shaped,
        V: Shaped,
    {
        Shape {
            name: std::any::type_name::<T>(),
            kind: ShapeKind::Dictionary(BuiltShape {
                element: std::any::type_name::<V>(),
                build: Box::new(|d: &Dispatch<'_>| {
                    Ok(Arc::new(DictionaryConverter::<T, K, V>::new(
                        d.converter::<K>()?,
                        d.converter::<V>()?,
                    )) as Arc<dyn Converter<T>>)
                }),
            }),
        }
    }

    /// A type written through a surrogate representation.
    pub fn surrogate<S: Shaped>(to: fn(&T) -> S, from: fn(S) -> T) -> Self {
        Shape {
            name: std::any::type_name::<T>(),
            kind: ShapeKind::Surrogate(BuiltShape {
                element: std::any::type_name::<S>(),
                build: Box::new(move |d: &Dispatch<'_>| {
                    Ok(Arc::new(SurrogateConverter::new(d.converter::<S>()?, to, from))
                        as Arc<dyn Converter<T>>)
                }),
            }),
        }
    }

    /// A closed set of named integer values.
    pub fn enumeration(
        discriminant: fn(&T) -> i64,
        variants: Vec<EnumVariantShape<T>>,
    ) -> Self {
        Shape {
            name: std::any::type_name::<T>(),
            kind: ShapeKind::Enum(EnumShape {
                variants,
                discriminant,
            }),
        }
    }

    /// A union over several member types.
    pub fn union(cases: Vec<UnionCaseShape<T>>) -> Self {
        Shape {
            name: std::any::type_name::<T>(),
            kind: ShapeKind::Union(UnionShape { cases }),
        }
    }
}

impl<U: Shaped> Shape<Option<U>> {
    /// An optional value; absent writes nil, a leading nil reads back as
    /// absent.
    pub fn nullable() -> Self {
        Shape {
            name: std::any::type_name::<Option<U>>(),
            kind: ShapeKind::Nullable(BuiltShape {
                element: std::any::type_name::<U>(),
                build: Box::new(|d: &Dispatch<'_>| {
                    Ok(Arc::new(NullableConverter::new(d.converter::<U>()?))
                        as Arc<dyn Converter<Option<U>>>)
                }),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Builds the target value from the slots its properties were read into.
pub type Constructor<T> = Box<dyn Fn(&mut SlotSet) -> Result<T, Error> + Send + Sync>;

/// One slot per property; read values park here until the constructor
/// assembles the target. Covers default-then-set, all-args and builder
/// construction strategies uniformly.
pub struct SlotSet {
    slots: Vec<Option<Box<dyn Any + Send>>>,
}

impl SlotSet {
    pub(crate) fn new(len: usize) -> Self {
        SlotSet {
            slots: (0..len).map(|_| None).collect(),
        }
    }

    pub(crate) fn put<P: Send + 'static>(&mut self, index: usize, value: P) {
        self.slots[index] = Some(Box::new(value));
    }

    /// Takes the value read for the property at `index`. Fails when the
    /// slot is empty, so use it for required or defaulted properties.
    pub fn take<P: Send + 'static>(&mut self, index: usize) -> Result<P, Error> {
        match self.take_opt(index)? {
            Some(value) => Ok(value),
            None => Err(Error::msg(format!("constructor slot {index} is empty"))),
        }
    }

    /// Takes the value at `index` if one was read.
    pub fn take_opt<P: Send + 'static>(&mut self, index: usize) -> Result<Option<P>, Error> {
        match self.slots.get_mut(index).and_then(Option::take) {
            Some(boxed) => match boxed.downcast::<P>() {
                Ok(value) => Ok(Some(*value)),
                Err(_) => Err(Error::msg(format!(
                    "constructor slot {index} holds a different type"
                ))),
            },
            None => Ok(None),
        }
    }

    /// Takes the value at `index`, falling back to `P::default()`.
    pub fn take_or_default<P: Default + Send + 'static>(
        &mut self,
        index: usize,
    ) -> Result<P, Error> {
        Ok(self.take_opt(index)?.unwrap_or_default())
    }
}

pub(crate) struct BoundProperty<T> {
    pub(crate) write_value: Box<
        dyn Fn(&mut MsgPackWriter<'_>, &T, &mut SerializationContext<'_>) -> Result<(), Error>
            + Send
            + Sync,
    >,
    pub(crate) read_value: Box<
        dyn Fn(&mut MsgPackReader<'_>, &mut SlotSet, &mut SerializationContext<'_>) -> Result<(), Error>
            + Send
            + Sync,
    >,
    pub(crate) fill_default: Option<Box<dyn Fn(&mut SlotSet) + Send + Sync>>,
    pub(crate) is_default: Option<Box<dyn Fn(&T) -> bool + Send + Sync>>,
}

pub(crate) type PropertyBindFn<T> =
    Box<dyn Fn(&Dispatch<'_>, usize) -> Result<BoundProperty<T>, Error> + Send + Sync>;

/// One property of an object shape. Built through [`PropertyBuilder`].
pub struct Property<T: Send + 'static> {
    pub(crate) member_name: &'static str,
    pub(crate) explicit_name: Option<&'static str>,
    pub(crate) key: Option<u32>,
    pub(crate) required: bool,
    pub(crate) ignored: bool,
    pub(crate) bind: PropertyBindFn<T>,
}

impl<T: Send + 'static> Property<T> {
    /// Starts a property backed by the element type's own shape.
    pub fn new<P: Shaped>(name: &'static str, get: fn(&T) -> &P) -> PropertyBuilder<T, P> {
        PropertyBuilder {
            member_name: name,
            explicit_name: None,
            key: None,
            required: false,
            ignored: false,
            get,
            resolver: Box::new(|d: &Dispatch<'_>| d.converter::<P>()),
            default_make: None,
            default_eq: None,
        }
    }

    /// Starts a property carried entirely by a custom converter, for
    /// element types without a shape of their own.
    pub fn with_converter<P: Send + 'static>(
        name: &'static str,
        get: fn(&T) -> &P,
        converter: Arc<dyn Converter<P>>,
    ) -> PropertyBuilder<T, P> {
        PropertyBuilder {
            member_name: name,
            explicit_name: None,
            key: None,
            required: false,
            ignored: false,
            get,
            resolver: Box::new(move |_| Ok(converter.clone())),
            default_make: None,
            default_eq: None,
        }
    }
}

/// Configures one property before it is erased into the object shape.
pub struct PropertyBuilder<T: Send + 'static, P: Send + 'static> {
    member_name: &'static str,
    explicit_name: Option<&'static str>,
    key: Option<u32>,
    required: bool,
    ignored: bool,
    get: fn(&T) -> &P,
    resolver: Box<dyn Fn(&Dispatch<'_>) -> Result<Arc<dyn Converter<P>>, Error> + Send + Sync>,
    default_make: Option<Arc<dyn Fn() -> P + Send + Sync>>,
    default_eq: Option<Arc<dyn Fn(&P) -> bool + Send + Sync>>,
}

impl<T: Send + 'static, P: Send + 'static> PropertyBuilder<T, P> {
    /// Declares an explicit wire name, bypassing the naming policy.
    pub fn rename(mut self, name: &'static str) -> Self {
        self.explicit_name = Some(name);
        self
    }

    /// Assigns an integer key, switching the whole object to the
    /// object-as-array protocol.
    pub fn key(mut self, key: u32) -> Self {
        self.key = Some(key);
        self
    }

    /// Marks the property required: a read that never binds it fails with
    /// `MissingRequiredProperty`.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Excludes the property from serialization.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    /// Declares a default used when the property is omitted on read.
    /// With `serialize_default_values` off, values equal to the default
    /// are skipped on write.
    pub fn with_default(mut self, default: fn() -> P) -> Self
    where
        P: PartialEq,
    {
        self.default_make = Some(Arc::new(default));
        self.default_eq = Some(Arc::new(move |value: &P| *value == default()));
        self
    }

    /// Replaces the property's converter.
    pub fn converter(mut self, converter: Arc<dyn Converter<P>>) -> Self {
        self.resolver = Box::new(move |_| Ok(converter.clone()));
        self
    }
}

impl<T: Send + 'static, P: Send + 'static> From<PropertyBuilder<T, P>> for Property<T> {
    fn from(builder: PropertyBuilder<T, P>) -> Self {
        let PropertyBuilder {
            member_name,
            explicit_name,
            key,
            required,
            ignored,
            get,
            resolver,
            default_make,
            default_eq,
        } = builder;
        Property {
            member_name,
            explicit_name,
            key,
            required,
            ignored,
            bind: Box::new(move |d, slot| {
                let converter = resolver(d)?;
                let write_conv = converter.clone();
                let fill_default = default_make.clone().map(|make| {
                    Box::new(move |slots: &mut SlotSet| slots.put(slot, make()))
                        as Box<dyn Fn(&mut SlotSet) + Send + Sync>
                });
                let is_default = default_eq.clone().map(|eq| {
                    Box::new(move |value: &T| eq(get(value)))
                        as Box<dyn Fn(&T) -> bool + Send + Sync>
                });
                Ok(BoundProperty {
                    write_value: Box::new(
                        move |w: &mut MsgPackWriter<'_>,
                              value: &T,
                              ctx: &mut SerializationContext<'_>| {
                            write_conv.write(w, get(value), ctx)
                        },
                    ),
                    read_value: Box::new(
                        move |r: &mut MsgPackReader<'_>,
                              slots: &mut SlotSet,
                              ctx: &mut SerializationContext<'_>| {
                            let value = converter.read(r, ctx)?;
                            slots.put(slot, value);
                            Ok(())
                        },
                    ),
                    fill_default,
                    is_default,
                })
            }),
        }
    }
}

/// The shape of a record: ordered properties plus a construction
/// strategy.
pub struct ObjectShape<T: Send + 'static> {
    pub(crate) type_name: &'static str,
    pub(crate) properties: Vec<Property<T>>,
    pub(crate) constructor: Option<Constructor<T>>,
    pub(crate) constructor_arity: Option<usize>,
}

impl<T: Send + 'static> ObjectShape<T> {
    /// An empty object shape.
    pub fn new(type_name: &'static str) -> Self {
        ObjectShape {
            type_name,
            properties: Vec::new(),
            constructor: None,
            constructor_arity: None,
        }
    }

    /// Appends a property. Slot indices follow declaration order.
    pub fn with(mut self, property: impl Into<Property<T>>) -> Self {
        self.properties.push(property.into());
        self
    }

    /// Sets the constructor assembling the target from its slots.
    pub fn constructor(
        mut self,
        build: impl Fn(&mut SlotSet) -> Result<T, Error> + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Box::new(build));
        self
    }

    /// Declares how many leading slots the constructor consumes, letting
    /// converter construction reject a constructor parameter no property
    /// can feed.
    pub fn constructor_arity(mut self, arity: usize) -> Self {
        self.constructor_arity = Some(arity);
        self
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// One named integer value of an enum shape.
pub struct EnumVariantShape<T> {
    /// The declared name, used by the `Name` wire format.
    pub name: &'static str,
    /// The underlying integer.
    pub value: i64,
    /// Produces the variant.
    pub make: fn() -> T,
}

/// A closed set of named integer values.
pub struct EnumShape<T> {
    pub(crate) variants: Vec<EnumVariantShape<T>>,
    pub(crate) discriminant: fn(&T) -> i64,
}

// ---------------------------------------------------------------------------
// Unions
// ---------------------------------------------------------------------------

/// A configured union discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnionAlias {
    /// An integer alias.
    Int(u32),
    /// The member's logical name.
    Name(&'static str),
}

pub(crate) struct BoundUnionCase<T> {
    pub(crate) type_name: &'static str,
    pub(crate) required_names: Vec<String>,
    pub(crate) matches: Box<dyn Fn(&T) -> bool + Send + Sync>,
    pub(crate) write: Box<
        dyn Fn(&mut MsgPackWriter<'_>, &T, &mut SerializationContext<'_>) -> Result<(), Error>
            + Send
            + Sync,
    >,
    pub(crate) read: Box<
        dyn Fn(&mut MsgPackReader<'_>, &mut SerializationContext<'_>) -> Result<T, Error>
            + Send
            + Sync,
    >,
}

pub(crate) type UnionBindFn<T> =
    Box<dyn Fn(&Dispatch<'_>) -> Result<BoundUnionCase<T>, Error> + Send + Sync>;

/// One member of a union shape.
pub struct UnionCaseShape<T: Send + 'static> {
    pub(crate) type_name: &'static str,
    pub(crate) alias: Option<UnionAlias>,
    pub(crate) bind: UnionBindFn<T>,
}

impl<T: Send + 'static> UnionCaseShape<T> {
    /// A member case: `into` lifts the member into the union, `project`
    /// recovers it when the union holds this case.
    pub fn new<C: Shaped>(into: fn(C) -> T, project: fn(&T) -> Option<&C>) -> Self {
        UnionCaseShape {
            type_name: std::any::type_name::<C>(),
            alias: None,
            bind: Box::new(move |d: &Dispatch<'_>| {
                let converter = d.converter::<C>()?;
                let required_names =
                    required_wire_names(&C::shape(), d.options().naming_policy);
                let write_conv = converter.clone();
                Ok(BoundUnionCase {
                    type_name: std::any::type_name::<C>(),
                    required_names,
                    matches: Box::new(move |value: &T| project(value).is_some()),
                    write: Box::new(
                        move |w: &mut MsgPackWriter<'_>,
                              value: &T,
                              ctx: &mut SerializationContext<'_>| {
                            match project(value) {
                                Some(inner) => write_conv.write(w, inner, ctx),
                                None => {
                                    Err(Error::msg("value does not match the selected union case"))
                                }
                            }
                        },
                    ),
                    read: Box::new(
                        move |r: &mut MsgPackReader<'_>, ctx: &mut SerializationContext<'_>| {
                            converter.read(r, ctx).map(into)
                        },
                    ),
                })
            }),
        }
    }

    /// Assigns an integer discriminator.
    pub fn with_int_alias(mut self, alias: u32) -> Self {
        self.alias = Some(UnionAlias::Int(alias));
        self
    }

    /// Assigns a name discriminator.
    pub fn with_name_alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(UnionAlias::Name(alias));
        self
    }
}

/// A union over several member types.
pub struct UnionShape<T: Send + 'static> {
    pub(crate) cases: Vec<UnionCaseShape<T>>,
}

/// Required wire names of an object shape, for shape-based union
/// dispatch.
pub(crate) fn required_wire_names<C: Send + 'static>(
    shape: &Shape<C>,
    policy: NamingPolicy,
) -> Vec<String> {
    match &shape.kind {
        ShapeKind::Object(object) => object
            .properties
            .iter()
            .filter(|p| p.required && !p.ignored)
            .map(|p| match p.explicit_name {
                Some(name) => name.to_string(),
                None => policy.apply(p.member_name).into_owned(),
            })
            .collect(),
        _ => Vec::new(),
    }
}
