use eyre::Result;
use shapepack::{ErrorCode, ObjectShape, Property, Shape, Shaped};

#[derive(Debug, PartialEq, Clone)]
struct Poco {
    x: u32,
    y: u32,
}

impl Shaped for Poco {
    fn shape() -> Shape<Self> {
        Shape::object(
            ObjectShape::new("Poco")
                .with(Property::new("x", |p: &Poco| &p.x).key(0).required())
                .with(Property::new("y", |p: &Poco| &p.y).key(1).required())
                .constructor(|slots| {
                    Ok(Poco {
                        x: slots.take(0)?,
                        y: slots.take(1)?,
                    })
                }),
        )
    }
}

#[test]
fn keyed_properties_use_the_array_protocol() -> Result<()> {
    shapepack_testhelpers::setup();

    let poco = Poco { x: 1, y: 2 };
    let bytes = shapepack::to_vec(&poco)?;
    assert_eq!(
        bytes,
        [
            0x92, // fixarray with 2 elements
            0x01, // x
            0x02, // y
        ]
    );
    assert_eq!(shapepack::from_slice::<Poco>(&bytes)?, poco);
    Ok(())
}

#[test]
fn gaps_between_keys_are_written_as_nil() -> Result<()> {
    shapepack_testhelpers::setup();

    #[derive(Debug, PartialEq)]
    struct Sparse {
        first: u8,
        fourth: u8,
    }

    impl Shaped for Sparse {
        fn shape() -> Shape<Self> {
            Shape::object(
                ObjectShape::new("Sparse")
                    .with(Property::new("first", |s: &Sparse| &s.first).key(0).required())
                    .with(Property::new("fourth", |s: &Sparse| &s.fourth).key(3).required())
                    .constructor(|slots| {
                        Ok(Sparse {
                            first: slots.take(0)?,
                            fourth: slots.take(1)?,
                        })
                    }),
            )
        }
    }

    let value = Sparse { first: 7, fourth: 9 };
    let bytes = shapepack::to_vec(&value)?;
    assert_eq!(bytes, [0x94, 0x07, 0xc0, 0xc0, 0x09]);
    assert_eq!(shapepack::from_slice::<Sparse>(&bytes)?, value);
    Ok(())
}

#[test]
fn undeclared_indices_are_ignored_on_read() -> Result<()> {
    shapepack_testhelpers::setup();

    // a later writer added a third element this reader has no key for
    let bytes = [0x93, 0x01, 0x02, 0xa5, b'e', b'x', b't', b'r', b'a'];
    assert_eq!(
        shapepack::from_slice::<Poco>(&bytes)?,
        Poco { x: 1, y: 2 }
    );
    Ok(())
}

#[test]
fn short_arrays_miss_required_properties() -> Result<()> {
    shapepack_testhelpers::setup();

    let bytes = [0x91, 0x01];
    let err = shapepack::from_slice::<Poco>(&bytes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingRequiredProperty);
    Ok(())
}

#[test]
fn mixing_keyed_and_unkeyed_properties_is_unsupported() -> Result<()> {
    shapepack_testhelpers::setup();

    #[derive(Debug, PartialEq)]
    struct Mixed {
        a: u8,
        b: u8,
    }

    impl Shaped for Mixed {
        fn shape() -> Shape<Self> {
            Shape::object(
                ObjectShape::new("Mixed")
                    .with(Property::new("a", |m: &Mixed| &m.a).key(0))
                    .with(Property::new("b", |m: &Mixed| &m.b))
                    .constructor(|slots| {
                        Ok(Mixed {
                            a: slots.take_or_default(0)?,
                            b: slots.take_or_default(1)?,
                        })
                    }),
            )
        }
    }

    let err = shapepack::to_vec(&Mixed { a: 1, b: 2 }).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotSupported);
    Ok(())
}

#[test]
fn duplicate_keys_are_rejected_at_construction() -> Result<()> {
    shapepack_testhelpers::setup();

    #[derive(Debug, PartialEq)]
    struct Clash {
        a: u8,
        b: u8,
    }

    impl Shaped for Clash {
        fn shape() -> Shape<Self> {
            Shape::object(
                ObjectShape::new("Clash")
                    .with(Property::new("a", |c: &Clash| &c.a).key(1))
                    .with(Property::new("b", |c: &Clash| &c.b).key(1))
                    .constructor(|slots| {
                        Ok(Clash {
                            a: slots.take_or_default(0)?,
                            b: slots.take_or_default(1)?,
                        })
                    }),
            )
        }
    }

    let err = shapepack::to_vec(&Clash { a: 1, b: 2 }).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotSupported);
    Ok(())
}

#[test]
fn an_unfeedable_constructor_parameter_is_unsupported() -> Result<()> {
    shapepack_testhelpers::setup();

    #[derive(Debug, PartialEq)]
    struct Wide {
        a: u8,
    }

    impl Shaped for Wide {
        fn shape() -> Shape<Self> {
            Shape::object(
                ObjectShape::new("Wide")
                    .with(Property::new("a", |w: &Wide| &w.a).key(0))
                    .constructor_arity(2)
                    .constructor(|slots| {
                        Ok(Wide {
                            a: slots.take_or_default(0)?,
                        })
                    }),
            )
        }
    }

    let err = shapepack::to_vec(&Wide { a: 1 }).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotSupported);
    Ok(())
}
