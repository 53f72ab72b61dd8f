use eyre::Result;
use shapepack::{
    EnumFormat, EnumVariantShape, ErrorCode, ObjectShape, Property, Serializer,
    SerializerOptions, Shape, Shaped, UnionCaseShape,
};

#[derive(Debug, PartialEq, Clone, Copy)]
enum Color {
    Red,
    Green,
    Blue,
}

impl Shaped for Color {
    fn shape() -> Shape<Self> {
        Shape::enumeration(
            |c: &Color| match c {
                Color::Red => 1,
                Color::Green => 2,
                Color::Blue => 3,
            },
            vec![
                EnumVariantShape {
                    name: "Red",
                    value: 1,
                    make: || Color::Red,
                },
                EnumVariantShape {
                    name: "Green",
                    value: 2,
                    make: || Color::Green,
                },
                EnumVariantShape {
                    name: "Blue",
                    value: 3,
                    make: || Color::Blue,
                },
            ],
        )
    }
}

#[test]
fn enums_write_integers_by_default_and_read_both_forms() -> Result<()> {
    shapepack_testhelpers::setup();

    let bytes = shapepack::to_vec(&Color::Green)?;
    assert_eq!(bytes, [0x02]);
    assert_eq!(shapepack::from_slice::<Color>(&bytes)?, Color::Green);

    // the string form decodes regardless of the configured format
    let bytes = [0xa4, b'B', b'l', b'u', b'e'];
    assert_eq!(shapepack::from_slice::<Color>(&bytes)?, Color::Blue);
    Ok(())
}

#[test]
fn enums_can_write_names_instead() -> Result<()> {
    shapepack_testhelpers::setup();

    let named = Serializer::with_options(
        SerializerOptions::default().with_enum_format(EnumFormat::Name),
    );
    let bytes = named.to_vec(&Color::Red)?;
    assert_eq!(bytes, [0xa3, b'R', b'e', b'd']);
    assert_eq!(named.from_slice::<Color>(&bytes)?, Color::Red);
    // and still reads integers
    assert_eq!(named.from_slice::<Color>(&[0x03])?, Color::Blue);
    Ok(())
}

#[test]
fn unknown_enum_values_fail() -> Result<()> {
    shapepack_testhelpers::setup();

    let err = shapepack::from_slice::<Color>(&[0x63]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unspecified);
    assert!(err.to_string().contains("99"));
    Ok(())
}

#[derive(Debug, PartialEq, Clone)]
struct Circle {
    radius: u32,
}

impl Shaped for Circle {
    fn shape() -> Shape<Self> {
        Shape::object(
            ObjectShape::new("Circle")
                .with(Property::new("radius", |c: &Circle| &c.radius).required())
                .constructor(|slots| {
                    Ok(Circle {
                        radius: slots.take(0)?,
                    })
                }),
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
struct Rect {
    width: u32,
    height: u32,
}

impl Shaped for Rect {
    fn shape() -> Shape<Self> {
        Shape::object(
            ObjectShape::new("Rect")
                .with(Property::new("width", |r: &Rect| &r.width).required())
                .with(Property::new("height", |r: &Rect| &r.height).required())
                .constructor(|slots| {
                    Ok(Rect {
                        width: slots.take(0)?,
                        height: slots.take(1)?,
                    })
                }),
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
enum Figure {
    Circle(Circle),
    Rect(Rect),
}

impl Shaped for Figure {
    fn shape() -> Shape<Self> {
        Shape::union(vec![
            UnionCaseShape::new(Figure::Circle, |f: &Figure| match f {
                Figure::Circle(c) => Some(c),
                _ => None,
            })
            .with_int_alias(0),
            UnionCaseShape::new(Figure::Rect, |f: &Figure| match f {
                Figure::Rect(r) => Some(r),
                _ => None,
            })
            .with_int_alias(1),
        ])
    }
}

#[test]
fn aliased_unions_wrap_the_payload_in_a_two_element_array() -> Result<()> {
    shapepack_testhelpers::setup();

    let figure = Figure::Circle(Circle { radius: 5 });
    let bytes = shapepack::to_vec(&figure)?;
    assert_eq!(
        bytes,
        [
            0x92, // [discriminator, payload]
            0x00, // alias 0
            0x81, // fixmap with 1 entry
            0xa6, b'r', b'a', b'd', b'i', b'u', b's', 0x05,
        ]
    );
    assert_eq!(shapepack::from_slice::<Figure>(&bytes)?, figure);

    let figure = Figure::Rect(Rect {
        width: 3,
        height: 4,
    });
    let bytes = shapepack::to_vec(&figure)?;
    assert_eq!(shapepack::from_slice::<Figure>(&bytes)?, figure);
    Ok(())
}

#[test]
fn unknown_discriminators_are_reported() -> Result<()> {
    shapepack_testhelpers::setup();

    let bytes = [0x92, 0x63, 0xc0];
    let err = shapepack::from_slice::<Figure>(&bytes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownUnionDiscriminator);
    assert!(err.to_string().contains("99"));
    Ok(())
}

#[derive(Debug, PartialEq, Clone)]
enum NamedFigure {
    Circle(Circle),
    Rect(Rect),
}

impl Shaped for NamedFigure {
    fn shape() -> Shape<Self> {
        Shape::union(vec![
            UnionCaseShape::new(NamedFigure::Circle, |f: &NamedFigure| match f {
                NamedFigure::Circle(c) => Some(c),
                _ => None,
            })
            .with_name_alias("circle"),
            UnionCaseShape::new(NamedFigure::Rect, |f: &NamedFigure| match f {
                NamedFigure::Rect(r) => Some(r),
                _ => None,
            })
            .with_name_alias("rect"),
        ])
    }
}

#[test]
fn name_aliases_work_like_integer_aliases() -> Result<()> {
    shapepack_testhelpers::setup();

    let figure = NamedFigure::Rect(Rect {
        width: 1,
        height: 2,
    });
    let bytes = shapepack::to_vec(&figure)?;
    assert_eq!(&bytes[..6], &[0x92, 0xa4, b'r', b'e', b'c', b't']);
    assert_eq!(shapepack::from_slice::<NamedFigure>(&bytes)?, figure);
    Ok(())
}

#[derive(Debug, PartialEq, Clone)]
enum ShapelessFigure {
    Circle(Circle),
    Rect(Rect),
}

impl Shaped for ShapelessFigure {
    fn shape() -> Shape<Self> {
        Shape::union(vec![
            UnionCaseShape::new(ShapelessFigure::Circle, |f: &ShapelessFigure| match f {
                ShapelessFigure::Circle(c) => Some(c),
                _ => None,
            }),
            UnionCaseShape::new(ShapelessFigure::Rect, |f: &ShapelessFigure| match f {
                ShapelessFigure::Rect(r) => Some(r),
                _ => None,
            }),
        ])
    }
}

#[test]
fn alias_free_unions_dispatch_on_required_properties() -> Result<()> {
    shapepack_testhelpers::setup();

    // payload is written bare, no wrapper array
    let figure = ShapelessFigure::Circle(Circle { radius: 5 });
    let bytes = shapepack::to_vec(&figure)?;
    assert_eq!(bytes[0], 0x81);
    assert_eq!(shapepack::from_slice::<ShapelessFigure>(&bytes)?, figure);

    let figure = ShapelessFigure::Rect(Rect {
        width: 3,
        height: 4,
    });
    let bytes = shapepack::to_vec(&figure)?;
    assert_eq!(shapepack::from_slice::<ShapelessFigure>(&bytes)?, figure);

    // extra unknown keys do not confuse the probe
    let mut noisy = vec![0x82, 0xa1, b'z', 0xc0];
    noisy.extend_from_slice(&[0xa6, b'r', b'a', b'd', b'i', b'u', b's', 0x07]);
    assert_eq!(
        shapepack::from_slice::<ShapelessFigure>(&noisy)?,
        ShapelessFigure::Circle(Circle { radius: 7 })
    );
    Ok(())
}

#[test]
fn indistinguishable_members_have_no_converter() -> Result<()> {
    shapepack_testhelpers::setup();

    #[derive(Debug, PartialEq, Clone)]
    struct Twin {
        radius: u32,
    }

    impl Shaped for Twin {
        fn shape() -> Shape<Self> {
            Shape::object(
                ObjectShape::new("Twin")
                    .with(Property::new("radius", |t: &Twin| &t.radius).required())
                    .constructor(|slots| {
                        Ok(Twin {
                            radius: slots.take(0)?,
                        })
                    }),
            )
        }
    }

    #[derive(Debug, PartialEq, Clone)]
    enum Confusable {
        A(Circle),
        B(Twin),
    }

    impl Shaped for Confusable {
        fn shape() -> Shape<Self> {
            Shape::union(vec![
                UnionCaseShape::new(Confusable::A, |c: &Confusable| match c {
                    Confusable::A(v) => Some(v),
                    _ => None,
                }),
                UnionCaseShape::new(Confusable::B, |c: &Confusable| match c {
                    Confusable::B(v) => Some(v),
                    _ => None,
                }),
            ])
        }
    }

    let err = shapepack::to_vec(&Confusable::A(Circle { radius: 1 })).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotSupported);
    assert!(err.to_string().contains("distinguish"));
    Ok(())
}
