use eyre::Result;
use serde::Serialize;
use shapepack::{
    ErrorCode, ErrorKind, NamingPolicy, ObjectShape, Property, Serializer, SerializerOptions,
    Shape, Shaped,
};

#[derive(Debug, PartialEq, Clone, Serialize)]
struct Person {
    first_name: String,
    last_name: String,
}

impl Shaped for Person {
    fn shape() -> Shape<Self> {
        Shape::object(
            ObjectShape::new("Person")
                .with(
                    Property::new("FirstName", |p: &Person| &p.first_name)
                        .rename("first_name")
                        .required(),
                )
                .with(
                    Property::new("LastName", |p: &Person| &p.last_name)
                        .rename("last_name")
                        .required(),
                )
                .constructor(|slots| {
                    Ok(Person {
                        first_name: slots.take(0)?,
                        last_name: slots.take(1)?,
                    })
                }),
        )
    }
}

#[test]
fn person_serializes_to_the_documented_bytes() -> Result<()> {
    shapepack_testhelpers::setup();

    let person = Person {
        first_name: "Andrew".to_string(),
        last_name: "Arnott".to_string(),
    };
    let bytes = shapepack::to_vec(&person)?;
    let expected = [
        0x82, // fixmap with 2 entries
        0xaa, // fixstr with length 10
        b'f', b'i', b'r', b's', b't', b'_', b'n', b'a', b'm', b'e',
        0xa6, // fixstr with length 6
        b'A', b'n', b'd', b'r', b'e', b'w',
        0xa9, // fixstr with length 9
        b'l', b'a', b's', b't', b'_', b'n', b'a', b'm', b'e',
        0xa6, // fixstr with length 6
        b'A', b'r', b'n', b'o', b't', b't',
    ];
    assert_eq!(bytes, expected);
    assert_eq!(shapepack::from_slice::<Person>(&bytes)?, person);
    Ok(())
}

#[test]
fn map_protocol_matches_rmp_serde() -> Result<()> {
    shapepack_testhelpers::setup();

    #[derive(Debug, PartialEq, Serialize)]
    struct Simple {
        a: u32,
        b: String,
        c: bool,
    }

    impl Shaped for Simple {
        fn shape() -> Shape<Self> {
            Shape::object(
                ObjectShape::new("Simple")
                    .with(Property::new("a", |s: &Simple| &s.a).required())
                    .with(Property::new("b", |s: &Simple| &s.b).required())
                    .with(Property::new("c", |s: &Simple| &s.c).required())
                    .constructor(|slots| {
                        Ok(Simple {
                            a: slots.take(0)?,
                            b: slots.take(1)?,
                            c: slots.take(2)?,
                        })
                    }),
            )
        }
    }

    let value = Simple {
        a: 123,
        b: "hello".to_string(),
        c: true,
    };
    let mut reference = Vec::new();
    let mut serializer = rmp_serde::Serializer::new(&mut reference).with_struct_map();
    value.serialize(&mut serializer)?;

    assert_eq!(shapepack::to_vec(&value)?, reference);
    Ok(())
}

#[test]
fn missing_required_property_names_the_property() -> Result<()> {
    shapepack_testhelpers::setup();

    // {"first_name": "Ada"}
    let bytes = [
        0x81, 0xaa, b'f', b'i', b'r', b's', b't', b'_', b'n', b'a', b'm', b'e', 0xa3, b'A',
        b'd', b'a',
    ];
    let err = shapepack::from_slice::<Person>(&bytes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingRequiredProperty);
    match err.kind() {
        ErrorKind::MissingRequiredProperty(name) => assert_eq!(&**name, "last_name"),
        other => panic!("unexpected kind {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_keys_are_skipped_including_nested_structures() -> Result<()> {
    shapepack_testhelpers::setup();

    let mut bytes = vec![0x83]; // three entries
    // "junk": a deeply nested array the reader has never heard of
    bytes.extend_from_slice(&[0xa4, b'j', b'u', b'n', b'k']);
    for _ in 0..1000 {
        bytes.push(0x91); // single-element array
    }
    bytes.push(0xc0);
    // "first_name": "Ada"
    bytes.extend_from_slice(&[
        0xaa, b'f', b'i', b'r', b's', b't', b'_', b'n', b'a', b'm', b'e', 0xa3, b'A', b'd',
        b'a',
    ]);
    // "last_name": "Lovelace"
    bytes.extend_from_slice(&[
        0xa9, b'l', b'a', b's', b't', b'_', b'n', b'a', b'm', b'e', 0xa8, b'L', b'o', b'v',
        b'e', b'l', b'a', b'c', b'e',
    ]);

    let person = shapepack::from_slice::<Person>(&bytes)?;
    assert_eq!(person.first_name, "Ada");
    assert_eq!(person.last_name, "Lovelace");
    Ok(())
}

#[test]
fn duplicate_keys_follow_the_configured_policy() -> Result<()> {
    shapepack_testhelpers::setup();

    // {"first_name": "Ada", "first_name": "Grace", "last_name": "x"}
    let mut bytes = vec![0x83];
    bytes.extend_from_slice(&[
        0xaa, b'f', b'i', b'r', b's', b't', b'_', b'n', b'a', b'm', b'e', 0xa3, b'A', b'd',
        b'a',
    ]);
    bytes.extend_from_slice(&[
        0xaa, b'f', b'i', b'r', b's', b't', b'_', b'n', b'a', b'm', b'e', 0xa5, b'G', b'r',
        b'a', b'c', b'e',
    ]);
    bytes.extend_from_slice(&[
        0xa9, b'l', b'a', b's', b't', b'_', b'n', b'a', b'm', b'e', 0xa1, b'x',
    ]);

    // last wins by default
    let person = shapepack::from_slice::<Person>(&bytes)?;
    assert_eq!(person.first_name, "Grace");

    let strict = Serializer::with_options(
        SerializerOptions::default().with_reject_duplicate_keys(true),
    );
    let err = strict.from_slice::<Person>(&bytes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateProperty);
    Ok(())
}

#[test]
fn naming_policy_applies_to_undeclared_names() -> Result<()> {
    shapepack_testhelpers::setup();

    #[derive(Debug, PartialEq)]
    struct Link {
        url_value: String,
    }

    impl Shaped for Link {
        fn shape() -> Shape<Self> {
            Shape::object(
                ObjectShape::new("Link")
                    .with(Property::new("URLValue", |l: &Link| &l.url_value).required())
                    .constructor(|slots| {
                        Ok(Link {
                            url_value: slots.take(0)?,
                        })
                    }),
            )
        }
    }

    let camel = Serializer::with_options(
        SerializerOptions::default().with_naming_policy(NamingPolicy::CamelCase),
    );
    let link = Link {
        url_value: "x".to_string(),
    };
    let bytes = camel.to_vec(&link)?;
    // fixmap(1), fixstr "urlValue"
    assert_eq!(&bytes[..10], &[0x81, 0xa8, b'u', b'r', b'l', b'V', b'a', b'l', b'u', b'e']);
    assert_eq!(camel.from_slice::<Link>(&bytes)?, link);

    // a differently-configured serializer does not accept the camel name
    let identity = Serializer::new();
    let err = identity.from_slice::<Link>(&bytes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingRequiredProperty);
    Ok(())
}

#[test]
fn declared_defaults_fill_omitted_properties() -> Result<()> {
    shapepack_testhelpers::setup();

    #[derive(Debug, PartialEq)]
    struct Settings {
        name: String,
        retries: u32,
    }

    impl Shaped for Settings {
        fn shape() -> Shape<Self> {
            Shape::object(
                ObjectShape::new("Settings")
                    .with(Property::new("name", |s: &Settings| &s.name).required())
                    .with(
                        Property::new("retries", |s: &Settings| &s.retries)
                            .with_default(|| 3),
                    )
                    .constructor(|slots| {
                        Ok(Settings {
                            name: slots.take(0)?,
                            retries: slots.take(1)?,
                        })
                    }),
            )
        }
    }

    // {"name": "a"}
    let bytes = [0x81, 0xa4, b'n', b'a', b'm', b'e', 0xa1, b'a'];
    let settings = shapepack::from_slice::<Settings>(&bytes)?;
    assert_eq!(settings.retries, 3);

    // defaults are emitted unless the options say otherwise
    let emitted = shapepack::to_vec(&settings)?;
    assert_eq!(emitted[0], 0x82);

    let lean = Serializer::with_options(
        SerializerOptions::default().with_serialize_default_values(false),
    );
    let skipped = lean.to_vec(&settings)?;
    assert_eq!(skipped[0], 0x81);
    assert_eq!(lean.from_slice::<Settings>(&skipped)?, settings);
    Ok(())
}

#[test]
fn ignored_properties_never_reach_the_wire() -> Result<()> {
    shapepack_testhelpers::setup();

    #[derive(Debug, PartialEq)]
    struct Cached {
        id: u64,
        scratch: String,
    }

    impl Shaped for Cached {
        fn shape() -> Shape<Self> {
            Shape::object(
                ObjectShape::new("Cached")
                    .with(Property::new("id", |c: &Cached| &c.id).required())
                    .with(Property::new("scratch", |c: &Cached| &c.scratch).ignored())
                    .constructor(|slots| {
                        Ok(Cached {
                            id: slots.take(0)?,
                            scratch: slots.take_or_default(1)?,
                        })
                    }),
            )
        }
    }

    let value = Cached {
        id: 9,
        scratch: "do not send".to_string(),
    };
    let bytes = shapepack::to_vec(&value)?;
    assert_eq!(bytes, [0x81, 0xa2, b'i', b'd', 0x09]);
    let back = shapepack::from_slice::<Cached>(&bytes)?;
    assert_eq!(back.scratch, "");
    Ok(())
}

#[test]
fn error_paths_name_the_failing_property() -> Result<()> {
    shapepack_testhelpers::setup();

    #[derive(Debug, PartialEq)]
    struct Outer {
        people: Vec<Person>,
    }

    impl Shaped for Outer {
        fn shape() -> Shape<Self> {
            Shape::object(
                ObjectShape::new("Outer")
                    .with(Property::new("people", |o: &Outer| &o.people).required())
                    .constructor(|slots| {
                        Ok(Outer {
                            people: slots.take(0)?,
                        })
                    }),
            )
        }
    }

    // {"people": [{"first_name": 7, ...}]} - a number where a string belongs
    let mut bytes = vec![0x81, 0xa6, b'p', b'e', b'o', b'p', b'l', b'e', 0x91, 0x82];
    bytes.extend_from_slice(&[
        0xaa, b'f', b'i', b'r', b's', b't', b'_', b'n', b'a', b'm', b'e', 0x07,
    ]);
    bytes.extend_from_slice(&[
        0xa9, b'l', b'a', b's', b't', b'_', b'n', b'a', b'm', b'e', 0xa1, b'x',
    ]);

    let err = shapepack::from_slice::<Outer>(&bytes).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnexpectedToken);
    assert_eq!(err.path(), "$.people[0].first_name");
    Ok(())
}
