//! Property-name normalization policies.

use std::borrow::Cow;

/// How member names become wire names when a property declares no
/// explicit name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NamingPolicy {
    /// Member names pass through untouched.
    #[default]
    Identity,
    /// Lowercases the leading run of uppercase letters, keeping the run's
    /// final letter uppercase when a lowercase letter follows it:
    /// `URLValue` becomes `urlValue`, `URL` becomes `url`, `MyURL`
    /// becomes `myURL`.
    CamelCase,
    /// Uppercases the first code point only.
    PascalCase,
}

impl NamingPolicy {
    /// Applies the policy. Spaces and non-letters pass through; empty
    /// input passes through.
    pub fn apply<'s>(&self, name: &'s str) -> Cow<'s, str> {
        match self {
            NamingPolicy::Identity => Cow::Borrowed(name),
            NamingPolicy::CamelCase => camel_case(name),
            NamingPolicy::PascalCase => pascal_case(name),
        }
    }
}

fn camel_case(name: &str) -> Cow<'_, str> {
    // find the end of the run to lowercase
    let mut end = 0;
    for (i, ch) in name.char_indices() {
        if !ch.is_uppercase() {
            break;
        }
        if i > 0 {
            let next = name[i + ch.len_utf8()..].chars().next();
            if matches!(next, Some(c) if c.is_lowercase()) {
                break;
            }
        }
        end = i + ch.len_utf8();
    }
    if end == 0 {
        return Cow::Borrowed(name);
    }
    let mut out = String::with_capacity(name.len());
    for ch in name[..end].chars() {
        out.extend(ch.to_lowercase());
    }
    out.push_str(&name[end..]);
    Cow::Owned(out)
}

fn pascal_case(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if !first.is_uppercase() => {
            let mut out = String::with_capacity(name.len());
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            Cow::Owned(out)
        }
        _ => Cow::Borrowed(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_table() {
        let policy = NamingPolicy::CamelCase;
        for (input, expected) in [
            ("URLValue", "urlValue"),
            ("URL", "url"),
            ("MyURL", "myURL"),
            ("FirstName", "firstName"),
            ("first_name", "first_name"),
            ("A", "a"),
            ("ABCDe", "abcDe"),
            ("X Y", "x Y"),
            ("", ""),
        ] {
            assert_eq!(policy.apply(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn pascal_case_table() {
        let policy = NamingPolicy::PascalCase;
        for (input, expected) in [
            ("firstName", "FirstName"),
            ("first name", "First name"),
            ("URL", "URL"),
            ("", ""),
        ] {
            assert_eq!(policy.apply(input), expected, "input {input:?}");
        }
    }
}
