//! A debugging pretty-printer: msgpack in, JSON text out.

use core::fmt;

use crate::errors::{Error, ErrorKind};
use crate::reader::{MsgPackReader, Token};

const JSON_MAX_DEPTH: u32 = 128;

/// Formatting options for [`convert_to_json`].
#[derive(Clone, Copy, Debug)]
pub struct JsonOptions {
    /// Newlines and indentation, on by default.
    pub pretty: bool,
    /// Spaces per indent level.
    pub indent_width: usize,
}

impl Default for JsonOptions {
    fn default() -> Self {
        JsonOptions {
            pretty: true,
            indent_width: 2,
        }
    }
}

/// Reads one msgpack value and renders it as JSON for human eyes.
///
/// Extensions render as `{"$ext": code, "data": "base16:…"}`, timestamps
/// as `{"$timestamp": {"secs": …, "nanos": …}}`, binary as a
/// `"base16:…"` string, and non-string map keys as their quoted text.
/// This is a debugging aid, not a wire-compatible JSON codec.
pub fn convert_to_json(
    reader: &mut MsgPackReader<'_>,
    out: &mut dyn fmt::Write,
    options: &JsonOptions,
) -> Result<(), Error> {
    write_value(reader, out, options, 0)
}

fn fmt_err(_: fmt::Error) -> Error {
    Error::msg("the output formatter failed")
}

fn newline(
    out: &mut dyn fmt::Write,
    options: &JsonOptions,
    depth: u32,
) -> Result<(), Error> {
    if options.pretty {
        out.write_char('\n').map_err(fmt_err)?;
        for _ in 0..(depth as usize * options.indent_width) {
            out.write_char(' ').map_err(fmt_err)?;
        }
    }
    Ok(())
}

fn write_value(
    reader: &mut MsgPackReader<'_>,
    out: &mut dyn fmt::Write,
    options: &JsonOptions,
    depth: u32,
) -> Result<(), Error> {
    if depth >= JSON_MAX_DEPTH {
        return Err(Error::new(ErrorKind::DepthLimitExceeded {
            max: JSON_MAX_DEPTH,
        }));
    }
    match reader.read_token()? {
        Token::Nil => out.write_str("null").map_err(fmt_err),
        Token::Bool(true) => out.write_str("true").map_err(fmt_err),
        Token::Bool(false) => out.write_str("false").map_err(fmt_err),
        Token::UInt(u) => write!(out, "{u}").map_err(fmt_err),
        Token::SInt(s) => write!(out, "{s}").map_err(fmt_err),
        Token::F32(f) => write_float(out, f as f64),
        Token::F64(f) => write_float(out, f),
        Token::Str(s) => write_json_string(out, &s),
        Token::Bin(b) => {
            out.write_str("\"base16:").map_err(fmt_err)?;
            for byte in b.iter() {
                write!(out, "{byte:02x}").map_err(fmt_err)?;
            }
            out.write_char('"').map_err(fmt_err)
        }
        Token::ArrayHeader(len) => {
            out.write_char('[').map_err(fmt_err)?;
            for i in 0..len {
                if i > 0 {
                    out.write_char(',').map_err(fmt_err)?;
                }
                newline(out, options, depth + 1)?;
                write_value(reader, out, options, depth + 1)?;
            }
            if len > 0 {
                newline(out, options, depth)?;
            }
            out.write_char(']').map_err(fmt_err)
        }
        Token::MapHeader(len) => {
            out.write_char('{').map_err(fmt_err)?;
            for i in 0..len {
                if i > 0 {
                    out.write_char(',').map_err(fmt_err)?;
                }
                newline(out, options, depth + 1)?;
                write_key(reader, out)?;
                out.write_char(':').map_err(fmt_err)?;
                if options.pretty {
                    out.write_char(' ').map_err(fmt_err)?;
                }
                write_value(reader, out, options, depth + 1)?;
            }
            if len > 0 {
                newline(out, options, depth)?;
            }
            out.write_char('}').map_err(fmt_err)
        }
        Token::Ext { code, data } => {
            write!(out, "{{\"$ext\": {code}, \"data\": \"base16:").map_err(fmt_err)?;
            for byte in data.iter() {
                write!(out, "{byte:02x}").map_err(fmt_err)?;
            }
            out.write_str("\"}").map_err(fmt_err)
        }
        Token::Timestamp(ts) => write!(
            out,
            "{{\"$timestamp\": {{\"secs\": {}, \"nanos\": {}}}}}",
            ts.seconds(),
            ts.nanoseconds()
        )
        .map_err(fmt_err),
    }
}

/// JSON object keys must be strings; everything else renders as its
/// quoted text.
fn write_key(reader: &mut MsgPackReader<'_>, out: &mut dyn fmt::Write) -> Result<(), Error> {
    match reader.read_token()? {
        Token::Str(s) => write_json_string(out, &s),
        Token::UInt(u) => write!(out, "\"{u}\"").map_err(fmt_err),
        Token::SInt(s) => write!(out, "\"{s}\"").map_err(fmt_err),
        Token::Bool(b) => write!(out, "\"{b}\"").map_err(fmt_err),
        Token::Nil => out.write_str("\"null\"").map_err(fmt_err),
        Token::ArrayHeader(len) => {
            for _ in 0..len {
                reader.skip_value()?;
            }
            out.write_str("\"<array key>\"").map_err(fmt_err)
        }
        Token::MapHeader(len) => {
            for _ in 0..2 * len {
                reader.skip_value()?;
            }
            out.write_str("\"<map key>\"").map_err(fmt_err)
        }
        other => write!(out, "{:?}", format!("{other:?}")).map_err(fmt_err),
    }
}

fn write_float(out: &mut dyn fmt::Write, value: f64) -> Result<(), Error> {
    if value.is_finite() {
        if value == value.trunc() && value.abs() < 1e15 {
            write!(out, "{value:.1}").map_err(fmt_err)
        } else {
            write!(out, "{value}").map_err(fmt_err)
        }
    } else {
        // not representable in JSON; quote it
        write!(out, "\"{value}\"").map_err(fmt_err)
    }
}

fn write_json_string(out: &mut dyn fmt::Write, text: &str) -> Result<(), Error> {
    out.write_char('"').map_err(fmt_err)?;
    for ch in text.chars() {
        match ch {
            '"' => out.write_str("\\\"").map_err(fmt_err)?,
            '\\' => out.write_str("\\\\").map_err(fmt_err)?,
            '\n' => out.write_str("\\n").map_err(fmt_err)?,
            '\r' => out.write_str("\\r").map_err(fmt_err)?,
            '\t' => out.write_str("\\t").map_err(fmt_err)?,
            c if (c as u32) < 0x20 => {
                write!(out, "\\u{:04x}", c as u32).map_err(fmt_err)?
            }
            c => out.write_char(c).map_err(fmt_err)?,
        }
    }
    out.write_char('"').map_err(fmt_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_map_compactly() {
        // {"a": 1, "b": [true, nil]}
        let bytes = [
            0x82, 0xa1, b'a', 0x01, 0xa1, b'b', 0x92, 0xc3, 0xc0,
        ];
        let mut reader = MsgPackReader::new(&bytes);
        let mut out = String::new();
        let options = JsonOptions {
            pretty: false,
            indent_width: 0,
        };
        convert_to_json(&mut reader, &mut out, &options).unwrap();
        assert_eq!(out, r#"{"a":1,"b":[true,null]}"#);
    }

    #[test]
    fn renders_integer_keys_as_quoted_text() {
        // {45: true}
        let bytes = [0x81, 0x2d, 0xc3];
        let mut reader = MsgPackReader::new(&bytes);
        let mut out = String::new();
        let options = JsonOptions {
            pretty: false,
            indent_width: 0,
        };
        convert_to_json(&mut reader, &mut out, &options).unwrap();
        assert_eq!(out, r#"{"45":true}"#);
    }
}
