//! Pre-encoded short strings, typically property names.

use core::hash::{Hash, Hasher};

use crate::buffer::VecBufferWriter;
use crate::errors::{Error, ErrorCode};
use crate::reader::MsgPackReader;
use crate::writer::MsgPackWriter;

/// A short string cached together with its msgpack encoding.
///
/// The msgpack form is the string prefixed with its shortest valid length
/// header, derived from the text once at construction. Equality and hash
/// are defined on the text, so two instances built by different callers
/// compare equal.
#[derive(Clone, Debug)]
pub struct PreformattedString {
    text: Box<str>,
    msgpack: Box<[u8]>,
    header_len: u8,
}

impl PreformattedString {
    /// Encodes `text` once.
    pub fn new(text: impl Into<Box<str>>) -> Self {
        let text = text.into();
        let mut out = VecBufferWriter::new();
        MsgPackWriter::new(&mut out)
            .write_str(&text)
            .expect("encoding a property name into a vec cannot fail");
        let msgpack = out.into_vec().into_boxed_slice();
        let header_len = (msgpack.len() - text.len()) as u8;
        PreformattedString {
            text,
            msgpack,
            header_len,
        }
    }

    /// The text itself.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The UTF-8 payload without the length header.
    pub fn utf8_bytes(&self) -> &[u8] {
        &self.msgpack[self.header_len as usize..]
    }

    /// The full msgpack encoding, header included.
    pub fn msgpack_bytes(&self) -> &[u8] {
        &self.msgpack
    }

    /// Emits the cached encoding.
    pub fn write(&self, writer: &mut MsgPackWriter<'_>) -> Result<(), Error> {
        writer.write_raw(&self.msgpack)
    }

    /// Tests the reader's current string token against this text without
    /// decoding to a heap string, across segment boundaries. Consumes the
    /// token on a match and leaves the reader untouched otherwise.
    pub fn try_match(&self, reader: &mut MsgPackReader<'_>) -> Result<bool, Error> {
        // fast path: the writer's own shortest-form bytes
        if reader.window().starts_with(&self.msgpack) {
            let advanced = reader.advance_by(self.msgpack.len());
            debug_assert!(advanced);
            return Ok(true);
        }
        // slow path: any other valid encoding of the same text
        let mut probe = reader.clone();
        match probe.read_str_bytes() {
            Ok(bytes) if *bytes == *self.utf8_bytes() => {
                *reader = probe;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) if e.code() == ErrorCode::UnexpectedToken => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl PartialEq for PreformattedString {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for PreformattedString {}

impl Hash for PreformattedString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_derive_from_text() {
        let name = PreformattedString::new("first_name");
        assert_eq!(name.msgpack_bytes()[0], 0xaa);
        assert_eq!(name.utf8_bytes(), b"first_name");
    }

    #[test]
    fn try_match_accepts_non_minimal_encodings() {
        let name = PreformattedString::new("id");
        // str8 encoding of the same text
        let bytes = [0xd9, 0x02, b'i', b'd', 0xc0];
        let mut reader = MsgPackReader::new(&bytes);
        assert!(name.try_match(&mut reader).unwrap());
        reader.read_nil().unwrap();
    }

    #[test]
    fn try_match_leaves_mismatches_alone() {
        let name = PreformattedString::new("id");
        let bytes = [0xa2, b'n', b'o'];
        let mut reader = MsgPackReader::new(&bytes);
        assert!(!name.try_match(&mut reader).unwrap());
        assert_eq!(reader.consumed(), 0);
    }

    #[test]
    fn try_match_crosses_segments() {
        let name = PreformattedString::new("username");
        let segments: [&[u8]; 3] = [&[0xa8, b'u', b's'], b"ern", b"ame"];
        let mut reader = MsgPackReader::from_segments(&segments);
        assert!(name.try_match(&mut reader).unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn equality_is_on_text() {
        assert_eq!(
            PreformattedString::new("a"),
            PreformattedString::new(String::from("a"))
        );
    }
}
