//! Byte plumbing: the segmented read window and the buffer-writer
//! protocol the wire codec sits on.

use std::borrow::Cow;

use bytes::BytesMut;

/// A read-only window over an ordered sequence of byte segments.
///
/// The cursor is `Copy`, so a decode attempt clones it, works on the
/// clone, and commits by assigning back. A failed attempt leaves the
/// original untouched, which is what makes the no-advance-on-failure
/// contract of the reader cheap to uphold.
#[derive(Clone, Copy, Debug)]
pub struct SegmentedBuf<'a> {
    head: &'a [u8],
    rest: &'a [&'a [u8]],
    consumed: u64,
}

impl<'a> SegmentedBuf<'a> {
    /// A window over one contiguous slice.
    pub fn new(bytes: &'a [u8]) -> Self {
        SegmentedBuf {
            head: bytes,
            rest: &[],
            consumed: 0,
        }
    }

    /// A window over a list of segments in order.
    pub fn from_segments(segments: &'a [&'a [u8]]) -> Self {
        match segments.split_first() {
            Some((head, rest)) => SegmentedBuf {
                head,
                rest,
                consumed: 0,
            },
            None => SegmentedBuf {
                head: &[],
                rest: &[],
                consumed: 0,
            },
        }
    }

    /// Total bytes consumed since the window was created.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Bytes left in the window.
    pub fn remaining(&self) -> usize {
        self.head.len() + self.rest.iter().map(|s| s.len()).sum::<usize>()
    }

    fn normalize(&mut self) {
        while self.head.is_empty() {
            match self.rest.split_first() {
                Some((head, rest)) => {
                    self.head = head;
                    self.rest = rest;
                }
                None => break,
            }
        }
    }

    /// The next byte, if any, without consuming it.
    pub fn peek(&self) -> Option<u8> {
        let mut cursor = *self;
        cursor.normalize();
        cursor.head.first().copied()
    }

    /// Consumes and returns one byte.
    pub fn read_u8(&mut self) -> Option<u8> {
        self.normalize();
        let (byte, tail) = self.head.split_first()?;
        self.head = tail;
        self.consumed += 1;
        Some(*byte)
    }

    /// Consumes exactly `N` bytes into an array, or consumes nothing.
    pub fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.remaining() < N {
            return None;
        }
        let mut out = [0u8; N];
        let filled = self.fill(&mut out);
        debug_assert_eq!(filled, N);
        Some(out)
    }

    /// Consumes exactly `n` bytes, borrowing when they sit in one segment
    /// and copying when they span a boundary. Consumes nothing on `None`.
    pub fn read_bytes(&mut self, n: usize) -> Option<Cow<'a, [u8]>> {
        if n == 0 {
            return Some(Cow::Borrowed(&[]));
        }
        if self.remaining() < n {
            return None;
        }
        self.normalize();
        if self.head.len() >= n {
            let (taken, tail) = self.head.split_at(n);
            self.head = tail;
            self.consumed += n as u64;
            return Some(Cow::Borrowed(taken));
        }
        let mut out = vec![0u8; n];
        let filled = self.fill(&mut out);
        debug_assert_eq!(filled, n);
        Some(Cow::Owned(out))
    }

    /// Advances past `n` bytes. Consumes nothing and reports `false` when
    /// fewer remain.
    pub fn skip(&mut self, n: usize) -> bool {
        if self.remaining() < n {
            return false;
        }
        let mut left = n;
        while left > 0 {
            self.normalize();
            let step = left.min(self.head.len());
            self.head = &self.head[step..];
            left -= step;
        }
        self.consumed += n as u64;
        true
    }

    /// Compares the front of the window against `needle` without
    /// consuming anything.
    pub fn starts_with(&self, needle: &[u8]) -> bool {
        if self.remaining() < needle.len() {
            return false;
        }
        let mut cursor = *self;
        let mut offset = 0;
        while offset < needle.len() {
            cursor.normalize();
            let step = (needle.len() - offset).min(cursor.head.len());
            if cursor.head[..step] != needle[offset..offset + step] {
                return false;
            }
            cursor.head = &cursor.head[step..];
            offset += step;
        }
        true
    }

    fn fill(&mut self, out: &mut [u8]) -> usize {
        let mut offset = 0;
        while offset < out.len() {
            self.normalize();
            if self.head.is_empty() {
                break;
            }
            let step = (out.len() - offset).min(self.head.len());
            out[offset..offset + step].copy_from_slice(&self.head[..step]);
            self.head = &self.head[step..];
            offset += step;
        }
        self.consumed += offset as u64;
        offset
    }
}

/// The memory-granting sink the wire writer emits into.
///
/// The contract mirrors span-based buffer writers: `span` hands out a
/// writable region of at least one byte (it may be shorter than the
/// hint), and `advance` commits how much of the last span was actually
/// written. `advance` must be called once per `span` before the next
/// request. A zero-length span is a protocol violation the writer turns
/// into an `InvalidOperation` error instead of spinning.
pub trait BufferWriter {
    /// Requests a writable region, sized at least one byte if the writer
    /// can grow at all.
    fn span(&mut self, size_hint: usize) -> &mut [u8];

    /// Commits `written` bytes of the most recent span.
    fn advance(&mut self, written: usize);
}

/// A growable [`BufferWriter`] backed by a `Vec<u8>`.
#[derive(Debug, Default)]
pub struct VecBufferWriter {
    buf: Vec<u8>,
    granted: usize,
}

impl VecBufferWriter {
    /// An empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finishes writing and takes the accumulated bytes.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.discard_grant();
        self.buf
    }

    /// Bytes committed so far.
    pub fn len(&self) -> usize {
        self.buf.len() - self.granted
    }

    /// Whether nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn discard_grant(&mut self) {
        let keep = self.buf.len() - self.granted;
        self.buf.truncate(keep);
        self.granted = 0;
    }
}

impl BufferWriter for VecBufferWriter {
    fn span(&mut self, size_hint: usize) -> &mut [u8] {
        self.discard_grant();
        let grant = size_hint.max(1);
        let start = self.buf.len();
        self.buf.resize(start + grant, 0);
        self.granted = grant;
        &mut self.buf[start..]
    }

    fn advance(&mut self, written: usize) {
        debug_assert!(written <= self.granted);
        let keep = self.buf.len() - self.granted + written;
        self.buf.truncate(keep);
        self.granted = 0;
    }
}

/// A growable [`BufferWriter`] backed by a [`bytes::BytesMut`].
#[derive(Debug, Default)]
pub struct BytesMutWriter {
    buf: BytesMut,
    granted: usize,
}

impl BytesMutWriter {
    /// An empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finishes writing and freezes the accumulated bytes.
    pub fn into_bytes(mut self) -> bytes::Bytes {
        let keep = self.buf.len() - self.granted;
        self.buf.truncate(keep);
        self.buf.freeze()
    }
}

impl BufferWriter for BytesMutWriter {
    fn span(&mut self, size_hint: usize) -> &mut [u8] {
        let keep = self.buf.len() - self.granted;
        self.buf.truncate(keep);
        let grant = size_hint.max(1);
        let start = self.buf.len();
        self.buf.resize(start + grant, 0);
        self.granted = grant;
        &mut self.buf[start..]
    }

    fn advance(&mut self, written: usize) {
        debug_assert!(written <= self.granted);
        let keep = self.buf.len() - self.granted + written;
        self.buf.truncate(keep);
        self.granted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_bytes_borrows_within_a_segment() {
        let segments: [&[u8]; 2] = [b"hello", b"world"];
        let mut buf = SegmentedBuf::from_segments(&segments);
        let taken = buf.read_bytes(5).unwrap();
        assert!(matches!(taken, Cow::Borrowed(_)));
        assert_eq!(&*taken, b"hello");
        assert_eq!(buf.consumed(), 5);
    }

    #[test]
    fn read_bytes_copies_across_segments() {
        let segments: [&[u8]; 2] = [b"hel", b"lo"];
        let mut buf = SegmentedBuf::from_segments(&segments);
        let taken = buf.read_bytes(5).unwrap();
        assert!(matches!(taken, Cow::Owned(_)));
        assert_eq!(&*taken, b"hello");
    }

    #[test]
    fn failed_read_consumes_nothing() {
        let mut buf = SegmentedBuf::new(b"ab");
        assert!(buf.read_bytes(3).is_none());
        assert_eq!(buf.consumed(), 0);
        assert_eq!(buf.remaining(), 2);
    }

    #[test]
    fn starts_with_spans_segments() {
        let segments: [&[u8]; 3] = [b"a", b"bc", b"d"];
        let buf = SegmentedBuf::from_segments(&segments);
        assert!(buf.starts_with(b"abcd"));
        assert!(!buf.starts_with(b"abce"));
        assert!(!buf.starts_with(b"abcde"));
    }

    #[test]
    fn vec_writer_commits_partial_spans() {
        let mut writer = VecBufferWriter::new();
        let span = writer.span(8);
        span[..3].copy_from_slice(b"abc");
        writer.advance(3);
        assert_eq!(writer.into_vec(), b"abc");
    }
}
