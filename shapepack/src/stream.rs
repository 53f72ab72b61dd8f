//! The async streaming layer: a pull-model byte source plus a reader
//! that suspends between tokens when bytes run out.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::errors::{Error, ErrorCode};
use crate::reader::MsgPackReader;

/// A pull-model source of bytes for the streaming reader.
#[async_trait]
pub trait ByteSource: Send {
    /// Fetches the next chunk. An empty chunk means the source is
    /// exhausted.
    async fn fetch(&mut self) -> std::io::Result<Bytes>;
}

/// Adapts any `AsyncRead` into a [`ByteSource`].
pub struct AsyncReadSource<R> {
    inner: R,
    chunk: usize,
}

impl<R> AsyncReadSource<R> {
    /// Wraps `inner` with the default chunk size.
    pub fn new(inner: R) -> Self {
        AsyncReadSource {
            inner,
            chunk: 8 * 1024,
        }
    }

    /// Wraps `inner`, fetching up to `chunk` bytes at a time.
    pub fn with_chunk_size(inner: R, chunk: usize) -> Self {
        AsyncReadSource {
            inner,
            chunk: chunk.max(1),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ByteSource for AsyncReadSource<R> {
    async fn fetch(&mut self) -> std::io::Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.chunk);
        self.inner.read_buf(&mut buf).await?;
        Ok(buf.freeze())
    }
}

/// A reader over an async byte source.
///
/// Decode attempts run synchronously over the buffered segments; a result
/// of `InsufficientBuffer` rewinds to the attempt's start, awaits more
/// bytes, and retries the whole attempt, so suspension only ever happens
/// between logical tokens and the sequence of reads equals what a
/// synchronous reader would produce on the concatenated stream. Fetched
/// buffers are owned by the reader and released as they are consumed.
pub struct StreamingReader<'src> {
    source: &'src mut dyn ByteSource,
    segments: VecDeque<Bytes>,
    consumed: u64,
    trimmed: u64,
    eof: bool,
    cancel: CancellationToken,
}

impl<'src> StreamingReader<'src> {
    /// A reader with no cancellation.
    pub fn new(source: &'src mut dyn ByteSource) -> Self {
        Self::with_cancellation(source, CancellationToken::new())
    }

    /// A reader observing `cancel` at every suspension.
    pub fn with_cancellation(source: &'src mut dyn ByteSource, cancel: CancellationToken) -> Self {
        StreamingReader {
            source,
            segments: VecDeque::new(),
            consumed: 0,
            trimmed: 0,
            eof: false,
            cancel,
        }
    }

    /// Bytes fetched but not yet consumed.
    pub fn buffered_remaining(&self) -> usize {
        let total: usize = self.segments.iter().map(|s| s.len()).sum();
        total - (self.consumed - self.trimmed) as usize
    }

    /// Whether the source has reported end of input.
    pub fn source_exhausted(&self) -> bool {
        self.eof
    }

    /// The token cancelling this reader.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn trim(&mut self) {
        while let Some(first) = self.segments.front() {
            let len = first.len() as u64;
            if self.trimmed + len <= self.consumed {
                self.trimmed += len;
                self.segments.pop_front();
            } else {
                break;
            }
        }
    }

    /// Runs a synchronous decode over the buffered segments, committing
    /// however far it advanced.
    pub fn with_buffered<R>(
        &mut self,
        f: impl FnOnce(&mut MsgPackReader<'_>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        self.trim();
        let offset = (self.consumed - self.trimmed) as usize;
        let views: Vec<&[u8]> = self
            .segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                if i == 0 {
                    &segment[offset.min(segment.len())..]
                } else {
                    &segment[..]
                }
            })
            .collect();
        let mut reader = MsgPackReader::from_segments(&views);
        let result = f(&mut reader);
        self.consumed += reader.consumed();
        result
    }

    /// Awaits one more chunk. Reports `false` once the source is
    /// exhausted.
    pub async fn fetch_more(&mut self) -> Result<bool, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        if self.eof {
            return Ok(false);
        }
        let chunk = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::cancelled()),
            fetched = self.source.fetch() => fetched?,
        };
        if chunk.is_empty() {
            trace!("byte source exhausted after {} bytes", self.trimmed);
            self.eof = true;
            Ok(false)
        } else {
            trace!("fetched {} more bytes", chunk.len());
            self.segments.push_back(chunk);
            Ok(true)
        }
    }

    /// Runs a decode, rewinding and fetching more input for as long as it
    /// reports a buffer shortage.
    pub async fn decode<R>(
        &mut self,
        op: impl Fn(&mut MsgPackReader<'_>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        loop {
            let checkpoint = self.consumed;
            match self.with_buffered(&op) {
                Err(e)
                    if matches!(
                        e.code(),
                        ErrorCode::InsufficientBuffer | ErrorCode::EmptyBuffer
                    ) =>
                {
                    self.consumed = checkpoint;
                    if e.code() == ErrorCode::EmptyBuffer
                        && self.eof
                        && self.buffered_remaining() == 0
                    {
                        // a clean end of input
                        return Err(e);
                    }
                    if !self.fetch_more().await? {
                        return Err(e.for_complete_sequence());
                    }
                }
                other => return other,
            }
        }
    }

    /// Buffers until the next whole value is present, without consuming
    /// it.
    pub async fn ensure_next_value(&mut self) -> Result<(), Error> {
        self.decode(|r| {
            let mut probe = r.clone();
            probe.skip_value()
        })
        .await
    }

    /// Buffers ahead until more than `threshold` bytes are pending or the
    /// source runs dry.
    pub(crate) async fn prime(&mut self, threshold: usize) -> Result<(), Error> {
        while self.buffered_remaining() <= threshold {
            if !self.fetch_more().await? {
                break;
            }
        }
        Ok(())
    }
}
