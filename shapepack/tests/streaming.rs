use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use eyre::Result;
use shapepack::{
    BoxFut, ByteSource, CancellationToken, Converter, Error, ErrorCode, MsgPackReader,
    MsgPackWriter, ObjectShape, Property, SerializationContext, Serializer, SerializerOptions,
    Shape, Shaped, StreamingReader,
};

/// Hands out a fixed byte string in chunks of the given size.
struct ChunkedSource {
    chunks: Vec<Bytes>,
}

impl ChunkedSource {
    fn new(bytes: &[u8], chunk_size: usize) -> Self {
        let mut chunks: Vec<Bytes> = bytes
            .chunks(chunk_size.max(1))
            .map(Bytes::copy_from_slice)
            .collect();
        chunks.reverse();
        ChunkedSource { chunks }
    }
}

#[async_trait]
impl ByteSource for ChunkedSource {
    async fn fetch(&mut self) -> std::io::Result<Bytes> {
        Ok(self.chunks.pop().unwrap_or_default())
    }
}

/// A source that never produces anything.
struct StalledSource;

#[async_trait]
impl ByteSource for StalledSource {
    async fn fetch(&mut self) -> std::io::Result<Bytes> {
        std::future::pending().await
    }
}

#[derive(Debug, PartialEq, Clone)]
struct Message {
    seq: u64,
    body: String,
}

impl Shaped for Message {
    fn shape() -> Shape<Self> {
        Shape::object(
            ObjectShape::new("Message")
                .with(Property::new("seq", |m: &Message| &m.seq).required())
                .with(Property::new("body", |m: &Message| &m.body).required())
                .constructor(|slots| {
                    Ok(Message {
                        seq: slots.take(0)?,
                        body: slots.take(1)?,
                    })
                }),
        )
    }
}

#[tokio::test]
async fn a_fragmented_large_string_decodes_exactly() -> Result<()> {
    shapepack_testhelpers::setup();

    let original: String = "msgpack ".repeat(12_800); // 100 KiB
    let bytes = shapepack::to_vec(&original)?;

    for chunk_size in [333usize, 7333, 65_536] {
        let mut source = ChunkedSource::new(&bytes, chunk_size);
        let serializer = Serializer::with_options(
            SerializerOptions::default().with_max_async_buffer(1),
        );
        let back: String = serializer.deserialize_from_stream(&mut source).await?;
        assert_eq!(back, original, "chunk size {chunk_size}");
    }
    Ok(())
}

#[tokio::test]
async fn one_byte_fragments_still_decode() -> Result<()> {
    shapepack_testhelpers::setup();

    let original: String = "byte by byte ".repeat(100);
    let bytes = shapepack::to_vec(&original)?;
    let mut source = ChunkedSource::new(&bytes, 1);
    let serializer = Serializer::with_options(
        SerializerOptions::default().with_max_async_buffer(1),
    );
    let back: String = serializer.deserialize_from_stream(&mut source).await?;
    assert_eq!(back, original);
    Ok(())
}

#[tokio::test]
async fn streaming_reads_match_synchronous_reads() -> Result<()> {
    shapepack_testhelpers::setup();

    let messages: Vec<Message> = (0..50)
        .map(|i| Message {
            seq: i,
            body: format!("body number {i}"),
        })
        .collect();
    let bytes = shapepack::to_vec(&messages)?;

    let serializer = Serializer::with_options(
        SerializerOptions::default().with_max_async_buffer(16),
    );
    let mut source = ChunkedSource::new(&bytes, 11);
    let streamed: Vec<Message> = serializer.deserialize_from_stream(&mut source).await?;
    let synchronous: Vec<Message> = serializer.from_slice(&bytes)?;
    assert_eq!(streamed, synchronous);
    Ok(())
}

/// Counts how often each entry point runs, and opts into async.
struct ProbeConverter {
    sync_reads: Arc<AtomicUsize>,
    async_reads: Arc<AtomicUsize>,
}

impl Converter<u64> for ProbeConverter {
    fn write(
        &self,
        writer: &mut MsgPackWriter<'_>,
        value: &u64,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<(), Error> {
        writer.write_u64(*value)
    }

    fn read(
        &self,
        reader: &mut MsgPackReader<'_>,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<u64, Error> {
        self.sync_reads.fetch_add(1, Ordering::SeqCst);
        reader.read_u64()
    }

    fn prefers_async(&self) -> bool {
        true
    }

    fn read_async<'a>(
        &'a self,
        reader: &'a mut StreamingReader<'_>,
        _ctx: &'a mut SerializationContext<'_>,
    ) -> BoxFut<'a, Result<u64, Error>> {
        self.async_reads.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            reader.ensure_next_value().await?;
            reader.with_buffered(|r| reader_free_read(r))
        })
    }
}

fn reader_free_read(reader: &mut MsgPackReader<'_>) -> Result<u64, Error> {
    reader.read_u64()
}

#[tokio::test]
async fn a_small_buffer_threshold_takes_the_async_path() -> Result<()> {
    shapepack_testhelpers::setup();

    let async_reads = Arc::new(AtomicUsize::new(0));
    let probe = ProbeConverter {
        sync_reads: Arc::new(AtomicUsize::new(0)),
        async_reads: async_reads.clone(),
    };
    let serializer = Serializer::with_options(
        SerializerOptions::default()
            .with_max_async_buffer(1)
            .with_converter::<u64>(Arc::new(probe)),
    );

    let values: Vec<u64> = (0..64).collect();
    let bytes = serializer.to_vec(&values)?;
    let mut source = ChunkedSource::new(&bytes, 3);
    let back: Vec<u64> = serializer.deserialize_from_stream(&mut source).await?;
    assert_eq!(back, values);
    assert!(
        async_reads.load(Ordering::SeqCst) >= 1,
        "the async entry point never ran"
    );
    Ok(())
}

#[tokio::test]
async fn a_buffer_threshold_covering_the_payload_stays_synchronous() -> Result<()> {
    shapepack_testhelpers::setup();

    let async_reads = Arc::new(AtomicUsize::new(0));
    let sync_reads = Arc::new(AtomicUsize::new(0));
    let probe = ProbeConverter {
        sync_reads: sync_reads.clone(),
        async_reads: async_reads.clone(),
    };
    let serializer = Serializer::with_options(
        SerializerOptions::default()
            .with_max_async_buffer(1 << 20)
            .with_converter::<u64>(Arc::new(probe)),
    );

    let values: Vec<u64> = (0..64).collect();
    let bytes = serializer.to_vec(&values)?;
    let mut source = ChunkedSource::new(&bytes, 3);
    let back: Vec<u64> = serializer.deserialize_from_stream(&mut source).await?;
    assert_eq!(back, values);
    assert_eq!(async_reads.load(Ordering::SeqCst), 0);
    assert!(sync_reads.load(Ordering::SeqCst) >= 64);
    Ok(())
}

#[tokio::test]
async fn cancellation_interrupts_a_stalled_stream() -> Result<()> {
    shapepack_testhelpers::setup();

    let serializer = Serializer::new();
    let token = CancellationToken::new();
    let mut source = StalledSource;

    let pending = serializer
        .deserialize_from_stream_with_cancellation::<Message>(&mut source, token.clone());
    tokio::pin!(pending);

    // let the read reach its suspension, then pull the plug
    tokio::select! {
        _ = &mut pending => panic!("the stalled stream completed"),
        _ = tokio::task::yield_now() => {}
    }
    token.cancel();
    let err = pending.await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Cancelled);
    Ok(())
}

#[tokio::test]
async fn a_clean_empty_stream_reports_empty_buffer() -> Result<()> {
    shapepack_testhelpers::setup();

    let mut source = ChunkedSource::new(&[], 1);
    let serializer = Serializer::new();
    let err = serializer
        .deserialize_from_stream::<Message>(&mut source)
        .await
        .unwrap_err();
    // the whole (empty) stream was buffered, so the sync path reports it
    assert_eq!(err.code(), ErrorCode::Unspecified);
    Ok(())
}

#[tokio::test]
async fn async_read_adapters_work_end_to_end() -> Result<()> {
    shapepack_testhelpers::setup();

    let message = Message {
        seq: 42,
        body: "over a duplex pipe".to_string(),
    };
    let serializer = Serializer::new();

    let (mut client, server) = tokio::io::duplex(64);
    let bytes = serializer.to_vec(&message)?;
    let writer = tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        for chunk in bytes.chunks(5) {
            client.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    let back: Message = serializer.from_async_read(server).await?;
    writer.await?;
    assert_eq!(back, message);
    Ok(())
}
