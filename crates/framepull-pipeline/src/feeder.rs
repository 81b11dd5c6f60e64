//! In-order byte delivery from a transport to the container parser.

use std::io;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// A transport: file reader, HTTP body, or anything else yielding bytes in order.
pub type ByteSource = BoxStream<'static, io::Result<Bytes>>;

/// Pulls chunks from a [`ByteSource`] and tags each with its file offset.
///
/// [`ByteFeeder::next_chunk`] is cancel-safe: dropping the future before it
/// completes loses no bytes.
pub struct ByteFeeder {
    source: ByteSource,
    offset: u64,
    finished: bool,
}

impl ByteFeeder {
    pub fn new<S>(source: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            source: source.boxed(),
            offset: 0,
            finished: false,
        }
    }

    /// Feed from an async reader in chunks of at most `chunk_size` bytes.
    pub fn from_reader<R>(reader: R, chunk_size: usize) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::new(ReaderStream::with_capacity(reader, chunk_size.max(1)))
    }

    /// Feed an in-memory buffer, split into `chunk_size` pieces.
    pub fn from_bytes(data: Bytes, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let pieces: Vec<io::Result<Bytes>> = (0..data.len())
            .step_by(chunk_size)
            .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
            .collect();
        Self::new(stream::iter(pieces))
    }

    /// Next non-empty chunk and the file offset it starts at.
    ///
    /// `None` once the source is exhausted; an error also ends the feed.
    pub async fn next_chunk(&mut self) -> Option<io::Result<(Bytes, u64)>> {
        if self.finished {
            return None;
        }

        loop {
            match self.source.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => {
                    let offset = self.offset;
                    self.offset += chunk.len() as u64;
                    return Some(Ok((chunk, offset)));
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }

    /// Bytes delivered so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offsets_are_monotonic() {
        let mut feeder = ByteFeeder::from_bytes(Bytes::from_static(b"0123456789"), 4);

        let (a, off_a) = feeder.next_chunk().await.unwrap().unwrap();
        let (b, off_b) = feeder.next_chunk().await.unwrap().unwrap();
        let (c, off_c) = feeder.next_chunk().await.unwrap().unwrap();

        assert_eq!((&a[..], off_a), (&b"0123"[..], 0));
        assert_eq!((&b[..], off_b), (&b"4567"[..], 4));
        assert_eq!((&c[..], off_c), (&b"89"[..], 8));
        assert!(feeder.next_chunk().await.is_none());
        assert!(feeder.is_finished());
        assert_eq!(feeder.offset(), 10);
    }

    #[tokio::test]
    async fn test_empty_chunks_skipped() {
        let items = vec![
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"c")),
        ];
        let mut feeder = ByteFeeder::new(stream::iter(items));

        assert_eq!(feeder.next_chunk().await.unwrap().unwrap().1, 0);
        assert_eq!(feeder.next_chunk().await.unwrap().unwrap().1, 2);
        assert!(feeder.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn test_error_ends_feed() {
        let items = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"cd")),
        ];
        let mut feeder = ByteFeeder::new(stream::iter(items));

        assert!(feeder.next_chunk().await.unwrap().is_ok());
        let err = feeder.next_chunk().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(feeder.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn test_from_reader() {
        let data: &'static [u8] = b"hello world";
        let mut feeder = ByteFeeder::from_reader(data, 5);
        let mut total = Vec::new();
        while let Some(chunk) = feeder.next_chunk().await {
            let (bytes, offset) = chunk.unwrap();
            assert_eq!(offset as usize, total.len());
            total.extend_from_slice(&bytes);
        }
        assert_eq!(total, b"hello world");
    }
}
