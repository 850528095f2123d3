//! Chunked processing of large in-memory collections.
//!
//! CPU-bound transforms over long lists (sorting, grouping, comparison) are
//! split into bounded slices. Between slices the task yields back to the
//! scheduler so that other queued work, such as a foreground fetch
//! completing, can run before the next slice starts.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::ChunkingSettings;
use std::future::Future;
use tracing::trace;

/// Splits work into slices of at most `chunk_size` items.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedProcessor {
    chunk_size: usize,
}

impl Default for ChunkedProcessor {
    fn default() -> Self {
        Self::from(&ChunkingSettings::default())
    }
}

impl From<&ChunkingSettings> for ChunkedProcessor {
    fn from(settings: &ChunkingSettings) -> Self {
        Self::new(settings.chunk_size)
    }
}

impl ChunkedProcessor {
    /// A chunk size of zero is treated as one.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run an async `transform` over consecutive slices of `items`.
    ///
    /// Each slice is awaited before the next one starts, and the task yields
    /// between slices (never after the last one). Results are concatenated in
    /// input order. The first failing slice aborts the whole call and its
    /// error is returned; results of earlier slices are dropped.
    pub async fn process<T, R, E, F, Fut>(&self, items: Vec<T>, mut transform: F) -> Result<Vec<R>, E>
    where
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<Vec<R>, E>>,
    {
        let mut output = Vec::with_capacity(items.len());
        let mut remaining = items.into_iter().peekable();
        let mut index = 0usize;

        while remaining.peek().is_some() {
            let chunk: Vec<T> = remaining.by_ref().take(self.chunk_size).collect();
            trace!("processing chunk {} ({} items)", index, chunk.len());
            output.extend(transform(chunk).await?);
            index += 1;

            if remaining.peek().is_some() {
                tokio::task::yield_now().await;
            }
        }

        Ok(output)
    }

    /// Synchronous variant: `transform` sees each slice by reference.
    pub async fn map<T, R, E, F>(&self, items: &[T], mut transform: F) -> Result<Vec<R>, E>
    where
        F: FnMut(&[T]) -> Result<Vec<R>, E>,
    {
        let mut output = Vec::with_capacity(items.len());
        let mut chunks = items.chunks(self.chunk_size).peekable();

        while let Some(chunk) = chunks.next() {
            output.extend(transform(chunk)?);
            if chunks.peek().is_some() {
                tokio::task::yield_now().await;
            }
        }

        Ok(output)
    }
}

/// Convenience wrapper around [`ChunkedProcessor::process`].
pub async fn process_in_chunks<T, R, E, F, Fut>(
    items: Vec<T>,
    transform: F,
    chunk_size: usize,
) -> Result<Vec<R>, E>
where
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = Result<Vec<R>, E>>,
{
    ChunkedProcessor::new(chunk_size).process(items, transform).await
}

/// Whether a list of `item_count` rows should be rendered virtualized.
pub fn should_virtualize(item_count: usize, threshold: usize) -> bool {
    item_count > threshold
}
