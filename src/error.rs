use std::io;

use thiserror::Error;

/// Failures reported by a [`PageSource`](crate::PageSource).
#[derive(Error, Debug)]
pub enum PageSourceError {
  #[error("mmap of {size} bytes failed: {source}")]
  MapFailed {
    size: usize,
    #[source]
    source: io::Error,
  },

  #[error("page source exhausted after {limit} chunks")]
  Exhausted { limit: usize },
}

/// Rejected [`HeapConfig`](crate::HeapConfig) values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  #[error("chunk size {0} is not a multiple of the allocation granularity")]
  ChunkSize(usize),

  #[error("max object size {0} must be a non-zero multiple of the allocation granularity")]
  MaxObjectSize(usize),

  #[error("chunk size {chunk_size} leaves {capacity} usable bytes, below the max object size {max_object_size}")]
  ChunkTooSmall {
    chunk_size: usize,
    capacity: usize,
    max_object_size: usize,
  },

  #[error("unknown bucket policy: {0}")]
  UnknownPolicy(String),
}

/// Heap operation result
pub type HeapResult<T> = Result<T, HeapError>;

#[derive(Error, Debug)]
pub enum HeapError {
  #[error("out of memory: {0}")]
  Exhausted(#[from] PageSourceError),

  #[error("a fresh chunk could not satisfy a request of {size} bytes")]
  RefillDidNotFit { size: usize },

  #[error("free list corrupted at {address:#x}: {reason}")]
  Corrupted { address: usize, reason: String },
}
