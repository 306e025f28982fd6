use std::fmt;

use crate::{
  align::{GRANULARITY, is_aligned},
  block::HEADER_SIZE,
  error::ConfigError,
  size_class::BucketPolicy,
};

/// Size of every chunk requested from the page source.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Largest request the heap accepts.
pub const MAX_OBJECT_SIZE: usize = 4000;

/// Configuration for a [`Heap`](crate::Heap). All fields have sensible
/// defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapConfig {
  /// Size-class mapping. Default: [`BucketPolicy::Breakpoint`].
  pub policy: BucketPolicy,

  /// Bytes requested per refill. Default: 4096.
  pub chunk_size: usize,

  /// Upper bound on request sizes. A fresh chunk must always be able to
  /// hold one object of this size. Default: 4000.
  pub max_object_size: usize,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      policy: BucketPolicy::default(),
      chunk_size: DEFAULT_CHUNK_SIZE,
      max_object_size: MAX_OBJECT_SIZE,
    }
  }
}

impl HeapConfig {
  pub fn with_policy(
    mut self,
    policy: BucketPolicy,
  ) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub fn with_max_object_size(
    mut self,
    max_object_size: usize,
  ) -> Self {
    self.max_object_size = max_object_size;
    self
  }

  /// Payload bytes of the single block carved from a fresh chunk.
  pub fn chunk_capacity(&self) -> usize {
    self.chunk_size.saturating_sub(HEADER_SIZE)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !is_aligned(self.chunk_size) {
      return Err(ConfigError::ChunkSize(self.chunk_size));
    }

    if self.max_object_size < GRANULARITY || !is_aligned(self.max_object_size) {
      return Err(ConfigError::MaxObjectSize(self.max_object_size));
    }

    let capacity = self.chunk_capacity();
    if capacity < self.max_object_size {
      return Err(ConfigError::ChunkTooSmall {
        chunk_size: self.chunk_size,
        capacity,
        max_object_size: self.max_object_size,
      });
    }

    Ok(())
  }
}

impl fmt::Display for HeapConfig {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "{} policy, {} byte chunks, objects up to {} bytes",
      self.policy, self.chunk_size, self.max_object_size
    )
  }
}
