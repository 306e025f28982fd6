use std::{
  alloc::{self, Layout},
  collections::HashSet,
  ptr::NonNull,
};

use log::{debug, error, trace};

use crate::{
  align::{GRANULARITY, is_aligned},
  block::{HEADER_SIZE, Header},
  config::HeapConfig,
  error::{ConfigError, HeapError, HeapResult},
  free_list::{FreeBlock, FreeListIndex, Fit},
  page_source::{MmapPageSource, PageSource},
  stats::HeapStats,
};

/// A segregated free-list heap growing in fixed-size chunks.
///
/// The heap owns every header it ever carved. A pointer returned by
/// [`Heap::allocate`] is a loan that must come back through [`Heap::free`]
/// before the block is handed out again.
pub struct Heap<S: PageSource> {
  index: FreeListIndex,
  source: S,
  config: HeapConfig,
  stats: HeapStats,
}

impl Default for Heap<MmapPageSource> {
  fn default() -> Self {
    Self::new(MmapPageSource)
  }
}

impl<S: PageSource> Heap<S> {
  /// An empty heap with the default configuration.
  pub fn new(source: S) -> Self {
    Self::build(source, HeapConfig::default())
  }

  pub fn with_config(
    source: S,
    config: HeapConfig,
  ) -> Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self::build(source, config))
  }

  fn build(
    source: S,
    config: HeapConfig,
  ) -> Self {
    debug!("heap created: {config}");

    Self {
      index: FreeListIndex::new(config.policy),
      source,
      config,
      stats: HeapStats::default(),
    }
  }

  /// Empties every bucket and resets the counters.
  ///
  /// Chunks acquired earlier stay with the page source and are not reused.
  /// Pointers handed out before the reset must not be freed afterwards.
  pub fn initialize(&mut self) {
    self.index.clear();
    self.stats = HeapStats::default();
    debug!("heap initialized");
  }

  /// Releases nothing; logs a summary of the run.
  pub fn finalize(&mut self) {
    debug!("heap finalized: {}", self.stats);
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn stats(&self) -> HeapStats {
    self.stats
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// Every block currently on a free list, bucket by bucket.
  pub fn free_blocks(&self) -> impl Iterator<Item = FreeBlock> + '_ {
    self.index.iter()
  }

  /// Allocates `size` payload bytes, terminating the process when no memory
  /// can be obtained.
  ///
  /// # Safety
  ///
  /// `size` must be a multiple of [`GRANULARITY`] within
  /// `[GRANULARITY, max_object_size]`. Every earlier [`Heap::free`] must have
  /// honored its own contract.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> NonNull<u8> {
    match unsafe { self.try_allocate(size) } {
      Ok(ptr) => ptr,
      Err(err) => {
        error!("allocation of {size} bytes failed: {err}");
        let layout = Layout::from_size_align(size, GRANULARITY).unwrap_or(Layout::new::<Header>());
        alloc::handle_alloc_error(layout)
      }
    }
  }

  /// Like [`Heap::allocate`] but hands page source failures back to the
  /// caller.
  ///
  /// # Safety
  ///
  /// Same contract as [`Heap::allocate`].
  pub unsafe fn try_allocate(
    &mut self,
    size: usize,
  ) -> HeapResult<NonNull<u8>> {
    debug_assert!(
      is_aligned(size) && (GRANULARITY..=self.config.max_object_size).contains(&size),
      "request of {size} bytes is not normalized"
    );

    let mut refilled = false;

    loop {
      if let Some(fit) = unsafe { self.index.best_fit(size) } {
        return Ok(unsafe { self.take(fit, size) });
      }

      if refilled {
        return Err(HeapError::RefillDidNotFit { size });
      }

      self.refill()?;
      refilled = true;
    }
  }

  /// Returns a block to the bucket matching its size. Null is ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this heap's [`Heap::allocate`] or
  /// [`Heap::try_allocate`] since the last [`Heap::initialize`], and not
  /// freed since.
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    if ptr.is_null() {
      return;
    }

    unsafe {
      let header = Header::from_payload(ptr);
      let size = (*header).size;

      debug_assert!(
        size <= self.stats.bytes_in_use,
        "freeing {size} bytes at {header:p} but only {} bytes in use",
        self.stats.bytes_in_use
      );

      let bucket = self.index.push(header);

      self.stats.frees += 1;
      self.stats.bytes_in_use -= size;

      trace!("freed {size} bytes at {header:p} into bucket {bucket}");
    }
  }

  /// Checks that every indexed block sits in the bucket its size maps to,
  /// has a normalized size and is listed once.
  pub fn verify(&self) -> HeapResult<()> {
    let policy = self.index.policy();
    let mut seen = HashSet::new();

    for block in self.free_blocks() {
      if !seen.insert(block.address) {
        return Err(HeapError::Corrupted {
          address: block.address,
          reason: "block listed twice".to_string(),
        });
      }

      if !is_aligned(block.size) {
        return Err(HeapError::Corrupted {
          address: block.address,
          reason: format!("size {} is not a multiple of {GRANULARITY}", block.size),
        });
      }

      let expected = policy.bucket_of(block.size);
      if expected != block.bucket {
        return Err(HeapError::Corrupted {
          address: block.address,
          reason: format!(
            "size {} belongs in bucket {expected}, found in bucket {}",
            block.size, block.bucket
          ),
        });
      }
    }

    Ok(())
  }

  /// Unlinks the chosen block, splits off the tail when it can host a header
  /// of its own, and returns the payload.
  unsafe fn take(
    &mut self,
    fit: Fit,
    size: usize,
  ) -> NonNull<u8> {
    unsafe {
      self.index.unlink(&fit);

      let block = fit.block;
      let payload = Header::payload(block);
      let remaining = fit.size - size;

      trace!(
        "fit for {size} bytes: {block:p} ({} bytes) from bucket {}",
        fit.size, fit.bucket
      );

      if remaining > HEADER_SIZE {
        (*block).size = size;

        let remainder = Header::write(payload.add(size), remaining - HEADER_SIZE);
        let bucket = self.index.push(remainder);

        trace!(
          "split {block:p}: remainder {remainder:p} ({} bytes) into bucket {bucket}",
          remaining - HEADER_SIZE
        );
      }

      self.stats.allocations += 1;
      self.stats.bytes_in_use += (*block).size;

      NonNull::new_unchecked(payload)
    }
  }

  /// Formats one fresh chunk as a single free block.
  fn refill(&mut self) -> HeapResult<()> {
    let chunk_size = self.config.chunk_size;
    let base = self.source.acquire_chunk(chunk_size)?;

    self.stats.chunks_acquired += 1;
    self.stats.bytes_acquired += chunk_size;

    // PageSource guarantees `chunk_size` writable, word aligned bytes.
    let bucket = unsafe {
      let header = Header::write(base.as_ptr(), self.config.chunk_capacity());
      self.index.push(header)
    };

    debug!(
      "chunk #{} at {base:?}: {} bytes into bucket {bucket}",
      self.stats.chunks_acquired,
      self.config.chunk_capacity()
    );

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::DEFAULT_CHUNK_SIZE, error::PageSourceError, page_source::ArenaPageSource,
    size_class::BucketPolicy,
  };

  const CAPACITY: usize = DEFAULT_CHUNK_SIZE - HEADER_SIZE;

  fn heap() -> Heap<ArenaPageSource> {
    Heap::new(ArenaPageSource::new())
  }

  #[test]
  fn test_first_allocation_refills_and_splits() {
    let mut heap = heap();

    let ptr = unsafe { heap.allocate(16) };

    assert_eq!(heap.source().acquired(), 1);

    let blocks: Vec<_> = heap.free_blocks().collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].size, CAPACITY - 16 - HEADER_SIZE);
    assert_eq!(blocks[0].address, ptr.as_ptr() as usize + 16);
    assert!(heap.verify().is_ok());
  }

  #[test]
  fn test_memory_is_writable() {
    let mut heap = heap();

    unsafe {
      let first = heap.allocate(64).as_ptr();
      let second = heap.allocate(64).as_ptr();

      first.write_bytes(0x11, 64);
      second.write_bytes(0x22, 64);

      assert!((0..64).all(|i| *first.add(i) == 0x11));
      assert!((0..64).all(|i| *second.add(i) == 0x22));
    }
  }

  #[test]
  fn test_unsplittable_remainder_is_handed_over() {
    let config = HeapConfig::default().with_max_object_size(CAPACITY);
    let mut heap = Heap::with_config(ArenaPageSource::new(), config).unwrap();

    // Leaves exactly one header's worth, which is not enough to split.
    let size = CAPACITY - HEADER_SIZE;
    let ptr = unsafe { heap.allocate(size) };

    assert_eq!(heap.free_blocks().count(), 0);
    assert_eq!(heap.stats().bytes_in_use, CAPACITY);

    unsafe { heap.free(ptr.as_ptr()) };

    let blocks: Vec<_> = heap.free_blocks().collect();
    assert_eq!(blocks[0].size, CAPACITY);
    assert_eq!(heap.stats().bytes_in_use, 0);
  }

  #[test]
  fn test_free_null_is_ignored() {
    let mut heap = heap();

    unsafe { heap.free(std::ptr::null_mut()) };

    assert_eq!(heap.stats().frees, 0);
  }

  #[test]
  fn test_try_allocate_reports_exhaustion() {
    let mut heap = Heap::new(ArenaPageSource::bounded(0));

    let result = unsafe { heap.try_allocate(8) };

    assert!(matches!(
      result,
      Err(HeapError::Exhausted(PageSourceError::Exhausted { limit: 0 }))
    ));
  }

  #[test]
  fn test_initialize_forgets_free_blocks() {
    let mut heap = heap();

    unsafe { heap.allocate(8) };
    heap.initialize();

    assert_eq!(heap.free_blocks().count(), 0);
    assert_eq!(heap.stats(), HeapStats::default());

    unsafe { heap.allocate(8) };
    assert_eq!(heap.source().acquired(), 2);
  }

  #[test]
  #[cfg(debug_assertions)]
  #[should_panic(expected = "bytes in use")]
  fn test_free_across_initialize_is_caught() {
    let mut heap = heap();

    let stale = unsafe { heap.allocate(64) };
    heap.initialize();

    unsafe { heap.free(stale.as_ptr()) };
  }

  #[test]
  fn test_with_config_validates() {
    let config = HeapConfig::default().with_chunk_size(1024);

    assert!(Heap::with_config(ArenaPageSource::new(), config).is_err());
  }

  #[test]
  fn test_power_of_two_policy() {
    let config = HeapConfig::default().with_policy(BucketPolicy::PowerOfTwo);
    let mut heap = Heap::with_config(ArenaPageSource::new(), config).unwrap();

    let small = unsafe { heap.allocate(16) };
    unsafe { heap.free(small.as_ptr()) };

    let again = unsafe { heap.allocate(24) };
    assert_ne!(again, small);
    assert!(heap.free_blocks().any(|block| block.size == 16 && block.bucket == 4));
    assert!(heap.verify().is_ok());
  }

  #[test]
  fn test_verify_detects_misfiled_block() {
    let mut heap = heap();

    let ptr = unsafe { heap.allocate(16) };
    unsafe {
      heap.free(ptr.as_ptr());
      // Grow the freed block behind the index's back.
      (*Header::from_payload(ptr.as_ptr())).size = 1024;
    }

    assert!(matches!(heap.verify(), Err(HeapError::Corrupted { .. })));
  }

  #[test]
  fn test_default_heap_uses_mmap() {
    let mut heap: Heap<MmapPageSource> = Heap::default();

    unsafe {
      let ptr = heap.allocate(128);
      ptr.as_ptr().write_bytes(0x5A, 128);
      heap.free(ptr.as_ptr());
    }

    assert_eq!(heap.stats().chunks_acquired, 1);
    heap.finalize();
  }
}
