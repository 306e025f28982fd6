use std::ptr;

use crate::{
  block::Header,
  size_class::{BUCKET_COUNT, BucketPolicy},
};

/// A free block reported by [`Heap::free_blocks`](crate::Heap::free_blocks).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlock {
  pub bucket: usize,
  /// Address of the block header.
  pub address: usize,
  /// Payload bytes.
  pub size: usize,
}

/// Result of a best-fit search: the chosen block and its predecessor in the
/// bucket chain (null when the block is the bucket head).
pub(crate) struct Fit {
  pub bucket: usize,
  pub prev: *mut Header,
  pub block: *mut Header,
  pub size: usize,
}

/// Segregated free lists: one intrusive singly linked list per size class.
///
/// ```text
///   bucket 0  ── null
///   bucket 1  ── null
///     ...
///   bucket 4  ──► [16] ──► [24] ──► null
///     ...
///   bucket 11 ──► [4048] ──► null
/// ```
pub(crate) struct FreeListIndex {
  heads: [*mut Header; BUCKET_COUNT],
  policy: BucketPolicy,
}

impl FreeListIndex {
  pub fn new(policy: BucketPolicy) -> Self {
    Self {
      heads: [ptr::null_mut(); BUCKET_COUNT],
      policy,
    }
  }

  pub fn policy(&self) -> BucketPolicy {
    self.policy
  }

  pub fn clear(&mut self) {
    self.heads = [ptr::null_mut(); BUCKET_COUNT];
  }

  /// Pushes an unlinked block onto the front of the bucket matching its size.
  ///
  /// # Safety
  ///
  /// `header` must point to a valid header owned by the heap and not
  /// currently reachable from any bucket.
  pub unsafe fn push(
    &mut self,
    header: *mut Header,
  ) -> usize {
    unsafe {
      let bucket = self.policy.bucket_of((*header).size);

      assert!(
        (*header).next.is_null() && self.heads[bucket] != header,
        "block {header:p} is already on a free list"
      );

      (*header).next = self.heads[bucket];
      self.heads[bucket] = header;
      bucket
    }
  }

  /// Finds the smallest block of at least `size` bytes, scanning upward from
  /// `bucket_of(size)` and stopping at the first bucket that holds any fit.
  ///
  /// # Safety
  ///
  /// Every chain must consist of valid headers.
  pub unsafe fn best_fit(
    &self,
    size: usize,
  ) -> Option<Fit> {
    let start = self.policy.bucket_of(size);

    for bucket in start..BUCKET_COUNT {
      let mut best: Option<Fit> = None;
      let mut prev: *mut Header = ptr::null_mut();
      let mut current = self.heads[bucket];

      unsafe {
        while !current.is_null() {
          let candidate = (*current).size;

          if candidate >= size && best.as_ref().is_none_or(|fit| candidate < fit.size) {
            best = Some(Fit {
              bucket,
              prev,
              block: current,
              size: candidate,
            });

            if candidate == size {
              break;
            }
          }

          prev = current;
          current = (*current).next;
        }
      }

      if best.is_some() {
        return best;
      }
    }

    None
  }

  /// Detaches the block described by `fit` and clears its link.
  ///
  /// # Safety
  ///
  /// `fit` must come from [`FreeListIndex::best_fit`] with no mutation of
  /// the index in between.
  pub unsafe fn unlink(
    &mut self,
    fit: &Fit,
  ) {
    unsafe {
      let next = (*fit.block).next;

      if fit.prev.is_null() {
        self.heads[fit.bucket] = next;
      } else {
        (*fit.prev).next = next;
      }

      (*fit.block).next = ptr::null_mut();
    }
  }

  pub fn iter(&self) -> Iter<'_> {
    Iter {
      index: self,
      bucket: 0,
      current: self.heads[0],
    }
  }
}

/// Walks every bucket in ascending order.
pub struct Iter<'a> {
  index: &'a FreeListIndex,
  bucket: usize,
  current: *mut Header,
}

impl Iterator for Iter<'_> {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<FreeBlock> {
    while self.current.is_null() {
      self.bucket += 1;
      if self.bucket >= BUCKET_COUNT {
        return None;
      }
      self.current = self.index.heads[self.bucket];
    }

    // Chains only ever hold headers the heap carved itself.
    let (size, next) = unsafe { ((*self.current).size, (*self.current).next) };
    let block = FreeBlock {
      bucket: self.bucket,
      address: self.current as usize,
      size,
    };
    self.current = next;

    Some(block)
  }
}
