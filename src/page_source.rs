use std::{io, mem, ptr::NonNull};

use log::{debug, error};

use crate::error::PageSourceError;

/// The only way a [`Heap`](crate::Heap) obtains address space.
///
/// # Safety
///
/// A successful `acquire_chunk(size)` must return memory that is writable for
/// at least `size` bytes, aligned to `usize`, not handed out to anyone else,
/// and valid until passed to `release_chunk` or until the source is dropped.
pub unsafe trait PageSource {
  fn acquire_chunk(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, PageSourceError>;

  /// Returns a chunk to the system.
  ///
  /// # Safety
  ///
  /// `base` and `size` must match an earlier `acquire_chunk`, and nothing
  /// inside the chunk may be used afterwards.
  unsafe fn release_chunk(
    &mut self,
    base: NonNull<u8>,
    size: usize,
  );
}

/// Anonymous private mappings straight from the kernel.
#[derive(Debug, Default)]
pub struct MmapPageSource;

unsafe impl PageSource for MmapPageSource {
  fn acquire_chunk(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, PageSourceError> {
    let address = unsafe {
      libc::mmap(
        std::ptr::null_mut(),
        size,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == libc::MAP_FAILED {
      return Err(PageSourceError::MapFailed {
        size,
        source: io::Error::last_os_error(),
      });
    }

    debug!("mmap {size} bytes at {address:?}");

    NonNull::new(address.cast::<u8>()).ok_or(PageSourceError::MapFailed {
      size,
      source: io::Error::other("mmap returned null"),
    })
  }

  unsafe fn release_chunk(
    &mut self,
    base: NonNull<u8>,
    size: usize,
  ) {
    debug!("munmap {size} bytes at {base:?}");
    if let Err(err) = unsafe { unmap(base, size) } {
      error!("munmap of {size} bytes at {base:?} failed: {err}");
    }
  }
}

unsafe fn unmap(
  base: NonNull<u8>,
  size: usize,
) -> io::Result<()> {
  match unsafe { libc::munmap(base.as_ptr().cast(), size) } {
    0 => Ok(()),
    _ => Err(io::Error::last_os_error()),
  }
}

/// Chunks carved from the process heap, optionally capped at a fixed count.
///
/// Every chunk is zeroed and word aligned. Chunks live until the source is
/// dropped, so a heap built on this source cleans up after itself.
///
/// Chunks are kept as raw pointers out of `Box::into_raw`: the source never
/// touches chunk memory again, so the pointers it hands out stay valid.
#[derive(Debug, Default)]
pub struct ArenaPageSource {
  chunks: Vec<NonNull<[usize]>>,
  limit: Option<usize>,
  acquired: usize,
}

impl ArenaPageSource {
  pub fn new() -> Self {
    Self::default()
  }

  /// A source that refuses to hand out more than `limit` chunks.
  pub fn bounded(limit: usize) -> Self {
    let mut source = Self::default();
    source.limit = Some(limit);
    source
  }

  /// Chunks handed out so far.
  pub fn acquired(&self) -> usize {
    self.acquired
  }

  /// Chunks handed out and not yet released.
  pub fn live(&self) -> usize {
    self.chunks.len()
  }
}

unsafe impl PageSource for ArenaPageSource {
  fn acquire_chunk(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, PageSourceError> {
    if let Some(limit) = self.limit {
      if self.acquired >= limit {
        return Err(PageSourceError::Exhausted { limit });
      }
    }

    let words = size.div_ceil(mem::size_of::<usize>());
    let chunk = vec![0usize; words].into_boxed_slice();
    // Box::into_raw never returns null.
    let chunk = unsafe { NonNull::new_unchecked(Box::into_raw(chunk)) };

    self.chunks.push(chunk);
    self.acquired += 1;

    Ok(chunk.cast::<u8>())
  }

  unsafe fn release_chunk(
    &mut self,
    base: NonNull<u8>,
    _size: usize,
  ) {
    if let Some(at) = self.chunks.iter().position(|chunk| chunk.cast::<u8>() == base) {
      let chunk = self.chunks.swap_remove(at);
      drop(unsafe { Box::from_raw(chunk.as_ptr()) });
    }
  }
}

impl Drop for ArenaPageSource {
  fn drop(&mut self) {
    for chunk in self.chunks.drain(..) {
      drop(unsafe { Box::from_raw(chunk.as_ptr()) });
    }
  }
}
