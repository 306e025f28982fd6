use std::{mem, ptr};

/// Metadata placed in front of every block, free or allocated.
///
/// ```text
///   ... | Header | payload (size bytes) | ...
///       ^        ^
///       header   pointer handed to the caller
/// ```
#[repr(C)]
pub struct Header {
  /// Usable payload bytes, not counting the header.
  pub size: usize,
  /// Next free block in the same bucket. Null while allocated.
  pub next: *mut Header,
}

pub const HEADER_SIZE: usize = mem::size_of::<Header>();

impl Header {
  /// Writes a fresh, unlinked header at `at` and returns it.
  ///
  /// # Safety
  ///
  /// `at` must be valid for writes of `HEADER_SIZE + size` bytes and aligned
  /// for `Header`.
  pub unsafe fn write(
    at: *mut u8,
    size: usize,
  ) -> *mut Header {
    let header = at.cast::<Header>();
    unsafe {
      header.write(Header {
        size,
        next: ptr::null_mut(),
      });
    }
    header
  }

  /// # Safety
  ///
  /// `header` must point to a header written by [`Header::write`].
  pub unsafe fn payload(header: *mut Header) -> *mut u8 {
    unsafe { header.cast::<u8>().add(HEADER_SIZE) }
  }

  /// Recovers the header from a pointer previously produced by
  /// [`Header::payload`].
  ///
  /// # Safety
  ///
  /// `payload` must come from [`Header::payload`].
  pub unsafe fn from_payload(payload: *mut u8) -> *mut Header {
    unsafe { payload.sub(HEADER_SIZE) }.cast::<Header>()
  }
}
