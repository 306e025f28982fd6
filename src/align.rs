use std::mem;

/// Allocation granularity: every request size and every block size is a
/// multiple of the machine word.
pub const GRANULARITY: usize = mem::size_of::<usize>();

/// Rounds a request size up to the allocation granularity.
///
/// Callers of [`Heap::allocate`](crate::Heap::allocate) are expected to
/// normalize sizes with this macro; the heap itself never does.
///
/// # Examples
///
/// ```rust
/// use rsegalloc::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::align::GRANULARITY)
  };
}

/// Rounds `value` up to a multiple of `align`, which must be a power of two.
///
/// ```rust
/// use rsegalloc::align_to;
///
/// assert_eq!(align_to!(4001, 16), 4016);
/// assert_eq!(align_to!(64, 64), 64);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Whether `value` is already a multiple of the allocation granularity.
pub const fn is_aligned(value: usize) -> bool {
  value & (GRANULARITY - 1) == 0
}
