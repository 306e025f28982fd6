use std::fmt;

/// Running counters kept by a [`Heap`](crate::Heap).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub chunks_acquired: usize,
  pub bytes_acquired: usize,
  pub allocations: usize,
  pub frees: usize,
  /// Payload bytes of every block currently loaned out, including the
  /// trailing slack of blocks that were too small to split.
  pub bytes_in_use: usize,
}

impl HeapStats {
  /// Share of the acquired address space currently holding live payloads.
  pub fn utilization(&self) -> f64 {
    if self.bytes_acquired == 0 {
      return 0.0;
    }
    self.bytes_in_use as f64 / self.bytes_acquired as f64
  }
}

impl fmt::Display for HeapStats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "{} chunks ({} bytes), {} allocations, {} frees, {} bytes in use, utilization {:.1}%",
      self.chunks_acquired,
      self.bytes_acquired,
      self.allocations,
      self.frees,
      self.bytes_in_use,
      self.utilization() * 100.0
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_utilization() {
    assert_eq!(HeapStats::default().utilization(), 0.0);

    let stats = HeapStats {
      chunks_acquired: 1,
      bytes_acquired: 4096,
      allocations: 1,
      frees: 0,
      bytes_in_use: 1024,
    };
    assert_eq!(stats.utilization(), 0.25);
    assert!(stats.to_string().ends_with("utilization 25.0%"));
  }
}
