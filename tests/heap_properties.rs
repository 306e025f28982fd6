use std::ptr::NonNull;

use proptest::prelude::*;
use rsegalloc::{
  ArenaPageSource, BucketPolicy, GRANULARITY, HEADER_SIZE, Heap, HeapConfig, MAX_OBJECT_SIZE,
};

#[derive(Clone, Debug)]
enum Op {
  Allocate(usize),
  /// Frees the live allocation at this index, modulo the live count.
  Free(usize),
}

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![
    3 => (1..=MAX_OBJECT_SIZE / GRANULARITY).prop_map(|words| Op::Allocate(words * GRANULARITY)),
    2 => any::<usize>().prop_map(Op::Free),
  ]
}

fn any_policy() -> impl Strategy<Value = BucketPolicy> {
  prop_oneof![Just(BucketPolicy::Breakpoint), Just(BucketPolicy::PowerOfTwo)]
}

struct Live {
  ptr: NonNull<u8>,
  size: usize,
  tag: u8,
}

fn assert_intact(live: &Live) {
  for i in 0..live.size {
    let byte = unsafe { *live.ptr.as_ptr().add(i) };
    assert_eq!(byte, live.tag, "payload at {:?} was clobbered", live.ptr);
  }
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  #[test]
  fn payloads_never_overlap(policy in any_policy(), ops in prop::collection::vec(op(), 1..200)) {
    let config = HeapConfig::default().with_policy(policy);
    let mut heap = Heap::with_config(ArenaPageSource::new(), config).unwrap();
    let mut live: Vec<Live> = Vec::new();

    for (step, op) in ops.into_iter().enumerate() {
      match op {
        Op::Allocate(size) => {
          let ptr = unsafe { heap.allocate(size) };
          let tag = (step % 251) as u8;
          unsafe { ptr.as_ptr().write_bytes(tag, size) };

          let start = ptr.as_ptr() as usize;
          for other in &live {
            let other_start = other.ptr.as_ptr() as usize;
            prop_assert!(
              start + size <= other_start || other_start + other.size <= start,
              "{start:#x}+{size} overlaps {other_start:#x}+{}", other.size
            );
          }

          live.push(Live { ptr, size, tag });
        }
        Op::Free(pick) if !live.is_empty() => {
          let victim = live.swap_remove(pick % live.len());
          assert_intact(&victim);
          unsafe { heap.free(victim.ptr.as_ptr()) };
        }
        Op::Free(_) => {}
      }

      prop_assert!(heap.verify().is_ok());
    }

    for survivor in &live {
      assert_intact(survivor);
    }

    let in_use: usize = live.iter().map(|l| l.size).sum();
    prop_assert!(heap.stats().bytes_in_use >= in_use);
  }

  #[test]
  fn free_then_allocate_reuses_address(
    policy in any_policy(),
    warmup in prop::collection::vec(1..=MAX_OBJECT_SIZE / GRANULARITY, 0..20),
    words in 1..=MAX_OBJECT_SIZE / GRANULARITY,
  ) {
    let config = HeapConfig::default().with_policy(policy);
    let mut heap = Heap::with_config(ArenaPageSource::new(), config).unwrap();

    unsafe {
      for w in warmup {
        heap.allocate(w * GRANULARITY);
      }

      let size = words * GRANULARITY;
      let first = heap.allocate(size);
      let chunks = heap.source().acquired();

      heap.free(first.as_ptr());
      let second = heap.allocate(size);

      prop_assert_eq!(first, second);
      prop_assert_eq!(heap.source().acquired(), chunks);
    }
  }

  #[test]
  fn every_request_in_range_succeeds(
    policy in any_policy(),
    sizes in prop::collection::vec(1..=MAX_OBJECT_SIZE / GRANULARITY, 1..100),
  ) {
    let config = HeapConfig::default().with_policy(policy);
    let mut heap = Heap::with_config(ArenaPageSource::new(), config).unwrap();

    let mut requested = 0;
    for words in sizes {
      let size = words * GRANULARITY;
      let result = unsafe { heap.try_allocate(size) };
      prop_assert!(result.is_ok());
      requested += size + HEADER_SIZE;
    }

    // Footprints are disjoint and all live inside acquired chunks.
    prop_assert!(heap.stats().bytes_acquired >= requested);
    prop_assert!(heap.verify().is_ok());
  }
}
