//! Randomized allocate/free workloads in the style of the classic malloc
//! challenge: each run reports elapsed time and average utilization for
//! every bucket policy.
//!
//! ```text
//! cargo run --release --example challenge [breakpoint|power-of-two]
//! ```

use std::{ptr::NonNull, time::Instant};

use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rsegalloc::{ArenaPageSource, BucketPolicy, GRANULARITY, Heap, HeapConfig, align};

const EPOCHS: usize = 4;
const OPS_PER_EPOCH: usize = 20_000;
const SEED: u64 = 0x5EED;

struct Workload {
  name: &'static str,
  min: usize,
  max: usize,
}

const WORKLOADS: [Workload; 5] = [
  Workload { name: "fixed 128", min: 128, max: 128 },
  Workload { name: "fixed 16", min: 16, max: 16 },
  Workload { name: "small 16-128", min: 16, max: 128 },
  Workload { name: "large 256-4000", min: 256, max: 4000 },
  Workload { name: "mixed 8-4000", min: 8, max: 4000 },
];

struct Outcome {
  millis: u128,
  utilization: f64,
  chunks: usize,
}

fn run(
  policy: BucketPolicy,
  workload: &Workload,
) -> Outcome {
  let config = HeapConfig::default().with_policy(policy);
  let mut heap = Heap::with_config(ArenaPageSource::new(), config).unwrap();
  let mut rng = StdRng::seed_from_u64(SEED);
  let mut live: Vec<(NonNull<u8>, usize)> = Vec::new();
  let mut samples = Vec::with_capacity(EPOCHS);

  let started = Instant::now();

  for _ in 0..EPOCHS {
    for _ in 0..OPS_PER_EPOCH {
      if !live.is_empty() && rng.gen_bool(0.45) {
        let (ptr, size) = live.swap_remove(rng.gen_range(0..live.len()));
        unsafe {
          debug_assert_eq!(*ptr.as_ptr(), (size % 251) as u8);
          heap.free(ptr.as_ptr());
        }
      } else {
        let size = align!(rng.gen_range(workload.min..=workload.max)).max(GRANULARITY);
        let ptr = unsafe { heap.allocate(size) };
        unsafe { ptr.as_ptr().write((size % 251) as u8) };
        live.push((ptr, size));
      }
    }
    samples.push(heap.stats().utilization());
  }

  let millis = started.elapsed().as_millis();

  for (ptr, _) in live.drain(..) {
    unsafe { heap.free(ptr.as_ptr()) };
  }
  heap.finalize();

  Outcome {
    millis,
    utilization: samples.iter().sum::<f64>() / samples.len() as f64,
    chunks: heap.stats().chunks_acquired,
  }
}

fn main() {
  env_logger::init();

  let policies = match std::env::args().nth(1) {
    Some(arg) => match arg.parse::<BucketPolicy>() {
      Ok(policy) => vec![policy],
      Err(err) => {
        eprintln!("{err}");
        std::process::exit(2);
      }
    },
    None => vec![BucketPolicy::Breakpoint, BucketPolicy::PowerOfTwo],
  };

  for policy in policies {
    info!("running workloads with {policy} buckets");
    println!("== {policy}");

    for workload in &WORKLOADS {
      let outcome = run(policy, workload);
      println!(
        "  {:<16} {:>6} ms  utilization {:>5.1}%  chunks {}",
        workload.name,
        outcome.millis,
        outcome.utilization * 100.0,
        outcome.chunks
      );
    }
  }
}
