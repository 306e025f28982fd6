use std::{fmt, str::FromStr};

use crate::error::ConfigError;

/// Number of free-list buckets, for either policy.
pub const BUCKET_COUNT: usize = 12;

/// Upper bounds (exclusive) of every breakpoint bucket but the last.
const BREAKPOINTS: [usize; BUCKET_COUNT - 1] = [2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048];

/// How payload sizes map onto buckets.
///
/// Both policies are monotonically non-decreasing in `size` and cover every
/// size without gaps; they differ only in where the class boundaries sit and
/// in lookup cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BucketPolicy {
  /// Fixed thresholds `<2, <4, <8, ..., <2048`, everything else in the last
  /// bucket.
  #[default]
  Breakpoint,
  /// Bucket is the position of the highest set bit of `size`.
  PowerOfTwo,
}

impl BucketPolicy {
  pub fn bucket_of(
    self,
    size: usize,
  ) -> usize {
    match self {
      BucketPolicy::Breakpoint => BREAKPOINTS.partition_point(|&bound| bound <= size),
      BucketPolicy::PowerOfTwo => {
        let exponent = size.checked_ilog2().unwrap_or(0) as usize;
        exponent.min(BUCKET_COUNT - 1)
      }
    }
  }
}

impl fmt::Display for BucketPolicy {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      BucketPolicy::Breakpoint => f.write_str("breakpoint"),
      BucketPolicy::PowerOfTwo => f.write_str("power-of-two"),
    }
  }
}

impl FromStr for BucketPolicy {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "breakpoint" | "breakpoints" => Ok(BucketPolicy::Breakpoint),
      "power-of-two" | "pow2" => Ok(BucketPolicy::PowerOfTwo),
      other => Err(ConfigError::UnknownPolicy(other.to_string())),
    }
  }
}
