//! Sample data synthesis.
//!
//! Records get ids `0..count` and vector components drawn independently
//! from a uniform `[0, 1)` distribution. A seed makes the run reproducible.

use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use tracing::debug;

use crate::model::SampleRecord;

/// Generate `count` records of dimension `dim`.
#[must_use]
pub fn generate_samples(count: usize, dim: usize, seed: Option<u64>) -> Vec<SampleRecord> {
    let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let unit = Uniform::new(0.0_f32, 1.0_f32);

    debug!(count, dim, ?seed, "Generating sample records");

    (0..count)
        .map(|i| SampleRecord {
            id: i64::try_from(i).unwrap_or(i64::MAX),
            vector: (0..dim).map(|_| unit.sample(&mut rng)).collect(),
        })
        .collect()
}
