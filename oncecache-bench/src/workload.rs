// Copyright 2026 oncecache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Distribution as _, Zipf};

/// Key distribution of the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Distribution {
    /// Every key in the range is equally likely.
    Uniform,
    /// Low keys are hot. The skew is set by the zipf exponent.
    Zipf,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("key range must be greater than 0")]
    EmptyKeyRange,
    #[error("invalid zipf distribution [n = {n}][s = {s}]: {reason}")]
    Zipf { n: u64, s: f64, reason: String },
}

/// Per-thread key source.
pub enum KeyGenerator {
    Uniform { rng: SmallRng, range: u64 },
    Zipf { rng: SmallRng, zipf: Zipf<f64> },
}

impl KeyGenerator {
    pub fn new(distribution: Distribution, range: u64, s: f64, seed: u64) -> Result<Self, WorkloadError> {
        if range == 0 {
            return Err(WorkloadError::EmptyKeyRange);
        }
        let rng = SmallRng::seed_from_u64(seed);
        match distribution {
            Distribution::Uniform => Ok(Self::Uniform { rng, range }),
            Distribution::Zipf => {
                let zipf = Zipf::new(range as f64, s).map_err(|e| WorkloadError::Zipf {
                    n: range,
                    s,
                    reason: e.to_string(),
                })?;
                Ok(Self::Zipf { rng, zipf })
            }
        }
    }

    /// Draw the next key in `[0, range)`.
    pub fn next_key(&mut self) -> u64 {
        match self {
            Self::Uniform { rng, range } => rng.random_range(0..*range),
            // Zipf samples lie in `[1, n]`.
            Self::Zipf { rng, zipf } => zipf.sample(rng) as u64 - 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_in_range() {
        let mut generator = KeyGenerator::new(Distribution::Uniform, 16, 0.0, 0).unwrap();
        assert!((0..10000).all(|_| generator.next_key() < 16));
    }

    #[test]
    fn test_zipf_in_range_and_skewed() {
        let mut generator = KeyGenerator::new(Distribution::Zipf, 1000, 1.2, 0).unwrap();
        let keys = (0..10000).map(|_| generator.next_key()).collect::<Vec<_>>();
        assert!(keys.iter().all(|key| *key < 1000));

        let hot = keys.iter().filter(|key| **key < 10).count();
        let cold = keys.iter().filter(|key| (500..510).contains(*key)).count();
        assert!(hot > cold);
    }

    #[test]
    fn test_invalid_workload() {
        assert!(matches!(
            KeyGenerator::new(Distribution::Uniform, 0, 0.0, 0),
            Err(WorkloadError::EmptyKeyRange)
        ));
        assert!(matches!(
            KeyGenerator::new(Distribution::Zipf, 100, -1.0, 0),
            Err(WorkloadError::Zipf { .. })
        ));
    }
}
