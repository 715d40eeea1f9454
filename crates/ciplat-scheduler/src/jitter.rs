//! Randomized work delays.

use std::time::Duration;
use uuid::Uuid;

/// Small LCG used to pick simulated work durations.
#[derive(Debug, Clone)]
pub struct Jitter {
    state: u64,
}

impl Jitter {
    const MULTIPLIER: u64 = 6_364_136_223_846_793_005;
    const INCREMENT: u64 = 1_442_695_040_888_963_407;

    pub fn seeded(seed: u64) -> Self {
        let state = if seed == 0 {
            0x9e37_79b9_7f4a_7c15
        } else {
            seed
        };
        Self { state }
    }

    /// Seed from a random UUIDv4.
    pub fn from_entropy() -> Self {
        let (hi, lo) = Uuid::new_v4().as_u64_pair();
        Self::seeded(hi ^ lo)
    }

    /// Derive an independent stream for one job from a shared seed.
    pub fn for_job(seed: Option<u64>, index: usize) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed ^ (index as u64 + 1).wrapping_mul(Self::MULTIPLIER)),
            None => Self::from_entropy(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        self.state
    }

    /// Uniform duration in `min..=max`, at microsecond granularity.
    pub fn between(&mut self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        let span = u64::try_from((max - min).as_micros()).unwrap_or(u64::MAX);
        // High bits of an LCG are the well-mixed ones.
        let offset = (self.next_u64() >> 11) % span.saturating_add(1);
        min + Duration::from_micros(offset)
    }
}
