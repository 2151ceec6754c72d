//! Synthetic catalog: deterministic stub for the upstream reading source.
//!
//! Generates hourly readings with magnitudes drawn from Normal(5.0, 1.5),
//! non-positive draws discarded. Stands in for the real catalog when no
//! database is configured, and doubles as a test fixture.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::domain::Reading;
use crate::ports::ReadingCatalog;

const MAGNITUDE_MEAN: f64 = 5.0;
const MAGNITUDE_STD: f64 = 1.5;

/// Default number of synthetic readings per load.
pub const DEFAULT_READING_COUNT: usize = 10_000;

/// Deterministic synthetic reading source.
pub struct SyntheticCatalog {
    count: usize,
    seed: u64,
}

impl SyntheticCatalog {
    /// Catalog producing `count` hourly readings from the given seed.
    #[must_use]
    pub fn new(count: usize, seed: u64) -> Self {
        Self { count, seed }
    }

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .single()
            .expect("valid fixed start time")
    }
}

impl ReadingCatalog for SyntheticCatalog {
    type Error = std::convert::Infallible;

    fn load_readings(&self) -> Result<Vec<Reading>, Self::Error> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let dist = Normal::new(MAGNITUDE_MEAN, MAGNITUDE_STD).expect("valid distribution parameters");
        let start = Self::start_time();

        let mut readings = Vec::with_capacity(self.count);
        for i in 0..self.count {
            let magnitude = dist.sample(&mut rng);
            if magnitude > 0.0 {
                readings.push(Reading::new(magnitude, start + Duration::hours(i as i64)));
            }
        }

        Ok(readings)
    }
}
