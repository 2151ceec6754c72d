//! Reading catalog port: Trait for the upstream data dependency.
//!
//! The core only requires a time-sorted collection of magnitude readings;
//! where they come from (a database, a synthetic stub) is an adapter concern.

use crate::domain::Reading;

/// Trait for sources of magnitude readings.
pub trait ReadingCatalog: Send + Sync {
    /// Error type for catalog operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every available reading, sorted by time of occurrence.
    ///
    /// # Errors
    /// Returns error if the source cannot be reached or read.
    fn load_readings(&self) -> Result<Vec<Reading>, Self::Error>;
}
