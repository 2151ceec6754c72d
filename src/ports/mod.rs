//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (reading source, checkpoint
//! storage).

mod catalog;
mod checkpoint;

pub use catalog::ReadingCatalog;
pub use checkpoint::{Checkpoint, CheckpointStore, CHECKPOINT_VERSION};
