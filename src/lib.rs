//! # Quakesense
#![allow(non_snake_case)]
//!
//! Earthquake severity sequence classifier.
//!
//! This crate provides:
//! - A windowing/labeling transform from time-ordered magnitude readings to
//!   fixed-length classifier inputs with five severity bins
//! - A stacked-LSTM sequence classifier trained with imbalance-aware weighted
//!   loss and a recall-gated stopping rule
//! - Risk reports mapping the predicted bin to confidence, expected magnitude
//!   and a qualitative risk level
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types and transforms (readings, bins, scaler, windows)
//! - `net`: Hand-rolled sequence classifier, loss and optimizer
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (SQLite, synthetic stub, JSON checkpoints)
//! - `application`: Use cases orchestrating domain, net and ports

pub mod adapters;
pub mod application;
pub mod domain;
pub mod net;
pub mod ports;

pub use domain::{Reading, RiskLevel, RiskReport, SeverityBin};

/// Result type for Quakesense operations
pub type Result<T> = std::result::Result<T, QuakesenseError>;

/// Main error type for Quakesense
#[derive(Debug, thiserror::Error)]
pub enum QuakesenseError {
    #[error("Data source unavailable: {0}")]
    DataUnavailable(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No trained checkpoint: {0}")]
    CheckpointMissing(String),

    #[error("Checkpoint unusable: {0}")]
    CheckpointCorrupt(String),

    #[error("Checkpoint could not be written: {0}")]
    CheckpointWrite(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
