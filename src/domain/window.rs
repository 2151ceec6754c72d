//! Windowing/labeling transform.
//!
//! Turns a time-sorted magnitude series into fixed-length scaled windows,
//! each labeled with the severity bin of the reading that follows it.

use crate::domain::{MinMaxScaler, Reading, SeverityBin};

/// Windows and their target bins, ready for training or validation.
#[derive(Debug, Clone, Default)]
pub struct WindowedDataset {
    /// Scaled magnitude windows, each of the configured sequence length.
    pub windows: Vec<Vec<f64>>,
    /// Target bin index for each window.
    pub labels: Vec<usize>,
}

impl WindowedDataset {
    /// Number of (window, label) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether the dataset holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Produce `max(N - L, 0)` (window, label) pairs from `N` sorted readings.
///
/// `window[i]` covers the scaled magnitudes at positions `i..i+L`;
/// `label[i]` is the bin of the *raw* magnitude at position `i+L`. Fewer
/// readings than the window length yields an empty dataset; the caller
/// decides whether that is an error.
#[must_use]
pub fn make_windows(
    readings: &[Reading],
    scaler: &MinMaxScaler,
    seq_length: usize,
) -> WindowedDataset {
    if seq_length == 0 || readings.len() <= seq_length {
        return WindowedDataset::default();
    }

    let scaled: Vec<f64> = readings
        .iter()
        .map(|r| scaler.transform(r.magnitude))
        .collect();

    let pairs = readings.len() - seq_length;
    let mut windows = Vec::with_capacity(pairs);
    let mut labels = Vec::with_capacity(pairs);
    for i in 0..pairs {
        windows.push(scaled[i..i + seq_length].to_vec());
        labels.push(SeverityBin::from_magnitude(readings[i + seq_length].magnitude).index());
    }

    WindowedDataset { windows, labels }
}

/// Split a dataset chronologically: the first `train_fraction` of pairs
/// trains, the remainder validates. No shuffling across the boundary.
#[must_use]
pub fn chronological_split(
    dataset: WindowedDataset,
    train_fraction: f64,
) -> (WindowedDataset, WindowedDataset) {
    let split = ((dataset.len() as f64) * train_fraction) as usize;
    let split = split.min(dataset.len());

    let mut windows = dataset.windows;
    let mut labels = dataset.labels;
    let val_windows = windows.split_off(split);
    let val_labels = labels.split_off(split);

    (
        WindowedDataset { windows, labels },
        WindowedDataset {
            windows: val_windows,
            labels: val_labels,
        },
    )
}
