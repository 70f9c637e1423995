//! Delay statistics over stored results
//!
//! Only successful rows carry a delay, so every delay figure is computed
//! over successes alone. Message tallies count every row.

use crate::models::ResultRecord;
use crate::types::OutcomeKind;
use serde::{Deserialize, Serialize};

/// Summary of round-trip delays, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayStatistics {
    /// Number of samples (successful messages)
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    /// Sample standard deviation; zero below two samples
    pub std_dev_ms: f64,
    pub p95_ms: f64,
}

impl DelayStatistics {
    /// Statistics over raw delay samples; `None` when there are none
    pub fn from_delays(delays: &[f64]) -> Option<Self> {
        if delays.is_empty() {
            return None;
        }

        let mut sorted = delays.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;

        Some(Self {
            count,
            min_ms: sorted[0],
            max_ms: sorted[count - 1],
            mean_ms: mean,
            median_ms: percentile(&sorted, 50.0),
            std_dev_ms: std_dev(&sorted, mean),
            p95_ms: percentile(&sorted, 95.0),
        })
    }

    /// Statistics over the successful rows of a run
    pub fn from_records(records: &[ResultRecord]) -> Option<Self> {
        let delays: Vec<f64> = records
            .iter()
            .filter(|r| r.status == OutcomeKind::Success)
            .filter_map(|r| r.delay_ms)
            .collect();
        Self::from_delays(&delays)
    }
}

/// Per-status row counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTally {
    pub success: usize,
    pub timeout: usize,
    pub failed: usize,
}

impl MessageTally {
    pub fn from_records(records: &[ResultRecord]) -> Self {
        records.iter().fold(Self::default(), |mut tally, record| {
            match record.status {
                OutcomeKind::Success => tally.success += 1,
                OutcomeKind::Timeout => tally.timeout += 1,
                OutcomeKind::Failed => tally.failed += 1,
            }
            tally
        })
    }

    pub fn total(&self) -> usize {
        self.success + self.timeout + self.failed
    }

    /// Rows with the `Failed` flag set: timeouts and publish failures
    pub fn unsuccessful(&self) -> usize {
        self.timeout + self.failed
    }

    /// Success rate in percent, rounded to 2 decimals
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let rate = self.success as f64 / total as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}

/// Linear-interpolated percentile of sorted values
pub fn percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let lower_value = sorted_values[lower_index];
        let upper_value = sorted_values[upper_index];
        let weight = index - lower_index as f64;
        lower_value + weight * (upper_value - lower_value)
    }
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
