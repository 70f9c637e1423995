//! Bar geometry for the delay chart

use crate::models::ResultRecord;
use crate::types::OutcomeKind;

/// Share of the largest delay used as the height of timeout/failed bars
pub const PLACEHOLDER_RATIO: f64 = 0.5;

/// One bar of the chart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartBar {
    pub index: u32,
    pub status: OutcomeKind,
    /// Drawn height, in milliseconds of delay
    pub height_ms: f64,
    /// Measured delay; successes only
    pub delay_ms: Option<f64>,
}

/// Bars in index order
///
/// Successes are drawn at their delay. Timeouts and failures carry no delay,
/// so they are drawn at half the largest delay to stay visible; without any
/// success every bar gets the same unit height.
pub fn chart_bars(records: &[ResultRecord]) -> Vec<ChartBar> {
    let max_delay = records
        .iter()
        .filter(|r| r.status == OutcomeKind::Success)
        .filter_map(|r| r.delay_ms)
        .fold(0.0, f64::max);

    let placeholder = if max_delay > 0.0 {
        max_delay * PLACEHOLDER_RATIO
    } else {
        1.0
    };

    let mut bars: Vec<ChartBar> = records
        .iter()
        .map(|record| {
            let delay_ms = match record.status {
                OutcomeKind::Success => record.delay_ms,
                _ => None,
            };
            ChartBar {
                index: record.message_index,
                status: record.status,
                height_ms: delay_ms.unwrap_or(placeholder),
                delay_ms,
            }
        })
        .collect();

    bars.sort_by_key(|b| b.index);
    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;

    #[test]
    fn test_unsuccessful_bars_at_half_max() {
        let records: Vec<ResultRecord> = vec![
            Outcome::success(1, "t".to_string(), 0.0, 0.040),
            Outcome::timeout(2, "t".to_string()),
            Outcome::success(3, "t".to_string(), 0.0, 0.010),
            Outcome::failed(4, "t".to_string()),
        ]
        .iter()
        .map(ResultRecord::from)
        .collect();

        let bars = chart_bars(&records);
        assert_eq!(bars.len(), 4);
        assert!((bars[0].height_ms - 40.0).abs() < 1e-6);
        assert!((bars[1].height_ms - 20.0).abs() < 1e-6);
        assert_eq!(bars[1].delay_ms, None);
        assert!((bars[3].height_ms - 20.0).abs() < 1e-6);
        assert_eq!(bars[3].status, OutcomeKind::Failed);
    }

    #[test]
    fn test_no_successes_uses_unit_height() {
        let records = vec![ResultRecord::from(&Outcome::timeout(1, "t".to_string()))];
        let bars = chart_bars(&records);
        assert_eq!(bars[0].height_ms, 1.0);
    }
}
