use serde::{Deserialize, Serialize};

use super::platform::BaseMetrics;

/// Performance summary for a platform account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: f64,
    pub cpc: f64,
}

impl From<BaseMetrics> for AnalyticsReport {
    /// Derives ctr (4 dp) and cpc (2 dp); zero denominators yield zero.
    fn from(metrics: BaseMetrics) -> Self {
        let ctr = if metrics.impressions == 0 {
            0.0
        } else {
            metrics.clicks as f64 / metrics.impressions as f64
        };
        let cpc = if metrics.clicks == 0 {
            0.0
        } else {
            metrics.spend / metrics.clicks as f64
        };

        Self {
            spend: round_to(metrics.spend, 2),
            impressions: metrics.impressions,
            clicks: metrics.clicks,
            ctr: round_to(ctr, 4),
            cpc: round_to(cpc, 2),
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;

    #[test]
    fn test_meta_report_matches_reference_values() {
        let report = AnalyticsReport::from(Platform::Meta.base_metrics());
        assert_eq!(report.spend, 245.67);
        assert_eq!(report.impressions, 25_000);
        assert_eq!(report.clicks, 850);
        assert_eq!(report.ctr, 0.034);
        assert_eq!(report.cpc, 0.29);
    }

    #[test]
    fn test_zero_denominators() {
        let report = AnalyticsReport::from(BaseMetrics {
            spend: 10.0,
            impressions: 0,
            clicks: 0,
        });
        assert_eq!(report.ctr, 0.0);
        assert_eq!(report.cpc, 0.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.288_94, 2), 0.29);
        assert_eq!(round_to(0.033_51, 4), 0.0335);
    }
}
