//! Rule-based fraud alerting.
//!
//! Three detectors run over collected-payment aggregates:
//!   - sudden revenue drop against a 4-quarter rolling average
//!   - unusually many distinct payment channels
//!   - sustained payments far below the sector average
//!
//! Detectors are pure functions over aggregate rows; the alerting
//! stage fetches inputs from the store and persists the output.

use chrono::NaiveDate;

use crate::store::{QuarterlyRevenueRow, SectorComparisonRow};
use crate::types::{AlertStatus, EntityId};

pub const ALERT_REVENUE_DROP: &str = "Sudden Revenue Drop";
pub const ALERT_CHANNEL_ANOMALY: &str = "Payment Channel Anomaly";
pub const ALERT_BELOW_SECTOR: &str = "Below Sector Average";

const REVENUE_DROP_THRESHOLD: f64 = -0.30;
const ROLLING_WINDOW: usize = 4;
const CHANNEL_LIMIT: i64 = 3;
const SECTOR_VARIANCE_THRESHOLD: f64 = -0.50;

#[derive(Debug, Clone, PartialEq)]
pub struct FraudAlert {
    pub taxpayer_id: EntityId,
    pub alert_date: NaiveDate,
    pub alert_type: String,
    pub risk_score: f64,
    pub description: String,
    pub status: AlertStatus,
}

/// Flag quarters whose revenue sits more than 30% below the rolling
/// mean of the trailing four quarters (current quarter included).
/// Rows must be ordered by taxpayer, then period; quarters before the
/// window fills are never flagged.
pub fn revenue_drop_alerts(
    rows: &[QuarterlyRevenueRow],
    as_of: NaiveDate,
) -> Vec<FraudAlert> {
    let mut alerts = Vec::new();
    let mut start = 0;
    while start < rows.len() {
        let taxpayer_id = &rows[start].taxpayer_id;
        let mut end = start;
        while end < rows.len() && rows[end].taxpayer_id == *taxpayer_id {
            end += 1;
        }
        let series = &rows[start..end];
        for i in (ROLLING_WINDOW - 1)..series.len() {
            let window = &series[i + 1 - ROLLING_WINDOW..=i];
            let rolling: f64 =
                window.iter().map(|r| r.amount).sum::<f64>() / ROLLING_WINDOW as f64;
            if rolling <= 0.0 {
                continue;
            }
            let change = (series[i].amount - rolling) / rolling;
            if change < REVENUE_DROP_THRESHOLD {
                alerts.push(FraudAlert {
                    taxpayer_id: taxpayer_id.clone(),
                    alert_date: as_of,
                    alert_type: ALERT_REVENUE_DROP.to_string(),
                    risk_score: change.abs().min(0.95),
                    description: format!(
                        "Revenue in {}Q{} dropped {:.0}% below the 4-quarter average",
                        series[i].year,
                        series[i].quarter,
                        change.abs() * 100.0
                    ),
                    status: AlertStatus::Open,
                });
            }
        }
        start = end;
    }
    alerts
}

/// Flag taxpayers paying through more than three distinct channels.
pub fn channel_diversity_alerts(
    channel_counts: &[(EntityId, i64)],
    as_of: NaiveDate,
) -> Vec<FraudAlert> {
    channel_counts
        .iter()
        .filter(|(_, count)| *count > CHANNEL_LIMIT)
        .map(|(taxpayer_id, count)| FraudAlert {
            taxpayer_id: taxpayer_id.clone(),
            alert_date: as_of,
            alert_type: ALERT_CHANNEL_ANOMALY.to_string(),
            risk_score: (*count as f64 * 0.2).min(0.8),
            description: format!("Payments made through {count} distinct channels"),
            status: AlertStatus::Open,
        })
        .collect()
}

/// Flag taxpayers whose mean payment runs more than 50% below their
/// sector's mean for the same tax type.
pub fn sector_comparison_alerts(
    rows: &[SectorComparisonRow],
    as_of: NaiveDate,
) -> Vec<FraudAlert> {
    let mut alerts = Vec::new();
    for row in rows {
        if row.sector_mean <= 0.0 {
            continue;
        }
        let variance = (row.own_mean - row.sector_mean) / row.sector_mean;
        if variance < SECTOR_VARIANCE_THRESHOLD {
            alerts.push(FraudAlert {
                taxpayer_id: row.taxpayer_id.clone(),
                alert_date: as_of,
                alert_type: ALERT_BELOW_SECTOR.to_string(),
                risk_score: variance.abs().min(0.85),
                description: format!(
                    "{} payments average {:.0}% below the {} sector",
                    row.tax_type.as_str(),
                    variance.abs() * 100.0,
                    row.sector
                ),
                status: AlertStatus::Open,
            });
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaxType;

    fn quarters(taxpayer: &str, amounts: &[f64]) -> Vec<QuarterlyRevenueRow> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| QuarterlyRevenueRow {
                taxpayer_id: taxpayer.to_string(),
                year: 2022 + (i / 4) as i32,
                quarter: (i % 4) as u32 + 1,
                amount,
            })
            .collect()
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
    }

    #[test]
    fn single_sharp_drop_is_flagged_once() {
        // Flat at 100 with one 40% drop in the fifth quarter.
        let rows = quarters("TP-1", &[100.0, 100.0, 100.0, 100.0, 60.0, 100.0, 100.0, 100.0]);
        let alerts = revenue_drop_alerts(&rows, as_of());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, ALERT_REVENUE_DROP);
        assert!(alerts[0].description.contains("2023Q1"));
        assert_eq!(alerts[0].status, AlertStatus::Open);
    }

    #[test]
    fn flat_series_raises_nothing() {
        let rows = quarters("TP-1", &[100.0; 8]);
        assert!(revenue_drop_alerts(&rows, as_of()).is_empty());
    }

    #[test]
    fn short_series_never_flags() {
        // Not enough quarters to fill the rolling window.
        let rows = quarters("TP-1", &[100.0, 10.0, 5.0]);
        assert!(revenue_drop_alerts(&rows, as_of()).is_empty());
    }

    #[test]
    fn windows_do_not_cross_taxpayers() {
        let mut rows = quarters("TP-1", &[100.0; 4]);
        rows.extend(quarters("TP-2", &[10.0, 10.0, 10.0, 10.0]));
        assert!(revenue_drop_alerts(&rows, as_of()).is_empty());
    }

    #[test]
    fn channel_limit_is_exclusive() {
        let counts = vec![
            ("TP-1".to_string(), 3i64),
            ("TP-2".to_string(), 4),
            ("TP-3".to_string(), 5),
        ];
        let alerts = channel_diversity_alerts(&counts, as_of());
        assert_eq!(alerts.len(), 2);
        assert!((alerts[0].risk_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn sector_outliers_are_flagged() {
        let rows = vec![
            SectorComparisonRow {
                taxpayer_id: "TP-1".into(),
                sector: "Retail".into(),
                tax_type: TaxType::Vat,
                own_mean: 40.0,
                sector_mean: 100.0,
            },
            SectorComparisonRow {
                taxpayer_id: "TP-2".into(),
                sector: "Retail".into(),
                tax_type: TaxType::Vat,
                own_mean: 60.0,
                sector_mean: 100.0,
            },
        ];
        let alerts = sector_comparison_alerts(&rows, as_of());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].taxpayer_id, "TP-1");
        assert_eq!(alerts[0].alert_type, ALERT_BELOW_SECTOR);
    }
}
