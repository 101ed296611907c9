//! Monthly revenue forecasting per tax type.
//!
//! A least-squares trend over the observed monthly series, with a
//! multiplicative seasonal index when at least a full year of history
//! exists. Interval bounds come from the residual spread around the
//! fitted line.

use chrono::NaiveDate;

use crate::error::{WarehouseError, WarehouseResult};
use crate::store::MonthlyRevenueRow;
use crate::types::TaxType;

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    /// First day of the forecast month.
    pub forecast_date: NaiveDate,
    pub tax_type: TaxType,
    pub predicted: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub generated_at: NaiveDate,
}

const MIN_HISTORY_MONTHS: usize = 6;
const INTERVAL_Z: f64 = 1.96;

/// Forecast the next `horizon_months` for one tax type.
pub fn forecast_revenue(
    series: &[MonthlyRevenueRow],
    tax_type: TaxType,
    horizon_months: u32,
    generated_at: NaiveDate,
) -> WarehouseResult<Vec<ForecastRow>> {
    if series.len() < MIN_HISTORY_MONTHS {
        return Err(WarehouseError::DataQuality {
            reason: format!(
                "{} history has {} months, need at least {MIN_HISTORY_MONTHS} to forecast",
                tax_type.as_str(),
                series.len()
            ),
        });
    }

    let n = series.len();
    let (slope, intercept) = linear_fit(series);

    // Residual spread around the trend line.
    let residual_sd = {
        let sum_sq: f64 = series
            .iter()
            .enumerate()
            .map(|(t, row)| (row.amount - (intercept + slope * t as f64)).powi(2))
            .sum();
        (sum_sq / (n as f64 - 2.0).max(1.0)).sqrt()
    };

    let seasonal = seasonal_index(series, slope, intercept);

    let last = &series[n - 1];
    let mut out = Vec::with_capacity(horizon_months as usize);
    let mut year = last.year;
    let mut month = last.month;
    for step in 1..=horizon_months {
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
        let t = (n as f64 - 1.0) + step as f64;
        let trend = intercept + slope * t;
        let factor = seasonal[(month - 1) as usize];
        let predicted = (trend * factor).max(0.0);
        let forecast_date =
            NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| WarehouseError::DataQuality {
                reason: format!("invalid forecast month {year}-{month}"),
            })?;
        out.push(ForecastRow {
            forecast_date,
            tax_type,
            predicted,
            lower_bound: (predicted - INTERVAL_Z * residual_sd).max(0.0),
            upper_bound: predicted + INTERVAL_Z * residual_sd,
            generated_at,
        });
    }
    Ok(out)
}

fn linear_fit(series: &[MonthlyRevenueRow]) -> (f64, f64) {
    let n = series.len() as f64;
    let mean_t = (n - 1.0) / 2.0;
    let mean_y: f64 = series.iter().map(|r| r.amount).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var = 0.0;
    for (t, row) in series.iter().enumerate() {
        let dt = t as f64 - mean_t;
        cov += dt * (row.amount - mean_y);
        var += dt * dt;
    }
    let slope = if var > 0.0 { cov / var } else { 0.0 };
    (slope, mean_y - slope * mean_t)
}

/// Mean ratio of observed to trend per calendar month. Months never
/// observed (or with fewer than 12 months of total history) stay at 1.
fn seasonal_index(series: &[MonthlyRevenueRow], slope: f64, intercept: f64) -> [f64; 12] {
    let mut index = [1.0f64; 12];
    if series.len() < 12 {
        return index;
    }
    let mut sums = [0.0f64; 12];
    let mut counts = [0u32; 12];
    for (t, row) in series.iter().enumerate() {
        let trend = intercept + slope * t as f64;
        if trend > 0.0 {
            let m = (row.month - 1) as usize;
            sums[m] += row.amount / trend;
            counts[m] += 1;
        }
    }
    for m in 0..12 {
        if counts[m] > 0 {
            index[m] = sums[m] / counts[m] as f64;
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(amounts: &[f64]) -> Vec<MonthlyRevenueRow> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| MonthlyRevenueRow {
                year: 2022 + (i / 12) as i32,
                month: (i % 12) as u32 + 1,
                amount,
            })
            .collect()
    }

    fn generated_at() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
    }

    #[test]
    fn flat_history_forecasts_flat() {
        let rows = series(&[100.0; 24]);
        let out = forecast_revenue(&rows, TaxType::Vat, 6, generated_at()).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(
            out[0].forecast_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        for f in &out {
            assert!((f.predicted - 100.0).abs() < 1e-6, "{}", f.predicted);
            assert!(f.lower_bound <= f.predicted && f.predicted <= f.upper_bound);
        }
    }

    #[test]
    fn rising_trend_keeps_rising() {
        let rows = series(&(0..24).map(|i| 100.0 + 10.0 * i as f64).collect::<Vec<_>>());
        let out = forecast_revenue(&rows, TaxType::Paye, 3, generated_at()).unwrap();
        assert!(out[0].predicted > rows.last().unwrap().amount);
        assert!(out[2].predicted > out[0].predicted);
    }

    #[test]
    fn short_history_is_rejected() {
        let rows = series(&[100.0; 3]);
        let err = forecast_revenue(&rows, TaxType::Vat, 6, generated_at()).unwrap_err();
        assert!(matches!(err, WarehouseError::DataQuality { .. }));
    }

    #[test]
    fn bounds_never_go_negative() {
        let rows = series(&(0..12).map(|i| 50.0 + (i % 3) as f64 * 40.0).collect::<Vec<_>>());
        let out = forecast_revenue(&rows, TaxType::Vat, 12, generated_at()).unwrap();
        for f in &out {
            assert!(f.lower_bound >= 0.0);
        }
    }
}
