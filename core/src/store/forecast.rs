//! Revenue forecast table access.
//!
//! Unlike the raw tables, forecasts are upserted on
//! (forecast_date, tax_type): reruns refresh predictions in place and
//! horizons from earlier runs survive.

use rusqlite::params;

use super::{date_from_sql, date_to_sql, WarehouseStore};
use crate::error::WarehouseResult;
use crate::forecast::ForecastRow;
use crate::store::returns::parse_tax_type;

impl WarehouseStore {
    pub fn upsert_forecasts(&self, rows: &[ForecastRow]) -> WarehouseResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO analytics_revenue_forecasts
                 (forecast_date, tax_type, predicted, lower_bound, upper_bound, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (forecast_date, tax_type) DO UPDATE SET
                     predicted = excluded.predicted,
                     lower_bound = excluded.lower_bound,
                     upper_bound = excluded.upper_bound,
                     generated_at = excluded.generated_at",
            )?;
            for f in rows {
                stmt.execute(params![
                    date_to_sql(f.forecast_date),
                    f.tax_type.as_str(),
                    f.predicted,
                    f.lower_bound,
                    f.upper_bound,
                    date_to_sql(f.generated_at),
                ])?;
            }
        }
        tx.commit()?;
        log::info!("upserted {} forecast rows", rows.len());
        Ok(())
    }

    pub fn load_forecasts(&self) -> WarehouseResult<Vec<ForecastRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT forecast_date, tax_type, predicted, lower_bound, upper_bound, generated_at
             FROM analytics_revenue_forecasts
             ORDER BY forecast_date, tax_type",
        )?;
        let raw = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut forecasts = Vec::new();
        for row in raw {
            let (date_text, type_text, predicted, lower_bound, upper_bound, generated_text) = row?;
            forecasts.push(ForecastRow {
                forecast_date: date_from_sql(&date_text)?,
                tax_type: parse_tax_type(&type_text)?,
                predicted,
                lower_bound,
                upper_bound,
                generated_at: date_from_sql(&generated_text)?,
            });
        }
        Ok(forecasts)
    }

    pub fn forecast_count(&self) -> WarehouseResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM analytics_revenue_forecasts",
            [],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}
