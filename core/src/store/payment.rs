//! Payment table access plus the revenue aggregates downstream
//! analytics read.

use rusqlite::params;

use super::returns::parse_tax_type;
use super::{date_from_sql, date_to_sql, WarehouseStore};
use crate::error::WarehouseResult;
use crate::payment_generator::PaymentRecord;
use crate::types::TaxType;

/// One taxpayer-quarter of collected revenue.
#[derive(Debug, Clone)]
pub struct QuarterlyRevenueRow {
    pub taxpayer_id: String,
    pub year: i32,
    pub quarter: u32,
    pub amount: f64,
}

/// A taxpayer's mean payment next to its sector's mean, per tax type.
#[derive(Debug, Clone)]
pub struct SectorComparisonRow {
    pub taxpayer_id: String,
    pub sector: String,
    pub tax_type: TaxType,
    pub own_mean: f64,
    pub sector_mean: f64,
}

/// One calendar month of collected revenue for one tax type.
#[derive(Debug, Clone)]
pub struct MonthlyRevenueRow {
    pub year: i32,
    pub month: u32,
    pub amount: f64,
}

impl WarehouseStore {
    pub fn replace_payments(&self, rows: &[PaymentRecord]) -> WarehouseResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM raw_payments", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO raw_payments
                 (payment_id, taxpayer_id, return_reference, payment_date,
                  payment_channel, payment_provider, tax_type, period_year,
                  period_seq, amount, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for p in rows {
                stmt.execute(params![
                    p.payment_id,
                    p.taxpayer_id,
                    p.return_reference,
                    date_to_sql(p.payment_date),
                    p.payment_channel,
                    p.payment_provider,
                    p.tax_type.as_str(),
                    p.period_year,
                    p.period_seq,
                    p.amount,
                    p.status,
                ])?;
            }
        }
        tx.commit()?;
        log::info!("loaded {} payments", rows.len());
        Ok(())
    }

    pub fn load_payments(&self) -> WarehouseResult<Vec<PaymentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT payment_id, taxpayer_id, return_reference, payment_date,
                    payment_channel, payment_provider, tax_type, period_year,
                    period_seq, amount, status
             FROM raw_payments ORDER BY payment_id",
        )?;
        let raw = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i32>(7)?,
                row.get::<_, u32>(8)?,
                row.get::<_, f64>(9)?,
                row.get::<_, String>(10)?,
            ))
        })?;

        let mut payments = Vec::new();
        for row in raw {
            let (
                payment_id,
                taxpayer_id,
                return_reference,
                date_text,
                payment_channel,
                payment_provider,
                type_text,
                period_year,
                period_seq,
                amount,
                status,
            ) = row?;
            payments.push(PaymentRecord {
                payment_id,
                taxpayer_id,
                return_reference,
                payment_date: date_from_sql(&date_text)?,
                payment_channel,
                payment_provider,
                tax_type: parse_tax_type(&type_text)?,
                period_year,
                period_seq,
                amount,
                status,
            });
        }
        Ok(payments)
    }

    pub fn payment_count(&self) -> WarehouseResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM raw_payments", [], |row| row.get(0))?;
        Ok(n)
    }

    /// Payment amounts in payment_id order, for exact reconciliation
    /// against in-memory records.
    pub fn payment_amounts_ordered(&self) -> WarehouseResult<Vec<f64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT amount FROM raw_payments ORDER BY payment_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn total_revenue_by_tax_type(&self) -> WarehouseResult<Vec<(String, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT tax_type, total_amount FROM analytics_revenue_summary
             ORDER BY tax_type",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Quarterly revenue per taxpayer, ordered by taxpayer then period.
    /// PAYE months are folded into their calendar quarter.
    pub fn quarterly_revenue_by_taxpayer(&self) -> WarehouseResult<Vec<QuarterlyRevenueRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT taxpayer_id, period_year,
                    CASE tax_type WHEN 'VAT' THEN period_seq
                         ELSE (period_seq + 2) / 3 END AS quarter,
                    SUM(amount)
             FROM raw_payments
             GROUP BY taxpayer_id, period_year, quarter
             ORDER BY taxpayer_id, period_year, quarter",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(QuarterlyRevenueRow {
                taxpayer_id: row.get(0)?,
                year: row.get(1)?,
                quarter: row.get(2)?,
                amount: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Distinct payment channels used per taxpayer.
    pub fn channel_counts(&self) -> WarehouseResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT taxpayer_id, COUNT(DISTINCT payment_channel)
             FROM raw_payments GROUP BY taxpayer_id ORDER BY taxpayer_id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Each business taxpayer's mean payment against its sector's mean,
    /// split by tax type. Sector means include the taxpayer itself.
    pub fn sector_payment_comparison(&self) -> WarehouseResult<Vec<SectorComparisonRow>> {
        let mut stmt = self.conn.prepare(
            "WITH own AS (
                 SELECT p.taxpayer_id, t.business_sector AS sector, p.tax_type,
                        AVG(p.amount) AS own_mean
                 FROM raw_payments p
                 JOIN raw_taxpayers t ON t.taxpayer_id = p.taxpayer_id
                 GROUP BY p.taxpayer_id, t.business_sector, p.tax_type
             ),
             sector AS (
                 SELECT sector, tax_type, AVG(own_mean) AS sector_mean
                 FROM own GROUP BY sector, tax_type
             )
             SELECT own.taxpayer_id, own.sector, own.tax_type,
                    own.own_mean, sector.sector_mean
             FROM own
             JOIN sector ON sector.sector = own.sector
                        AND sector.tax_type = own.tax_type
             ORDER BY own.taxpayer_id, own.tax_type",
        )?;
        let raw = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in raw {
            let (taxpayer_id, sector, type_text, own_mean, sector_mean) = row?;
            out.push(SectorComparisonRow {
                taxpayer_id,
                sector,
                tax_type: parse_tax_type(&type_text)?,
                own_mean,
                sector_mean,
            });
        }
        Ok(out)
    }

    /// Monthly collected revenue for one tax type, in calendar order.
    /// Keyed on payment date, which is what cash-flow forecasting needs.
    pub fn monthly_revenue_series(&self, tax_type: TaxType) -> WarehouseResult<Vec<MonthlyRevenueRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT CAST(strftime('%Y', payment_date) AS INTEGER),
                    CAST(strftime('%m', payment_date) AS INTEGER),
                    SUM(amount)
             FROM raw_payments
             WHERE tax_type = ?1
             GROUP BY 1, 2
             ORDER BY 1, 2",
        )?;
        let rows = stmt.query_map(params![tax_type.as_str()], |row| {
            Ok(MonthlyRevenueRow {
                year: row.get(0)?,
                month: row.get(1)?,
                amount: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
