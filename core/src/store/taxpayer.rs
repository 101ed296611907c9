//! Taxpayer table access.

use rusqlite::params;

use super::{date_from_sql, date_to_sql, WarehouseStore};
use crate::error::{WarehouseError, WarehouseResult};
use crate::taxpayer_generator::TaxpayerRecord;
use crate::types::{RiskCategory, TaxpayerType};

impl WarehouseStore {
    /// Truncate and reload the taxpayer table in one transaction.
    ///
    /// Every dependent table references taxpayer rows, so reloading
    /// taxpayers clears the whole dependent layer. Raw children are
    /// reloaded right after by their own replace calls; analytics
    /// rows are rebuilt by their stages.
    pub fn replace_taxpayers(&self, rows: &[TaxpayerRecord]) -> WarehouseResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM analytics_fraud_scores", [])?;
        tx.execute("DELETE FROM analytics_fraud_alerts", [])?;
        tx.execute("DELETE FROM raw_companies_registry", [])?;
        tx.execute("DELETE FROM raw_payments", [])?;
        tx.execute("DELETE FROM raw_tax_returns", [])?;
        tx.execute("DELETE FROM raw_taxpayers", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO raw_taxpayers
                 (taxpayer_id, tin, name, taxpayer_type, registration_date,
                  region, district, business_sector, business_subsector,
                  employee_count, annual_turnover, risk_category, compliance_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for t in rows {
                stmt.execute(params![
                    t.taxpayer_id,
                    t.tin,
                    t.name,
                    t.taxpayer_type.as_str(),
                    date_to_sql(t.registration_date),
                    t.region,
                    t.district,
                    t.business_sector,
                    t.business_subsector,
                    t.employee_count,
                    t.annual_turnover,
                    t.risk_category.as_str(),
                    t.compliance_score,
                ])?;
            }
        }
        tx.commit()?;
        log::info!("loaded {} taxpayers", rows.len());
        Ok(())
    }

    pub fn load_taxpayers(&self) -> WarehouseResult<Vec<TaxpayerRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT taxpayer_id, tin, name, taxpayer_type, registration_date,
                    region, district, business_sector, business_subsector,
                    employee_count, annual_turnover, risk_category, compliance_score
             FROM raw_taxpayers ORDER BY taxpayer_id",
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
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, Option<i64>>(9)?,
                row.get::<_, Option<f64>>(10)?,
                row.get::<_, String>(11)?,
                row.get::<_, f64>(12)?,
            ))
        })?;

        let mut taxpayers = Vec::new();
        for row in raw {
            let (
                taxpayer_id,
                tin,
                name,
                type_text,
                registration_text,
                region,
                district,
                business_sector,
                business_subsector,
                employee_count,
                annual_turnover,
                risk_text,
                compliance_score,
            ) = row?;
            taxpayers.push(TaxpayerRecord {
                taxpayer_id,
                tin,
                name,
                taxpayer_type: TaxpayerType::parse(&type_text).ok_or_else(|| {
                    WarehouseError::DataQuality {
                        reason: format!("unknown taxpayer type '{type_text}'"),
                    }
                })?,
                registration_date: date_from_sql(&registration_text)?,
                region,
                district,
                business_sector,
                business_subsector,
                employee_count,
                annual_turnover,
                risk_category: RiskCategory::parse(&risk_text).ok_or_else(|| {
                    WarehouseError::DataQuality {
                        reason: format!("unknown risk category '{risk_text}'"),
                    }
                })?,
                compliance_score,
            });
        }
        Ok(taxpayers)
    }

    pub fn taxpayer_count(&self) -> WarehouseResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM raw_taxpayers", [], |row| row.get(0))?;
        Ok(n)
    }

    pub fn high_risk_taxpayer_count(&self) -> WarehouseResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_taxpayers WHERE risk_category = 'High'",
            [],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Model write-back of risk attributes after scoring.
    pub fn update_risk_assessment(
        &self,
        taxpayer_id: &str,
        risk_category: RiskCategory,
        compliance_score: f64,
    ) -> WarehouseResult<()> {
        self.conn.execute(
            "UPDATE raw_taxpayers
             SET risk_category = ?1, compliance_score = ?2
             WHERE taxpayer_id = ?3",
            params![risk_category.as_str(), compliance_score, taxpayer_id],
        )?;
        Ok(())
    }

    /// Distribution of taxpayers per region, for run summaries.
    pub fn taxpayers_by_region(&self) -> WarehouseResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT region, COUNT(*) FROM raw_taxpayers
             GROUP BY region ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
