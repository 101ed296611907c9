//! Tax return table access.

use rusqlite::params;

use super::{date_from_sql, date_to_sql, WarehouseStore};
use crate::error::{WarehouseError, WarehouseResult};
use crate::return_generator::ReturnRecord;
use crate::types::{ReturnStatus, TaxType};

impl WarehouseStore {
    pub fn replace_returns(&self, rows: &[ReturnRecord]) -> WarehouseResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM raw_tax_returns", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO raw_tax_returns
                 (return_id, taxpayer_id, tax_type, period_year, period_seq,
                  due_date, filing_date, taxable_base, tax_due, net_payable, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for r in rows {
                stmt.execute(params![
                    r.return_id,
                    r.taxpayer_id,
                    r.tax_type.as_str(),
                    r.period_year,
                    r.period_seq,
                    date_to_sql(r.due_date),
                    r.filing_date.map(date_to_sql),
                    r.taxable_base,
                    r.tax_due,
                    r.net_payable,
                    r.status.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        log::info!("loaded {} tax returns", rows.len());
        Ok(())
    }

    pub fn load_returns(&self) -> WarehouseResult<Vec<ReturnRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT return_id, taxpayer_id, tax_type, period_year, period_seq,
                    due_date, filing_date, taxable_base, tax_due, net_payable, status
             FROM raw_tax_returns ORDER BY return_id",
        )?;
        let raw = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, f64>(7)?,
                row.get::<_, f64>(8)?,
                row.get::<_, f64>(9)?,
                row.get::<_, String>(10)?,
            ))
        })?;

        let mut returns = Vec::new();
        for row in raw {
            let (
                return_id,
                taxpayer_id,
                type_text,
                period_year,
                period_seq,
                due_text,
                filing_text,
                taxable_base,
                tax_due,
                net_payable,
                status_text,
            ) = row?;
            returns.push(ReturnRecord {
                return_id,
                taxpayer_id,
                tax_type: parse_tax_type(&type_text)?,
                period_year,
                period_seq,
                due_date: date_from_sql(&due_text)?,
                filing_date: filing_text.as_deref().map(date_from_sql).transpose()?,
                taxable_base,
                tax_due,
                net_payable,
                status: ReturnStatus::parse(&status_text).ok_or_else(|| {
                    WarehouseError::DataQuality {
                        reason: format!("unknown return status '{status_text}'"),
                    }
                })?,
            });
        }
        Ok(returns)
    }

    pub fn return_count(&self) -> WarehouseResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM raw_tax_returns", [], |row| row.get(0))?;
        Ok(n)
    }
}

pub(super) fn parse_tax_type(text: &str) -> WarehouseResult<TaxType> {
    TaxType::parse(text).ok_or_else(|| WarehouseError::DataQuality {
        reason: format!("unknown tax type '{text}'"),
    })
}
