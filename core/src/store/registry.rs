//! Companies-registry table access.

use rusqlite::params;

use super::{date_from_sql, date_to_sql, WarehouseStore};
use crate::error::WarehouseResult;
use crate::registry_generator::CompanyRecord;

impl WarehouseStore {
    pub fn replace_companies(&self, rows: &[CompanyRecord]) -> WarehouseResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM raw_companies_registry", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO raw_companies_registry
                 (company_reg_no, taxpayer_id, company_name, incorporation_date,
                  company_type, share_capital, directors_count, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for c in rows {
                stmt.execute(params![
                    c.company_reg_no,
                    c.taxpayer_id,
                    c.company_name,
                    date_to_sql(c.incorporation_date),
                    c.company_type,
                    c.share_capital,
                    c.directors_count,
                    c.status,
                ])?;
            }
        }
        tx.commit()?;
        log::info!("loaded {} registry entries", rows.len());
        Ok(())
    }

    pub fn load_companies(&self) -> WarehouseResult<Vec<CompanyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT company_reg_no, taxpayer_id, company_name, incorporation_date,
                    company_type, share_capital, directors_count, status
             FROM raw_companies_registry ORDER BY company_reg_no",
        )?;
        let raw = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;
        let mut companies = Vec::new();
        for row in raw {
            let (
                company_reg_no,
                taxpayer_id,
                company_name,
                incorporation_text,
                company_type,
                share_capital,
                directors_count,
                status,
            ) = row?;
            companies.push(CompanyRecord {
                company_reg_no,
                taxpayer_id,
                company_name,
                incorporation_date: date_from_sql(&incorporation_text)?,
                company_type,
                share_capital,
                directors_count,
                status,
            });
        }
        Ok(companies)
    }

    pub fn company_count(&self) -> WarehouseResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_companies_registry",
            [],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::registry_generator::CompanyRecord;
    use crate::store::WarehouseStore;
    use crate::taxpayer_generator::TaxpayerRecord;
    use crate::types::{RiskCategory, TaxpayerType};

    #[test]
    fn registry_rows_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warehouse.db");
        let store = WarehouseStore::open(path.to_str().unwrap()).unwrap();
        store.migrate().unwrap();

        let owner = TaxpayerRecord {
            taxpayer_id: "TP-000001".into(),
            tin: "123-456789-1".into(),
            name: "Banjul Trading Ltd".into(),
            taxpayer_type: TaxpayerType::Corporate,
            registration_date: NaiveDate::from_ymd_opt(2019, 4, 1).unwrap(),
            region: "Greater Banjul Area".into(),
            district: "Banjul".into(),
            business_sector: "Trade & Commerce".into(),
            business_subsector: "Retail".into(),
            employee_count: Some(12),
            annual_turnover: Some(2_000_000.0),
            risk_category: RiskCategory::Low,
            compliance_score: 0.8,
        };
        store.replace_taxpayers(std::slice::from_ref(&owner)).unwrap();

        let record = CompanyRecord {
            company_reg_no: "GC000001".into(),
            taxpayer_id: "TP-000001".into(),
            company_name: "Banjul Trading Ltd".into(),
            incorporation_date: NaiveDate::from_ymd_opt(2019, 3, 12).unwrap(),
            company_type: "Corporate".into(),
            share_capital: 500_000.0,
            directors_count: 3,
            status: "Active".into(),
        };
        store.replace_companies(std::slice::from_ref(&record)).unwrap();

        let reopened = store.reopen().unwrap();
        let back = reopened.load_companies().unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].company_reg_no, record.company_reg_no);
        assert_eq!(back[0].incorporation_date, record.incorporation_date);

        store.replace_companies(&[]).unwrap();
        assert_eq!(store.company_count().unwrap(), 0);
    }
}
