//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Pipeline tasks call store methods; they never execute SQL directly.
//! All statements are parameterized. Values never reach SQL text by
//! string formatting.
//!
//! SQLite has no schemas, so the warehouse's raw.* and analytics.*
//! namespaces become raw_ and analytics_ table prefixes.

mod alert;
mod forecast;
mod payment;
mod registry;
mod returns;
mod taxpayer;

pub use alert::AlertRow;
pub use payment::{MonthlyRevenueRow, QuarterlyRevenueRow, SectorComparisonRow};

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{WarehouseError, WarehouseResult};

pub struct WarehouseStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl WarehouseStore {
    pub fn open(path: &str) -> WarehouseResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> WarehouseResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases this returns a fresh, isolated database.
    pub fn reopen(&self) -> WarehouseResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> WarehouseResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_raw.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_analytics.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id: &str,
        seed: u64,
        version: &str,
        started_at: NaiveDate,
    ) -> WarehouseResult<()> {
        self.conn.execute(
            "INSERT INTO pipeline_run (run_id, seed, version, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![run_id, seed as i64, version, date_to_sql(started_at)],
        )?;
        Ok(())
    }

    // ── Data quality ───────────────────────────────────────────

    /// Post-load validation of the raw layer. Any violation fails the
    /// run; quality problems are never logged-and-continued.
    pub fn quality_check(&self) -> WarehouseResult<()> {
        let empty_tins: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_taxpayers WHERE tin IS NULL OR tin = ''",
            [],
            |row| row.get(0),
        )?;
        if empty_tins > 0 {
            return Err(WarehouseError::DataQuality {
                reason: format!("{empty_tins} taxpayers with empty TIN"),
            });
        }

        let duplicate_tins: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (
                 SELECT tin FROM raw_taxpayers GROUP BY tin HAVING COUNT(*) > 1
             )",
            [],
            |row| row.get(0),
        )?;
        if duplicate_tins > 0 {
            return Err(WarehouseError::DataQuality {
                reason: format!("{duplicate_tins} duplicated TINs"),
            });
        }

        let orphan_returns: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_tax_returns r
             LEFT JOIN raw_taxpayers t ON t.taxpayer_id = r.taxpayer_id
             WHERE t.taxpayer_id IS NULL",
            [],
            |row| row.get(0),
        )?;
        if orphan_returns > 0 {
            return Err(WarehouseError::DataQuality {
                reason: format!("{orphan_returns} returns without a taxpayer"),
            });
        }

        let negative_payments: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_payments WHERE amount < 0",
            [],
            |row| row.get(0),
        )?;
        if negative_payments > 0 {
            return Err(WarehouseError::DataQuality {
                reason: format!("{negative_payments} negative payment amounts"),
            });
        }

        log::info!("data quality checks passed");
        Ok(())
    }
}

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_sql(text: &str) -> WarehouseResult<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| WarehouseError::DataQuality {
        reason: format!("unparseable date '{text}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_cleanly_and_idempotently() {
        let store = WarehouseStore::in_memory().unwrap();
        store.migrate().unwrap();
        store.migrate().unwrap();
        store
            .insert_run("run-1", 42, "0.1.0", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap();
    }

    #[test]
    fn quality_check_passes_on_empty_warehouse() {
        let store = WarehouseStore::in_memory().unwrap();
        store.migrate().unwrap();
        store.quality_check().unwrap();
    }

    #[test]
    fn quality_check_rejects_duplicated_tins() {
        use crate::taxpayer_generator::TaxpayerRecord;
        use crate::types::{RiskCategory, TaxpayerType};

        let store = WarehouseStore::in_memory().unwrap();
        store.migrate().unwrap();

        let template = TaxpayerRecord {
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
        let mut twin = template.clone();
        twin.taxpayer_id = "TP-000002".into();
        store.replace_taxpayers(&[template, twin]).unwrap();

        let err = store.quality_check().unwrap_err();
        assert!(err.to_string().contains("duplicated TIN"), "{err}");
    }

    #[test]
    fn date_round_trip() {
        let d = NaiveDate::from_ymd_opt(2023, 7, 15).unwrap();
        assert_eq!(date_from_sql(&date_to_sql(d)).unwrap(), d);
        assert!(date_from_sql("nonsense").is_err());
    }
}
