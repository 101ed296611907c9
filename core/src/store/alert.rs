//! Fraud alert and model score table access.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::params;

use super::{date_from_sql, date_to_sql, WarehouseStore};
use crate::alerts::FraudAlert;
use crate::error::{WarehouseError, WarehouseResult};
use crate::scoring::FraudScore;
use crate::types::{AlertStatus, RiskBand};

/// An alert as stored, with its assigned row id.
#[derive(Debug, Clone)]
pub struct AlertRow {
    pub alert_id: i64,
    pub taxpayer_id: String,
    pub alert_date: NaiveDate,
    pub alert_type: String,
    pub risk_score: f64,
    pub description: String,
    pub status: AlertStatus,
}

impl WarehouseStore {
    /// Drop all alerts. Called at the top of the alerting stage so a
    /// rerun never duplicates its own output.
    pub fn clear_alerts(&self) -> WarehouseResult<()> {
        self.conn.execute("DELETE FROM analytics_fraud_alerts", [])?;
        Ok(())
    }

    pub fn insert_alerts(&self, alerts: &[FraudAlert]) -> WarehouseResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO analytics_fraud_alerts
                 (taxpayer_id, alert_date, alert_type, risk_score, description, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for a in alerts {
                stmt.execute(params![
                    a.taxpayer_id,
                    date_to_sql(a.alert_date),
                    a.alert_type,
                    a.risk_score,
                    a.description,
                    a.status.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_alerts(&self) -> WarehouseResult<Vec<AlertRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT alert_id, taxpayer_id, alert_date, alert_type,
                    risk_score, description, status
             FROM analytics_fraud_alerts ORDER BY alert_id",
        )?;
        let raw = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        let mut alerts = Vec::new();
        for row in raw {
            let (alert_id, taxpayer_id, date_text, alert_type, risk_score, description, status_text) =
                row?;
            alerts.push(AlertRow {
                alert_id,
                taxpayer_id,
                alert_date: date_from_sql(&date_text)?,
                alert_type,
                risk_score,
                description,
                status: AlertStatus::parse(&status_text).ok_or_else(|| {
                    WarehouseError::DataQuality {
                        reason: format!("unknown alert status '{status_text}'"),
                    }
                })?,
            });
        }
        Ok(alerts)
    }

    pub fn alert_count(&self) -> WarehouseResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM analytics_fraud_alerts",
            [],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    pub fn open_alert_count(&self) -> WarehouseResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM analytics_fraud_alerts WHERE status = 'Open'",
            [],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Advance an alert's lifecycle status. Backward moves are
    /// rejected; alerts never reopen.
    pub fn set_alert_status(&self, alert_id: i64, next: AlertStatus) -> WarehouseResult<()> {
        let current_text: String = self.conn.query_row(
            "SELECT status FROM analytics_fraud_alerts WHERE alert_id = ?1",
            params![alert_id],
            |row| row.get(0),
        )?;
        let current = AlertStatus::parse(&current_text).ok_or_else(|| {
            WarehouseError::DataQuality {
                reason: format!("unknown alert status '{current_text}'"),
            }
        })?;
        if !current.can_transition_to(next) {
            return Err(WarehouseError::InvalidTransition {
                from: current.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.conn.execute(
            "UPDATE analytics_fraud_alerts SET status = ?1 WHERE alert_id = ?2",
            params![next.as_str(), alert_id],
        )?;
        Ok(())
    }

    /// Taxpayers carrying a live alert at or above the given risk
    /// score. Feeds the training label.
    pub fn flagged_taxpayer_ids(&self, min_risk_score: f64) -> WarehouseResult<BTreeSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT taxpayer_id FROM analytics_fraud_alerts
             WHERE risk_score >= ?1 AND status != 'Closed'",
        )?;
        let rows = stmt.query_map(params![min_risk_score], |row| row.get::<_, String>(0))?;
        let mut ids = BTreeSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    // ── Model scores ───────────────────────────────────────────

    pub fn replace_scores(&self, scores: &[FraudScore]) -> WarehouseResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM analytics_fraud_scores", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO analytics_fraud_scores
                 (taxpayer_id, fraud_probability, risk_band, scored_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for s in scores {
                stmt.execute(params![
                    s.taxpayer_id,
                    s.fraud_probability,
                    s.risk_band.as_str(),
                    date_to_sql(s.scored_at),
                ])?;
            }
        }
        tx.commit()?;
        log::info!("stored {} fraud scores", scores.len());
        Ok(())
    }

    pub fn load_scores(&self) -> WarehouseResult<Vec<FraudScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT taxpayer_id, fraud_probability, risk_band, scored_at
             FROM analytics_fraud_scores ORDER BY taxpayer_id",
        )?;
        let raw = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut scores = Vec::new();
        for row in raw {
            let (taxpayer_id, fraud_probability, band_text, scored_text) = row?;
            scores.push(FraudScore {
                taxpayer_id,
                fraud_probability,
                risk_band: parse_band(&band_text)?,
                scored_at: date_from_sql(&scored_text)?,
            });
        }
        Ok(scores)
    }
}

fn parse_band(text: &str) -> WarehouseResult<RiskBand> {
    match text {
        "Low" => Ok(RiskBand::Low),
        "Medium" => Ok(RiskBand::Medium),
        "High" => Ok(RiskBand::High),
        "Critical" => Ok(RiskBand::Critical),
        _ => Err(WarehouseError::DataQuality {
            reason: format!("unknown risk band '{text}'"),
        }),
    }
}
