//! End-of-run warehouse summary.
//!
//! Summaries are best-effort: a failed query logs a warning and
//! degrades to a default instead of failing the run, since the
//! pipeline work is already committed by the time this reads.

use serde::Serialize;

use crate::store::WarehouseStore;

#[derive(Debug, Clone, Default, Serialize)]
pub struct WarehouseSummary {
    pub taxpayers: i64,
    pub high_risk_taxpayers: i64,
    pub tax_returns: i64,
    pub payments: i64,
    pub companies: i64,
    pub alerts: i64,
    pub open_alerts: i64,
    pub forecast_rows: i64,
    pub revenue_by_tax_type: Vec<(String, f64)>,
    pub taxpayers_by_region: Vec<(String, i64)>,
}

impl WarehouseSummary {
    pub fn collect(store: &WarehouseStore) -> Self {
        Self {
            taxpayers: or_zero("taxpayer count", store.taxpayer_count()),
            high_risk_taxpayers: or_zero("high risk count", store.high_risk_taxpayer_count()),
            tax_returns: or_zero("return count", store.return_count()),
            payments: or_zero("payment count", store.payment_count()),
            companies: or_zero("company count", store.company_count()),
            alerts: or_zero("alert count", store.alert_count()),
            open_alerts: or_zero("open alert count", store.open_alert_count()),
            forecast_rows: or_zero("forecast count", store.forecast_count()),
            revenue_by_tax_type: or_default("revenue by tax type", store.total_revenue_by_tax_type()),
            taxpayers_by_region: or_default("regional distribution", store.taxpayers_by_region()),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Warehouse summary ===\n");
        out.push_str(&format!("Taxpayers:        {}\n", self.taxpayers));
        out.push_str(&format!("  high risk:      {}\n", self.high_risk_taxpayers));
        out.push_str(&format!("Tax returns:      {}\n", self.tax_returns));
        out.push_str(&format!("Payments:         {}\n", self.payments));
        out.push_str(&format!("Registry entries: {}\n", self.companies));
        out.push_str(&format!(
            "Alerts:           {} ({} open)\n",
            self.alerts, self.open_alerts
        ));
        out.push_str(&format!("Forecast rows:    {}\n", self.forecast_rows));
        for (tax_type, total) in &self.revenue_by_tax_type {
            out.push_str(&format!("Revenue {tax_type:<9} GMD {total:.2}\n"));
        }
        for (region, count) in &self.taxpayers_by_region {
            out.push_str(&format!("  {region}: {count}\n"));
        }
        out
    }
}

fn or_zero(what: &str, result: crate::error::WarehouseResult<i64>) -> i64 {
    result.unwrap_or_else(|e| {
        log::warn!("summary query '{what}' failed: {e}");
        0
    })
}

fn or_default<T: Default>(what: &str, result: crate::error::WarehouseResult<T>) -> T {
    result.unwrap_or_else(|e| {
        log::warn!("summary query '{what}' failed: {e}");
        T::default()
    })
}
