//! Companies-registry extract generation.
//!
//! One registry row per incorporated taxpayer (corporates and
//! partnerships). Incorporation precedes tax registration.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::rng::StageRng;
use crate::taxpayer_generator::TaxpayerRecord;
use crate::types::EntityId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub company_reg_no: String,
    pub taxpayer_id: EntityId,
    pub company_name: String,
    pub incorporation_date: NaiveDate,
    pub company_type: String,
    pub share_capital: f64,
    pub directors_count: i64,
    pub status: String,
}

const SHARE_CAPITAL_TIERS: &[f64] =
    &[100_000.0, 500_000.0, 1_000_000.0, 5_000_000.0, 10_000_000.0];

pub fn generate_registry(
    taxpayers: &[TaxpayerRecord],
    rng: &mut StageRng,
) -> Vec<CompanyRecord> {
    let mut companies = Vec::new();
    for (i, taxpayer) in taxpayers.iter().filter(|t| t.is_business()).enumerate() {
        let incorporation_date =
            taxpayer.registration_date - Duration::days(rng.range_i64(30, 365));
        let share_capital =
            SHARE_CAPITAL_TIERS[rng.next_u64_below(SHARE_CAPITAL_TIERS.len() as u64) as usize];
        companies.push(CompanyRecord {
            company_reg_no: format!("GC{:06}", i + 1),
            taxpayer_id: taxpayer.taxpayer_id.clone(),
            company_name: taxpayer.name.clone(),
            incorporation_date,
            company_type: taxpayer.taxpayer_type.as_str().to_string(),
            share_capital,
            directors_count: rng.range_i64(2, 7),
            status: if rng.chance(0.95) { "Active" } else { "Dormant" }.to_string(),
        });
    }
    log::info!("generated {} registry entries", companies.len());
    companies
}
