//! Synthetic taxpayer population generation.
//!
//! Taxpayers are drawn region-first (weighted by business concentration),
//! then sector (the capital gets a more diverse mix than the provinces),
//! then size and compliance attributes. Fraud members are selected in a
//! separate pass and have their risk attributes overridden so the latent
//! label is recoverable downstream only through its effects.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::WarehouseConfig;
use crate::error::{WarehouseError, WarehouseResult};
use crate::fraud::FraudProfile;
use crate::name_generator::NameGenerator;
use crate::rng::StageRng;
use crate::types::{EntityId, RiskCategory, TaxpayerType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxpayerRecord {
    pub taxpayer_id: EntityId,
    pub tin: String,
    pub name: String,
    pub taxpayer_type: TaxpayerType,
    pub registration_date: NaiveDate,
    pub region: String,
    pub district: String,
    pub business_sector: String,
    pub business_subsector: String,
    /// Absent for individual taxpayers.
    pub employee_count: Option<i64>,
    /// Absent for individual taxpayers.
    pub annual_turnover: Option<f64>,
    pub risk_category: RiskCategory,
    pub compliance_score: f64,
}

impl TaxpayerRecord {
    pub fn is_business(&self) -> bool {
        matches!(
            self.taxpayer_type,
            TaxpayerType::Corporate | TaxpayerType::Partnership
        )
    }

    /// VAT registration is mandatory above the turnover threshold.
    pub fn vat_registered(&self, threshold: f64) -> bool {
        self.annual_turnover.map_or(false, |t| t > threshold)
    }
}

/// The generated population together with its latent fraud state.
#[derive(Debug, Clone)]
pub struct GeneratedPopulation {
    pub taxpayers: Vec<TaxpayerRecord>,
    pub fraud: FraudProfile,
}

/// Generate the full taxpayer population.
///
/// `rng` drives attribute draws; `fraud_rng` drives only fraud-set
/// selection, so changing the population's attribute logic never
/// reshuffles which taxpayers are fraudulent.
pub fn generate_taxpayers(
    config: &WarehouseConfig,
    rng: &mut StageRng,
    fraud_rng: &mut StageRng,
) -> WarehouseResult<GeneratedPopulation> {
    let params = &config.generator;
    if params.population == 0 {
        return Err(WarehouseError::InvalidConfig {
            reason: "population must be > 0".into(),
        });
    }

    let region_weights: Vec<f64> = config
        .regions
        .iter()
        .map(|r| r.business_concentration)
        .collect();
    let capital = config.capital_region().to_string();

    let mut taxpayers = Vec::with_capacity(params.population);
    let mut used_tins = HashSet::with_capacity(params.population);

    for i in 0..params.population {
        let region = &config.regions[rng.weighted_index(&region_weights)];
        let in_capital = region.region == capital;
        let sector_weights: Vec<f64> = config
            .sectors
            .iter()
            .map(|s| {
                if in_capital {
                    s.capital_weight
                } else {
                    s.provincial_weight
                }
            })
            .collect();
        let sector = &config.sectors[rng.weighted_index(&sector_weights)];
        let district =
            region.districts[rng.next_u64_below(region.districts.len() as u64) as usize].clone();
        let subsector =
            sector.subsectors[rng.next_u64_below(sector.subsectors.len() as u64) as usize].clone();

        let taxpayer_type = draw_taxpayer_type(rng);
        let name = match taxpayer_type {
            TaxpayerType::Individual => NameGenerator::generate_full_name(rng),
            TaxpayerType::Ngo => format!("{} Foundation", NameGenerator::generate_last_name(rng)),
            _ => NameGenerator::generate_business_name(rng),
        };

        let years_active = rng.range_i64(0, 19);
        let registration_date = params.end_date
            - Duration::days(years_active * 365 + rng.range_i64(0, 364));

        let (employee_count, annual_turnover) = match taxpayer_type {
            TaxpayerType::Individual => (None, None),
            _ => {
                let turnover = rng.log_normal(sector.avg_revenue, params.turnover_sigma);
                let employees = rng.range_i64(2, 500);
                (Some(employees), Some(turnover))
            }
        };

        // Additive risk factors, capped at 0.95.
        let mut risk: f64 = 0.0;
        if sector.compliance_rate < 0.6 {
            risk += 0.2;
        }
        if years_active < 2 {
            risk += 0.15;
        }
        if rng.chance(0.1) {
            risk += 0.3; // unexplained reporting inconsistency
        }
        if sector.digital_payment < 0.3 {
            risk += 0.1; // cash-heavy sector
        }
        let risk = risk.min(0.95);

        let compliance = (rng.normal(sector.compliance_rate, params.compliance_noise)
            - risk / 2.0)
            .clamp(0.1, 0.95);

        taxpayers.push(TaxpayerRecord {
            taxpayer_id: format!("TP-{:06}", i + 1),
            tin: draw_unique_tin(rng, &mut used_tins),
            name,
            taxpayer_type,
            registration_date,
            region: region.region.clone(),
            district,
            business_sector: sector.sector.clone(),
            business_subsector: subsector,
            employee_count,
            annual_turnover,
            risk_category: RiskCategory::from_score(risk),
            compliance_score: compliance,
        });
    }

    let ids: Vec<EntityId> = taxpayers.iter().map(|t| t.taxpayer_id.clone()).collect();
    let fraud = FraudProfile::select(&ids, params, fraud_rng);

    // Fraud members present as high-risk, low-compliance payers. The
    // label itself is carried only on the FraudProfile value.
    for taxpayer in &mut taxpayers {
        if fraud.is_member(&taxpayer.taxpayer_id) {
            taxpayer.risk_category = RiskCategory::High;
            taxpayer.compliance_score = rng.range_f64(0.2, 0.5);
        }
    }

    log::info!(
        "generated {} taxpayers ({} businesses)",
        taxpayers.len(),
        taxpayers.iter().filter(|t| t.is_business()).count()
    );
    Ok(GeneratedPopulation { taxpayers, fraud })
}

fn draw_taxpayer_type(rng: &mut StageRng) -> TaxpayerType {
    // Corporate-heavy mix; registered individuals and NGOs are the tail.
    match rng.weighted_index(&[0.15, 0.55, 0.22, 0.08]) {
        0 => TaxpayerType::Individual,
        1 => TaxpayerType::Corporate,
        2 => TaxpayerType::Partnership,
        _ => TaxpayerType::Ngo,
    }
}

/// Draw a TIN in the XXX-XXXXXX-X format, re-rolling on collision so
/// the uniqueness invariant holds by construction.
fn draw_unique_tin(rng: &mut StageRng, used: &mut HashSet<String>) -> String {
    loop {
        let tin = format!(
            "{:03}-{:06}-{}",
            rng.range_i64(100, 999),
            rng.range_i64(100_000, 999_999),
            rng.range_i64(1, 9)
        );
        if used.insert(tin.clone()) {
            return tin;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, StageSlot};

    fn generate(seed: u64) -> GeneratedPopulation {
        generate_sized(seed, WarehouseConfig::default_test().generator.population)
    }

    fn generate_sized(seed: u64, population: usize) -> GeneratedPopulation {
        let mut config = WarehouseConfig::default_test();
        config.generator.population = population;
        let bank = RngBank::new(seed);
        generate_taxpayers(
            &config,
            &mut bank.for_stage(StageSlot::Taxpayer),
            &mut bank.for_stage(StageSlot::FraudSelection),
        )
        .unwrap()
    }

    #[test]
    fn population_size_and_unique_identifiers() {
        let pop = generate(42);
        assert_eq!(pop.taxpayers.len(), 60);

        let tins: HashSet<_> = pop.taxpayers.iter().map(|t| t.tin.as_str()).collect();
        assert_eq!(tins.len(), pop.taxpayers.len());
        let ids: HashSet<_> = pop.taxpayers.iter().map(|t| t.taxpayer_id.as_str()).collect();
        assert_eq!(ids.len(), pop.taxpayers.len());
        for t in &pop.taxpayers {
            assert!(!t.tin.is_empty());
            assert_eq!(t.tin.len(), 12, "TIN shape XXX-XXXXXX-X: {}", t.tin);
        }
    }

    #[test]
    fn attributes_stay_in_domain() {
        let pop = generate(42);
        for t in &pop.taxpayers {
            assert!((0.1..=0.95).contains(&t.compliance_score), "{}", t.compliance_score);
            if t.taxpayer_type == TaxpayerType::Individual {
                assert!(t.annual_turnover.is_none());
                assert!(t.employee_count.is_none());
            }
        }
    }

    #[test]
    fn fraud_members_present_as_high_risk() {
        let pop = generate_sized(42, 400);
        assert!(pop.fraud.member_count() > 0);
        for t in &pop.taxpayers {
            if pop.fraud.is_member(&t.taxpayer_id) {
                assert_eq!(t.risk_category, RiskCategory::High);
                assert!(t.compliance_score < 0.5);
            }
        }
    }

    #[test]
    fn same_seed_reproduces_population() {
        let a = generate(1234);
        let b = generate(1234);
        for (x, y) in a.taxpayers.iter().zip(&b.taxpayers) {
            assert_eq!(x.tin, y.tin);
            assert_eq!(x.name, y.name);
            assert_eq!(x.compliance_score.to_bits(), y.compliance_score.to_bits());
        }
    }
}
