//! Feature engineering for the fraud model.
//!
//! Features are computed over business taxpayers with at least one
//! return. The training label is derived solely from pre-scoring
//! fields (generated risk category and compliance score, plus rule
//! alerts); nothing the model itself writes back ever feeds a label.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};

use crate::payment_generator::PaymentRecord;
use crate::return_generator::ReturnRecord;
use crate::taxpayer_generator::TaxpayerRecord;
use crate::types::{EntityId, ReturnStatus, RiskCategory, TaxType};

pub const FEATURE_NAMES: &[&str] = &[
    "annual_turnover",
    "employee_count",
    "years_active",
    "paye_return_count",
    "vat_return_count",
    "late_filing_rate",
    "payment_count",
    "avg_payment",
    "payment_stddev",
    "max_payment",
    "payment_consistency",
    "filing_reliability",
];

#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub taxpayer_id: EntityId,
    pub values: Vec<f64>,
    pub label: bool,
}

/// Build one feature row per eligible taxpayer.
///
/// `flagged` is the set of taxpayers carrying a live high-risk rule
/// alert; the label is true when the taxpayer either presents as
/// high-risk with sub-0.5 compliance or is in that set.
pub fn extract(
    taxpayers: &[TaxpayerRecord],
    returns: &[ReturnRecord],
    payments: &[PaymentRecord],
    flagged: &BTreeSet<EntityId>,
    as_of: NaiveDate,
) -> Vec<FeatureRow> {
    let mut returns_by_taxpayer: HashMap<&str, Vec<&ReturnRecord>> = HashMap::new();
    for r in returns {
        returns_by_taxpayer.entry(&r.taxpayer_id).or_default().push(r);
    }
    let mut payments_by_taxpayer: HashMap<&str, Vec<&PaymentRecord>> = HashMap::new();
    for p in payments {
        payments_by_taxpayer.entry(&p.taxpayer_id).or_default().push(p);
    }

    let mut rows = Vec::new();
    for taxpayer in taxpayers.iter().filter(|t| t.is_business()) {
        let trets = match returns_by_taxpayer.get(taxpayer.taxpayer_id.as_str()) {
            Some(v) if !v.is_empty() => v,
            _ => continue,
        };
        let tpays = payments_by_taxpayer
            .get(taxpayer.taxpayer_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let paye_returns = trets.iter().filter(|r| r.tax_type == TaxType::Paye).count() as f64;
        let vat_returns = trets.len() as f64 - paye_returns;
        let late_rate = trets
            .iter()
            .filter(|r| r.status == ReturnStatus::Overdue)
            .count() as f64
            / trets.len() as f64;

        let amounts: Vec<f64> = tpays.iter().map(|p| p.amount).collect();
        let avg_payment = mean(&amounts);
        let payment_stddev = std_dev(&amounts, avg_payment);
        let max_payment = amounts.iter().copied().fold(0.0f64, f64::max);

        let years_active =
            (as_of.num_days_from_ce() - taxpayer.registration_date.num_days_from_ce()) as f64
                / 365.25;

        let label = is_suspicious(taxpayer) || flagged.contains(&taxpayer.taxpayer_id);
        rows.push(FeatureRow {
            taxpayer_id: taxpayer.taxpayer_id.clone(),
            values: vec![
                taxpayer.annual_turnover.unwrap_or(0.0),
                taxpayer.employee_count.unwrap_or(0) as f64,
                years_active,
                paye_returns,
                vat_returns,
                late_rate,
                amounts.len() as f64,
                avg_payment,
                payment_stddev,
                max_payment,
                avg_payment / (payment_stddev + 1.0),
                1.0 - late_rate,
            ],
            label,
        });
    }
    rows
}

fn is_suspicious(taxpayer: &TaxpayerRecord) -> bool {
    taxpayer.risk_category == RiskCategory::High && taxpayer.compliance_score < 0.5
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WarehouseConfig;
    use crate::payment_generator::generate_payments;
    use crate::return_generator::generate_returns;
    use crate::rng::{RngBank, StageSlot};
    use crate::taxpayer_generator::generate_taxpayers;

    #[test]
    fn one_row_per_business_with_returns() {
        let mut config = WarehouseConfig::default_test();
        config.generator.population = 300;
        let bank = RngBank::new(42);
        let pop = generate_taxpayers(
            &config,
            &mut bank.for_stage(StageSlot::Taxpayer),
            &mut bank.for_stage(StageSlot::FraudSelection),
        )
        .unwrap();
        let returns = generate_returns(
            &config,
            &pop.taxpayers,
            &pop.fraud,
            &mut bank.for_stage(StageSlot::Returns),
        );
        let payments = generate_payments(
            &config,
            &pop.taxpayers,
            &returns,
            &pop.fraud,
            &mut bank.for_stage(StageSlot::Payments),
        );

        let rows = extract(
            &pop.taxpayers,
            &returns,
            &payments,
            &BTreeSet::new(),
            config.generator.end_date,
        );
        assert!(!rows.is_empty());
        for row in &rows {
            assert_eq!(row.values.len(), FEATURE_NAMES.len());
            assert!(row.values.iter().all(|v| v.is_finite()));
            let rate = row.values[5];
            assert!((0.0..=1.0).contains(&rate));
            let reliability = row.values[11];
            assert!((rate + reliability - 1.0).abs() < 1e-12);
        }
        // Fraud members that kept High risk and low compliance are labeled.
        let labeled: Vec<_> = rows.iter().filter(|r| r.label).collect();
        assert!(!labeled.is_empty(), "no positive labels in sample");
    }

    #[test]
    fn flagged_set_forces_a_positive_label() {
        let config = WarehouseConfig::default_test();
        let bank = RngBank::new(7);
        let pop = generate_taxpayers(
            &config,
            &mut bank.for_stage(StageSlot::Taxpayer),
            &mut bank.for_stage(StageSlot::FraudSelection),
        )
        .unwrap();
        let returns = generate_returns(
            &config,
            &pop.taxpayers,
            &pop.fraud,
            &mut bank.for_stage(StageSlot::Returns),
        );
        let some_business = pop
            .taxpayers
            .iter()
            .find(|t| t.is_business() && !is_suspicious(t))
            .unwrap();
        let flagged: BTreeSet<EntityId> = [some_business.taxpayer_id.clone()].into();

        let rows = extract(&pop.taxpayers, &returns, &[], &flagged, config.generator.end_date);
        let row = rows
            .iter()
            .find(|r| r.taxpayer_id == some_business.taxpayer_id)
            .unwrap();
        assert!(row.label);
    }
}
