//! Payment generation against filed returns.
//!
//! Each return with a positive liability may settle through exactly one
//! payment. The payment amount always equals the return's net payable,
//! so any fraud deflation applied upstream flows through unchanged.
//! Compliance drives whether a payment happens at all and how late it
//! lands. Honest payers keep a habitual channel shaped by regional
//! digital adoption and the sector's digital-payment share; fraud
//! actors hop channels on every payment.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::WarehouseConfig;
use crate::fraud::FraudProfile;
use crate::return_generator::ReturnRecord;
use crate::rng::StageRng;
use crate::taxpayer_generator::TaxpayerRecord;
use crate::types::{EntityId, TaxType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub taxpayer_id: EntityId,
    pub return_reference: String,
    pub payment_date: NaiveDate,
    pub payment_channel: String,
    pub payment_provider: String,
    pub tax_type: TaxType,
    pub period_year: i32,
    pub period_seq: u32,
    pub amount: f64,
    pub status: String,
}

const DIGITAL_CHANNELS: &[(&str, &[&str])] = &[
    ("Mobile Money", &["Africell Money", "QMoney", "APS Wallet"]),
    ("Bank Transfer", &["Trust Bank", "GT Bank", "Ecobank", "Access Bank"]),
    ("Online Portal", &["GRA Portal"]),
];

const CASH_CHANNELS: &[(&str, &[&str])] = &[
    ("Cash", &["GRA Counter"]),
    ("Cheque", &["Trust Bank", "GT Bank", "Standard Chartered"]),
];

pub fn generate_payments(
    config: &WarehouseConfig,
    taxpayers: &[TaxpayerRecord],
    returns: &[ReturnRecord],
    fraud: &FraudProfile,
    rng: &mut StageRng,
) -> Vec<PaymentRecord> {
    let by_id: std::collections::HashMap<&str, &TaxpayerRecord> = taxpayers
        .iter()
        .map(|t| (t.taxpayer_id.as_str(), t))
        .collect();

    // Honest payers stick to one habitual channel, drawn up front in
    // taxpayer order so the stream stays stable.
    let mut habits: std::collections::HashMap<&str, (&str, &str)> = std::collections::HashMap::new();
    for t in taxpayers {
        habits.insert(t.taxpayer_id.as_str(), draw_habitual_channel(config, t, rng));
    }

    let mut payments = Vec::new();
    let mut counter = 0u64;
    for ret in returns {
        if ret.net_payable <= 0.0 {
            continue;
        }
        let taxpayer = match by_id.get(ret.taxpayer_id.as_str()) {
            Some(t) => t,
            None => continue,
        };

        let pay_probability = if fraud.is_member(&taxpayer.taxpayer_id) {
            match ret.tax_type {
                TaxType::Paye => 0.7,
                TaxType::Vat => 0.6,
            }
        } else {
            payment_tier(taxpayer.compliance_score)
        };
        if !rng.chance(pay_probability) {
            continue;
        }

        let delay = if fraud.is_member(&taxpayer.taxpayer_id) {
            rng.range_i64(0, 45)
        } else {
            rng.range_i64(-5, 10)
        };
        let anchor = ret.filing_date.unwrap_or(ret.due_date);
        let payment_date = anchor + Duration::days(delay.max(-5));

        let (channel, provider) = if fraud.is_member(&taxpayer.taxpayer_id) {
            // Fraud actors hop channels: every payment draws from the
            // full pool instead of a habitual side.
            draw_any_channel(rng)
        } else if rng.chance(0.05) {
            draw_any_channel(rng)
        } else {
            habits[taxpayer.taxpayer_id.as_str()]
        };
        counter += 1;
        payments.push(PaymentRecord {
            payment_id: format!("PAY-{:07}", counter),
            taxpayer_id: taxpayer.taxpayer_id.clone(),
            return_reference: ret.return_id.clone(),
            payment_date,
            payment_channel: channel.to_string(),
            payment_provider: provider.to_string(),
            tax_type: ret.tax_type,
            period_year: ret.period_year,
            period_seq: ret.period_seq,
            amount: ret.net_payable,
            status: "Completed".to_string(),
        });
    }

    log::info!(
        "generated {} payments against {} returns",
        payments.len(),
        returns.len()
    );
    payments
}

/// Payment propensity by compliance score.
fn payment_tier(compliance_score: f64) -> f64 {
    if compliance_score > 0.8 {
        0.95
    } else if compliance_score > 0.5 {
        0.7
    } else {
        0.4
    }
}

/// A taxpayer's habitual channel, biased by regional digital adoption
/// blended with the sector's digital-payment share.
fn draw_habitual_channel<'a>(
    config: &WarehouseConfig,
    taxpayer: &TaxpayerRecord,
    rng: &mut StageRng,
) -> (&'a str, &'a str) {
    let adoption = config
        .region(&taxpayer.region)
        .map(|r| r.digital_adoption)
        .unwrap_or(0.3);
    let sector_digital = config
        .sector(&taxpayer.business_sector)
        .map(|s| s.digital_payment)
        .unwrap_or(0.3);
    let pool = if rng.chance((adoption + sector_digital) / 2.0) {
        DIGITAL_CHANNELS
    } else {
        CASH_CHANNELS
    };
    pick_channel(pool, rng)
}

fn draw_any_channel<'a>(rng: &mut StageRng) -> (&'a str, &'a str) {
    let pool = if rng.chance(0.5) {
        DIGITAL_CHANNELS
    } else {
        CASH_CHANNELS
    };
    pick_channel(pool, rng)
}

fn pick_channel<'a>(pool: &[(&'a str, &'a [&'a str])], rng: &mut StageRng) -> (&'a str, &'a str) {
    let (channel, providers) = pool[rng.next_u64_below(pool.len() as u64) as usize];
    let provider = providers[rng.next_u64_below(providers.len() as u64) as usize];
    (channel, provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, StageSlot};
    use crate::return_generator::generate_returns;
    use crate::taxpayer_generator::generate_taxpayers;

    #[test]
    fn payment_amounts_match_return_liabilities() {
        let config = WarehouseConfig::default_test();
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
        assert!(!payments.is_empty());
        assert!(payments.len() <= returns.len());

        let by_ref: std::collections::HashMap<&str, &ReturnRecord> =
            returns.iter().map(|r| (r.return_id.as_str(), r)).collect();
        for p in &payments {
            let r = by_ref[p.return_reference.as_str()];
            assert_eq!(p.amount.to_bits(), r.net_payable.to_bits());
            assert_eq!(p.tax_type, r.tax_type);
            assert!(p.payment_date >= r.due_date - Duration::days(15));
        }

        let ids: std::collections::HashSet<_> =
            payments.iter().map(|p| p.payment_id.as_str()).collect();
        assert_eq!(ids.len(), payments.len());
    }

    #[test]
    fn fraud_actors_spread_across_more_channels() {
        let mut config = WarehouseConfig::default_test();
        config.generator.population = 500;
        let bank = RngBank::new(11);
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

        let mut channels: std::collections::HashMap<&str, std::collections::HashSet<&str>> =
            std::collections::HashMap::new();
        for p in &payments {
            channels
                .entry(p.taxpayer_id.as_str())
                .or_default()
                .insert(p.payment_channel.as_str());
        }

        let mut fraud_counts = Vec::new();
        let mut honest_counts = Vec::new();
        for (id, set) in &channels {
            // Only taxpayers with enough payments to show a habit.
            if payments.iter().filter(|p| p.taxpayer_id == *id).count() < 8 {
                continue;
            }
            if pop.fraud.is_member(id) {
                fraud_counts.push(set.len() as f64);
            } else {
                honest_counts.push(set.len() as f64);
            }
        }
        assert!(!fraud_counts.is_empty(), "no fraud payers with payments");
        let fraud_mean = fraud_counts.iter().sum::<f64>() / fraud_counts.len() as f64;
        let honest_mean = honest_counts.iter().sum::<f64>() / honest_counts.len() as f64;
        assert!(
            fraud_mean > honest_mean + 0.5,
            "fraud channel spread {fraud_mean} not above honest {honest_mean}"
        );
    }

    #[test]
    fn tier_breakpoints() {
        assert_eq!(payment_tier(0.85), 0.95);
        assert_eq!(payment_tier(0.6), 0.7);
        assert_eq!(payment_tier(0.3), 0.4);
    }
}
