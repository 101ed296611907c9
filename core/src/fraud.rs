//! Latent fraud state for a generated population.
//!
//! A small fraction of taxpayers is selected up front as fraud actors.
//! Membership is never persisted; it only shapes generation. Downstream
//! consumers see the effects (deflated liabilities, skipped filings,
//! late part-payments) rather than the label itself.
//!
//! Distortion draws are keyed on (taxpayer, tax type, period) so the same
//! factor reaches every correlated field of one period: a return's
//! deflated liability and the payment settling it always agree.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::config::GeneratorParams;
use crate::rng::StageRng;
use crate::types::{EntityId, TaxType};

/// Fraud membership plus the distortion parameters that apply to members.
///
/// Cheap to clone; passed by value to every generation step that needs it.
#[derive(Debug, Clone)]
pub struct FraudProfile {
    members: BTreeSet<EntityId>,
    seed: u64,
    underreport_low: f64,
    underreport_high: f64,
    paye_skip_probability: f64,
    vat_skip_probability: f64,
}

impl FraudProfile {
    /// Select fraud members by independent Bernoulli draws over the
    /// population, in taxpayer order.
    pub fn select(
        taxpayer_ids: &[EntityId],
        params: &GeneratorParams,
        rng: &mut StageRng,
    ) -> Self {
        let mut members = BTreeSet::new();
        for id in taxpayer_ids {
            if rng.chance(params.fraud_fraction) {
                members.insert(id.clone());
            }
        }
        log::info!(
            "selected {} fraud actors out of {} taxpayers",
            members.len(),
            taxpayer_ids.len()
        );
        Self {
            members,
            seed: rng.stage_seed(),
            underreport_low: params.underreport_low,
            underreport_high: params.underreport_high,
            paye_skip_probability: params.paye_skip_probability,
            vat_skip_probability: params.vat_skip_probability,
        }
    }

    #[cfg(test)]
    pub fn for_test(members: BTreeSet<EntityId>, params: &GeneratorParams, seed: u64) -> Self {
        Self {
            members,
            seed,
            underreport_low: params.underreport_low,
            underreport_high: params.underreport_high,
            paye_skip_probability: params.paye_skip_probability,
            vat_skip_probability: params.vat_skip_probability,
        }
    }

    pub fn is_member(&self, taxpayer_id: &str) -> bool {
        self.members.contains(taxpayer_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> impl Iterator<Item = &EntityId> {
        self.members.iter()
    }

    /// Liability deflation factor for one taxpayer-period.
    ///
    /// Returns 1.0 for honest taxpayers, otherwise a factor in
    /// [underreport_low, underreport_high). The draw is a pure function of
    /// (seed, taxpayer, tax type, period), so callers working on different
    /// correlated fields of the same period recover the same factor.
    pub fn deflation_factor(
        &self,
        taxpayer_id: &str,
        tax_type: TaxType,
        year: i32,
        period_seq: u32,
    ) -> f64 {
        if !self.is_member(taxpayer_id) {
            return 1.0;
        }
        let mut rng = self.period_rng(taxpayer_id, tax_type, year, period_seq, 0);
        let span = self.underreport_high - self.underreport_low;
        self.underreport_low + draw_unit(&mut rng) * span
    }

    /// Whether a fraud member skips filing this period entirely.
    /// Always false for honest taxpayers.
    pub fn skips_filing(
        &self,
        taxpayer_id: &str,
        tax_type: TaxType,
        year: i32,
        period_seq: u32,
    ) -> bool {
        if !self.is_member(taxpayer_id) {
            return false;
        }
        let p = match tax_type {
            TaxType::Paye => self.paye_skip_probability,
            TaxType::Vat => self.vat_skip_probability,
        };
        let mut rng = self.period_rng(taxpayer_id, tax_type, year, period_seq, 1);
        draw_unit(&mut rng) < p
    }

    fn period_rng(
        &self,
        taxpayer_id: &str,
        tax_type: TaxType,
        year: i32,
        period_seq: u32,
        purpose: u64,
    ) -> Pcg64Mcg {
        let mut h = fnv1a(self.seed ^ purpose.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        for b in taxpayer_id.as_bytes() {
            h = fnv1a_byte(h, *b);
        }
        h = fnv1a_byte(h, match tax_type {
            TaxType::Paye => 1,
            TaxType::Vat => 2,
        });
        for b in (year as u64).to_le_bytes() {
            h = fnv1a_byte(h, b);
        }
        for b in (period_seq as u64).to_le_bytes() {
            h = fnv1a_byte(h, b);
        }
        Pcg64Mcg::seed_from_u64(h)
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(seed: u64) -> u64 {
    let mut h = FNV_OFFSET;
    for b in seed.to_le_bytes() {
        h = fnv1a_byte(h, b);
    }
    h
}

fn fnv1a_byte(h: u64, b: u8) -> u64 {
    (h ^ u64::from(b)).wrapping_mul(FNV_PRIME)
}

fn draw_unit(rng: &mut Pcg64Mcg) -> f64 {
    use rand::RngCore;
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}
