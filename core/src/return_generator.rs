//! Tax return generation for PAYE (monthly) and VAT (quarterly) periods.
//!
//! Every eligible taxpayer-period yields at most one return. Declared
//! bases are generated honestly for everyone; fraud only deflates the
//! liability derived from the base, using the per-period factor from
//! the FraudProfile. Fraud members may also skip a period outright.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::WarehouseConfig;
use crate::fraud::FraudProfile;
use crate::rng::StageRng;
use crate::taxpayer_generator::TaxpayerRecord;
use crate::types::{EntityId, ReturnStatus, TaxType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub return_id: String,
    pub taxpayer_id: EntityId,
    pub tax_type: TaxType,
    pub period_year: i32,
    /// Month number for PAYE, quarter number for VAT.
    pub period_seq: u32,
    pub due_date: NaiveDate,
    pub filing_date: Option<NaiveDate>,
    /// Declared base: gross payroll for PAYE, taxable sales for VAT.
    pub taxable_base: f64,
    pub tax_due: f64,
    pub net_payable: f64,
    pub status: ReturnStatus,
}

/// One filing period with its statutory due date.
#[derive(Debug, Clone, Copy)]
struct Period {
    year: i32,
    seq: u32,
    end: NaiveDate,
    due: NaiveDate,
}

pub fn generate_returns(
    config: &WarehouseConfig,
    taxpayers: &[TaxpayerRecord],
    fraud: &FraudProfile,
    rng: &mut StageRng,
) -> Vec<ReturnRecord> {
    let params = &config.generator;
    let paye_periods = monthly_periods(params.start_date, params.end_date);
    let vat_periods = quarterly_periods(params.start_date, params.end_date);

    let mut returns = Vec::new();
    for taxpayer in taxpayers {
        if taxpayer.taxpayer_type.files_paye() {
            for period in &paye_periods {
                if let Some(r) =
                    generate_paye_return(taxpayer, period, fraud, params.vat_rate, rng)
                {
                    returns.push(r);
                }
            }
        }
        if taxpayer.vat_registered(params.vat_registration_threshold) {
            for period in &vat_periods {
                if let Some(r) = generate_vat_return(taxpayer, period, fraud, params.vat_rate, rng)
                {
                    returns.push(r);
                }
            }
        }
    }

    log::info!("generated {} tax returns", returns.len());
    returns
}

fn generate_paye_return(
    taxpayer: &TaxpayerRecord,
    period: &Period,
    fraud: &FraudProfile,
    _vat_rate: f64,
    rng: &mut StageRng,
) -> Option<ReturnRecord> {
    if taxpayer.registration_date > period.end {
        return None;
    }
    if fraud.skips_filing(&taxpayer.taxpayer_id, TaxType::Paye, period.year, period.seq) {
        return None;
    }

    let employees = taxpayer.employee_count.unwrap_or(5) as f64;
    let avg_salary = rng.range_f64(5_000.0, 25_000.0);
    // Payroll swells around the December trading season.
    let seasonal = 1.0 + 0.2 * (period.seq as f64 * std::f64::consts::PI / 6.0).sin();
    let gross_payroll = employees * avg_salary * seasonal;
    let effective_rate = rng.range_f64(0.10, 0.25);

    let factor =
        fraud.deflation_factor(&taxpayer.taxpayer_id, TaxType::Paye, period.year, period.seq);
    let tax_due = gross_payroll * effective_rate * factor;

    let filing_date = draw_filing_date(taxpayer.compliance_score, period.due, rng);
    Some(ReturnRecord {
        return_id: format!(
            "PAYE-{}-{}{:02}",
            taxpayer.taxpayer_id, period.year, period.seq
        ),
        taxpayer_id: taxpayer.taxpayer_id.clone(),
        tax_type: TaxType::Paye,
        period_year: period.year,
        period_seq: period.seq,
        due_date: period.due,
        filing_date,
        taxable_base: round2(gross_payroll),
        tax_due: round2(tax_due),
        net_payable: round2(tax_due),
        status: ReturnStatus::derive(filing_date, period.due),
    })
}

fn generate_vat_return(
    taxpayer: &TaxpayerRecord,
    period: &Period,
    fraud: &FraudProfile,
    vat_rate: f64,
    rng: &mut StageRng,
) -> Option<ReturnRecord> {
    if taxpayer.registration_date > period.end {
        return None;
    }
    if fraud.skips_filing(&taxpayer.taxpayer_id, TaxType::Vat, period.year, period.seq) {
        return None;
    }

    let turnover = taxpayer.annual_turnover.unwrap_or(0.0);
    let quarterly_sales = turnover / 4.0 * rng.range_f64(0.8, 1.2);
    let taxable_base = quarterly_sales * 0.7;

    let factor =
        fraud.deflation_factor(&taxpayer.taxpayer_id, TaxType::Vat, period.year, period.seq);
    let tax_due = taxable_base * vat_rate * factor;

    let filing_date = draw_filing_date(taxpayer.compliance_score, period.due, rng);
    Some(ReturnRecord {
        return_id: format!(
            "VAT-{}-{}Q{}",
            taxpayer.taxpayer_id, period.year, period.seq
        ),
        taxpayer_id: taxpayer.taxpayer_id.clone(),
        tax_type: TaxType::Vat,
        period_year: period.year,
        period_seq: period.seq,
        due_date: period.due,
        filing_date,
        taxable_base: round2(taxable_base),
        tax_due: round2(tax_due),
        net_payable: round2(tax_due),
        status: ReturnStatus::derive(filing_date, period.due),
    })
}

/// Compliant payers mostly file early; the rest trail the due date.
fn draw_filing_date(
    compliance_score: f64,
    due: NaiveDate,
    rng: &mut StageRng,
) -> Option<NaiveDate> {
    if rng.chance(compliance_score) {
        Some(due + Duration::days(rng.range_i64(-10, 0)))
    } else if rng.chance(0.8) {
        Some(due + Duration::days(rng.range_i64(1, 60)))
    } else {
        None // never filed
    }
}

fn monthly_periods(start: NaiveDate, end: NaiveDate) -> Vec<Period> {
    let mut periods = Vec::new();
    let mut year = start.year();
    let mut month = start.month();
    loop {
        let first = match NaiveDate::from_ymd_opt(year, month, 1) {
            Some(d) => d,
            None => break,
        };
        let (next_year, next_month) = next_month(year, month);
        let next_first = match NaiveDate::from_ymd_opt(next_year, next_month, 1) {
            Some(d) => d,
            None => break,
        };
        let last = next_first - Duration::days(1);
        if last > end {
            break;
        }
        if first >= start {
            periods.push(Period {
                year,
                seq: month,
                end: last,
                due: due_on_15th(next_year, next_month),
            });
        }
        year = next_year;
        month = next_month;
    }
    periods
}

fn quarterly_periods(start: NaiveDate, end: NaiveDate) -> Vec<Period> {
    let mut periods = Vec::new();
    for year in start.year()..=end.year() {
        for quarter in 1..=4u32 {
            let first_month = (quarter - 1) * 3 + 1;
            let first = match NaiveDate::from_ymd_opt(year, first_month, 1) {
                Some(d) => d,
                None => continue,
            };
            let (ny, nm) = next_month(year, first_month + 2);
            let next_first = match NaiveDate::from_ymd_opt(ny, nm, 1) {
                Some(d) => d,
                None => continue,
            };
            let last = next_first - Duration::days(1);
            if first < start || last > end {
                continue;
            }
            periods.push(Period {
                year,
                seq: quarter,
                end: last,
                due: due_on_15th(ny, nm),
            });
        }
    }
    periods
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Statutory due date: the 15th of the month following the period.
fn due_on_15th(year: i32, month: u32) -> NaiveDate {
    // 15th exists in every month.
    NaiveDate::from_ymd_opt(year, month, 15).unwrap_or_else(|| {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default()
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, StageSlot};
    use crate::taxpayer_generator::generate_taxpayers;

    #[test]
    fn monthly_periods_cover_the_window() {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let periods = monthly_periods(start, end);
        assert_eq!(periods.len(), 24);
        assert_eq!(periods[0].year, 2022);
        assert_eq!(periods[0].seq, 1);
        assert_eq!(
            periods[0].due,
            NaiveDate::from_ymd_opt(2022, 2, 15).unwrap()
        );
        let last = periods.last().unwrap();
        assert_eq!((last.year, last.seq), (2023, 12));
        assert_eq!(last.due, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn quarterly_periods_cover_the_window() {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let periods = quarterly_periods(start, end);
        assert_eq!(periods.len(), 8);
        assert_eq!(
            periods[3].due,
            NaiveDate::from_ymd_opt(2023, 1, 15).unwrap()
        );
    }

    #[test]
    fn returns_follow_eligibility_and_status_rules() {
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
        assert!(!returns.is_empty());

        let by_id: std::collections::HashMap<_, _> = pop
            .taxpayers
            .iter()
            .map(|t| (t.taxpayer_id.as_str(), t))
            .collect();
        for r in &returns {
            let t = by_id[r.taxpayer_id.as_str()];
            match r.tax_type {
                TaxType::Paye => assert!(t.taxpayer_type.files_paye()),
                TaxType::Vat => {
                    assert!(t.vat_registered(config.generator.vat_registration_threshold))
                }
            }
            assert_eq!(r.status, ReturnStatus::derive(r.filing_date, r.due_date));
            assert!(r.tax_due >= 0.0);
            assert!((r.net_payable - r.tax_due).abs() < 1e-9);
        }
    }

    #[test]
    fn fraud_vat_liability_sits_below_statutory_rate() {
        let mut config = WarehouseConfig::default_test();
        config.generator.population = 400;
        let bank = RngBank::new(1);
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

        let mut fraud_vat_seen = false;
        for r in returns.iter().filter(|r| r.tax_type == TaxType::Vat) {
            if r.taxable_base <= 0.0 {
                continue;
            }
            let effective = r.tax_due / r.taxable_base;
            if pop.fraud.is_member(&r.taxpayer_id) {
                fraud_vat_seen = true;
                assert!(
                    effective < config.generator.vat_rate * config.generator.underreport_high
                        + 1e-6,
                    "fraud effective rate {effective} not deflated"
                );
                assert!(
                    effective >= config.generator.vat_rate * config.generator.underreport_low
                        - 1e-6
                );
            } else {
                assert!(
                    (effective - config.generator.vat_rate).abs() < 1e-3,
                    "honest effective rate {effective} drifted from statutory"
                );
            }
        }
        assert!(fraud_vat_seen, "no fraud VAT returns in sample");
    }
}
