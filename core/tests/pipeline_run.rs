//! End-to-end pipeline run against an in-memory warehouse.

use chrono::Datelike;

use gta_core::config::WarehouseConfig;
use gta_core::pipeline::PipelineContext;
use gta_core::rng::RngBank;
use gta_core::store::WarehouseStore;
use gta_core::tasks::build_pipeline;
use gta_core::types::{AlertStatus, RiskCategory};

fn run_pipeline(seed: u64, dir: &std::path::Path) -> PipelineContext {
    let store = WarehouseStore::in_memory().unwrap();
    store.migrate().unwrap();
    let config = WarehouseConfig::default_test();
    store
        .insert_run("test-run", seed, "test", config.generator.end_date)
        .unwrap();
    let as_of = config.generator.end_date;
    let mut ctx = PipelineContext {
        store,
        config,
        rng_bank: RngBank::new(seed),
        run_id: "test-run".into(),
        artifacts_dir: dir.join("artifacts"),
        model_path: dir.join("fraud_model.json"),
        as_of,
    };
    build_pipeline().run(&mut ctx).unwrap();
    ctx
}

#[test]
fn full_run_populates_every_layer() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = run_pipeline(42, dir.path());
    let store = &ctx.store;

    assert_eq!(store.taxpayer_count().unwrap(), 60);
    assert!(store.return_count().unwrap() > 0);
    assert!(store.payment_count().unwrap() > 0);
    assert!(store.company_count().unwrap() > 0);
    assert!(store.alert_count().unwrap() > 0);

    // Both tax types forecast over the configured horizon.
    let horizon = ctx.config.generator.forecast_horizon_months as usize;
    let forecasts = store.load_forecasts().unwrap();
    assert_eq!(forecasts.len(), horizon * 2);
    for f in &forecasts {
        assert!(f.lower_bound <= f.predicted && f.predicted <= f.upper_bound);
        assert!(f.forecast_date > ctx.config.generator.end_date.with_day(1).unwrap());
    }

    assert!(ctx.model_path.exists());
}

#[test]
fn scores_and_write_backs_stay_in_domain() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = run_pipeline(42, dir.path());

    let scores = ctx.store.load_scores().unwrap();
    assert!(!scores.is_empty());
    for s in &scores {
        assert!((0.0..=1.0).contains(&s.fraud_probability));
    }

    // Write-back keeps taxpayer attributes inside the generator's domain.
    for t in ctx.store.load_taxpayers().unwrap() {
        assert!(matches!(
            t.risk_category,
            RiskCategory::Low | RiskCategory::Medium | RiskCategory::High
        ));
        assert!((0.1..=0.95).contains(&t.compliance_score), "{}", t.compliance_score);
    }
}

#[test]
fn stored_payments_reconcile_exactly_with_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = run_pipeline(42, dir.path());

    let from_csv: Vec<gta_core::payment_generator::PaymentRecord> =
        gta_core::artifacts::read_csv(&ctx.artifacts_dir, gta_core::artifacts::PAYMENTS_CSV)
            .unwrap();
    let mut from_csv: Vec<(String, f64)> = from_csv
        .into_iter()
        .map(|p| (p.payment_id, p.amount))
        .collect();
    from_csv.sort_by(|a, b| a.0.cmp(&b.0));

    let stored = ctx.store.payment_amounts_ordered().unwrap();
    assert_eq!(stored.len(), from_csv.len());
    for ((_, csv_amount), db_amount) in from_csv.iter().zip(&stored) {
        assert_eq!(csv_amount.to_bits(), db_amount.to_bits());
    }
}

#[test]
fn aggregated_revenue_matches_generated_payments() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = run_pipeline(42, dir.path());

    let payments: Vec<gta_core::payment_generator::PaymentRecord> =
        gta_core::artifacts::read_csv(&ctx.artifacts_dir, gta_core::artifacts::PAYMENTS_CSV)
            .unwrap();
    let mut expected: std::collections::BTreeMap<&str, f64> = std::collections::BTreeMap::new();
    for p in &payments {
        *expected.entry(p.tax_type.as_str()).or_default() += p.amount;
    }

    let totals = ctx.store.total_revenue_by_tax_type().unwrap();
    assert_eq!(totals.len(), expected.len());
    for (tax_type, total) in &totals {
        let reference = expected[tax_type.as_str()];
        assert!(
            (total - reference).abs() < 1e-6 * reference.max(1.0),
            "{tax_type}: stored {total} vs generated {reference}"
        );
    }
}

#[test]
fn rerun_on_the_same_store_does_not_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let store = WarehouseStore::in_memory().unwrap();
    store.migrate().unwrap();
    let config = WarehouseConfig::default_test();
    let as_of = config.generator.end_date;
    let mut ctx = PipelineContext {
        store,
        config,
        rng_bank: RngBank::new(7),
        run_id: "rerun".into(),
        artifacts_dir: dir.path().join("artifacts"),
        model_path: dir.path().join("fraud_model.json"),
        as_of,
    };
    build_pipeline().run(&mut ctx).unwrap();
    let taxpayers = ctx.store.taxpayer_count().unwrap();
    let payments = ctx.store.payment_count().unwrap();
    let forecasts = ctx.store.forecast_count().unwrap();
    let alerts = ctx.store.alert_count().unwrap();

    // Second run over the same warehouse: raw tables reload, alerts
    // rebuild, forecasts upsert in place.
    ctx.rng_bank = RngBank::new(7);
    build_pipeline().run(&mut ctx).unwrap();
    assert_eq!(ctx.store.taxpayer_count().unwrap(), taxpayers);
    assert_eq!(ctx.store.payment_count().unwrap(), payments);
    assert_eq!(ctx.store.forecast_count().unwrap(), forecasts);
    assert_eq!(ctx.store.alert_count().unwrap(), alerts);
}

#[test]
fn alert_lifecycle_is_one_directional_in_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = run_pipeline(42, dir.path());

    let alerts = ctx.store.load_alerts().unwrap();
    let first = &alerts[0];
    assert_eq!(first.status, AlertStatus::Open);

    ctx.store
        .set_alert_status(first.alert_id, AlertStatus::UnderInvestigation)
        .unwrap();
    ctx.store
        .set_alert_status(first.alert_id, AlertStatus::Closed)
        .unwrap();

    let err = ctx
        .store
        .set_alert_status(first.alert_id, AlertStatus::Open)
        .unwrap_err();
    assert!(matches!(
        err,
        gta_core::error::WarehouseError::InvalidTransition { .. }
    ));

    let reloaded = ctx.store.load_alerts().unwrap();
    let row = reloaded
        .iter()
        .find(|a| a.alert_id == first.alert_id)
        .unwrap();
    assert_eq!(row.status, AlertStatus::Closed);
}
