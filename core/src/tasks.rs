//! The warehouse pipeline's concrete tasks.
//!
//! generate -> load -> quality_check -> rule_alerts -> train_model -> score
//!                                  \-> forecast
//!
//! Generation talks only to the artifacts directory; everything from
//! load onward talks only to the store.

use crate::alerts;
use crate::artifacts;
use crate::error::WarehouseResult;
use crate::forecast::forecast_revenue;
use crate::payment_generator::{generate_payments, PaymentRecord};
use crate::pipeline::{Pipeline, PipelineContext, PipelineTask};
use crate::registry_generator::{generate_registry, CompanyRecord};
use crate::return_generator::{generate_returns, ReturnRecord};
use crate::rng::StageSlot;
use crate::scoring;
use crate::taxpayer_generator::{generate_taxpayers, TaxpayerRecord};
use crate::types::TaxType;

pub const TASK_GENERATE: &str = "generate";
pub const TASK_LOAD: &str = "load";
pub const TASK_QUALITY: &str = "quality_check";
pub const TASK_RULE_ALERTS: &str = "rule_alerts";
pub const TASK_TRAIN: &str = "train_model";
pub const TASK_SCORE: &str = "score";
pub const TASK_FORECAST: &str = "forecast";

/// The standard warehouse pipeline.
pub fn build_pipeline() -> Pipeline {
    let mut pipeline = Pipeline::new();
    pipeline
        .register(Box::new(GenerateTask))
        .register(Box::new(LoadTask))
        .register(Box::new(QualityCheckTask))
        .register(Box::new(RuleAlertsTask))
        .register(Box::new(TrainModelTask))
        .register(Box::new(ScoreTask))
        .register(Box::new(ForecastTask));
    pipeline
}

/// Generate the synthetic population and write the CSV artifacts.
/// The fraud profile is created here and handed down by value; it
/// never leaves this task.
pub struct GenerateTask;

impl PipelineTask for GenerateTask {
    fn name(&self) -> &'static str {
        TASK_GENERATE
    }

    fn run(&mut self, ctx: &mut PipelineContext) -> WarehouseResult<()> {
        let population = generate_taxpayers(
            &ctx.config,
            &mut ctx.rng_bank.for_stage(StageSlot::Taxpayer),
            &mut ctx.rng_bank.for_stage(StageSlot::FraudSelection),
        )?;
        let returns = generate_returns(
            &ctx.config,
            &population.taxpayers,
            &population.fraud,
            &mut ctx.rng_bank.for_stage(StageSlot::Returns),
        );
        let payments = generate_payments(
            &ctx.config,
            &population.taxpayers,
            &returns,
            &population.fraud,
            &mut ctx.rng_bank.for_stage(StageSlot::Payments),
        );
        let companies = generate_registry(
            &population.taxpayers,
            &mut ctx.rng_bank.for_stage(StageSlot::Registry),
        );

        artifacts::write_csv(&ctx.artifacts_dir, artifacts::TAXPAYERS_CSV, &population.taxpayers)?;
        artifacts::write_csv(&ctx.artifacts_dir, artifacts::RETURNS_CSV, &returns)?;
        artifacts::write_csv(&ctx.artifacts_dir, artifacts::PAYMENTS_CSV, &payments)?;
        artifacts::write_csv(&ctx.artifacts_dir, artifacts::REGISTRY_CSV, &companies)?;
        Ok(())
    }
}

/// Truncate-and-reload the raw layer from the CSV artifacts.
pub struct LoadTask;

impl PipelineTask for LoadTask {
    fn name(&self) -> &'static str {
        TASK_LOAD
    }

    fn upstream(&self) -> &'static [&'static str] {
        &[TASK_GENERATE]
    }

    fn run(&mut self, ctx: &mut PipelineContext) -> WarehouseResult<()> {
        let taxpayers: Vec<TaxpayerRecord> =
            artifacts::read_csv(&ctx.artifacts_dir, artifacts::TAXPAYERS_CSV)?;
        let returns: Vec<ReturnRecord> =
            artifacts::read_csv(&ctx.artifacts_dir, artifacts::RETURNS_CSV)?;
        let payments: Vec<PaymentRecord> =
            artifacts::read_csv(&ctx.artifacts_dir, artifacts::PAYMENTS_CSV)?;
        let companies: Vec<CompanyRecord> =
            artifacts::read_csv(&ctx.artifacts_dir, artifacts::REGISTRY_CSV)?;

        ctx.store.replace_taxpayers(&taxpayers)?;
        ctx.store.replace_returns(&returns)?;
        ctx.store.replace_payments(&payments)?;
        ctx.store.replace_companies(&companies)?;
        Ok(())
    }
}

/// Fail the run on any raw-layer quality violation.
pub struct QualityCheckTask;

impl PipelineTask for QualityCheckTask {
    fn name(&self) -> &'static str {
        TASK_QUALITY
    }

    fn upstream(&self) -> &'static [&'static str] {
        &[TASK_LOAD]
    }

    fn run(&mut self, ctx: &mut PipelineContext) -> WarehouseResult<()> {
        ctx.store.quality_check()
    }
}

/// Run the three rule detectors and persist their alerts. Clears the
/// alert table first so reruns do not stack duplicates.
pub struct RuleAlertsTask;

impl PipelineTask for RuleAlertsTask {
    fn name(&self) -> &'static str {
        TASK_RULE_ALERTS
    }

    fn upstream(&self) -> &'static [&'static str] {
        &[TASK_QUALITY]
    }

    fn run(&mut self, ctx: &mut PipelineContext) -> WarehouseResult<()> {
        ctx.store.clear_alerts()?;

        let quarterly = ctx.store.quarterly_revenue_by_taxpayer()?;
        let channels = ctx.store.channel_counts()?;
        let comparison = ctx.store.sector_payment_comparison()?;

        let mut all = alerts::revenue_drop_alerts(&quarterly, ctx.as_of);
        all.extend(alerts::channel_diversity_alerts(&channels, ctx.as_of));
        all.extend(alerts::sector_comparison_alerts(&comparison, ctx.as_of));
        ctx.store.insert_alerts(&all)?;
        log::info!("raised {} rule alerts", all.len());
        Ok(())
    }
}

/// Train the fraud model and persist the artifact.
pub struct TrainModelTask;

impl PipelineTask for TrainModelTask {
    fn name(&self) -> &'static str {
        TASK_TRAIN
    }

    fn upstream(&self) -> &'static [&'static str] {
        &[TASK_RULE_ALERTS]
    }

    fn run(&mut self, ctx: &mut PipelineContext) -> WarehouseResult<()> {
        let artifact = scoring::train_model(
            &ctx.store,
            &mut ctx.rng_bank.for_stage(StageSlot::Training),
            ctx.as_of,
        )?;
        artifact.save(&ctx.model_path)
    }
}

/// Score the population with the persisted artifact.
pub struct ScoreTask;

impl PipelineTask for ScoreTask {
    fn name(&self) -> &'static str {
        TASK_SCORE
    }

    fn upstream(&self) -> &'static [&'static str] {
        &[TASK_TRAIN]
    }

    fn run(&mut self, ctx: &mut PipelineContext) -> WarehouseResult<()> {
        scoring::score_population(&ctx.store, &ctx.model_path, ctx.as_of)?;
        Ok(())
    }
}

/// Forecast monthly revenue per tax type from collected payments.
pub struct ForecastTask;

impl PipelineTask for ForecastTask {
    fn name(&self) -> &'static str {
        TASK_FORECAST
    }

    fn upstream(&self) -> &'static [&'static str] {
        &[TASK_QUALITY]
    }

    fn run(&mut self, ctx: &mut PipelineContext) -> WarehouseResult<()> {
        let horizon = ctx.config.generator.forecast_horizon_months;
        for tax_type in [TaxType::Paye, TaxType::Vat] {
            let series = ctx.store.monthly_revenue_series(tax_type)?;
            let rows = forecast_revenue(&series, tax_type, horizon, ctx.as_of)?;
            ctx.store.upsert_forecasts(&rows)?;
        }
        Ok(())
    }
}
