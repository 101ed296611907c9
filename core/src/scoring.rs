//! Model training and population scoring stages.
//!
//! Training always runs before scoring in the task graph and reads
//! only generated fields, so a model can never learn from its own
//! write-backs. Scoring refuses to run without a trained artifact.

use std::path::Path;

use chrono::NaiveDate;

use crate::alerts::FraudAlert;
use crate::error::{WarehouseError, WarehouseResult};
use crate::features::{self, FeatureRow, FEATURE_NAMES};
use crate::model::{self, ModelArtifact, StandardScaler, CANDIDATE_PARAMS};
use crate::rng::StageRng;
use crate::store::WarehouseStore;
use crate::types::{AlertStatus, EntityId, RiskBand};

/// Rule alerts at or above this risk score feed the training label.
const LABEL_ALERT_THRESHOLD: f64 = 0.7;
/// Model probabilities above this raise a fresh alert.
const ALERT_PROBABILITY_THRESHOLD: f64 = 0.7;
const VALIDATION_FRACTION: f64 = 0.2;

pub const ALERT_MODEL_FLAG: &str = "Model Risk Flag";

#[derive(Debug, Clone, PartialEq)]
pub struct FraudScore {
    pub taxpayer_id: EntityId,
    pub fraud_probability: f64,
    pub risk_band: RiskBand,
    pub scored_at: NaiveDate,
}

/// Train candidate models on a deterministic 80/20 split and keep the
/// one with the best validation AUC.
pub fn train_model(
    store: &WarehouseStore,
    rng: &mut StageRng,
    as_of: NaiveDate,
) -> WarehouseResult<ModelArtifact> {
    let rows = feature_rows(store, as_of)?;
    if rows.len() < 10 {
        return Err(WarehouseError::DataQuality {
            reason: format!("only {} feature rows, too few to train on", rows.len()),
        });
    }

    let mut order: Vec<usize> = (0..rows.len()).collect();
    shuffle(&mut order, rng);
    let validation_size = ((rows.len() as f64 * VALIDATION_FRACTION) as usize).max(1);
    let (validation_idx, train_idx) = order.split_at(validation_size);

    let train_raw: Vec<Vec<f64>> = train_idx.iter().map(|&i| rows[i].values.clone()).collect();
    let train_labels: Vec<bool> = train_idx.iter().map(|&i| rows[i].label).collect();
    let scaler = StandardScaler::fit(&train_raw)?;
    let train_scaled: Vec<Vec<f64>> = train_raw.iter().map(|r| scaler.transform(r)).collect();

    let validation_scaled: Vec<Vec<f64>> = validation_idx
        .iter()
        .map(|&i| scaler.transform(&rows[i].values))
        .collect();
    let validation_labels: Vec<bool> = validation_idx.iter().map(|&i| rows[i].label).collect();

    let mut best: Option<(f64, model::LogisticModel)> = None;
    for params in CANDIDATE_PARAMS {
        let candidate = model::train(&train_scaled, &train_labels, *params)?;
        let scores: Vec<f64> = validation_scaled.iter().map(|r| candidate.predict(r)).collect();
        let auc = model::roc_auc(&scores, &validation_labels);
        log::info!(
            "candidate lr={} epochs={} l2={}: validation AUC {:.3}",
            params.learning_rate,
            params.epochs,
            params.l2,
            auc
        );
        if best.as_ref().map_or(true, |(b, _)| auc > *b) {
            best = Some((auc, candidate));
        }
    }
    let (validation_auc, winner) = best.ok_or_else(|| WarehouseError::DataQuality {
        reason: "no training candidates configured".into(),
    })?;
    log::info!("selected model with validation AUC {:.3}", validation_auc);

    Ok(ModelArtifact {
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        scaler,
        model: winner,
        validation_auc,
        trained_at: as_of,
    })
}

/// Score every eligible taxpayer with a persisted artifact, store the
/// probabilities, write risk attributes back to the taxpayer table,
/// and raise an alert for every probability above the threshold.
pub fn score_population(
    store: &WarehouseStore,
    artifact_path: &Path,
    as_of: NaiveDate,
) -> WarehouseResult<Vec<FraudScore>> {
    let artifact = ModelArtifact::load(artifact_path)?;
    if artifact.feature_names != FEATURE_NAMES {
        return Err(WarehouseError::DataQuality {
            reason: format!(
                "model artifact feature layout {:?} does not match {:?}",
                artifact.feature_names, FEATURE_NAMES
            ),
        });
    }

    let rows = feature_rows(store, as_of)?;
    let mut scores = Vec::with_capacity(rows.len());
    let mut model_alerts = Vec::new();
    for row in &rows {
        let p = artifact.model.predict(&artifact.scaler.transform(&row.values));
        let band = RiskBand::from_probability(p);
        if p > ALERT_PROBABILITY_THRESHOLD {
            model_alerts.push(FraudAlert {
                taxpayer_id: row.taxpayer_id.clone(),
                alert_date: as_of,
                alert_type: ALERT_MODEL_FLAG.to_string(),
                risk_score: p,
                description: format!("Model fraud probability {:.2} ({} band)", p, band.as_str()),
                status: AlertStatus::Open,
            });
        }
        scores.push(FraudScore {
            taxpayer_id: row.taxpayer_id.clone(),
            fraud_probability: p,
            risk_band: band,
            scored_at: as_of,
        });
    }

    store.replace_scores(&scores)?;
    for score in &scores {
        // Taxpayer compliance is refreshed as the probability
        // complement, clamped to the generator's domain.
        store.update_risk_assessment(
            &score.taxpayer_id,
            score.risk_band.to_risk_category(),
            (1.0 - score.fraud_probability).clamp(0.1, 0.95),
        )?;
    }
    store.insert_alerts(&model_alerts)?;
    log::info!(
        "scored {} taxpayers, {} above the alert threshold",
        scores.len(),
        model_alerts.len()
    );
    Ok(scores)
}

fn feature_rows(store: &WarehouseStore, as_of: NaiveDate) -> WarehouseResult<Vec<FeatureRow>> {
    let taxpayers = store.load_taxpayers()?;
    let returns = store.load_returns()?;
    let payments = store.load_payments()?;
    let flagged = store.flagged_taxpayer_ids(LABEL_ALERT_THRESHOLD)?;
    Ok(features::extract(&taxpayers, &returns, &payments, &flagged, as_of))
}

/// Fisher-Yates over index order.
fn shuffle(order: &mut [usize], rng: &mut StageRng) {
    for i in (1..order.len()).rev() {
        let j = rng.next_u64_below(i as u64 + 1) as usize;
        order.swap(i, j);
    }
}
