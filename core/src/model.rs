//! Logistic fraud model: standardization, gradient-descent training,
//! rank-based AUC, and the JSON model artifact.
//!
//! The artifact bundles the scaler, weights, and the feature-name list
//! it was trained on; scoring refuses to run against a feature layout
//! it does not recognize.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{WarehouseError, WarehouseResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub std_devs: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-column mean and standard deviation. Constant columns
    /// get a unit deviation so transform never divides by zero.
    pub fn fit(rows: &[Vec<f64>]) -> WarehouseResult<Self> {
        let first = rows.first().ok_or_else(|| WarehouseError::DataQuality {
            reason: "cannot fit scaler on an empty feature matrix".into(),
        })?;
        let dims = first.len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; dims];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut std_devs = vec![0.0; dims];
        for row in rows {
            for ((s, v), m) in std_devs.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        for s in &mut std_devs {
            *s = (*s / n).sqrt();
            if *s < 1e-12 {
                *s = 1.0;
            }
        }
        Ok(Self { means, std_devs })
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.means)
            .zip(&self.std_devs)
            .map(|((v, m), s)| (v - m) / s)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticModel {
    /// Probability for one already-scaled feature row.
    pub fn predict(&self, scaled: &[f64]) -> f64 {
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(scaled)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        sigmoid(z)
    }
}

/// One training configuration; candidates compete on validation AUC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

pub const CANDIDATE_PARAMS: &[TrainParams] = &[
    TrainParams { learning_rate: 0.1, epochs: 300, l2: 0.0 },
    TrainParams { learning_rate: 0.1, epochs: 300, l2: 0.01 },
    TrainParams { learning_rate: 0.03, epochs: 600, l2: 0.001 },
];

/// Full-batch gradient descent on scaled features.
pub fn train(
    scaled: &[Vec<f64>],
    labels: &[bool],
    params: TrainParams,
) -> WarehouseResult<LogisticModel> {
    if scaled.is_empty() || scaled.len() != labels.len() {
        return Err(WarehouseError::DataQuality {
            reason: format!(
                "training set shape mismatch: {} rows, {} labels",
                scaled.len(),
                labels.len()
            ),
        });
    }
    let dims = scaled[0].len();
    let n = scaled.len() as f64;
    let mut model = LogisticModel {
        weights: vec![0.0; dims],
        bias: 0.0,
    };

    for _ in 0..params.epochs {
        let mut grad_w = vec![0.0; dims];
        let mut grad_b = 0.0;
        for (row, &label) in scaled.iter().zip(labels) {
            let err = model.predict(row) - if label { 1.0 } else { 0.0 };
            for (g, x) in grad_w.iter_mut().zip(row) {
                *g += err * x;
            }
            grad_b += err;
        }
        for (w, g) in model.weights.iter_mut().zip(&grad_w) {
            *w -= params.learning_rate * (g / n + params.l2 * *w);
        }
        model.bias -= params.learning_rate * grad_b / n;
    }
    Ok(model)
}

/// Rank-based ROC AUC (Mann-Whitney). Returns 0.5 when either class
/// is absent, which keeps candidate selection well-defined on
/// degenerate validation splits.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> f64 {
    let mut pairs: Vec<(f64, bool)> = scores.iter().copied().zip(labels.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let positives = labels.iter().filter(|&&l| l).count() as f64;
    let negatives = labels.len() as f64 - positives;
    if positives == 0.0 || negatives == 0.0 {
        return 0.5;
    }

    // Midranks handle ties.
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        while j < pairs.len() && pairs[j].0 == pairs[i].0 {
            j += 1;
        }
        let midrank = (i + 1 + j) as f64 / 2.0;
        for pair in &pairs[i..j] {
            if pair.1 {
                rank_sum_pos += midrank;
            }
        }
        i = j;
    }
    (rank_sum_pos - positives * (positives + 1.0) / 2.0) / (positives * negatives)
}

/// The persisted model: everything scoring needs to reproduce
/// training-time preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub model: LogisticModel,
    pub validation_auc: f64,
    pub trained_at: chrono::NaiveDate,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> WarehouseResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("saved model artifact to {}", path.display());
        Ok(())
    }

    /// Load a previously trained artifact. A missing file is fatal:
    /// scoring must never fall back to an untrained model.
    pub fn load(path: &Path) -> WarehouseResult<Self> {
        if !path.exists() {
            return Err(WarehouseError::MissingArtifact {
                path: path.display().to_string(),
            });
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
