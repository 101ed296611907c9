//! CSV artifacts exchanged between the generate and load stages.
//!
//! Generation writes one CSV per source table into the artifacts
//! directory; the loader reads them back. A missing artifact is always
//! fatal, never silently skipped.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{WarehouseError, WarehouseResult};

pub const TAXPAYERS_CSV: &str = "taxpayers.csv";
pub const RETURNS_CSV: &str = "tax_returns.csv";
pub const PAYMENTS_CSV: &str = "payments.csv";
pub const REGISTRY_CSV: &str = "companies_registry.csv";

/// Write rows as a headered CSV artifact, creating the directory if
/// needed. Overwrites any previous run's file.
pub fn write_csv<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> WarehouseResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let mut writer = csv::Writer::from_path(&path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::debug!("wrote {} rows to {}", rows.len(), path.display());
    Ok(path)
}

/// Read a CSV artifact back into typed rows. Fails with
/// MissingArtifact when the file does not exist.
pub fn read_csv<T: DeserializeOwned>(dir: &Path, name: &str) -> WarehouseResult<Vec<T>> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(WarehouseError::MissingArtifact {
            path: path.display().to_string(),
        });
    }
    let mut reader = csv::Reader::from_path(&path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}
