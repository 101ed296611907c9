use thiserror::Error;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data quality violation: {reason}")]
    DataQuality { reason: String },

    #[error("Missing artifact: {path}")]
    MissingArtifact { path: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid alert status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Task '{task}' failed: {reason}")]
    TaskFailed { task: String, reason: String },

    #[error("Dependency cycle in task graph involving '{task}'")]
    DependencyCycle { task: String },

    #[error("Unknown task dependency '{dependency}' declared by '{task}'")]
    UnknownDependency { task: String, dependency: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type WarehouseResult<T> = Result<T, WarehouseError>;
