use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the import pipeline. Everything here is recovered
/// locally by the orchestrator; malformed records and missed reference joins
/// are skipped or degraded in place and never reach this enum.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CEP did not normalize to 8 digits")]
    InvalidCep,

    #[error("could not open {}: {source}", path.display())]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize address document: {0}")]
    Serialization(#[from] serde_json::Error),
}
