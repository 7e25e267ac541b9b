//! error.rs — Error types for ingest and configuration

use thiserror::Error;
use uwb_types::ParseLevelError;

/// A range sample the receiver refused to store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("anchor {anchor_id}: distance {distance} is not finite")]
    NonFiniteDistance { anchor_id: u32, distance: f32 },

    #[error("anchor {anchor_id}: distance {distance} is negative")]
    NegativeDistance { anchor_id: u32, distance: f32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error(transparent)]
    Level(#[from] ParseLevelError),
}
