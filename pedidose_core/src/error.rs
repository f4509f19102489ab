//! Error types for the pedidose_core library.

use crate::types::MassUnit;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pedidose_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Formulary validation error
    #[error("Formulary validation error: {0}")]
    FormularyValidation(String),

    /// Attempted a mass conversion with no defined numeric relationship (IU)
    #[error("no conversion defined between {from} and {to}")]
    UnsupportedConversion { from: MassUnit, to: MassUnit },

    /// Dose-unit string outside the recognized set
    #[error("unknown dose unit: {0:?}")]
    UnknownDoseUnit(String),

    /// Drug key absent from the formulary
    #[error("drug not found in formulary: {0:?}")]
    DrugNotFound(String),

    /// Explicit mode override names a mode the drug does not have
    #[error("drug {drug:?} has no mode {mode:?}")]
    ModeNotFound { drug: String, mode: String },

    /// No preparation mode satisfies the weight/total constraints
    #[error("no eligible preparation mode for {drug:?} at {weight_kg} kg")]
    NoEligibleMode { drug: String, weight_kg: f64 },

    /// Weight input is non-finite or not positive
    #[error("invalid weight: {0} kg")]
    InvalidWeight(f64),

    /// Flow-rate input is non-finite or negative
    #[error("invalid flow rate: {0} ml/h")]
    InvalidRate(f64),

    /// Age input outside the supported pediatric range
    #[error("invalid age: {0} years (supported range 0-18)")]
    InvalidAge(f64),
}
