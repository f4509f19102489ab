#![forbid(unsafe_code)]

//! Core domain model and computation engine for the Pedidose pediatric
//! critical-care calculator.
//!
//! This crate provides:
//! - Domain types (units, modes, drugs, results)
//! - The drug formulary (built-in registry + JSON loading)
//! - The perfusion engine (mode selection, preparation, rate conversion)
//! - Supplementary calculators (weight estimation, bolus dosing, vitals)

pub mod types;
pub mod error;
pub mod units;
pub mod formulary;
pub mod engine;
pub mod weight;
pub mod dosing;
pub mod vitals;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use engine::{choose_mode, compute, compute_preparation, dose_at_rate};
pub use formulary::{build_default_formulary, get_default_formulary, FORMULARY_VERSION};
pub use weight::{estimate_weight, WeightEstimate};
pub use dosing::{emergency_doses, format_dose, intubation_doses, ComputedDose};
pub use vitals::{reference_ranges, RefRange, VitalSigns};
