//! Core domain types for the Pedidose calculator.
//!
//! This module defines the fundamental types used throughout the system:
//! - Mass, time and compound dose-rate units
//! - Preparation modes and their selection criteria
//! - Drug definitions and the formulary
//! - Engine inputs and computed results

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Unit Types
// ============================================================================

/// Mass unit for drug amounts.
///
/// IU has no numeric relationship to mcg/mg; conversions involving it fail.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MassUnit {
    #[serde(rename = "mcg")]
    Mcg,
    #[serde(rename = "mg")]
    Mg,
    #[serde(rename = "IU")]
    Iu,
}

impl fmt::Display for MassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MassUnit::Mcg => write!(f, "mcg"),
            MassUnit::Mg => write!(f, "mg"),
            MassUnit::Iu => write!(f, "IU"),
        }
    }
}

/// Time base of a dose rate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    Minute,
    Hour,
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Minute => write!(f, "min"),
            TimeUnit::Hour => write!(f, "h"),
        }
    }
}

/// Compound per-kg dose-rate unit (e.g. "mcg/kg/min")
///
/// The set is closed: parsing any other string fails with
/// [`Error::UnknownDoseUnit`], so classification into mass/time bases is
/// total on this type.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DoseUnit {
    #[serde(rename = "mcg/kg/min")]
    McgPerKgMin,
    #[serde(rename = "mcg/kg/h")]
    McgPerKgHour,
    #[serde(rename = "mg/kg/min")]
    MgPerKgMin,
    #[serde(rename = "mg/kg/h")]
    MgPerKgHour,
    #[serde(rename = "IU/kg/min")]
    IuPerKgMin,
    #[serde(rename = "IU/kg/h")]
    IuPerKgHour,
}

impl DoseUnit {
    /// Mass component of the unit ("mcg/kg/min" → mcg)
    pub fn mass_base(self) -> MassUnit {
        match self {
            DoseUnit::McgPerKgMin | DoseUnit::McgPerKgHour => MassUnit::Mcg,
            DoseUnit::MgPerKgMin | DoseUnit::MgPerKgHour => MassUnit::Mg,
            DoseUnit::IuPerKgMin | DoseUnit::IuPerKgHour => MassUnit::Iu,
        }
    }

    /// Time component of the unit ("mcg/kg/min" → min)
    pub fn time_base(self) -> TimeUnit {
        match self {
            DoseUnit::McgPerKgMin | DoseUnit::MgPerKgMin | DoseUnit::IuPerKgMin => {
                TimeUnit::Minute
            }
            DoseUnit::McgPerKgHour | DoseUnit::MgPerKgHour | DoseUnit::IuPerKgHour => {
                TimeUnit::Hour
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DoseUnit::McgPerKgMin => "mcg/kg/min",
            DoseUnit::McgPerKgHour => "mcg/kg/h",
            DoseUnit::MgPerKgMin => "mg/kg/min",
            DoseUnit::MgPerKgHour => "mg/kg/h",
            DoseUnit::IuPerKgMin => "IU/kg/min",
            DoseUnit::IuPerKgHour => "IU/kg/h",
        }
    }
}

impl fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DoseUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mcg/kg/min" => Ok(DoseUnit::McgPerKgMin),
            "mcg/kg/h" => Ok(DoseUnit::McgPerKgHour),
            "mg/kg/min" => Ok(DoseUnit::MgPerKgMin),
            "mg/kg/h" => Ok(DoseUnit::MgPerKgHour),
            "IU/kg/min" => Ok(DoseUnit::IuPerKgMin),
            "IU/kg/h" => Ok(DoseUnit::IuPerKgHour),
            other => Err(Error::UnknownDoseUnit(other.to_string())),
        }
    }
}

/// Carrier fluid for the syringe. Display-only; no computation depends on it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Diluent {
    #[serde(rename = "SSF")]
    Ssf,
    #[serde(rename = "G5")]
    G5,
    #[serde(rename = "SSF_or_G5")]
    SsfOrG5,
}

impl fmt::Display for Diluent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diluent::Ssf => write!(f, "SSF"),
            Diluent::G5 => write!(f, "G5"),
            Diluent::SsfOrG5 => write!(f, "SSF or G5"),
        }
    }
}

// ============================================================================
// Quantity Types
// ============================================================================

/// A drug mass with its unit
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Mass {
    pub value: f64,
    pub unit: MassUnit,
}

impl fmt::Display for Mass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Mass of drug per milliliter of prepared solution
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Concentration {
    pub value: f64,
    pub unit: MassUnit,
}

impl fmt::Display for Concentration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/ml", self.value, self.unit)
    }
}

// ============================================================================
// Mode Types
// ============================================================================

/// Applicability constraints attached to a preparation mode
///
/// `max_total` bounds the *computed* total mass and is only meaningful for
/// weight-adjusted modes; fixed modes carry a constant, unconditional total.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SelectCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total: Option<Mass>,
}

/// How the syringe contents are derived, with type-safe variants
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModeKind {
    /// Total mass in the syringe is a fixed constant
    FixedTotal { total: Mass },
    /// Concentration is a fixed constant; total derives from volume
    FixedConcentration { concentration: Concentration },
    /// "At `anchor_ml_h` ml/h the delivered dose equals `anchor_dose`
    /// `dose_unit` for this patient" — concentration derives from solving
    /// the anchor for the given weight
    WeightAdjustedAnchor {
        anchor_ml_h: f64,
        anchor_dose: f64,
        dose_unit: DoseUnit,
    },
    /// Anchor derivation with an optional hard cap on total mass
    WeightAdjustedSpecial {
        anchor_ml_h: f64,
        anchor_dose: f64,
        dose_unit: DoseUnit,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cap_total: Option<Mass>,
    },
}

impl ModeKind {
    /// Whether the total mass depends on patient weight
    pub fn is_weight_adjusted(&self) -> bool {
        matches!(
            self,
            ModeKind::WeightAdjustedAnchor { .. } | ModeKind::WeightAdjustedSpecial { .. }
        )
    }
}

/// One prescriptive recipe for preparing a drug's infusion syringe
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModeSpec {
    pub id: String,
    pub volume_ml: f64,
    pub diluent: Diluent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<SelectCriteria>,
    #[serde(flatten)]
    pub kind: ModeKind,
}

// ============================================================================
// Drug and Formulary Types
// ============================================================================

/// Usual clinical dose-rate range, display only
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DoseRange {
    pub min: f64,
    pub max: f64,
    pub unit: DoseUnit,
}

/// A drug definition: ordered preparation modes plus display metadata
///
/// Mode order is significant — the first eligible mode wins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrugConfig {
    pub key: String,
    pub display_name: String,
    /// Canonical unit for clinical dose display and rate conversion
    pub dose_unit: DoseUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usual_range: Option<DoseRange>,
    pub modes: Vec<ModeSpec>,
}

/// The versioned, immutable drug registry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Formulary {
    pub version: u32,
    pub drugs: Vec<DrugConfig>,
}

// ============================================================================
// Engine Input/Output Types
// ============================================================================

/// Input to the perfusion engine
#[derive(Clone, Debug)]
pub struct ComputeInput {
    pub drug_key: String,
    pub weight_kg: f64,
    /// When present, additionally convert this flow rate to a dose rate
    pub rate_ml_h: Option<f64>,
    /// When present, bypass mode selection with this exact mode
    pub mode_id: Option<String>,
}

/// A prepared syringe: derived per invocation, never cached
#[derive(Clone, Debug, Serialize)]
pub struct PreparationResult {
    pub volume_ml: f64,
    pub total: Mass,
    pub concentration: Concentration,
    pub diluent: Diluent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A dose rate in the drug's canonical unit
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Conversion {
    pub dose: f64,
    pub dose_unit: DoseUnit,
}

/// Dose delivered at a specific flow rate
#[derive(Clone, Copy, Debug, Serialize)]
pub struct AtRate {
    pub rate_ml_h: f64,
    pub conversion: Conversion,
}

/// Full result of an engine invocation
#[derive(Clone, Debug, Serialize)]
pub struct ComputeOutput {
    pub drug_key: String,
    pub display_name: String,
    pub chosen_mode_id: String,
    pub preparation: PreparationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_rate: Option<AtRate>,
}
