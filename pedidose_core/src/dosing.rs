//! Weight-based bolus dose tables for emergencies and intubation.
//!
//! Each dose is a linear per-kg formula with drug-specific floors and caps.
//! These are single boluses, distinct from the continuous-infusion engine.

use crate::error::{Error, Result};
use serde::Serialize;

/// A computed bolus dose for one drug
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComputedDose {
    pub key: &'static str,
    pub name: &'static str,
    pub dose: f64,
    pub unit: &'static str,
}

fn check_weight(weight_kg: f64) -> Result<()> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(Error::InvalidWeight(weight_kg));
    }
    Ok(())
}

/// 0.02 mg/kg with a 0.1 mg floor and 0.6 mg cap; shared by the emergency
/// and intubation tables.
fn atropine_mg(weight_kg: f64) -> f64 {
    if weight_kg < 5.0 {
        0.1
    } else if weight_kg < 30.0 {
        weight_kg * 0.02
    } else {
        0.6
    }
}

/// Emergency bolus doses for a patient weight
pub fn emergency_doses(weight_kg: f64) -> Result<Vec<ComputedDose>> {
    check_weight(weight_kg)?;
    let w = weight_kg;

    Ok(vec![
        ComputedDose {
            key: "adenosine",
            name: "Adenosine",
            dose: w / 10.0,
            unit: "mg",
        },
        ComputedDose {
            key: "epinephrine",
            name: "Epinephrine (1:10,000)",
            dose: w / 100.0,
            unit: "mg",
        },
        ComputedDose {
            key: "amiodarone",
            name: "Amiodarone",
            dose: w.min(60.0) * 5.0,
            unit: "mg",
        },
        ComputedDose {
            key: "atropine",
            name: "Atropine",
            dose: atropine_mg(w),
            unit: "mg",
        },
        ComputedDose {
            key: "bicarbonate",
            name: "Sodium bicarbonate 1M",
            dose: w.min(50.0),
            unit: "mEq",
        },
        ComputedDose {
            key: "fluid_bolus",
            name: "Fluid bolus (crystalloid)",
            dose: if w < 50.0 { w * 20.0 } else { 1000.0 },
            unit: "ml",
        },
        ComputedDose {
            key: "flumazenil",
            name: "Flumazenil",
            dose: if w < 20.0 { w * 0.01 } else { 0.1 },
            unit: "mg",
        },
        ComputedDose {
            key: "calcium_gluconate",
            name: "Calcium gluconate 10%",
            dose: if w < 40.0 { w * 0.5 } else { 20.0 },
            unit: "ml",
        },
        ComputedDose {
            key: "glucose",
            name: "Glucose 10%",
            dose: if w < 50.0 { w * 2.0 } else { 100.0 },
            unit: "ml",
        },
        ComputedDose {
            key: "mannitol",
            name: "Mannitol",
            dose: w * 0.5,
            unit: "g",
        },
        ComputedDose {
            key: "naloxone",
            name: "Naloxone",
            dose: w * 0.01,
            unit: "mg",
        },
        ComputedDose {
            key: "hypertonic_saline",
            name: "Hypertonic saline 3%",
            dose: if w > 50.0 { 250.0 } else { w * 5.0 },
            unit: "ml",
        },
        ComputedDose {
            key: "magnesium_sulfate",
            name: "Magnesium sulfate",
            dose: if w < 40.0 { w * 50.0 } else { 2000.0 },
            unit: "mg",
        },
        ComputedDose {
            key: "tranexamic_acid",
            name: "Tranexamic acid",
            dose: if w < 100.0 { w * 15.0 } else { 1500.0 },
            unit: "mg",
        },
    ])
}

/// Intubation drug doses for a patient weight
///
/// `age_days` matters only for succinylcholine, which is doubled for
/// neonates (30 days or younger); when unknown the non-neonate dose is used.
pub fn intubation_doses(weight_kg: f64, age_days: Option<u32>) -> Result<Vec<ComputedDose>> {
    check_weight(weight_kg)?;
    let w = weight_kg;
    let neonate = age_days.map(|d| d <= 30).unwrap_or(false);

    Ok(vec![
        ComputedDose {
            key: "atropine",
            name: "Atropine",
            dose: atropine_mg(w),
            unit: "mg",
        },
        ComputedDose {
            key: "fentanyl",
            name: "Fentanyl",
            dose: w * 2.0,
            unit: "mcg",
        },
        ComputedDose {
            key: "ketamine",
            name: "Ketamine",
            dose: w * 2.0,
            unit: "mg",
        },
        ComputedDose {
            key: "midazolam",
            name: "Midazolam",
            dose: (w / 10.0).min(10.0),
            unit: "mg",
        },
        ComputedDose {
            key: "propofol",
            name: "Propofol",
            dose: w * 2.5,
            unit: "mg",
        },
        ComputedDose {
            key: "succinylcholine",
            name: "Succinylcholine",
            dose: if neonate { w * 2.0 } else { w },
            unit: "mg",
        },
        ComputedDose {
            key: "rocuronium",
            name: "Rocuronium",
            dose: w,
            unit: "mg",
        },
    ])
}

/// Render a dose without spurious precision: whole numbers print with no
/// decimals, everything else with one.
pub fn format_dose(dose: f64) -> String {
    let rounded = (dose * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", dose)
    }
}
