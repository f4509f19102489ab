//! Built-in drug formulary and registry loading.
//!
//! The formulary is the ordered table of drug definitions the engine
//! computes against. It is immutable after load; a custom formulary can be
//! loaded from a JSON document with the same shape.

use crate::error::Result;
use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::Path;

/// Version of the built-in formulary document
pub const FORMULARY_VERSION: u32 = 1;

/// Cached default formulary - built once and reused across all operations
static DEFAULT_FORMULARY: Lazy<Formulary> = Lazy::new(build_default_formulary_internal);

/// Get a reference to the cached default formulary
///
/// Returns a reference to the pre-built registry, avoiding the overhead of
/// rebuilding the drug table on every operation.
pub fn get_default_formulary() -> &'static Formulary {
    &DEFAULT_FORMULARY
}

/// Builds the default formulary with the built-in drug definitions
///
/// **Note**: For production use, prefer `get_default_formulary()` which
/// returns a cached reference. This function is retained for testing and
/// custom registry construction.
pub fn build_default_formulary() -> Formulary {
    build_default_formulary_internal()
}

fn mg(value: f64) -> Mass {
    Mass {
        value,
        unit: MassUnit::Mg,
    }
}

fn mcg(value: f64) -> Mass {
    Mass {
        value,
        unit: MassUnit::Mcg,
    }
}

/// Internal function that actually builds the formulary
fn build_default_formulary_internal() -> Formulary {
    let drugs = vec![
        // ====================================================================
        // Inotropes / vasoactives
        // ====================================================================
        DrugConfig {
            key: "adrenaline_peripheral".into(),
            display_name: "Epinephrine (peripheral line)".into(),
            dose_unit: DoseUnit::McgPerKgMin,
            usual_range: Some(DoseRange {
                min: 0.01,
                max: 1.5,
                unit: DoseUnit::McgPerKgMin,
            }),
            modes: vec![ModeSpec {
                id: "fixed_1mg_50ml".into(),
                volume_ml: 50.0,
                diluent: Diluent::Ssf,
                note: Some("Fixed: 1 mg made up to 50 ml (20 mcg/ml).".into()),
                select: None,
                kind: ModeKind::FixedTotal { total: mg(1.0) },
            }],
        },
        DrugConfig {
            key: "adrenaline_central".into(),
            display_name: "Epinephrine (central line)".into(),
            dose_unit: DoseUnit::McgPerKgMin,
            usual_range: Some(DoseRange {
                min: 0.01,
                max: 1.5,
                unit: DoseUnit::McgPerKgMin,
            }),
            modes: vec![ModeSpec {
                id: "anchor_0p1_mcgkgmin_at_1mlh".into(),
                volume_ml: 50.0,
                diluent: Diluent::SsfOrG5,
                note: Some(
                    "Adjusted: 1 ml/h = 0.1 mcg/kg/min; total (mg) = 0.3 x weight.".into(),
                ),
                select: None,
                kind: ModeKind::WeightAdjustedAnchor {
                    anchor_ml_h: 1.0,
                    anchor_dose: 0.1,
                    dose_unit: DoseUnit::McgPerKgMin,
                },
            }],
        },
        DrugConfig {
            key: "noradrenaline_peripheral".into(),
            display_name: "Norepinephrine (peripheral line)".into(),
            dose_unit: DoseUnit::McgPerKgMin,
            usual_range: Some(DoseRange {
                min: 0.1,
                max: 1.0,
                unit: DoseUnit::McgPerKgMin,
            }),
            modes: vec![ModeSpec {
                id: "fixed_1mg_50ml".into(),
                volume_ml: 50.0,
                diluent: Diluent::Ssf,
                note: Some("Fixed: 1 mg made up to 50 ml (20 mcg/ml).".into()),
                select: None,
                kind: ModeKind::FixedTotal { total: mg(1.0) },
            }],
        },
        DrugConfig {
            key: "noradrenaline_central".into(),
            display_name: "Norepinephrine (central line)".into(),
            dose_unit: DoseUnit::McgPerKgMin,
            usual_range: Some(DoseRange {
                min: 0.1,
                max: 1.0,
                unit: DoseUnit::McgPerKgMin,
            }),
            modes: vec![ModeSpec {
                id: "anchor_0p1_mcgkgmin_at_1mlh".into(),
                volume_ml: 50.0,
                diluent: Diluent::G5,
                note: Some(
                    "Adjusted: 1 ml/h = 0.1 mcg/kg/min; total (mg) = 0.3 x weight.".into(),
                ),
                select: None,
                kind: ModeKind::WeightAdjustedAnchor {
                    anchor_ml_h: 1.0,
                    anchor_dose: 0.1,
                    dose_unit: DoseUnit::McgPerKgMin,
                },
            }],
        },
        DrugConfig {
            key: "dopamine_peripheral".into(),
            display_name: "Dopamine (peripheral line)".into(),
            dose_unit: DoseUnit::McgPerKgMin,
            usual_range: Some(DoseRange {
                min: 5.0,
                max: 20.0,
                unit: DoseUnit::McgPerKgMin,
            }),
            modes: vec![ModeSpec {
                id: "anchor_1_mcgkgmin_at_1mlh".into(),
                volume_ml: 50.0,
                diluent: Diluent::SsfOrG5,
                note: Some("Adjusted: 1 ml/h = 1 mcg/kg/min; total (mg) = 3 x weight.".into()),
                select: None,
                kind: ModeKind::WeightAdjustedAnchor {
                    anchor_ml_h: 1.0,
                    anchor_dose: 1.0,
                    dose_unit: DoseUnit::McgPerKgMin,
                },
            }],
        },
        DrugConfig {
            key: "dopamine_central".into(),
            display_name: "Dopamine (central line)".into(),
            dose_unit: DoseUnit::McgPerKgMin,
            usual_range: Some(DoseRange {
                min: 5.0,
                max: 20.0,
                unit: DoseUnit::McgPerKgMin,
            }),
            modes: vec![ModeSpec {
                id: "anchor_10_mcgkgmin_at_1mlh".into(),
                volume_ml: 50.0,
                diluent: Diluent::SsfOrG5,
                note: Some("Adjusted: 1 ml/h = 10 mcg/kg/min; total (mg) = 30 x weight.".into()),
                select: None,
                kind: ModeKind::WeightAdjustedAnchor {
                    anchor_ml_h: 1.0,
                    anchor_dose: 10.0,
                    dose_unit: DoseUnit::McgPerKgMin,
                },
            }],
        },
        DrugConfig {
            key: "amiodarone".into(),
            display_name: "Amiodarone".into(),
            dose_unit: DoseUnit::McgPerKgMin,
            usual_range: Some(DoseRange {
                min: 5.0,
                max: 15.0,
                unit: DoseUnit::McgPerKgMin,
            }),
            modes: vec![
                ModeSpec {
                    id: "peds_anchor_5_mcgkgmin_at_1mlh_cap_300mg".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::G5,
                    note: Some(
                        "Small child: 1 ml/h = 5 mcg/kg/min (mg = 15 x weight), capped at 300 mg."
                            .into(),
                    ),
                    select: Some(SelectCriteria {
                        max_weight_kg: Some(10.0),
                        ..Default::default()
                    }),
                    kind: ModeKind::WeightAdjustedSpecial {
                        anchor_ml_h: 1.0,
                        anchor_dose: 5.0,
                        dose_unit: DoseUnit::McgPerKgMin,
                        cap_total: Some(mg(300.0)),
                    },
                },
                ModeSpec {
                    id: "fixed_300mg_50ml".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::G5,
                    note: Some("Fixed: 300 mg made up to 50 ml (6 mg/ml).".into()),
                    select: None,
                    kind: ModeKind::FixedTotal { total: mg(300.0) },
                },
            ],
        },
        DrugConfig {
            key: "milrinone".into(),
            display_name: "Milrinone".into(),
            dose_unit: DoseUnit::McgPerKgMin,
            usual_range: Some(DoseRange {
                min: 0.3,
                max: 1.0,
                unit: DoseUnit::McgPerKgMin,
            }),
            modes: vec![
                ModeSpec {
                    id: "anchor_0p5_mcgkgmin_at_1mlh".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::SsfOrG5,
                    note: Some(
                        "Adjusted: 1 ml/h = 0.5 mcg/kg/min (mg = 1.5 x weight).".into(),
                    ),
                    select: Some(SelectCriteria {
                        max_total: Some(mg(50.0)),
                        ..Default::default()
                    }),
                    kind: ModeKind::WeightAdjustedAnchor {
                        anchor_ml_h: 1.0,
                        anchor_dose: 0.5,
                        dose_unit: DoseUnit::McgPerKgMin,
                    },
                },
                ModeSpec {
                    id: "fixed_50mg_50ml".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::SsfOrG5,
                    note: Some("Ceiling: 50 mg made up to 50 ml.".into()),
                    select: Some(SelectCriteria {
                        min_weight_kg: Some(50.0),
                        ..Default::default()
                    }),
                    kind: ModeKind::FixedTotal { total: mg(50.0) },
                },
            ],
        },
        DrugConfig {
            key: "labetalol".into(),
            display_name: "Labetalol".into(),
            dose_unit: DoseUnit::MgPerKgHour,
            usual_range: Some(DoseRange {
                min: 0.5,
                max: 3.0,
                unit: DoseUnit::MgPerKgHour,
            }),
            modes: vec![
                ModeSpec {
                    id: "fixed_200mg_50ml".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::G5,
                    note: Some("Low weight: 200 mg made up to 50 ml (4 mg/ml).".into()),
                    select: Some(SelectCriteria {
                        max_weight_kg: Some(10.0),
                        ..Default::default()
                    }),
                    kind: ModeKind::FixedTotal { total: mg(200.0) },
                },
                ModeSpec {
                    id: "fixed_250mg_50ml".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::G5,
                    note: Some("Standard: 250 mg made up to 50 ml (5 mg/ml).".into()),
                    select: None,
                    kind: ModeKind::FixedTotal { total: mg(250.0) },
                },
            ],
        },
        // ====================================================================
        // Sedation / analgesia / paralytics
        // ====================================================================
        DrugConfig {
            key: "fentanyl".into(),
            display_name: "Fentanyl".into(),
            dose_unit: DoseUnit::McgPerKgHour,
            usual_range: Some(DoseRange {
                min: 1.0,
                max: 5.0,
                unit: DoseUnit::McgPerKgHour,
            }),
            modes: vec![
                ModeSpec {
                    id: "adjusted_1mcgkgH_at_1mlh".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::SsfOrG5,
                    note: Some(
                        "Adjusted: 1 ml/h = 1 mcg/kg/h; total (mcg) = 50 x weight.".into(),
                    ),
                    select: Some(SelectCriteria {
                        max_total: Some(mcg(2000.0)),
                        ..Default::default()
                    }),
                    kind: ModeKind::WeightAdjustedAnchor {
                        anchor_ml_h: 1.0,
                        anchor_dose: 1.0,
                        dose_unit: DoseUnit::McgPerKgHour,
                    },
                },
                ModeSpec {
                    id: "pure_50mcgml".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::SsfOrG5,
                    note: Some("Neat: 50 mcg/ml (2500 mcg per 50 ml).".into()),
                    select: None,
                    kind: ModeKind::FixedConcentration {
                        concentration: Concentration {
                            value: 50.0,
                            unit: MassUnit::Mcg,
                        },
                    },
                },
            ],
        },
        DrugConfig {
            key: "ketamine".into(),
            display_name: "Ketamine".into(),
            dose_unit: DoseUnit::MgPerKgHour,
            usual_range: Some(DoseRange {
                min: 0.5,
                max: 2.0,
                unit: DoseUnit::MgPerKgHour,
            }),
            modes: vec![
                ModeSpec {
                    id: "adjusted_1mgkgH_at_1mlh".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::SsfOrG5,
                    note: Some(
                        "Adjusted: 1 ml/h = 1 mg/kg/h; total (mg) = 50 x weight.".into(),
                    ),
                    select: Some(SelectCriteria {
                        max_total: Some(mg(2000.0)),
                        ..Default::default()
                    }),
                    kind: ModeKind::WeightAdjustedAnchor {
                        anchor_ml_h: 1.0,
                        anchor_dose: 1.0,
                        dose_unit: DoseUnit::MgPerKgHour,
                    },
                },
                ModeSpec {
                    id: "pure_50mgml".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::SsfOrG5,
                    note: Some("Neat: 50 mg/ml.".into()),
                    select: None,
                    kind: ModeKind::FixedConcentration {
                        concentration: Concentration {
                            value: 50.0,
                            unit: MassUnit::Mg,
                        },
                    },
                },
            ],
        },
        DrugConfig {
            key: "midazolam".into(),
            display_name: "Midazolam".into(),
            dose_unit: DoseUnit::MgPerKgHour,
            usual_range: Some(DoseRange {
                min: 0.05,
                max: 0.3,
                unit: DoseUnit::MgPerKgHour,
            }),
            modes: vec![
                ModeSpec {
                    id: "adjusted_0p1mgkgH_at_1mlh".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::SsfOrG5,
                    note: Some(
                        "Adjusted: 1 ml/h = 0.10 mg/kg/h; total (mg) = 5 x weight.".into(),
                    ),
                    select: Some(SelectCriteria {
                        max_total: Some(mg(200.0)),
                        ..Default::default()
                    }),
                    kind: ModeKind::WeightAdjustedAnchor {
                        anchor_ml_h: 1.0,
                        anchor_dose: 0.1,
                        dose_unit: DoseUnit::MgPerKgHour,
                    },
                },
                ModeSpec {
                    id: "pure_5mgml".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::SsfOrG5,
                    note: Some("Neat: 5 mg/ml (250 mg per 50 ml).".into()),
                    select: None,
                    kind: ModeKind::FixedConcentration {
                        concentration: Concentration {
                            value: 5.0,
                            unit: MassUnit::Mg,
                        },
                    },
                },
            ],
        },
        DrugConfig {
            key: "rocuronium".into(),
            display_name: "Rocuronium".into(),
            dose_unit: DoseUnit::MgPerKgHour,
            usual_range: Some(DoseRange {
                min: 0.3,
                max: 1.0,
                unit: DoseUnit::MgPerKgHour,
            }),
            modes: vec![
                ModeSpec {
                    id: "fixed_240mg_50ml_small".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::SsfOrG5,
                    note: Some("Low weight: 240 mg made up to 50 ml.".into()),
                    select: Some(SelectCriteria {
                        max_weight_kg: Some(10.0),
                        ..Default::default()
                    }),
                    kind: ModeKind::FixedTotal { total: mg(240.0) },
                },
                ModeSpec {
                    id: "pure_10mgml".into(),
                    volume_ml: 50.0,
                    diluent: Diluent::SsfOrG5,
                    note: Some("Neat: 10 mg/ml (500 mg per 50 ml).".into()),
                    select: None,
                    kind: ModeKind::FixedConcentration {
                        concentration: Concentration {
                            value: 10.0,
                            unit: MassUnit::Mg,
                        },
                    },
                },
            ],
        },
        DrugConfig {
            key: "insulin".into(),
            display_name: "Insulin".into(),
            dose_unit: DoseUnit::IuPerKgHour,
            usual_range: Some(DoseRange {
                min: 0.02,
                max: 0.1,
                unit: DoseUnit::IuPerKgHour,
            }),
            modes: vec![ModeSpec {
                id: "adjusted_0p01IUkgH_at_1mlh".into(),
                volume_ml: 100.0,
                diluent: Diluent::Ssf,
                note: Some(
                    "Adjusted: 1 ml/h = 0.01 IU/kg/h; total (IU) = weight in kg. Prime the line."
                        .into(),
                ),
                select: None,
                kind: ModeKind::WeightAdjustedAnchor {
                    anchor_ml_h: 1.0,
                    anchor_dose: 0.01,
                    dose_unit: DoseUnit::IuPerKgHour,
                },
            }],
        },
    ];

    Formulary {
        version: FORMULARY_VERSION,
        drugs,
    }
}

/// Mass unit a mode's computed total comes out in
fn mode_mass_base(kind: &ModeKind) -> MassUnit {
    match kind {
        ModeKind::FixedTotal { total } => total.unit,
        ModeKind::FixedConcentration { concentration } => concentration.unit,
        ModeKind::WeightAdjustedAnchor { dose_unit, .. }
        | ModeKind::WeightAdjustedSpecial { dose_unit, .. } => dose_unit.mass_base(),
    }
}

fn comparable(a: MassUnit, b: MassUnit) -> bool {
    a == b || (a != MassUnit::Iu && b != MassUnit::Iu)
}

impl Formulary {
    /// Look up a drug definition by key
    pub fn get(&self, key: &str) -> Option<&DrugConfig> {
        self.drugs.iter().find(|d| d.key == key)
    }

    /// Parse a formulary from a JSON document
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Load a formulary from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let formulary = Self::from_json_str(&contents)?;
        tracing::info!(
            "Loaded formulary ({} drugs) from {:?}",
            formulary.drugs.len(),
            path
        );
        Ok(formulary)
    }

    /// Validate the formulary for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.version == 0 {
            errors.push("Formulary version must be at least 1".to_string());
        }
        if self.drugs.is_empty() {
            errors.push("Formulary has no drugs".to_string());
        }

        let mut seen_keys = HashSet::new();
        for drug in &self.drugs {
            if drug.key.is_empty() {
                errors.push("Drug has empty key".to_string());
            }
            if !seen_keys.insert(drug.key.as_str()) {
                errors.push(format!("Duplicate drug key '{}'", drug.key));
            }
            if drug.display_name.is_empty() {
                errors.push(format!("Drug '{}' has empty display name", drug.key));
            }
            if drug.modes.is_empty() {
                errors.push(format!("Drug '{}' has no modes", drug.key));
            }

            if let Some(range) = &drug.usual_range {
                if range.min > range.max {
                    errors.push(format!(
                        "Drug '{}': usual range min {} > max {}",
                        drug.key, range.min, range.max
                    ));
                }
            }

            let mut seen_modes = HashSet::new();
            for mode in &drug.modes {
                if mode.id.is_empty() {
                    errors.push(format!("Drug '{}' has a mode with empty id", drug.key));
                }
                if !seen_modes.insert(mode.id.as_str()) {
                    errors.push(format!(
                        "Drug '{}' has duplicate mode id '{}'",
                        drug.key, mode.id
                    ));
                }
                if !mode.volume_ml.is_finite() || mode.volume_ml <= 0.0 {
                    errors.push(format!(
                        "Drug '{}' mode '{}': syringe volume {} must be positive",
                        drug.key, mode.id, mode.volume_ml
                    ));
                }

                match &mode.kind {
                    ModeKind::FixedTotal { total } => {
                        if total.value <= 0.0 {
                            errors.push(format!(
                                "Drug '{}' mode '{}': fixed total must be positive",
                                drug.key, mode.id
                            ));
                        }
                    }
                    ModeKind::FixedConcentration { concentration } => {
                        if concentration.value <= 0.0 {
                            errors.push(format!(
                                "Drug '{}' mode '{}': fixed concentration must be positive",
                                drug.key, mode.id
                            ));
                        }
                    }
                    ModeKind::WeightAdjustedAnchor {
                        anchor_ml_h,
                        anchor_dose,
                        ..
                    } => {
                        if *anchor_ml_h <= 0.0 || *anchor_dose <= 0.0 {
                            errors.push(format!(
                                "Drug '{}' mode '{}': anchor rate and dose must be positive",
                                drug.key, mode.id
                            ));
                        }
                    }
                    ModeKind::WeightAdjustedSpecial {
                        anchor_ml_h,
                        anchor_dose,
                        dose_unit,
                        cap_total,
                    } => {
                        if *anchor_ml_h <= 0.0 || *anchor_dose <= 0.0 {
                            errors.push(format!(
                                "Drug '{}' mode '{}': anchor rate and dose must be positive",
                                drug.key, mode.id
                            ));
                        }
                        if let Some(cap) = cap_total {
                            if cap.value <= 0.0 {
                                errors.push(format!(
                                    "Drug '{}' mode '{}': total cap must be positive",
                                    drug.key, mode.id
                                ));
                            }
                            if !comparable(cap.unit, dose_unit.mass_base()) {
                                errors.push(format!(
                                    "Drug '{}' mode '{}': cap unit {} is incomparable with computed unit {} and can never apply",
                                    drug.key,
                                    mode.id,
                                    cap.unit,
                                    dose_unit.mass_base()
                                ));
                            }
                        }
                    }
                }

                if let Some(select) = &mode.select {
                    if let (Some(min), Some(max)) = (select.min_weight_kg, select.max_weight_kg) {
                        if min > max {
                            errors.push(format!(
                                "Drug '{}' mode '{}': min weight {} > max weight {}",
                                drug.key, mode.id, min, max
                            ));
                        }
                    }
                    if let Some(max_total) = &select.max_total {
                        if max_total.value <= 0.0 {
                            errors.push(format!(
                                "Drug '{}' mode '{}': max_total must be positive",
                                drug.key, mode.id
                            ));
                        }
                        if !mode.kind.is_weight_adjusted() {
                            errors.push(format!(
                                "Drug '{}' mode '{}': max_total has no effect on a fixed mode",
                                drug.key, mode.id
                            ));
                        } else if !comparable(mode_mass_base(&mode.kind), max_total.unit) {
                            errors.push(format!(
                                "Drug '{}' mode '{}': max_total unit {} is incomparable with computed unit {} and silently never filters",
                                drug.key,
                                mode.id,
                                max_total.unit,
                                mode_mass_base(&mode.kind)
                            ));
                        }
                    }
                }
            }

            // Selection must terminate for any valid weight: at least one
            // mode per drug has to be free of weight bounds.
            let has_unrestricted = drug.modes.iter().any(|m| {
                m.select
                    .as_ref()
                    .map(|s| s.min_weight_kg.is_none() && s.max_weight_kg.is_none())
                    .unwrap_or(true)
            });
            if !has_unrestricted {
                errors.push(format!(
                    "Drug '{}': every mode is weight-restricted; no fallback exists",
                    drug.key
                ));
            }
        }

        errors
    }
}
