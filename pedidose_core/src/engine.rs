//! Perfusion computation engine.
//!
//! This module implements the preparation pipeline:
//! - Mode selection by weight range and computed-total bounds
//! - Preparation (total mass and concentration) per mode variant
//! - Conversion between flow rate (ml/h) and per-kg dose rate
//!
//! Every function here is a pure computation over its inputs and the
//! immutable formulary; results are derived fresh on each call.

use crate::error::{Error, Result};
use crate::types::{
    AtRate, ComputeInput, ComputeOutput, Concentration, Conversion, DoseUnit, Formulary, Mass,
    MassUnit, ModeKind, ModeSpec, PreparationResult, TimeUnit,
};
use crate::units;

/// Pick the first eligible mode for the given weight.
///
/// Scans left to right; a mode is skipped when the weight falls outside its
/// `select` bounds, or (for weight-adjusted modes with a `max_total`
/// criterion) when the computed total exceeds the bound. Order is
/// clinically significant: restrictive pediatric modes precede general
/// fallbacks, so the scan never scores or reorders.
pub fn choose_mode<'a>(modes: &'a [ModeSpec], weight_kg: f64) -> Option<&'a ModeSpec> {
    for mode in modes {
        if let Some(select) = &mode.select {
            if let Some(min) = select.min_weight_kg {
                if weight_kg < min {
                    continue;
                }
            }
            if let Some(max) = select.max_weight_kg {
                if weight_kg > max {
                    continue;
                }
            }

            // max_total bounds the computed total; fixed modes have a
            // constant total, so the criterion only applies to
            // weight-adjusted variants.
            if let Some(max_total) = &select.max_total {
                if mode.kind.is_weight_adjusted() {
                    let prep = compute_preparation(mode, weight_kg);
                    // IU totals have no mass equivalent; an incomparable
                    // pair leaves the criterion inapplicable.
                    let computed = match (prep.total.unit, max_total.unit) {
                        (a, b) if a == b => Some(prep.total.value),
                        (MassUnit::Mg, MassUnit::Mcg) => Some(prep.total.value * 1000.0),
                        (MassUnit::Mcg, MassUnit::Mg) => Some(prep.total.value / 1000.0),
                        _ => None,
                    };
                    if let Some(value) = computed {
                        if value > max_total.value {
                            continue;
                        }
                    }
                }
            }
        }

        return Some(mode);
    }
    None
}

/// Compute the syringe preparation for a mode and weight.
///
/// Deterministic and side-effect free. The mode's diluent, volume and note
/// are carried into the result verbatim.
pub fn compute_preparation(mode: &ModeSpec, weight_kg: f64) -> PreparationResult {
    let volume_ml = mode.volume_ml;

    let (total, concentration) = match &mode.kind {
        ModeKind::FixedTotal { total } => (
            *total,
            Concentration {
                value: total.value / volume_ml,
                unit: total.unit,
            },
        ),
        ModeKind::FixedConcentration { concentration } => (
            Mass {
                value: concentration.value * volume_ml,
                unit: concentration.unit,
            },
            *concentration,
        ),
        ModeKind::WeightAdjustedAnchor {
            anchor_ml_h,
            anchor_dose,
            dose_unit,
        } => {
            let abs = units::absolute_rate_per_hour(*anchor_dose, *dose_unit, weight_kg);
            let conc = abs.value / anchor_ml_h;
            (
                Mass {
                    value: conc * volume_ml,
                    unit: abs.unit,
                },
                Concentration {
                    value: conc,
                    unit: abs.unit,
                },
            )
        }
        ModeKind::WeightAdjustedSpecial {
            anchor_ml_h,
            anchor_dose,
            dose_unit,
            cap_total,
        } => {
            let abs = units::absolute_rate_per_hour(*anchor_dose, *dose_unit, weight_kg);
            let conc = abs.value / anchor_ml_h;
            let mut unit = abs.unit;
            let mut total = conc * volume_ml;

            // The cap clamps total mass only; concentration is always
            // recomputed as total / volume afterwards. The total is carried
            // in the cap's unit when the two are commensurable, so a
            // breached cap lands on the configured value exactly. An IU cap
            // on a mass total (or vice versa) can never apply.
            if let Some(cap) = cap_total {
                let converted = match (unit, cap.unit) {
                    (a, b) if a == b => Some(total),
                    (MassUnit::Mcg, MassUnit::Mg) => Some(total / 1000.0),
                    (MassUnit::Mg, MassUnit::Mcg) => Some(total * 1000.0),
                    _ => None,
                };
                if let Some(value) = converted {
                    unit = cap.unit;
                    total = value.min(cap.value);
                }
            }

            (
                Mass { value: total, unit },
                Concentration {
                    value: total / volume_ml,
                    unit,
                },
            )
        }
    };

    PreparationResult {
        volume_ml,
        total,
        concentration,
        diluent: mode.diluent,
        note: mode.note.clone(),
    }
}

/// Dose rate delivered at a given flow rate, in the drug's canonical unit.
///
/// Algebraic inverse of the anchor derivation in [`compute_preparation`]:
/// running a mode's own anchor rate through this function reproduces the
/// anchor dose.
pub fn dose_at_rate(
    prep: &PreparationResult,
    drug_dose_unit: DoseUnit,
    weight_kg: f64,
    rate_ml_h: f64,
) -> Result<Conversion> {
    let target_mass = drug_dose_unit.mass_base();

    let conc = if prep.concentration.unit == target_mass {
        prep.concentration.value
    } else {
        match (prep.concentration.unit, target_mass) {
            (MassUnit::Mg, MassUnit::Mcg) => {
                units::to_micrograms(prep.concentration.value, MassUnit::Mg)?
            }
            (MassUnit::Mcg, MassUnit::Mg) => {
                units::to_milligrams(prep.concentration.value, MassUnit::Mcg)?
            }
            (from, to) => return Err(Error::UnsupportedConversion { from, to }),
        }
    };

    let abs_per_hour = rate_ml_h * conc;
    let dose = match drug_dose_unit.time_base() {
        TimeUnit::Hour => abs_per_hour / weight_kg,
        TimeUnit::Minute => abs_per_hour / 60.0 / weight_kg,
    };

    Ok(Conversion {
        dose,
        dose_unit: drug_dose_unit,
    })
}

/// Engine entry point: resolve a mode, compute the preparation, and
/// optionally the dose delivered at a given flow rate.
///
/// Fails with [`Error::DrugNotFound`], [`Error::ModeNotFound`] (explicit
/// override of an absent mode), or [`Error::NoEligibleMode`] (selection
/// exhausted). All failures are immediate and synchronous.
pub fn compute(formulary: &Formulary, input: &ComputeInput) -> Result<ComputeOutput> {
    if !input.weight_kg.is_finite() || input.weight_kg <= 0.0 {
        return Err(Error::InvalidWeight(input.weight_kg));
    }
    if let Some(rate) = input.rate_ml_h {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::InvalidRate(rate));
        }
    }

    let drug = formulary
        .get(&input.drug_key)
        .ok_or_else(|| Error::DrugNotFound(input.drug_key.clone()))?;

    let mode = match &input.mode_id {
        Some(id) => drug
            .modes
            .iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| Error::ModeNotFound {
                drug: drug.key.clone(),
                mode: id.clone(),
            })?,
        None => {
            choose_mode(&drug.modes, input.weight_kg).ok_or_else(|| Error::NoEligibleMode {
                drug: drug.key.clone(),
                weight_kg: input.weight_kg,
            })?
        }
    };

    let preparation = compute_preparation(mode, input.weight_kg);

    let at_rate = match input.rate_ml_h {
        Some(rate_ml_h) => Some(AtRate {
            rate_ml_h,
            conversion: dose_at_rate(&preparation, drug.dose_unit, input.weight_kg, rate_ml_h)?,
        }),
        None => None,
    };

    Ok(ComputeOutput {
        drug_key: drug.key.clone(),
        display_name: drug.display_name.clone(),
        chosen_mode_id: mode.id.clone(),
        preparation,
        at_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulary::build_default_formulary;
    use crate::types::{Diluent, SelectCriteria};

    const TOL: f64 = 1e-9;

    fn anchor_mode(id: &str, anchor_dose: f64, dose_unit: DoseUnit) -> ModeSpec {
        ModeSpec {
            id: id.into(),
            volume_ml: 50.0,
            diluent: Diluent::SsfOrG5,
            note: None,
            select: None,
            kind: ModeKind::WeightAdjustedAnchor {
                anchor_ml_h: 1.0,
                anchor_dose,
                dose_unit,
            },
        }
    }

    #[test]
    fn fixed_total_concentration_is_total_over_volume() {
        let mode = ModeSpec {
            id: "fixed_1mg_50ml".into(),
            volume_ml: 50.0,
            diluent: Diluent::Ssf,
            note: None,
            select: None,
            kind: ModeKind::FixedTotal {
                total: Mass {
                    value: 1.0,
                    unit: MassUnit::Mg,
                },
            },
        };

        let prep = compute_preparation(&mode, 12.0);
        assert_eq!(prep.total.value, 1.0);
        assert!((prep.concentration.value - 0.02).abs() < TOL);
        assert_eq!(prep.concentration.unit, MassUnit::Mg);
    }

    #[test]
    fn fixed_concentration_total_is_concentration_times_volume() {
        let mode = ModeSpec {
            id: "pure_50mcgml".into(),
            volume_ml: 50.0,
            diluent: Diluent::SsfOrG5,
            note: None,
            select: None,
            kind: ModeKind::FixedConcentration {
                concentration: Concentration {
                    value: 50.0,
                    unit: MassUnit::Mcg,
                },
            },
        };

        let prep = compute_preparation(&mode, 12.0);
        assert_eq!(prep.total.value, 2500.0);
        assert_eq!(prep.total.unit, MassUnit::Mcg);
        assert_eq!(prep.concentration.value, 50.0);
    }

    #[test]
    fn concentration_times_volume_matches_total_for_all_builtin_modes() {
        let formulary = build_default_formulary();
        for drug in &formulary.drugs {
            for mode in &drug.modes {
                for weight in [2.0, 8.0, 25.0, 70.0] {
                    let prep = compute_preparation(mode, weight);
                    assert!(
                        (prep.concentration.value * prep.volume_ml - prep.total.value).abs()
                            < 1e-6,
                        "{}/{} at {} kg",
                        drug.key,
                        mode.id,
                        weight
                    );
                }
            }
        }
    }

    #[test]
    fn anchor_round_trip_reproduces_anchor_dose() {
        let formulary = build_default_formulary();
        for drug in &formulary.drugs {
            for mode in &drug.modes {
                let (anchor_ml_h, anchor_dose, dose_unit) = match &mode.kind {
                    ModeKind::WeightAdjustedAnchor {
                        anchor_ml_h,
                        anchor_dose,
                        dose_unit,
                    } => (*anchor_ml_h, *anchor_dose, *dose_unit),
                    _ => continue,
                };

                for weight in [3.0, 8.0, 19.5, 42.0] {
                    let prep = compute_preparation(mode, weight);
                    let conv = dose_at_rate(&prep, dose_unit, weight, anchor_ml_h).unwrap();
                    assert!(
                        (conv.dose - anchor_dose).abs() < 1e-9,
                        "{}/{} at {} kg: {} != {}",
                        drug.key,
                        mode.id,
                        weight,
                        conv.dose,
                        anchor_dose
                    );
                }
            }
        }
    }

    #[test]
    fn special_mode_caps_total_and_recomputes_concentration() {
        let mode = ModeSpec {
            id: "capped".into(),
            volume_ml: 50.0,
            diluent: Diluent::G5,
            note: None,
            select: None,
            kind: ModeKind::WeightAdjustedSpecial {
                anchor_ml_h: 1.0,
                anchor_dose: 5.0,
                dose_unit: DoseUnit::McgPerKgMin,
                cap_total: Some(Mass {
                    value: 300.0,
                    unit: MassUnit::Mg,
                }),
            },
        };

        // Uncapped total would be 15 mg/kg x 50 kg = 750 mg
        let prep = compute_preparation(&mode, 50.0);
        assert_eq!(prep.total.value, 300.0);
        assert_eq!(prep.total.unit, MassUnit::Mg);
        assert!((prep.concentration.value - 6.0).abs() < TOL);
    }

    #[test]
    fn uncapped_special_total_is_reported_in_the_cap_unit() {
        let formulary = build_default_formulary();
        let amiodarone = formulary.get("amiodarone").unwrap();

        let prep = compute_preparation(&amiodarone.modes[0], 8.0);
        assert_eq!(prep.total.unit, MassUnit::Mg);
        assert!((prep.total.value - 120.0).abs() < TOL);
    }

    #[test]
    fn iu_cap_on_mass_total_never_fires() {
        let mode = ModeSpec {
            id: "capped".into(),
            volume_ml: 50.0,
            diluent: Diluent::G5,
            note: None,
            select: None,
            kind: ModeKind::WeightAdjustedSpecial {
                anchor_ml_h: 1.0,
                anchor_dose: 5.0,
                dose_unit: DoseUnit::McgPerKgMin,
                cap_total: Some(Mass {
                    value: 300.0,
                    unit: MassUnit::Iu,
                }),
            },
        };

        // IU is incommensurable with the computed mcg total: cap is inert
        let prep = compute_preparation(&mode, 50.0);
        assert_eq!(prep.total.value, 750_000.0);
        assert_eq!(prep.total.unit, MassUnit::Mcg);
    }

    #[test]
    fn first_eligible_mode_wins() {
        let mut restricted = anchor_mode("small_patients", 5.0, DoseUnit::McgPerKgMin);
        restricted.select = Some(SelectCriteria {
            max_weight_kg: Some(10.0),
            ..Default::default()
        });
        let fallback = anchor_mode("fallback", 1.0, DoseUnit::McgPerKgMin);
        let modes = vec![restricted, fallback];

        assert_eq!(choose_mode(&modes, 5.0).unwrap().id, "small_patients");
        assert_eq!(choose_mode(&modes, 50.0).unwrap().id, "fallback");
    }

    #[test]
    fn min_weight_bound_is_inclusive() {
        let mut mode = anchor_mode("adult", 1.0, DoseUnit::McgPerKgMin);
        mode.select = Some(SelectCriteria {
            min_weight_kg: Some(50.0),
            ..Default::default()
        });
        let modes = vec![mode];

        assert!(choose_mode(&modes, 49.9).is_none());
        assert!(choose_mode(&modes, 50.0).is_some());
    }

    #[test]
    fn max_total_criterion_filters_weight_adjusted_modes() {
        let mut adjusted = anchor_mode("adjusted", 1.0, DoseUnit::MgPerKgHour);
        adjusted.select = Some(SelectCriteria {
            // total (mg) = 50 x weight; bound crossed above 40 kg
            max_total: Some(Mass {
                value: 2000.0,
                unit: MassUnit::Mg,
            }),
            ..Default::default()
        });
        let fallback = ModeSpec {
            id: "pure".into(),
            volume_ml: 50.0,
            diluent: Diluent::SsfOrG5,
            note: None,
            select: None,
            kind: ModeKind::FixedConcentration {
                concentration: Concentration {
                    value: 50.0,
                    unit: MassUnit::Mg,
                },
            },
        };
        let modes = vec![adjusted, fallback];

        assert_eq!(choose_mode(&modes, 30.0).unwrap().id, "adjusted");
        assert_eq!(choose_mode(&modes, 45.0).unwrap().id, "pure");
    }

    #[test]
    fn max_total_compares_across_mcg_and_mg() {
        let mut adjusted = anchor_mode("adjusted", 1.0, DoseUnit::McgPerKgHour);
        // total (mcg) = 50 x weight; 2 mg bound crossed above 40 kg
        adjusted.select = Some(SelectCriteria {
            max_total: Some(Mass {
                value: 2.0,
                unit: MassUnit::Mg,
            }),
            ..Default::default()
        });
        let fallback = anchor_mode("fallback", 1.0, DoseUnit::McgPerKgHour);
        let modes = vec![adjusted, fallback];

        assert_eq!(choose_mode(&modes, 40.0).unwrap().id, "adjusted");
        assert_eq!(choose_mode(&modes, 41.0).unwrap().id, "fallback");
    }

    #[test]
    fn max_total_with_iu_total_does_not_filter() {
        let mut adjusted = anchor_mode("insulin_like", 0.01, DoseUnit::IuPerKgHour);
        adjusted.select = Some(SelectCriteria {
            max_total: Some(Mass {
                value: 1.0,
                unit: MassUnit::Mg,
            }),
            ..Default::default()
        });
        let modes = vec![adjusted];

        // IU vs mg is incomparable: the criterion is inapplicable, mode stays
        assert_eq!(choose_mode(&modes, 500.0).unwrap().id, "insulin_like");
    }

    #[test]
    fn amiodarone_small_child_uses_capped_anchor_mode() {
        let formulary = build_default_formulary();
        let out = compute(
            &formulary,
            &ComputeInput {
                drug_key: "amiodarone".into(),
                weight_kg: 8.0,
                rate_ml_h: None,
                mode_id: None,
            },
        )
        .unwrap();

        assert_eq!(
            out.chosen_mode_id,
            "peds_anchor_5_mcgkgmin_at_1mlh_cap_300mg"
        );
        // 5 mcg/kg/min x 8 kg x 60 = 2400 mcg/h = 2.4 mg/ml at 1 ml/h
        assert!((out.preparation.concentration.value - 2.4).abs() < TOL);
        assert_eq!(out.preparation.concentration.unit, MassUnit::Mg);
        assert!((out.preparation.total.value - 120.0).abs() < TOL);
    }

    #[test]
    fn amiodarone_large_patient_falls_through_to_fixed_mode() {
        let formulary = build_default_formulary();
        let out = compute(
            &formulary,
            &ComputeInput {
                drug_key: "amiodarone".into(),
                weight_kg: 70.0,
                rate_ml_h: None,
                mode_id: None,
            },
        )
        .unwrap();

        assert_eq!(out.chosen_mode_id, "fixed_300mg_50ml");
        assert_eq!(out.preparation.total.value, 300.0);
        assert!((out.preparation.concentration.value - 6.0).abs() < TOL);
    }

    #[test]
    fn central_epinephrine_dose_at_two_ml_per_hour() {
        let formulary = build_default_formulary();
        let out = compute(
            &formulary,
            &ComputeInput {
                drug_key: "adrenaline_central".into(),
                weight_kg: 10.0,
                rate_ml_h: Some(2.0),
                mode_id: None,
            },
        )
        .unwrap();

        // Concentration 60 mcg/ml; 2 ml/h -> 120 mcg/h -> 2 mcg/min -> 0.2 mcg/kg/min
        assert!((out.preparation.concentration.value - 60.0).abs() < TOL);
        let at_rate = out.at_rate.unwrap();
        assert!((at_rate.conversion.dose - 0.2).abs() < TOL);
        assert_eq!(at_rate.conversion.dose_unit, DoseUnit::McgPerKgMin);
    }

    #[test]
    fn insulin_total_equals_weight_in_iu() {
        let formulary = build_default_formulary();
        let out = compute(
            &formulary,
            &ComputeInput {
                drug_key: "insulin".into(),
                weight_kg: 20.0,
                rate_ml_h: Some(1.0),
                mode_id: None,
            },
        )
        .unwrap();

        assert_eq!(out.preparation.volume_ml, 100.0);
        assert_eq!(out.preparation.total.unit, MassUnit::Iu);
        assert!((out.preparation.total.value - 20.0).abs() < TOL);
        // 1 ml/h is the anchor rate: dose must be 0.01 IU/kg/h
        assert!((out.at_rate.unwrap().conversion.dose - 0.01).abs() < TOL);
    }

    #[test]
    fn dose_at_rate_converts_mg_concentration_to_mcg_dose_unit() {
        let formulary = build_default_formulary();
        // Peripheral epinephrine: fixed 1 mg / 50 ml = 20 mcg/ml
        let out = compute(
            &formulary,
            &ComputeInput {
                drug_key: "adrenaline_peripheral".into(),
                weight_kg: 10.0,
                rate_ml_h: Some(3.0),
                mode_id: None,
            },
        )
        .unwrap();

        // 3 ml/h x 20 mcg/ml = 60 mcg/h -> 1 mcg/min -> 0.1 mcg/kg/min
        let dose = out.at_rate.unwrap().conversion.dose;
        assert!((dose - 0.1).abs() < TOL);
    }

    #[test]
    fn dose_at_rate_rejects_iu_to_mass_conversion() {
        let prep = PreparationResult {
            volume_ml: 100.0,
            total: Mass {
                value: 20.0,
                unit: MassUnit::Iu,
            },
            concentration: Concentration {
                value: 0.2,
                unit: MassUnit::Iu,
            },
            diluent: Diluent::Ssf,
            note: None,
        };

        let err = dose_at_rate(&prep, DoseUnit::McgPerKgMin, 20.0, 1.0).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion { .. }));
    }

    #[test]
    fn explicit_mode_override_bypasses_selection() {
        let formulary = build_default_formulary();
        let out = compute(
            &formulary,
            &ComputeInput {
                drug_key: "amiodarone".into(),
                weight_kg: 8.0,
                rate_ml_h: None,
                mode_id: Some("fixed_300mg_50ml".into()),
            },
        )
        .unwrap();

        assert_eq!(out.chosen_mode_id, "fixed_300mg_50ml");
        assert_eq!(out.preparation.total.value, 300.0);
    }

    #[test]
    fn unknown_mode_override_fails() {
        let formulary = build_default_formulary();
        let err = compute(
            &formulary,
            &ComputeInput {
                drug_key: "amiodarone".into(),
                weight_kg: 8.0,
                rate_ml_h: None,
                mode_id: Some("no_such_mode".into()),
            },
        )
        .unwrap_err();

        assert!(matches!(err, Error::ModeNotFound { .. }));
    }

    #[test]
    fn unknown_drug_fails() {
        let formulary = build_default_formulary();
        let err = compute(
            &formulary,
            &ComputeInput {
                drug_key: "no_such_drug".into(),
                weight_kg: 8.0,
                rate_ml_h: None,
                mode_id: None,
            },
        )
        .unwrap_err();

        assert!(matches!(err, Error::DrugNotFound(_)));
    }

    #[test]
    fn exhausted_selection_is_a_hard_failure() {
        let formulary = build_default_formulary();
        // Milrinone: the adjusted mode's 50 mg bound is crossed above
        // 33.3 kg and the fixed mode requires 50 kg or more.
        let err = compute(
            &formulary,
            &ComputeInput {
                drug_key: "milrinone".into(),
                weight_kg: 40.0,
                rate_ml_h: None,
                mode_id: None,
            },
        )
        .unwrap_err();

        assert!(matches!(err, Error::NoEligibleMode { .. }));
    }

    #[test]
    fn nonpositive_weight_is_rejected() {
        let formulary = build_default_formulary();
        for weight in [0.0, -4.0, f64::NAN] {
            let err = compute(
                &formulary,
                &ComputeInput {
                    drug_key: "amiodarone".into(),
                    weight_kg: weight,
                    rate_ml_h: None,
                    mode_id: None,
                },
            )
            .unwrap_err();
            assert!(matches!(err, Error::InvalidWeight(_)));
        }
    }

    #[test]
    fn negative_rate_is_rejected() {
        let formulary = build_default_formulary();
        let err = compute(
            &formulary,
            &ComputeInput {
                drug_key: "amiodarone".into(),
                weight_kg: 8.0,
                rate_ml_h: Some(-1.0),
                mode_id: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRate(_)));
    }
}
