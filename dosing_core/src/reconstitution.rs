//! Reconstitution calculator for lyophilized peptides.
//!
//! Insulin-style syringes are marked in units, 100 units = 1 mL. Given a
//! vial's content and the dose the user wants, the solver works backwards
//! to the diluent volume that puts the dose exactly on a chosen syringe
//! marking:
//!
//! ```text
//! diluent_ml = syringe_units * vial / (dose * 100)
//! ```

use serde::{Deserialize, Serialize};

use crate::DosageUnit;

/// Syringe units per millilitre
pub const UNITS_PER_ML: f64 = 100.0;

/// Input validation failures. No result is produced alongside an error.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ReconstitutionError {
    #[error("vial size must be greater than 0 and at most {max}, got {value}")]
    InvalidVialSize { value: f64, max: f64 },

    #[error("dose must be greater than 0, got {0}")]
    InvalidDose(f64),

    #[error("dose of {dose} exceeds the vial's total content of {vial}")]
    DoseExceedsVial { dose: f64, vial: f64 },

    #[error("syringe units must be greater than 0 and at most 100, got {0}")]
    InvalidSyringeUnits(f64),

    #[error("diluent volume must be greater than 0 mL, got {0}")]
    InvalidDiluentVolume(f64),

    #[error("a {dose} dose cannot be measured against a {vial} vial")]
    IncompatibleUnits {
        vial: &'static str,
        dose: &'static str,
    },
}

/// Advisory flags on an otherwise valid result
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconstitutionWarning {
    /// Too little diluent to measure accurately
    DiluentTooSmall,
    /// More diluent than a standard vial holds
    DiluentTooLarge,
    /// Unusually large volume for a subcutaneous injection
    LargeDrawVolume,
}

impl ReconstitutionWarning {
    pub fn message(self) -> &'static str {
        match self {
            ReconstitutionWarning::DiluentTooSmall => {
                "diluent volume is very small and hard to measure accurately"
            }
            ReconstitutionWarning::DiluentTooLarge => {
                "diluent volume may not fit in a standard vial"
            }
            ReconstitutionWarning::LargeDrawVolume => {
                "draw volume is large for a subcutaneous injection"
            }
        }
    }
}

/// Thresholds for validation and warnings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReconstitutionLimits {
    #[serde(default = "default_max_vial_size")]
    pub max_vial_size: f64,

    #[serde(default = "default_min_diluent_ml")]
    pub min_diluent_ml: f64,

    #[serde(default = "default_max_diluent_ml")]
    pub max_diluent_ml: f64,

    #[serde(default = "default_max_draw_ml")]
    pub max_draw_ml: f64,
}

impl Default for ReconstitutionLimits {
    fn default() -> Self {
        Self {
            max_vial_size: default_max_vial_size(),
            min_diluent_ml: default_min_diluent_ml(),
            max_diluent_ml: default_max_diluent_ml(),
            max_draw_ml: default_max_draw_ml(),
        }
    }
}

// Large enough for 10,000 IU hCG vials
fn default_max_vial_size() -> f64 {
    10_000.0
}

fn default_min_diluent_ml() -> f64 {
    0.3
}

fn default_max_diluent_ml() -> f64 {
    5.0
}

fn default_max_draw_ml() -> f64 {
    1.0
}

/// What the user has and wants
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconstitutionRequest {
    pub vial_amount: f64,
    pub vial_unit: DosageUnit,
    pub dose_amount: f64,
    pub dose_unit: DosageUnit,
    /// Syringe marking the dose should land on
    pub syringe_units: f64,
}

/// Solved mixing and drawing instructions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Reconstitution {
    pub diluent_volume_ml: f64,
    /// Content per mL, in the vial's unit
    pub concentration_per_ml: f64,
    pub volume_to_draw_ml: f64,
    pub units_to_draw: f64,
    pub doses_per_vial: f64,
    /// Unit the concentration and dose are expressed in
    pub unit: DosageUnit,
    pub warnings: Vec<ReconstitutionWarning>,
}

/// Solve for the diluent volume that lands the dose on `syringe_units`
pub fn solve(
    request: &ReconstitutionRequest,
    limits: &ReconstitutionLimits,
) -> Result<Reconstitution, ReconstitutionError> {
    let (vial, dose) = validate_amounts(
        request.vial_amount,
        request.vial_unit,
        request.dose_amount,
        request.dose_unit,
        limits,
    )?;

    let units = request.syringe_units;
    if !units.is_finite() || units <= 0.0 || units > UNITS_PER_ML {
        return Err(ReconstitutionError::InvalidSyringeUnits(units));
    }

    let diluent_ml = (units * vial) / (dose * UNITS_PER_ML);
    let result = build(vial, dose, diluent_ml, request.vial_unit, limits);

    tracing::debug!(
        "Reconstitution: {} {} vial, {} dose at {} units -> {:.3} mL diluent",
        vial,
        request.vial_unit.label(),
        dose,
        units,
        result.diluent_volume_ml
    );
    Ok(result)
}

/// Forward mode: the vial is already mixed with `diluent_ml`; how much to draw
pub fn draw_for_dose(
    vial_amount: f64,
    vial_unit: DosageUnit,
    diluent_ml: f64,
    dose_amount: f64,
    dose_unit: DosageUnit,
    limits: &ReconstitutionLimits,
) -> Result<Reconstitution, ReconstitutionError> {
    let (vial, dose) = validate_amounts(vial_amount, vial_unit, dose_amount, dose_unit, limits)?;

    if !diluent_ml.is_finite() || diluent_ml <= 0.0 {
        return Err(ReconstitutionError::InvalidDiluentVolume(diluent_ml));
    }

    Ok(build(vial, dose, diluent_ml, vial_unit, limits))
}

/// Express the dose in the vial's unit.
///
/// Mass units convert into each other (mcg dose into an mg vial). Any other
/// unit is used as-is and must match the vial's unit exactly.
fn harmonize_dose(
    vial_unit: DosageUnit,
    dose_amount: f64,
    dose_unit: DosageUnit,
) -> Result<f64, ReconstitutionError> {
    match (vial_unit.to_milligrams(1.0), dose_unit.to_milligrams(dose_amount)) {
        (Some(mg_per_vial_unit), Some(dose_mg)) => Ok(dose_mg / mg_per_vial_unit),
        _ if vial_unit == dose_unit => Ok(dose_amount),
        _ => Err(ReconstitutionError::IncompatibleUnits {
            vial: vial_unit.label(),
            dose: dose_unit.label(),
        }),
    }
}

fn validate_amounts(
    vial_amount: f64,
    vial_unit: DosageUnit,
    dose_amount: f64,
    dose_unit: DosageUnit,
    limits: &ReconstitutionLimits,
) -> Result<(f64, f64), ReconstitutionError> {
    if !vial_amount.is_finite() || vial_amount <= 0.0 || vial_amount > limits.max_vial_size {
        return Err(ReconstitutionError::InvalidVialSize {
            value: vial_amount,
            max: limits.max_vial_size,
        });
    }

    if !dose_amount.is_finite() || dose_amount <= 0.0 {
        return Err(ReconstitutionError::InvalidDose(dose_amount));
    }

    let dose = harmonize_dose(vial_unit, dose_amount, dose_unit)?;
    if dose > vial_amount {
        return Err(ReconstitutionError::DoseExceedsVial {
            dose,
            vial: vial_amount,
        });
    }

    Ok((vial_amount, dose))
}

fn build(
    vial: f64,
    dose: f64,
    diluent_ml: f64,
    unit: DosageUnit,
    limits: &ReconstitutionLimits,
) -> Reconstitution {
    let concentration = vial / diluent_ml;
    let draw_ml = dose / concentration;

    let mut warnings = Vec::new();
    if diluent_ml < limits.min_diluent_ml {
        warnings.push(ReconstitutionWarning::DiluentTooSmall);
    }
    if diluent_ml > limits.max_diluent_ml {
        warnings.push(ReconstitutionWarning::DiluentTooLarge);
    }
    if draw_ml > limits.max_draw_ml {
        warnings.push(ReconstitutionWarning::LargeDrawVolume);
    }

    Reconstitution {
        diluent_volume_ml: diluent_ml,
        concentration_per_ml: concentration,
        volume_to_draw_ml: draw_ml,
        units_to_draw: draw_ml * UNITS_PER_ML,
        doses_per_vial: vial / dose,
        unit,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(vial: f64, dose: f64, dose_unit: DosageUnit, units: f64) -> ReconstitutionRequest {
        ReconstitutionRequest {
            vial_amount: vial,
            vial_unit: DosageUnit::Mg,
            dose_amount: dose,
            dose_unit,
            syringe_units: units,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ten_mg_vial_two_mg_dose() {
        let result = solve(
            &request(10.0, 2.0, DosageUnit::Mg, 20.0),
            &ReconstitutionLimits::default(),
        )
        .unwrap();

        assert!(close(result.diluent_volume_ml, 1.0));
        assert!(close(result.concentration_per_ml, 10.0));
        assert!(close(result.volume_to_draw_ml, 0.2));
        assert!(close(result.units_to_draw, 20.0));
        assert!(close(result.doses_per_vial, 5.0));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_mcg_dose_into_mg_vial() {
        // 5 mg vial, 250 mcg dose on the 10 unit mark
        let result = solve(
            &request(5.0, 250.0, DosageUnit::Mcg, 10.0),
            &ReconstitutionLimits::default(),
        )
        .unwrap();

        assert!(close(result.diluent_volume_ml, 2.0));
        assert!(close(result.volume_to_draw_ml, 0.1));
        assert!(close(result.doses_per_vial, 20.0));
    }

    #[test]
    fn test_iu_vial_is_not_converted() {
        let req = ReconstitutionRequest {
            vial_amount: 36.0,
            vial_unit: DosageUnit::Iu,
            dose_amount: 2.0,
            dose_unit: DosageUnit::Iu,
            syringe_units: 20.0,
        };
        let result = solve(&req, &ReconstitutionLimits::default()).unwrap();

        assert!(close(result.diluent_volume_ml, 3.6));
        assert_eq!(result.unit, DosageUnit::Iu);
    }

    #[test]
    fn test_mass_and_iu_do_not_mix() {
        let limits = ReconstitutionLimits::default();
        let mixed = ReconstitutionRequest {
            vial_amount: 36.0,
            vial_unit: DosageUnit::Iu,
            dose_amount: 2.0,
            dose_unit: DosageUnit::Mg,
            syringe_units: 20.0,
        };
        assert_eq!(
            solve(&mixed, &limits),
            Err(ReconstitutionError::IncompatibleUnits {
                vial: "IU",
                dose: "mg"
            })
        );

        assert!(matches!(
            draw_for_dose(5.0, DosageUnit::Mg, 2.0, 1.0, DosageUnit::Iu, &limits),
            Err(ReconstitutionError::IncompatibleUnits { .. })
        ));
    }

    #[test]
    fn test_dose_exceeding_vial_is_rejected() {
        let err = solve(
            &request(2.0, 5.0, DosageUnit::Mg, 20.0),
            &ReconstitutionLimits::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ReconstitutionError::DoseExceedsVial {
                dose: 5.0,
                vial: 2.0
            }
        );
    }

    #[test]
    fn test_each_precondition_has_its_own_error() {
        let limits = ReconstitutionLimits::default();

        assert!(matches!(
            solve(&request(0.0, 1.0, DosageUnit::Mg, 10.0), &limits),
            Err(ReconstitutionError::InvalidVialSize { .. })
        ));
        assert!(matches!(
            solve(&request(20_000.0, 1.0, DosageUnit::Mg, 10.0), &limits),
            Err(ReconstitutionError::InvalidVialSize { .. })
        ));
        assert!(matches!(
            solve(&request(10.0, -1.0, DosageUnit::Mg, 10.0), &limits),
            Err(ReconstitutionError::InvalidDose(_))
        ));
        assert!(matches!(
            solve(&request(10.0, 1.0, DosageUnit::Mg, 0.0), &limits),
            Err(ReconstitutionError::InvalidSyringeUnits(_))
        ));
        assert!(matches!(
            solve(&request(10.0, 1.0, DosageUnit::Mg, 120.0), &limits),
            Err(ReconstitutionError::InvalidSyringeUnits(_))
        ));
    }

    #[test]
    fn test_warnings() {
        let limits = ReconstitutionLimits::default();

        // 0.2 mL of diluent
        let tiny = solve(&request(2.0, 1.0, DosageUnit::Mg, 10.0), &limits).unwrap();
        assert_eq!(tiny.warnings, vec![ReconstitutionWarning::DiluentTooSmall]);

        // 10 mL of diluent
        let huge = solve(&request(10.0, 0.1, DosageUnit::Mg, 10.0), &limits).unwrap();
        assert_eq!(huge.warnings, vec![ReconstitutionWarning::DiluentTooLarge]);
    }

    #[test]
    fn test_draw_for_dose() {
        let limits = ReconstitutionLimits::default();
        let result =
            draw_for_dose(10.0, DosageUnit::Mg, 2.0, 500.0, DosageUnit::Mcg, &limits).unwrap();

        assert!(close(result.concentration_per_ml, 5.0));
        assert!(close(result.volume_to_draw_ml, 0.1));
        assert!(close(result.units_to_draw, 10.0));

        let large = draw_for_dose(10.0, DosageUnit::Mg, 5.0, 4.0, DosageUnit::Mg, &limits).unwrap();
        assert_eq!(large.warnings, vec![ReconstitutionWarning::LargeDrawVolume]);

        assert_eq!(
            draw_for_dose(10.0, DosageUnit::Mg, 0.0, 1.0, DosageUnit::Mg, &limits),
            Err(ReconstitutionError::InvalidDiluentVolume(0.0))
        );
    }
}
