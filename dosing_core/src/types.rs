//! Core domain types for the dosing engine.
//!
//! This module defines the records a host hands to the engine:
//! - Regimens and their schedule descriptors
//! - Dose events (the append-only dose history)
//! - Vial inventory state
//! - Site history entries derived from dose events
//!
//! All timestamps are host-local wall-clock values. The host converts from
//! its own time zone before calling in.

use std::collections::BTreeSet;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sites::{InjectionCategory, InjectionSite};
use crate::{Error, Result};

// ============================================================================
// Units
// ============================================================================

/// Unit a dose or vial amount is expressed in
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DosageUnit {
    Mg,
    Mcg,
    G,
    Iu,
    Ml,
    Units,
}

impl DosageUnit {
    /// Convert an amount in this unit to milligrams.
    ///
    /// Only mass units convert; IU, mL and syringe units have no fixed mass
    /// and return `None`.
    pub fn to_milligrams(self, amount: f64) -> Option<f64> {
        match self {
            DosageUnit::Mg => Some(amount),
            DosageUnit::Mcg => Some(amount / 1000.0),
            DosageUnit::G => Some(amount * 1000.0),
            DosageUnit::Iu | DosageUnit::Ml | DosageUnit::Units => None,
        }
    }

    /// Short label used in output ("mg", "mcg", ...)
    pub fn label(self) -> &'static str {
        match self {
            DosageUnit::Mg => "mg",
            DosageUnit::Mcg => "mcg",
            DosageUnit::G => "g",
            DosageUnit::Iu => "IU",
            DosageUnit::Ml => "mL",
            DosageUnit::Units => "units",
        }
    }

    /// Parse a unit label, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mg" => Some(DosageUnit::Mg),
            "mcg" | "ug" | "µg" => Some(DosageUnit::Mcg),
            "g" => Some(DosageUnit::G),
            "iu" => Some(DosageUnit::Iu),
            "ml" => Some(DosageUnit::Ml),
            "units" | "u" => Some(DosageUnit::Units),
            _ => None,
        }
    }
}

// ============================================================================
// Schedules
// ============================================================================

/// How often a regimen's dose falls due
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Once a day at the notification time
    Daily,
    /// Every `n` days counted from the last dose (or start date)
    EveryNDays { n: u32 },
    /// On fixed weekdays, 0 = Sunday through 6 = Saturday
    SpecificWeekdays { days: BTreeSet<u8> },
    /// A repeating cycle of gaps, e.g. `[3, 4]` for twice weekly ("every 3.5 days")
    AlternatingDays { lengths: Vec<u32> },
    /// No schedule; doses are logged when needed
    AsNeeded,
}

impl ScheduleKind {
    /// Build a schedule from a plain stored interval.
    ///
    /// Older records stored "every 3.5 days" as an interval of 3; that value
    /// maps to an explicit alternating 3/4 cycle.
    pub fn from_interval_days(n: u32) -> Self {
        match n {
            1 => ScheduleKind::Daily,
            3 => ScheduleKind::AlternatingDays { lengths: vec![3, 4] },
            n => ScheduleKind::EveryNDays { n },
        }
    }

    /// Twice-weekly schedule alternating 3 and 4 day gaps
    pub fn every_three_and_a_half_days() -> Self {
        ScheduleKind::AlternatingDays { lengths: vec![3, 4] }
    }

    /// Average number of days between doses, `None` for as-needed
    pub fn interval_days(&self) -> Option<f64> {
        match self {
            ScheduleKind::Daily => Some(1.0),
            ScheduleKind::EveryNDays { n } => Some(*n as f64),
            ScheduleKind::SpecificWeekdays { days } if !days.is_empty() => {
                Some(7.0 / days.len() as f64)
            }
            ScheduleKind::AlternatingDays { lengths } if !lengths.is_empty() => {
                let cycle: u32 = lengths.iter().sum();
                Some(cycle as f64 / lengths.len() as f64)
            }
            _ => None,
        }
    }

    /// Check the structural invariants of the schedule
    pub fn validate(&self) -> Result<()> {
        match self {
            ScheduleKind::EveryNDays { n } if *n == 0 => Err(Error::Validation(
                "every-n-days interval must be at least 1".into(),
            )),
            ScheduleKind::SpecificWeekdays { days } if days.is_empty() => Err(
                Error::Validation("weekday schedule needs at least one day".into()),
            ),
            ScheduleKind::SpecificWeekdays { days } if days.iter().any(|d| *d > 6) => {
                Err(Error::Validation(format!(
                    "weekdays must be 0 (Sunday) through 6 (Saturday), got {:?}",
                    days
                )))
            }
            ScheduleKind::AlternatingDays { lengths } if lengths.is_empty() => Err(
                Error::Validation("alternating schedule needs at least one gap".into()),
            ),
            ScheduleKind::AlternatingDays { lengths } if lengths.contains(&0) => Err(
                Error::Validation("alternating schedule gaps must be at least 1 day".into()),
            ),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Regimen
// ============================================================================

/// A user's ongoing dosing plan for one compound
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Regimen {
    pub id: String,
    pub name: String,
    pub dosage_amount: f64,
    pub dosage_unit: DosageUnit,
    pub schedule: ScheduleKind,
    #[serde(default)]
    pub notification_time: Option<NaiveTime>,
    #[serde(default)]
    pub start_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub last_dose_date: Option<NaiveDateTime>,
    pub is_active: bool,
    /// Injection route, `None` for compounds that are not injected
    #[serde(default)]
    pub category: Option<InjectionCategory>,
}

impl Regimen {
    /// Create an active regimen starting at `start`
    pub fn new(
        id: impl Into<String>,
        dosage_amount: f64,
        dosage_unit: DosageUnit,
        schedule: ScheduleKind,
        start: NaiveDateTime,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            dosage_amount,
            dosage_unit,
            schedule,
            notification_time: None,
            start_date: Some(start),
            last_dose_date: None,
            is_active: true,
            category: None,
        }
    }

    /// Validate the regimen before handing it to the schedule calculator
    pub fn validate(&self) -> Result<()> {
        validate_compound_id(&self.id)?;
        validate_dose_amount(self.dosage_amount)?;
        self.schedule.validate()
    }

    /// Record a logged or skipped dose
    pub fn record_dose(&mut self, at: NaiveDateTime) {
        self.last_dose_date = Some(at);
    }

    /// Stop tracking without deleting the regimen
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Dose amount in milligrams, if the unit is a mass unit
    pub fn dose_mg(&self) -> Option<f64> {
        self.dosage_unit.to_milligrams(self.dosage_amount)
    }
}

/// Compound ids name a directory in file-backed hosts: ASCII letters,
/// digits, `-` and `_` only.
pub fn validate_compound_id(id: &str) -> Result<()> {
    let plain = !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !plain {
        return Err(Error::Validation(format!(
            "compound id {:?} may only contain letters, digits, '-' and '_'",
            id
        )));
    }
    Ok(())
}

/// Dose amounts are finite and positive
pub fn validate_dose_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::Validation(format!(
            "dosage amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

// ============================================================================
// Dose history
// ============================================================================

/// A logged dose
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoseEvent {
    pub id: Uuid,
    pub compound_id: String,
    pub timestamp: NaiveDateTime,
    pub dosage_amount: f64,
    pub unit: DosageUnit,
    #[serde(default)]
    pub injection_site: Option<InjectionSite>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DoseEvent {
    /// Create a dose event with a fresh id
    pub fn new(
        compound_id: impl Into<String>,
        timestamp: NaiveDateTime,
        dosage_amount: f64,
        unit: DosageUnit,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            compound_id: compound_id.into(),
            timestamp,
            dosage_amount,
            unit,
            injection_site: None,
            notes: None,
        }
    }

    /// Reject amounts that cannot be stored or consumed
    pub fn validate(&self) -> Result<()> {
        validate_compound_id(&self.compound_id)?;
        validate_dose_amount(self.dosage_amount)
    }
}

/// A `(site, timestamp)` pair taken from a dose event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SiteHistoryEntry {
    pub site: InjectionSite,
    pub timestamp: NaiveDateTime,
}

// ============================================================================
// Inventory
// ============================================================================

/// Vial stock for one compound
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InventoryState {
    pub vial_count: u32,
    pub vial_size_mg: f64,
    pub remaining_in_current_vial_mg: f64,
    pub low_stock_threshold_vials: u32,
    pub auto_decrement: bool,
}

impl InventoryState {
    /// Create stock with a full current vial.
    ///
    /// Fails if the vial size is not a positive number.
    pub fn new(vial_count: u32, vial_size_mg: f64, low_stock_threshold_vials: u32) -> Result<Self> {
        if !vial_size_mg.is_finite() || vial_size_mg <= 0.0 {
            return Err(Error::Validation(format!(
                "vial size must be positive, got {}",
                vial_size_mg
            )));
        }

        Ok(Self {
            vial_count,
            vial_size_mg,
            remaining_in_current_vial_mg: if vial_count > 0 { vial_size_mg } else { 0.0 },
            low_stock_threshold_vials,
            auto_decrement: true,
        })
    }

    /// Set what is left in the open vial, clamped to `[0, vial_size_mg]`
    pub fn with_remaining(mut self, remaining_mg: f64) -> Self {
        self.remaining_in_current_vial_mg = remaining_mg.clamp(0.0, self.vial_size_mg);
        self
    }
}
