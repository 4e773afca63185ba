#![forbid(unsafe_code)]

//! Core domain model and dosing engine for dosekit.
//!
//! This crate provides:
//! - Domain types (regimens, dose events, vial inventory)
//! - Next-dose scheduling
//! - Injection site rotation
//! - Vial inventory ledger
//! - Reconstitution math
//! - File-backed journal and snapshots for hosts that want them
//!
//! The engine modules are pure: the host passes in data snapshots and the
//! current time, and gets values back.

pub mod types;
pub mod error;
pub mod sites;
pub mod config;
pub mod logging;
pub mod schedule;
pub mod rotation;
pub mod inventory;
pub mod reconstitution;
pub mod journal;
pub mod snapshot;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use sites::{BodyPart, ImSite, InjectionCategory, InjectionSite, Side, SubqSite};
pub use config::Config;
pub use schedule::{
    is_due_today, is_due_today_with_default, is_overdue, is_overdue_with_default, next_due,
    next_due_with_default, upcoming,
};
pub use rotation::{rank_sites, recommend_next_site, SiteScore};
pub use inventory::{DecrementOutcome, LedgerUpdate};
pub use reconstitution::{
    draw_for_dose, solve, Reconstitution, ReconstitutionError, ReconstitutionLimits,
    ReconstitutionRequest, ReconstitutionWarning,
};
pub use journal::{DoseSink, JsonlJournal};
pub use history::{load_dose_history, site_history};
