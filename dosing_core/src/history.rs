//! Dose history queries.
//!
//! Turns the raw journal into the views the engine needs: newest-first
//! dose lists and `(site, timestamp)` pairs for rotation.

use crate::sites::InjectionCategory;
use crate::{DoseEvent, Result, SiteHistoryEntry};
use std::collections::HashMap;
use std::path::Path;

/// Load a compound's dose history, newest first.
///
/// When a dose was edited the journal holds several copies under one id;
/// only the last copy is kept.
pub fn load_dose_history(journal_path: &Path) -> Result<Vec<DoseEvent>> {
    let raw = crate::journal::read_events(journal_path)?;
    let total = raw.len();

    let mut latest: HashMap<uuid::Uuid, DoseEvent> = HashMap::with_capacity(total);
    for event in raw {
        latest.insert(event.id, event);
    }

    let mut events: Vec<DoseEvent> = latest.into_values().collect();
    sort_newest_first(&mut events);

    tracing::debug!(
        "Loaded {} doses ({} journal lines) from {:?}",
        events.len(),
        total,
        journal_path
    );
    Ok(events)
}

/// Sort by timestamp, newest first
pub fn sort_newest_first(events: &mut [DoseEvent]) {
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Site usage pairs for one injection category, newest first
pub fn site_history(events: &[DoseEvent], category: InjectionCategory) -> Vec<SiteHistoryEntry> {
    let mut entries: Vec<SiteHistoryEntry> = events
        .iter()
        .filter_map(|event| {
            event.injection_site.map(|site| SiteHistoryEntry {
                site,
                timestamp: event.timestamp,
            })
        })
        .filter(|entry| entry.site.category() == category)
        .collect();
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries
}
