//! Vial inventory ledger.
//!
//! Stock is tracked as a count of vials plus what is left in the one that
//! is currently open. Every operation returns a new state; the host decides
//! whether to persist it.
//!
//! Invariants kept by every operation:
//! - `0 <= remaining_in_current_vial_mg <= vial_size_mg`
//! - `vial_count` never underflows

use crate::InventoryState;

/// What a decrement did to the stock
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DecrementOutcome {
    /// Auto-decrement is off; the user tracks stock by hand
    Manual,
    /// Zero, negative or non-finite dose
    NothingToConsume,
    /// Taken from the open vial
    Consumed,
    /// The open vial ran out and `opened` new vials were started
    OpenedNewVial { opened: u32 },
    /// The last vial ran dry before the full dose; logged anyway
    Exhausted { shortfall_mg: f64 },
    /// Nothing left to take from; state unchanged
    InsufficientStock,
}

impl DecrementOutcome {
    pub fn success(&self) -> bool {
        !matches!(self, DecrementOutcome::InsufficientStock)
    }
}

/// New stock after a decrement, with the outcome
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerUpdate {
    pub state: InventoryState,
    pub outcome: DecrementOutcome,
}

impl LedgerUpdate {
    pub fn success(&self) -> bool {
        self.outcome.success()
    }
}

impl InventoryState {
    /// Consume a dose from stock.
    ///
    /// Draws from the open vial first and opens new vials as needed. When
    /// the last vial cannot cover the dose, whatever is left is used up and
    /// the dose still counts as logged.
    pub fn decrement(&self, dose_mg: f64) -> LedgerUpdate {
        if !self.auto_decrement {
            return self.unchanged(DecrementOutcome::Manual);
        }
        if !dose_mg.is_finite() || dose_mg <= 0.0 {
            return self.unchanged(DecrementOutcome::NothingToConsume);
        }

        let mut next = self.clone();
        let remaining = next.remaining_in_current_vial_mg.max(0.0);

        let outcome = if remaining >= dose_mg {
            next.remaining_in_current_vial_mg = remaining - dose_mg;
            DecrementOutcome::Consumed
        } else if next.vial_count > 1 {
            let mut deficit = dose_mg - remaining;
            let mut opened = 0;
            next.remaining_in_current_vial_mg = 0.0;

            while deficit > 0.0 && next.vial_count > 1 {
                next.vial_count -= 1;
                opened += 1;
                let take = deficit.min(next.vial_size_mg);
                next.remaining_in_current_vial_mg = next.vial_size_mg - take;
                deficit -= take;
            }

            if deficit > 0.0 {
                DecrementOutcome::Exhausted {
                    shortfall_mg: deficit,
                }
            } else {
                DecrementOutcome::OpenedNewVial { opened }
            }
        } else if remaining > 0.0 {
            next.remaining_in_current_vial_mg = 0.0;
            DecrementOutcome::Exhausted {
                shortfall_mg: dose_mg - remaining,
            }
        } else {
            tracing::debug!("Insufficient stock for {} mg dose", dose_mg);
            return self.unchanged(DecrementOutcome::InsufficientStock);
        };

        next.clamp_remaining();
        tracing::debug!(
            "Decremented {} mg: {:?}, {} vials, {:.3} mg left in current",
            dose_mg,
            outcome,
            next.vial_count,
            next.remaining_in_current_vial_mg
        );

        LedgerUpdate {
            state: next,
            outcome,
        }
    }

    /// Add sealed vials to stock.
    ///
    /// When stock was completely empty the first new vial becomes the open one.
    pub fn add_vials(&self, count: u32) -> InventoryState {
        let mut next = self.clone();
        let was_empty = next.vial_count == 0 && next.remaining_in_current_vial_mg <= 0.0;

        next.vial_count = next.vial_count.saturating_add(count);
        if was_empty && count > 0 {
            next.remaining_in_current_vial_mg = next.vial_size_mg;
        }
        next
    }

    /// Discard the open vial and start a fresh one
    pub fn start_new_vial(&self) -> InventoryState {
        let mut next = self.clone();
        next.remaining_in_current_vial_mg = next.vial_size_mg;
        next.vial_count = next.vial_count.saturating_sub(1);
        next
    }

    /// Everything left: sealed vials plus the open one
    pub fn total_remaining_mg(&self) -> f64 {
        let sealed = self.vial_count.saturating_sub(1) as f64 * self.vial_size_mg;
        sealed + self.remaining_in_current_vial_mg.max(0.0)
    }

    pub fn is_low_stock(&self) -> bool {
        self.vial_count <= self.low_stock_threshold_vials
    }

    /// Whole doses the remaining stock covers
    pub fn remaining_doses(&self, dose_mg: f64) -> u32 {
        if !dose_mg.is_finite() || dose_mg <= 0.0 {
            return 0;
        }
        // Absorb float noise such as 10.0 / 0.1
        ((self.total_remaining_mg() / dose_mg) + 1e-9).floor() as u32
    }

    /// Days until stock runs out at the given dose and dosing interval
    pub fn days_of_supply(&self, dose_mg: f64, interval_days: f64) -> f64 {
        self.remaining_doses(dose_mg) as f64 * interval_days.max(0.0)
    }

    fn unchanged(&self, outcome: DecrementOutcome) -> LedgerUpdate {
        LedgerUpdate {
            state: self.clone(),
            outcome,
        }
    }

    fn clamp_remaining(&mut self) {
        self.remaining_in_current_vial_mg = self
            .remaining_in_current_vial_mg
            .clamp(0.0, self.vial_size_mg);
    }
}
