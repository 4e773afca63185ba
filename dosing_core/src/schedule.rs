//! Next-dose calculation for tracked regimens.
//!
//! Every function here takes the regimen snapshot and the host's "now" and
//! returns a fresh value; nothing reads the clock.
//!
//! Schedule rules:
//! - Daily: today at the dose time, or tomorrow if that moment has passed
//! - Every N days: counted from the last dose (or the start date)
//! - Alternating days: a fixed cycle of gaps phased from the start date
//! - Specific weekdays: the next listed weekday at the dose time

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::{Regimen, ScheduleKind};

/// Dose time used when a regimen has no notification time
pub fn default_dose_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Next due moment for a regimen, using 08:00 when no time is set.
///
/// Returns `None` for as-needed and inactive regimens.
pub fn next_due(regimen: &Regimen, now: NaiveDateTime) -> Option<NaiveDateTime> {
    next_due_with_default(regimen, now, default_dose_time())
}

/// Next due moment, with a host-chosen fallback dose time
pub fn next_due_with_default(
    regimen: &Regimen,
    now: NaiveDateTime,
    default_time: NaiveTime,
) -> Option<NaiveDateTime> {
    if !regimen.is_active {
        tracing::debug!("Regimen {} is inactive, nothing due", regimen.id);
        return None;
    }

    let time = regimen.notification_time.unwrap_or(default_time);

    let due = match &regimen.schedule {
        ScheduleKind::AsNeeded => return None,
        ScheduleKind::Daily => daily(now, time),
        ScheduleKind::EveryNDays { n } => every_n_days(regimen, now, time, (*n).max(1)),
        ScheduleKind::AlternatingDays { lengths } => alternating_days(regimen, now, time, lengths),
        ScheduleKind::SpecificWeekdays { days } => {
            specific_weekdays(now, time, days.iter().copied())
        }
    };

    tracing::debug!(
        "Regimen {} ({:?}) next due at {}",
        regimen.id,
        regimen.schedule,
        due
    );
    Some(due)
}

/// True when the next dose falls on `now`'s calendar day
pub fn is_due_today(regimen: &Regimen, now: NaiveDateTime) -> bool {
    is_due_today_with_default(regimen, now, default_dose_time())
}

pub fn is_due_today_with_default(
    regimen: &Regimen,
    now: NaiveDateTime,
    default_time: NaiveTime,
) -> bool {
    next_due_with_default(regimen, now, default_time).is_some_and(|due| due.date() == now.date())
}

/// True when the next due moment is already behind `now`
pub fn is_overdue(regimen: &Regimen, now: NaiveDateTime) -> bool {
    is_overdue_with_default(regimen, now, default_dose_time())
}

pub fn is_overdue_with_default(
    regimen: &Regimen,
    now: NaiveDateTime,
    default_time: NaiveTime,
) -> bool {
    next_due_with_default(regimen, now, default_time).is_some_and(|due| due < now)
}

/// The next `count` due moments, assuming each dose is taken on time.
///
/// Useful for scheduling a batch of reminders at once.
pub fn upcoming(
    regimen: &Regimen,
    now: NaiveDateTime,
    count: usize,
    default_time: NaiveTime,
) -> Vec<NaiveDateTime> {
    let mut projected = regimen.clone();
    let mut cursor = now;
    let mut out = Vec::with_capacity(count);

    for _ in 0..count {
        let Some(due) = next_due_with_default(&projected, cursor, default_time) else {
            break;
        };
        out.push(due);
        projected.record_dose(due);
        cursor = due + Duration::seconds(1);
    }

    out
}

fn days(n: i64) -> Duration {
    Duration::days(n)
}

fn daily(now: NaiveDateTime, time: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(time);
    if today < now {
        today + days(1)
    } else {
        today
    }
}

fn every_n_days(regimen: &Regimen, now: NaiveDateTime, time: NaiveTime, n: u32) -> NaiveDateTime {
    let anchor = regimen
        .last_dose_date
        .or(regimen.start_date)
        .unwrap_or(now)
        .date();
    let today = now.date();

    // Not started yet
    if anchor > today && regimen.last_dose_date.is_none() {
        return anchor.and_time(time);
    }

    let n = i64::from(n);
    let days_since = (today - anchor).num_days();
    let rem = days_since.rem_euclid(n);
    let days_until = if rem == 0 && days_since > 0 { 0 } else { n - rem };

    let due = (today + days(days_until)).and_time(time);
    if days_until == 0 && due <= now {
        due + days(n)
    } else {
        due
    }
}

fn alternating_days(
    regimen: &Regimen,
    now: NaiveDateTime,
    time: NaiveTime,
    lengths: &[u32],
) -> NaiveDateTime {
    let anchor = regimen
        .start_date
        .or(regimen.last_dose_date)
        .unwrap_or(now)
        .date();
    let today = now.date();

    if anchor > today {
        return anchor.and_time(time);
    }

    // Cumulative gap boundaries within one cycle, e.g. [3, 7] for [3, 4]
    let mut boundaries = Vec::with_capacity(lengths.len());
    let mut cycle = 0i64;
    for len in lengths {
        cycle += i64::from((*len).max(1));
        boundaries.push(cycle);
    }
    if cycle == 0 {
        // Degenerate input: behave like a daily schedule
        return daily(now, time);
    }

    let days_since = (today - anchor).num_days();
    let pos = days_since.rem_euclid(cycle);
    let is_dose_day = pos == 0 || boundaries.contains(&pos);
    let dosed_today = regimen
        .last_dose_date
        .is_some_and(|last| last.date() == today);

    let today_due = today.and_time(time);
    if is_dose_day && today_due > now && !dosed_today {
        return today_due;
    }

    let next_boundary = boundaries
        .iter()
        .copied()
        .find(|b| *b > pos)
        .unwrap_or(cycle);
    (today + days(next_boundary - pos)).and_time(time)
}

fn specific_weekdays(
    now: NaiveDateTime,
    time: NaiveTime,
    scheduled: impl Iterator<Item = u8> + Clone,
) -> NaiveDateTime {
    let today: NaiveDate = now.date();
    let weekday = now.weekday().num_days_from_sunday() as u8;
    let passed_today = today.and_time(time) < now;

    for offset in 0..7u8 {
        let day = (weekday + offset) % 7;
        if !scheduled.clone().any(|d| d == day) {
            continue;
        }
        if offset == 0 && passed_today {
            continue;
        }
        return (today + days(i64::from(offset))).and_time(time);
    }

    // Only today is scheduled and it has passed: same weekday next week
    (today + days(7)).and_time(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DosageUnit;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn regimen(schedule: ScheduleKind, start: NaiveDateTime) -> Regimen {
        Regimen::new("test", 1.0, DosageUnit::Mg, schedule, start)
    }

    fn weekdays(days: &[u8]) -> ScheduleKind {
        ScheduleKind::SpecificWeekdays {
            days: days.iter().copied().collect(),
        }
    }

    #[test]
    fn test_daily_before_and_after_dose_time() {
        let r = regimen(ScheduleKind::Daily, at(2024, 1, 1, 0, 0));

        assert_eq!(next_due(&r, at(2024, 1, 10, 7, 0)), Some(at(2024, 1, 10, 8, 0)));
        assert_eq!(next_due(&r, at(2024, 1, 10, 9, 0)), Some(at(2024, 1, 11, 8, 0)));
    }

    #[test]
    fn test_daily_uses_notification_time() {
        let mut r = regimen(ScheduleKind::Daily, at(2024, 1, 1, 0, 0));
        r.notification_time = NaiveTime::from_hms_opt(21, 30, 0);

        assert_eq!(next_due(&r, at(2024, 1, 10, 9, 0)), Some(at(2024, 1, 10, 21, 30)));
    }

    #[test]
    fn test_inactive_and_as_needed_have_no_due_date() {
        let mut r = regimen(ScheduleKind::Daily, at(2024, 1, 1, 0, 0));
        r.deactivate();
        assert_eq!(next_due(&r, at(2024, 1, 10, 9, 0)), None);

        let r = regimen(ScheduleKind::AsNeeded, at(2024, 1, 1, 0, 0));
        assert_eq!(next_due(&r, at(2024, 1, 10, 9, 0)), None);
        assert!(!is_due_today(&r, at(2024, 1, 10, 9, 0)));
    }

    #[test]
    fn test_every_n_days_from_last_dose() {
        let mut r = regimen(ScheduleKind::EveryNDays { n: 2 }, at(2024, 1, 1, 8, 0));
        r.record_dose(at(2024, 1, 10, 8, 5));

        // Dosed today: next is two days out
        assert_eq!(next_due(&r, at(2024, 1, 10, 12, 0)), Some(at(2024, 1, 12, 8, 0)));
        // One day later: one day to go
        assert_eq!(next_due(&r, at(2024, 1, 11, 12, 0)), Some(at(2024, 1, 12, 8, 0)));
        // Due day, before the dose time
        assert_eq!(next_due(&r, at(2024, 1, 12, 7, 0)), Some(at(2024, 1, 12, 8, 0)));
    }

    #[test]
    fn test_every_n_days_rolls_forward_when_time_passed() {
        let mut r = regimen(ScheduleKind::EveryNDays { n: 3 }, at(2024, 1, 1, 8, 0));
        r.record_dose(at(2024, 1, 10, 8, 0));

        assert_eq!(next_due(&r, at(2024, 1, 13, 9, 0)), Some(at(2024, 1, 16, 8, 0)));
    }

    #[test]
    fn test_every_n_days_anchors_on_start_date() {
        let r = regimen(ScheduleKind::EveryNDays { n: 7 }, at(2024, 1, 1, 8, 0));

        assert_eq!(next_due(&r, at(2024, 1, 3, 9, 0)), Some(at(2024, 1, 8, 8, 0)));
    }

    #[test]
    fn test_future_start_is_due_on_start_day() {
        let r = regimen(ScheduleKind::EveryNDays { n: 2 }, at(2024, 2, 1, 8, 0));
        assert_eq!(next_due(&r, at(2024, 1, 28, 9, 0)), Some(at(2024, 2, 1, 8, 0)));

        let r = regimen(ScheduleKind::every_three_and_a_half_days(), at(2024, 2, 1, 8, 0));
        assert_eq!(next_due(&r, at(2024, 1, 28, 9, 0)), Some(at(2024, 2, 1, 8, 0)));
    }

    #[test]
    fn test_alternating_three_four_sequence() {
        let start = at(2024, 1, 1, 8, 0);
        let mut r = regimen(ScheduleKind::every_three_and_a_half_days(), start);
        let mut now = start;
        let mut gaps = Vec::new();

        for _ in 0..8 {
            let due = next_due(&r, now).unwrap();
            gaps.push((due.date() - now.date()).num_days());
            r.record_dose(due);
            now = due;
        }

        assert_eq!(gaps, vec![3, 4, 3, 4, 3, 4, 3, 4]);
    }

    #[test]
    fn test_alternating_matches_legacy_cycle_rule() {
        let start = at(2024, 1, 1, 8, 0);
        let r = regimen(ScheduleKind::every_three_and_a_half_days(), start);

        for day in 0..21i64 {
            let now = (start.date() + Duration::days(day)).and_hms_opt(23, 0, 0).unwrap();
            let pos = day % 7;
            let expected = if pos < 3 { 3 - pos } else { 7 - pos };
            let due = next_due(&r, now).unwrap();
            assert_eq!((due.date() - now.date()).num_days(), expected, "day {}", day);
        }
    }

    #[test]
    fn test_alternating_due_today_until_dose_logged() {
        let start = at(2024, 1, 1, 8, 0);
        let mut r = regimen(ScheduleKind::every_three_and_a_half_days(), start);

        let morning = at(2024, 1, 4, 7, 0);
        assert_eq!(next_due(&r, morning), Some(at(2024, 1, 4, 8, 0)));

        r.record_dose(at(2024, 1, 4, 6, 45));
        assert_eq!(next_due(&r, morning), Some(at(2024, 1, 8, 8, 0)));
    }

    #[test]
    fn test_weekdays_thursday_goes_to_friday() {
        // 2024-01-04 is a Thursday
        let r = regimen(weekdays(&[1, 3, 5]), at(2024, 1, 1, 8, 0));

        assert_eq!(next_due(&r, at(2024, 1, 4, 7, 0)), Some(at(2024, 1, 5, 8, 0)));
    }

    #[test]
    fn test_weekdays_skips_today_once_passed() {
        let r = regimen(weekdays(&[1, 3, 5]), at(2024, 1, 1, 8, 0));

        // Friday before and after 08:00
        assert_eq!(next_due(&r, at(2024, 1, 5, 7, 0)), Some(at(2024, 1, 5, 8, 0)));
        assert_eq!(next_due(&r, at(2024, 1, 5, 9, 0)), Some(at(2024, 1, 8, 8, 0)));
    }

    #[test]
    fn test_weekdays_single_day_wraps_a_full_week() {
        // Sundays only, asked on a Sunday evening
        let r = regimen(weekdays(&[0]), at(2024, 1, 1, 8, 0));

        assert_eq!(next_due(&r, at(2024, 1, 7, 20, 0)), Some(at(2024, 1, 14, 8, 0)));
    }

    #[test]
    fn test_due_today_and_overdue() {
        let r = regimen(ScheduleKind::Daily, at(2024, 1, 1, 0, 0));

        assert!(is_due_today(&r, at(2024, 1, 10, 7, 0)));
        assert!(!is_due_today(&r, at(2024, 1, 10, 9, 0)));
        assert!(!is_overdue(&r, at(2024, 1, 10, 9, 0)));
    }

    #[test]
    fn test_due_today_follows_configured_default_time() {
        let r = regimen(ScheduleKind::Daily, at(2024, 1, 1, 0, 0));
        let evening = NaiveTime::from_hms_opt(21, 0, 0).unwrap();

        // 09:00 is past the built-in 08:00 but before a 21:00 default
        assert!(!is_due_today(&r, at(2024, 1, 10, 9, 0)));
        assert!(is_due_today_with_default(&r, at(2024, 1, 10, 9, 0), evening));
        assert!(!is_overdue_with_default(&r, at(2024, 1, 10, 9, 0), evening));
    }

    #[test]
    fn test_upcoming_daily() {
        let r = regimen(ScheduleKind::Daily, at(2024, 1, 1, 0, 0));
        let next = upcoming(&r, at(2024, 1, 10, 9, 0), 3, default_dose_time());

        assert_eq!(
            next,
            vec![at(2024, 1, 11, 8, 0), at(2024, 1, 12, 8, 0), at(2024, 1, 13, 8, 0)]
        );
    }

    #[test]
    fn test_upcoming_as_needed_is_empty() {
        let r = regimen(ScheduleKind::AsNeeded, at(2024, 1, 1, 0, 0));
        assert!(upcoming(&r, at(2024, 1, 10, 9, 0), 5, default_dose_time()).is_empty());
    }

    proptest! {
        /// Every-N-days never lands in the past or more than one cycle out
        #[test]
        fn every_n_days_stays_within_one_cycle(
            n in prop::sample::select(vec![1u32, 2, 4, 5, 6, 7]),
            days_since_dose in 0i64..60,
            now_minutes in 0u32..(24 * 60),
            dose_minutes in 0u32..(24 * 60),
        ) {
            let now = at(2024, 3, 1, now_minutes / 60, now_minutes % 60);
            let mut r = regimen(ScheduleKind::EveryNDays { n }, at(2023, 12, 1, 8, 0));
            r.notification_time = NaiveTime::from_hms_opt(dose_minutes / 60, dose_minutes % 60, 0);
            r.record_dose(now - Duration::days(days_since_dose));

            let due = next_due(&r, now).unwrap();
            prop_assert!(due > now - Duration::days(1));
            prop_assert!(due.date() <= now.date() + Duration::days(i64::from(n)));
        }
    }
}
