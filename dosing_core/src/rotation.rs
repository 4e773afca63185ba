//! Injection site rotation.
//!
//! Recommends the next site by scoring recent usage:
//! - Each past injection adds `1 / (days_since + 1)` to its site's score
//! - The body part with the lowest total score wins first
//! - Within that body part, the lowest-scoring site wins
//! - Ties go to the side used least recently, then to table order
//!
//! The recommendation is advisory; the host lets the user pick any site.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::sites::{sites_for, BodyPart, InjectionCategory, InjectionSite, Side, SiteInfo};
use crate::SiteHistoryEntry;

/// How many recent injections are considered by default
pub const DEFAULT_LOOKBACK: usize = 20;

/// A candidate site with its usage scores
#[derive(Clone, Debug, PartialEq)]
pub struct SiteScore {
    pub site: InjectionSite,
    pub body_part: BodyPart,
    /// Recency-weighted usage of this site
    pub score: f64,
    /// Combined score of the site's body part
    pub group_score: f64,
    pub last_used: Option<NaiveDateTime>,
}

/// Recommend the next injection site for a category.
///
/// Empty history yields the first site of the category.
pub fn recommend_next_site(
    category: InjectionCategory,
    history: &[SiteHistoryEntry],
    lookback: usize,
    now: NaiveDateTime,
) -> InjectionSite {
    let ranked = rank_sites(category, history, lookback, now);
    let site = ranked
        .first()
        .map(|candidate| candidate.site)
        .unwrap_or_else(|| first_site(category));

    tracing::debug!(
        "Recommended {} from {} history entries (lookback {})",
        site.key(),
        history.len(),
        lookback
    );
    site
}

/// Every site of a category, best candidate first
pub fn rank_sites(
    category: InjectionCategory,
    history: &[SiteHistoryEntry],
    lookback: usize,
    now: NaiveDateTime,
) -> Vec<SiteScore> {
    let window = recent_window(category, history, lookback);

    let mut site_score: HashMap<InjectionSite, f64> = HashMap::new();
    let mut site_last: HashMap<InjectionSite, NaiveDateTime> = HashMap::new();
    let mut side_last: HashMap<Side, NaiveDateTime> = HashMap::new();

    for entry in &window {
        *site_score.entry(entry.site).or_insert(0.0) += recency_weight(entry.timestamp, now);
        bump_latest(&mut site_last, entry.site, entry.timestamp);
        bump_latest(&mut side_last, entry.site.side(), entry.timestamp);
    }

    let mut groups = group_by_body_part(category);
    for group in &mut groups {
        group.score = group
            .sites
            .iter()
            .map(|info| site_score.get(&info.site).copied().unwrap_or(0.0))
            .sum();
        group.last_used = group
            .sites
            .iter()
            .filter_map(|info| site_last.get(&info.site).copied())
            .max();
    }

    // Least-used region first; never-used regions before stale ones
    groups.sort_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then(a.last_used.cmp(&b.last_used))
            .then(a.order.cmp(&b.order))
    });

    let mut ranked = Vec::new();
    for group in groups {
        let mut candidates: Vec<(usize, &SiteInfo)> = group.sites.into_iter().enumerate().collect();
        candidates.sort_by(|(ia, a), (ib, b)| {
            let score_a = site_score.get(&a.site).copied().unwrap_or(0.0);
            let score_b = site_score.get(&b.site).copied().unwrap_or(0.0);
            score_a
                .total_cmp(&score_b)
                .then(side_last.get(&a.side).cmp(&side_last.get(&b.side)))
                .then(ia.cmp(ib))
        });

        for (_, info) in candidates {
            ranked.push(SiteScore {
                site: info.site,
                body_part: info.body_part,
                score: site_score.get(&info.site).copied().unwrap_or(0.0),
                group_score: group.score,
                last_used: site_last.get(&info.site).copied(),
            });
        }
    }

    ranked
}

/// Sites of one body part, in table order
struct Group {
    order: usize,
    sites: Vec<&'static SiteInfo>,
    score: f64,
    last_used: Option<NaiveDateTime>,
}

fn group_by_body_part(category: InjectionCategory) -> Vec<Group> {
    let mut groups: Vec<(BodyPart, Group)> = Vec::new();

    for info in sites_for(category) {
        match groups.iter_mut().find(|entry| entry.0 == info.body_part) {
            Some(entry) => entry.1.sites.push(info),
            None => {
                let order = groups.len();
                groups.push((
                    info.body_part,
                    Group {
                        order,
                        sites: vec![info],
                        score: 0.0,
                        last_used: None,
                    },
                ));
            }
        }
    }

    groups.into_iter().map(|(_, group)| group).collect()
}

/// The most recent `lookback` entries for the category, newest first
fn recent_window(
    category: InjectionCategory,
    history: &[SiteHistoryEntry],
    lookback: usize,
) -> Vec<SiteHistoryEntry> {
    let mut window: Vec<_> = history
        .iter()
        .filter(|entry| entry.site.category() == category)
        .copied()
        .collect();
    window.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    window.truncate(lookback);
    window
}

fn recency_weight(timestamp: NaiveDateTime, now: NaiveDateTime) -> f64 {
    let days_since = (now - timestamp).num_days().max(0);
    1.0 / (days_since as f64 + 1.0)
}

fn bump_latest<K: std::hash::Hash + Eq>(
    map: &mut HashMap<K, NaiveDateTime>,
    key: K,
    at: NaiveDateTime,
) {
    let latest = map.entry(key).or_insert(at);
    if at > *latest {
        *latest = at;
    }
}

fn first_site(category: InjectionCategory) -> InjectionSite {
    match category {
        InjectionCategory::Intramuscular => {
            InjectionSite::Intramuscular(crate::sites::ImSite::DeltoidLeft)
        }
        InjectionCategory::Subcutaneous => {
            InjectionSite::Subcutaneous(crate::sites::SubqSite::BellyUpperLeft)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::{ImSite, SubqSite};
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn used(site: InjectionSite, days_ago: i64) -> SiteHistoryEntry {
        SiteHistoryEntry {
            site,
            timestamp: now() - Duration::days(days_ago),
        }
    }

    fn sc(site: SubqSite) -> InjectionSite {
        InjectionSite::Subcutaneous(site)
    }

    #[test]
    fn test_cold_start_picks_first_site() {
        assert_eq!(
            recommend_next_site(InjectionCategory::Subcutaneous, &[], DEFAULT_LOOKBACK, now()),
            sc(SubqSite::BellyUpperLeft)
        );
        assert_eq!(
            recommend_next_site(InjectionCategory::Intramuscular, &[], DEFAULT_LOOKBACK, now()),
            InjectionSite::Intramuscular(ImSite::DeltoidLeft)
        );
    }

    #[test]
    fn test_unused_body_part_wins() {
        let mut history = Vec::new();
        for day in 0..12 {
            history.push(used(sc(SubqSite::BellyUpperLeft), day));
            history.push(used(sc(SubqSite::GluteRight), day));
        }
        history.push(used(sc(SubqSite::DeltoidLeft), 3));

        let site = recommend_next_site(
            InjectionCategory::Subcutaneous,
            &history,
            DEFAULT_LOOKBACK,
            now(),
        );
        assert_eq!(site.body_part(), BodyPart::Thigh);
    }

    #[test]
    fn test_fresh_site_in_used_region_loses_to_quiet_region() {
        // Belly has untouched sites but the region as a whole is busy
        let history = vec![
            used(sc(SubqSite::BellyUpperLeft), 0),
            used(sc(SubqSite::BellyUpperRight), 1),
            used(sc(SubqSite::GluteLeft), 20),
            used(sc(SubqSite::ThighLeft), 20),
            used(sc(SubqSite::DeltoidLeft), 20),
        ];

        let site = recommend_next_site(
            InjectionCategory::Subcutaneous,
            &history,
            DEFAULT_LOOKBACK,
            now(),
        );
        assert_ne!(site.body_part(), BodyPart::Abdomen);
    }

    #[test]
    fn test_side_tie_break_prefers_least_recent_side() {
        // Every other region is busier than the belly
        let mut history = vec![used(sc(SubqSite::BellyUpperLeft), 1)];
        for day in 0..3 {
            history.push(used(sc(SubqSite::GluteLeft), day));
            history.push(used(sc(SubqSite::ThighLeft), day));
            history.push(used(sc(SubqSite::DeltoidLeft), day));
        }

        let site = recommend_next_site(
            InjectionCategory::Subcutaneous,
            &history,
            DEFAULT_LOOKBACK,
            now(),
        );
        // Left was used recently everywhere, right never
        assert_eq!(site, sc(SubqSite::BellyUpperRight));
    }

    #[test]
    fn test_lookback_forgets_old_history() {
        // Thigh was hammered long ago, belly once recently
        let mut history = vec![used(sc(SubqSite::BellyUpperLeft), 0)];
        for day in 30..40 {
            history.push(used(sc(SubqSite::ThighLeft), day));
            history.push(used(sc(SubqSite::ThighRight), day));
        }

        let limited = rank_sites(InjectionCategory::Subcutaneous, &history, 1, now());
        let thigh = limited
            .iter()
            .find(|s| s.site == sc(SubqSite::ThighLeft))
            .unwrap();
        assert_eq!(thigh.score, 0.0);
        assert_eq!(thigh.last_used, None);
    }

    #[test]
    fn test_recency_weighting() {
        let history = vec![
            used(sc(SubqSite::BellyUpperLeft), 0),
            used(sc(SubqSite::BellyLowerLeft), 29),
        ];

        let ranked = rank_sites(InjectionCategory::Subcutaneous, &history, DEFAULT_LOOKBACK, now());
        let score = |site| ranked.iter().find(|s| s.site == site).unwrap().score;

        assert!((score(sc(SubqSite::BellyUpperLeft)) - 1.0).abs() < 1e-9);
        assert!((score(sc(SubqSite::BellyLowerLeft)) - 1.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_other_category_history_is_ignored() {
        let history = vec![used(InjectionSite::Intramuscular(ImSite::DeltoidLeft), 0)];

        assert_eq!(
            recommend_next_site(
                InjectionCategory::Subcutaneous,
                &history,
                DEFAULT_LOOKBACK,
                now()
            ),
            sc(SubqSite::BellyUpperLeft)
        );
    }

    #[test]
    fn test_rank_lists_every_site_with_recommendation_first() {
        let history = vec![
            used(sc(SubqSite::BellyUpperLeft), 2),
            used(sc(SubqSite::GluteRight), 1),
        ];

        let ranked = rank_sites(InjectionCategory::Subcutaneous, &history, DEFAULT_LOOKBACK, now());
        assert_eq!(ranked.len(), 10);
        assert_eq!(
            ranked[0].site,
            recommend_next_site(
                InjectionCategory::Subcutaneous,
                &history,
                DEFAULT_LOOKBACK,
                now()
            )
        );
        assert!(ranked
            .windows(2)
            .all(|pair| pair[0].group_score <= pair[1].group_score));
    }

    proptest! {
        /// However the rest is used, an untouched body part is recommended
        #[test]
        fn unused_body_part_always_wins(
            skipped in 0usize..4,
            picks in prop::collection::vec((0usize..16, 0i64..60), 1..=DEFAULT_LOOKBACK),
        ) {
            let category = InjectionCategory::Subcutaneous;
            let mut parts: Vec<BodyPart> = Vec::new();
            for info in sites_for(category) {
                if !parts.contains(&info.body_part) {
                    parts.push(info.body_part);
                }
            }
            let quiet = parts[skipped % parts.len()];

            let candidates: Vec<InjectionSite> = sites_for(category)
                .filter(|info| info.body_part != quiet)
                .map(|info| info.site)
                .collect();
            let history: Vec<SiteHistoryEntry> = picks
                .iter()
                .map(|&(idx, days_ago)| used(candidates[idx % candidates.len()], days_ago))
                .collect();

            let site = recommend_next_site(category, &history, DEFAULT_LOOKBACK, now());
            prop_assert!(history.iter().all(|entry| entry.site.body_part() != site.body_part()));
        }
    }
}
