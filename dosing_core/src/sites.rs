//! Injection site catalog.
//!
//! Sites are split by injection category into two disjoint enumerations.
//! Everything the rotation logic needs to know about a site (body part,
//! side, display label) lives in one static table, so adding or regrouping
//! sites never touches the scoring code.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Injection route of a compound
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InjectionCategory {
    Intramuscular,
    Subcutaneous,
}

impl InjectionCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "im" | "intramuscular" => Some(InjectionCategory::Intramuscular),
            "subq" | "sc" | "subcutaneous" => Some(InjectionCategory::Subcutaneous),
            _ => None,
        }
    }
}

/// Intramuscular sites
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImSite {
    DeltoidLeft,
    DeltoidRight,
    VentroglutealLeft,
    VentroglutealRight,
    GluteUpperLeft,
    GluteUpperRight,
    GluteLowerLeft,
    GluteLowerRight,
    ThighLeft,
    ThighRight,
}

/// Subcutaneous sites
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubqSite {
    BellyUpperLeft,
    BellyUpperRight,
    BellyLowerLeft,
    BellyLowerRight,
    GluteLeft,
    GluteRight,
    ThighLeft,
    ThighRight,
    DeltoidLeft,
    DeltoidRight,
}

/// An injection site, tagged by category
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InjectionSite {
    Intramuscular(ImSite),
    Subcutaneous(SubqSite),
}

/// Body region used to group sites during rotation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    Deltoid,
    Hip,
    Glute,
    Thigh,
    Abdomen,
    Arm,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Static metadata for one site
#[derive(Clone, Copy, Debug)]
pub struct SiteInfo {
    pub site: InjectionSite,
    pub body_part: BodyPart,
    pub side: Side,
    /// Stable key used on the command line and in exports
    pub key: &'static str,
    pub label: &'static str,
}

const fn im(
    site: ImSite,
    body_part: BodyPart,
    side: Side,
    key: &'static str,
    label: &'static str,
) -> SiteInfo {
    SiteInfo {
        site: InjectionSite::Intramuscular(site),
        body_part,
        side,
        key,
        label,
    }
}

const fn subq(
    site: SubqSite,
    body_part: BodyPart,
    side: Side,
    key: &'static str,
    label: &'static str,
) -> SiteInfo {
    SiteInfo {
        site: InjectionSite::Subcutaneous(site),
        body_part,
        side,
        key,
        label,
    }
}

/// Every known site. Order within a category is the deterministic fallback
/// order for rotation ties and cold starts.
pub static SITE_TABLE: &[SiteInfo] = &[
    // Intramuscular
    im(ImSite::DeltoidLeft, BodyPart::Deltoid, Side::Left, "im_deltoid_left", "Left Deltoid"),
    im(ImSite::DeltoidRight, BodyPart::Deltoid, Side::Right, "im_deltoid_right", "Right Deltoid"),
    im(ImSite::VentroglutealLeft, BodyPart::Hip, Side::Left, "im_ventroglute_left", "Left Ventrogluteal"),
    im(ImSite::VentroglutealRight, BodyPart::Hip, Side::Right, "im_ventroglute_right", "Right Ventrogluteal"),
    im(ImSite::GluteUpperLeft, BodyPart::Glute, Side::Left, "im_glute_upper_left", "Left Glute (upper)"),
    im(ImSite::GluteUpperRight, BodyPart::Glute, Side::Right, "im_glute_upper_right", "Right Glute (upper)"),
    im(ImSite::GluteLowerLeft, BodyPart::Glute, Side::Left, "im_glute_lower_left", "Left Glute (lower)"),
    im(ImSite::GluteLowerRight, BodyPart::Glute, Side::Right, "im_glute_lower_right", "Right Glute (lower)"),
    im(ImSite::ThighLeft, BodyPart::Thigh, Side::Left, "im_thigh_left", "Left Thigh (vastus lateralis)"),
    im(ImSite::ThighRight, BodyPart::Thigh, Side::Right, "im_thigh_right", "Right Thigh (vastus lateralis)"),
    // Subcutaneous
    subq(SubqSite::BellyUpperLeft, BodyPart::Abdomen, Side::Left, "subq_belly_upper_left", "Belly, upper left"),
    subq(SubqSite::BellyUpperRight, BodyPart::Abdomen, Side::Right, "subq_belly_upper_right", "Belly, upper right"),
    subq(SubqSite::BellyLowerLeft, BodyPart::Abdomen, Side::Left, "subq_belly_lower_left", "Belly, lower left"),
    subq(SubqSite::BellyLowerRight, BodyPart::Abdomen, Side::Right, "subq_belly_lower_right", "Belly, lower right"),
    subq(SubqSite::GluteLeft, BodyPart::Glute, Side::Left, "subq_glute_left", "Left Glute"),
    subq(SubqSite::GluteRight, BodyPart::Glute, Side::Right, "subq_glute_right", "Right Glute"),
    subq(SubqSite::ThighLeft, BodyPart::Thigh, Side::Left, "subq_thigh_left", "Left Thigh"),
    subq(SubqSite::ThighRight, BodyPart::Thigh, Side::Right, "subq_thigh_right", "Right Thigh"),
    subq(SubqSite::DeltoidLeft, BodyPart::Arm, Side::Left, "subq_arm_left", "Back of left arm"),
    subq(SubqSite::DeltoidRight, BodyPart::Arm, Side::Right, "subq_arm_right", "Back of right arm"),
];

/// Index from site to its row in `SITE_TABLE`
static SITE_INDEX: Lazy<HashMap<InjectionSite, usize>> = Lazy::new(|| {
    SITE_TABLE
        .iter()
        .enumerate()
        .map(|(idx, info)| (info.site, idx))
        .collect()
});

impl InjectionSite {
    pub fn category(self) -> InjectionCategory {
        match self {
            InjectionSite::Intramuscular(_) => InjectionCategory::Intramuscular,
            InjectionSite::Subcutaneous(_) => InjectionCategory::Subcutaneous,
        }
    }

    /// Table metadata for this site
    pub fn info(self) -> &'static SiteInfo {
        // Every variant has a row; the index is built from the same table.
        &SITE_TABLE[SITE_INDEX[&self]]
    }

    pub fn body_part(self) -> BodyPart {
        self.info().body_part
    }

    pub fn side(self) -> Side {
        self.info().side
    }

    pub fn label(self) -> &'static str {
        self.info().label
    }

    pub fn key(self) -> &'static str {
        self.info().key
    }

    /// Look a site up by its stable key
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_lowercase();
        SITE_TABLE.iter().find(|info| info.key == key).map(|info| info.site)
    }
}

/// All sites of one category, in table order
pub fn sites_for(category: InjectionCategory) -> impl Iterator<Item = &'static SiteInfo> {
    SITE_TABLE
        .iter()
        .filter(move |info| info.site.category() == category)
}
