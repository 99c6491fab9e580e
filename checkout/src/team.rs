//! Team size configuration and the required-member computation.

use crate::catalog::CatalogItem;
use crate::error::ConfigError;
use crate::fields::FieldSet;
use crate::types::{Record, field_value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the field a team enters its total head count in
pub const NUM_MEMBERS_FIELD: &str = "numMembers";

/// Smallest team once flagship benefits are subtracted: leader plus one
pub const MIN_ADJUSTED_TEAM: u32 = 2;

/// Participant bounds for one item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSizeConfig {
    /// Minimum participants, leader included
    pub min: u32,
    /// Maximum participants, leader included
    pub max: u32,
}

impl TeamSizeConfig {
    /// Bounds of a solo item
    pub const SOLO: Self = Self { min: 1, max: 1 };

    /// Whether this is a team event
    #[must_use]
    pub const fn is_team(&self) -> bool {
        self.max > 1
    }
}

/// Parse a displayed team size such as `"4-5"`, `"4 - 8"` or `"4"`.
#[must_use]
pub fn parse_team_size_text(text: &str) -> Option<TeamSizeConfig> {
    let (min, max) = match text.split_once('-') {
        Some((min, max)) => (min.trim().parse::<u32>().ok()?, max.trim().parse::<u32>().ok()?),
        None => {
            let n = text.trim().parse::<u32>().ok()?;
            (n, n)
        },
    };
    (min >= 1 && max >= min).then_some(TeamSizeConfig { min, max })
}

/// Team size table keyed by item title (case-insensitive)
#[derive(Clone, Debug, Default)]
pub struct TeamSizeTable {
    entries: BTreeMap<String, TeamSizeConfig>,
}

fn key(title: &str) -> String {
    title.trim().to_uppercase()
}

impl TeamSizeTable {
    /// Build a table from `(title, min, max)` entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTeamSize`] if an entry has `min == 0`
    /// or `max < min`.
    pub fn from_entries<T: Into<String>>(
        entries: impl IntoIterator<Item = (T, u32, u32)>,
    ) -> Result<Self, ConfigError> {
        let mut table = BTreeMap::new();
        for (title, min, max) in entries {
            let title = title.into();
            if min == 0 || max < min {
                return Err(ConfigError::InvalidTeamSize { title, min, max });
            }
            table.insert(key(&title), TeamSizeConfig { min, max });
        }
        Ok(Self { entries: table })
    }

    /// The built-in festival table
    #[must_use]
    pub fn festival() -> Self {
        let entries = [
            ("RAMP WALK", 10, 21),
            ("BATTLE OF BANDS", 4, 8),
            ("VALORANT", 5, 6),
            ("BGMI", 4, 5),
            ("FREE FIRE", 4, 4),
            ("GROUP DANCE", 6, 15),
        ];
        Self {
            entries: entries
                .into_iter()
                .map(|(title, min, max)| (key(title), TeamSizeConfig { min, max }))
                .collect(),
        }
    }

    /// Configured bounds for a title, if any
    #[must_use]
    pub fn get(&self, title: &str) -> Option<TeamSizeConfig> {
        self.entries.get(&key(title)).copied()
    }

    /// Bounds for a title; absence means a solo item
    #[must_use]
    pub fn config_for(&self, title: &str) -> TeamSizeConfig {
        self.get(title).unwrap_or(TeamSizeConfig::SOLO)
    }

    /// Bounds for an item: the table first, then the item's displayed team
    /// size, then solo
    #[must_use]
    pub fn config_for_item(&self, item: &CatalogItem) -> TeamSizeConfig {
        self.get(&item.title)
            .or_else(|| item.team_size_text.as_deref().and_then(parse_team_size_text))
            .unwrap_or(TeamSizeConfig::SOLO)
    }

    /// Whether the titled item is a team event
    #[must_use]
    pub fn is_team_event(&self, title: &str) -> bool {
        self.config_for(title).is_team()
    }
}

/// Where a team's required member count came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequirementSource {
    /// The team entered its total in `numMembers`
    DeclaredTotal {
        /// The entered total, leader included
        total: u32,
    },
    /// The configured minimum, reduced by flagship benefit slots
    AdjustedMinimum {
        /// Configured bounds
        config: TeamSizeConfig,
        /// Minimum after subtracting benefit slots, never below two
        adjusted_min: u32,
    },
}

/// How many member records (besides the leader) a team form needs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberRequirement {
    /// Additional members required beyond the leader
    pub additional: u32,
    /// What the count was derived from
    pub source: RequirementSource,
}

impl MemberRequirement {
    /// Total team size the requirement corresponds to
    #[must_use]
    pub const fn target_total(&self) -> u32 {
        self.additional + 1
    }
}

/// Minimum team size after flagship benefit slots stand in for members.
///
/// Support artists and both visitor-pass kinds each cover one slot, but a
/// team always keeps a leader and at least one real member.
#[must_use]
pub const fn adjusted_minimum(config: TeamSizeConfig, benefit_qty: u32) -> u32 {
    let reduced = config.min.saturating_sub(benefit_qty);
    if reduced < MIN_ADJUSTED_TEAM {
        MIN_ADJUSTED_TEAM
    } else {
        reduced
    }
}

/// Compute the member requirement for a team form.
///
/// A declared `numMembers` total wins when the form has that field and the
/// value parses; otherwise the table minimum is adjusted by the item's
/// flagship benefit quantities.
#[must_use]
pub fn member_requirement(
    item: &CatalogItem,
    fields: &FieldSet,
    form: Option<&Record>,
    benefit_qty: u32,
    table: &TeamSizeTable,
) -> MemberRequirement {
    let declared = fields
        .has(NUM_MEMBERS_FIELD)
        .then(|| form.and_then(|f| field_value(f, NUM_MEMBERS_FIELD)))
        .flatten()
        .and_then(|value| value.parse::<u32>().ok());

    if let Some(total) = declared {
        return MemberRequirement {
            additional: total.saturating_sub(1),
            source: RequirementSource::DeclaredTotal { total },
        };
    }

    let config = table.config_for_item(item);
    let adjusted_min = adjusted_minimum(config, benefit_qty);
    MemberRequirement {
        additional: adjusted_min - 1,
        source: RequirementSource::AdjustedMinimum {
            config,
            adjusted_min,
        },
    }
}
