//! Field schema registry.
//!
//! Maps a catalog item to the form it needs. Field sets are identified by
//! their shape, not by where they live: two sets with the same fields in the
//! same order hash identically and therefore group identically.

use crate::catalog::CatalogItem;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// One option of a select field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Submitted value
    pub value: String,
    /// Display label
    pub label: String,
}

/// Input type of a field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldType {
    /// Free text
    Text,
    /// Email address
    Email,
    /// Ten-digit mobile number
    Phone,
    /// Non-negative whole number
    Number,
    /// One of a fixed list of options
    Select {
        /// Allowed options
        options: Vec<SelectOption>,
    },
    /// Uploaded document
    File {
        /// Accepted MIME patterns (`"image/*,application/pdf"`)
        accept: String,
    },
}

impl FieldType {
    fn tag(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Number => "number",
            Self::Select { .. } => "select",
            Self::File { .. } => "file",
        }
    }
}

/// A single form field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field key, unique within its set
    pub name: String,
    /// Display label
    pub label: String,
    /// Input type
    pub field_type: FieldType,
    /// Whether a value must be provided
    pub required: bool,
}

impl FieldDefinition {
    fn new(name: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            field_type,
            required: true,
        }
    }

    fn text(name: &str, label: &str) -> Self {
        Self::new(name, label, FieldType::Text)
    }

    fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Whether this field holds a file
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.field_type, FieldType::File { .. })
    }
}

/// Ordered list of field definitions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet(Vec<FieldDefinition>);

impl FieldSet {
    /// Create a field set
    #[must_use]
    pub const fn new(fields: Vec<FieldDefinition>) -> Self {
        Self(fields)
    }

    /// Iterate over fields in order
    pub fn iter(&self) -> std::slice::Iter<'_, FieldDefinition> {
        self.0.iter()
    }

    /// Find a field by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.0.iter().find(|field| field.name == name)
    }

    /// Whether the set contains a field with this name
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// SHA-256 over the canonical shape of the set, as lowercase hex.
    ///
    /// Covers name, type, required flag, select options and file accept
    /// patterns, in field order. Labels are cosmetic and not included.
    #[must_use]
    pub fn structural_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for field in &self.0 {
            hasher.update(field.name.as_bytes());
            hasher.update([0x1f]);
            hasher.update(field.field_type.tag().as_bytes());
            hasher.update([0x1f, u8::from(field.required)]);
            match &field.field_type {
                FieldType::Select { options } => {
                    for option in options {
                        hasher.update([0x1f]);
                        hasher.update(option.value.as_bytes());
                    }
                },
                FieldType::File { accept } => {
                    hasher.update([0x1f]);
                    hasher.update(accept.as_bytes());
                },
                _ => {},
            }
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a FieldDefinition;
    type IntoIter = std::slice::Iter<'a, FieldDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Which form a scope uses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldSetKind {
    /// Individual participant
    Solo,
    /// Group performance (ramp walk, dance, band)
    Team,
    /// Esports team identified by the leader's game id
    TeamEsports,
    /// Esports squad with in-game names and UIDs
    SquadEsports,
    /// Visitor pass holder
    VisitorPass,
    /// Support artist or bonus visitor attached to a flagship item
    BenefitHolder,
}

impl FieldSetKind {
    /// The field set for this kind
    #[must_use]
    pub fn fields(self) -> &'static FieldSet {
        match self {
            Self::Solo => &SOLO,
            Self::Team => &TEAM,
            Self::TeamEsports => &TEAM_ESPORTS,
            Self::SquadEsports => &SQUAD_ESPORTS,
            Self::VisitorPass => &VISITOR_PASS,
            Self::BenefitHolder => &BENEFIT_HOLDER,
        }
    }

    /// Whether items of this kind get a dedicated team form
    #[must_use]
    pub const fn is_team(self) -> bool {
        matches!(self, Self::Team | Self::TeamEsports | Self::SquadEsports)
    }
}

const TEAM_ESPORTS_KEYWORDS: &[&str] = &["valorant", "cs2", "counter strike", "counter-strike"];
const SQUAD_ESPORTS_KEYWORDS: &[&str] = &["bgmi", "free fire", "pubg", "call of duty"];
const GROUP_PERFORMANCE_KEYWORDS: &[&str] = &["ramp walk", "dance", "band"];

/// Resolve the form kind for an item from its title.
///
/// First match wins: team esports, squad esports, group performance, solo.
#[must_use]
pub fn fields_for_item(item: &CatalogItem) -> FieldSetKind {
    let title = item.title.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| title.contains(k));

    if matches(TEAM_ESPORTS_KEYWORDS) {
        FieldSetKind::TeamEsports
    } else if matches(SQUAD_ESPORTS_KEYWORDS) {
        FieldSetKind::SquadEsports
    } else if matches(GROUP_PERFORMANCE_KEYWORDS) {
        FieldSetKind::Team
    } else {
        FieldSetKind::Solo
    }
}

fn solo_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::text("name", "Full Name"),
        FieldDefinition::new("email", "Email", FieldType::Email),
        FieldDefinition::new("contactNo", "Mobile Number", FieldType::Phone),
        FieldDefinition::new(
            "gender",
            "Gender",
            FieldType::Select {
                options: [("male", "Male"), ("female", "Female"), ("other", "Other")]
                    .into_iter()
                    .map(|(value, label)| SelectOption {
                        value: value.to_string(),
                        label: label.to_string(),
                    })
                    .collect(),
            },
        ),
        FieldDefinition::new("age", "Age", FieldType::Number),
        FieldDefinition::text("universityName", "University / College"),
        FieldDefinition::text("address", "Address"),
        FieldDefinition::text("referralCode", "Referral Code").optional(),
        FieldDefinition::new(
            "idCard",
            "College ID Card",
            FieldType::File {
                accept: "image/*,application/pdf".to_string(),
            },
        ),
    ]
}

fn with_extra(extra: Vec<FieldDefinition>) -> FieldSet {
    let mut fields = solo_fields();
    fields.extend(extra);
    FieldSet::new(fields)
}

static SOLO: LazyLock<FieldSet> = LazyLock::new(|| FieldSet::new(solo_fields()));

static TEAM: LazyLock<FieldSet> = LazyLock::new(|| {
    with_extra(vec![
        FieldDefinition::text("teamName", "Team Name"),
        FieldDefinition::new("numMembers", "Total Team Members", FieldType::Number),
    ])
});

static TEAM_ESPORTS: LazyLock<FieldSet> = LazyLock::new(|| {
    with_extra(vec![
        FieldDefinition::text("teamName", "Team Name"),
        FieldDefinition::text("leaderGameId", "Team Leader Game ID"),
    ])
});

static SQUAD_ESPORTS: LazyLock<FieldSet> = LazyLock::new(|| {
    with_extra(vec![
        FieldDefinition::text("squadName", "Squad Name"),
        FieldDefinition::text("inGameName", "In-Game Name"),
        FieldDefinition::text("gameUid", "Game UID"),
    ])
});

static VISITOR_PASS: LazyLock<FieldSet> = LazyLock::new(|| {
    FieldSet::new(vec![
        FieldDefinition::text("name", "Full Name"),
        FieldDefinition::new("email", "Email", FieldType::Email),
        FieldDefinition::new("contactNo", "Mobile Number", FieldType::Phone),
        FieldDefinition::text("universityName", "University / College").optional(),
    ])
});

static BENEFIT_HOLDER: LazyLock<FieldSet> = LazyLock::new(|| {
    FieldSet::new(vec![
        FieldDefinition::text("name", "Full Name"),
        FieldDefinition::new("email", "Email", FieldType::Email),
        FieldDefinition::new("contactNo", "Mobile Number", FieldType::Phone),
    ])
});
