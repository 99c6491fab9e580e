//! Validation of everything the forms step collects.
//!
//! [`validate`] is pure: it reads the selection, groups and form data and
//! returns a [`ValidationReport`]. It never mutates its inputs and is cheap
//! enough to call on every change.
//!
//! Scopes are checked independently: the visitor-pass form, each flagship
//! benefit record, each group's main form (plus the team-size rule) and each
//! team member record.

use crate::fields::{FieldDefinition, FieldSet, FieldSetKind, FieldType};
use crate::forms::{FileMap, FormsState};
use crate::grouping::FormGroup;
use crate::selection::{BenefitKind, SelectionState};
use crate::team::{NUM_MEMBERS_FIELD, RequirementSource, TeamSizeTable, adjusted_minimum};
use crate::types::{GroupSignature, ItemId, Record, field_value};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Error key of the team-size rule within a group scope
pub const TEAM_SIZE_KEY: &str = "teamMembers";

/// Message for a malformed mobile number
pub const PHONE_MESSAGE: &str = "Mobile number must be exactly 10 digits.";

/// Message for a malformed email address
pub const EMAIL_MESSAGE: &str = "Enter a valid email address.";

#[allow(clippy::expect_used)]
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Where an error belongs
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeKey {
    /// The visitor-pass holder form
    VisitorPass,
    /// One flagship benefit record
    Benefit {
        /// Flagship item
        item: ItemId,
        /// Benefit kind
        kind: BenefitKind,
        /// Record index within the kind
        index: usize,
    },
    /// A group's main form
    Group(GroupSignature),
    /// One additional member of a team group
    Member {
        /// Team group
        group: GroupSignature,
        /// Member index
        index: usize,
    },
}

/// Field errors per scope
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: BTreeMap<ScopeKey, BTreeMap<String, String>>,
}

impl ValidationReport {
    /// True iff there are no errors anywhere
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    /// Number of field errors across all scopes
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.values().map(BTreeMap::len).sum()
    }

    /// Errors of one scope
    #[must_use]
    pub fn scope(&self, scope: &ScopeKey) -> Option<&BTreeMap<String, String>> {
        self.errors.get(scope)
    }

    /// Error message of one field
    #[must_use]
    pub fn get(&self, scope: &ScopeKey, field: &str) -> Option<&str> {
        self.scope(scope)?.get(field).map(String::as_str)
    }

    /// All errors, scope by scope
    pub fn iter(&self) -> impl Iterator<Item = (&ScopeKey, &BTreeMap<String, String>)> {
        self.errors.iter()
    }

    fn insert(&mut self, scope: &ScopeKey, field: &str, message: String) {
        self.errors
            .entry(scope.clone())
            .or_default()
            .insert(field.to_string(), message);
    }
}

/// Everything validation reads
#[derive(Clone, Copy, Debug)]
pub struct ValidationInput<'a> {
    /// Current selection
    pub selection: &'a SelectionState,
    /// Groups built from the selection
    pub groups: &'a [FormGroup],
    /// Entered data
    pub forms: &'a FormsState,
    /// Team size table
    pub team_table: &'a TeamSizeTable,
}

/// Validate every scope.
#[must_use]
pub fn validate(input: &ValidationInput<'_>) -> ValidationReport {
    let mut report = ValidationReport::default();

    if input.selection.visitor_pass_days() > 0 {
        check_record(
            &mut report,
            &ScopeKey::VisitorPass,
            FieldSetKind::VisitorPass.fields(),
            &input.forms.visitor_pass,
            |_, _| false,
        );
    }

    for (item, benefits) in input.selection.flagship_benefits() {
        for kind in BenefitKind::ALL {
            for (index, record) in benefits.line(kind).details().iter().enumerate() {
                check_record(
                    &mut report,
                    &ScopeKey::Benefit {
                        item: *item,
                        kind,
                        index,
                    },
                    FieldSetKind::BenefitHolder.fields(),
                    record,
                    |_, _| false,
                );
            }
        }
    }

    for group in input.groups {
        validate_group(&mut report, input, group);
    }

    report
}

fn validate_group(report: &mut ValidationReport, input: &ValidationInput<'_>, group: &FormGroup) {
    let scope = ScopeKey::Group(group.signature.clone());
    let empty = Record::new();
    let form = input.forms.group_form(&group.signature).unwrap_or(&empty);
    let files = input.forms.group_file_map(&group.signature);

    // A group file counts as present when attached or when the form still
    // carries its file name from an earlier session.
    check_record(report, &scope, group.fields, form, |def, value| {
        has_file(files, &def.name) || value.is_some()
    });

    let Some(requirement) =
        group.member_requirement(input.forms, input.selection, input.team_table)
    else {
        return;
    };

    if let (RequirementSource::DeclaredTotal { total }, Some(item)) =
        (requirement.source, group.team_item())
    {
        if let Some(config) = input.team_table.get(&item.title) {
            let min = adjusted_minimum(config, input.selection.benefit_qty(item.id));
            if total < min || total > config.max {
                report.insert(
                    &scope,
                    NUM_MEMBERS_FIELD,
                    format!("Team size must be between {min} and {}.", config.max),
                );
            }
        }
    }

    let members = input.forms.members(&group.signature);
    let required = requirement.additional as usize;
    let target = requirement.target_total();
    if members.len() < required {
        report.insert(
            &scope,
            TEAM_SIZE_KEY,
            format!(
                "Add {} more team member(s) (team of {target} required).",
                required - members.len()
            ),
        );
    } else if members.len() > required {
        report.insert(
            &scope,
            TEAM_SIZE_KEY,
            format!(
                "Remove {} team member(s) (team of {target} required).",
                members.len() - required
            ),
        );
    }

    // Members need an actual uploaded file; a leftover file name is not enough.
    for (index, member) in members.iter().enumerate() {
        let member_files = input.forms.member_file_map(&group.signature, index);
        check_record(
            report,
            &ScopeKey::Member {
                group: group.signature.clone(),
                index,
            },
            FieldSetKind::Solo.fields(),
            member,
            |def, _| has_file(member_files, &def.name),
        );
    }
}

fn has_file(files: Option<&FileMap>, field: &str) -> bool {
    files.is_some_and(|f| f.contains_key(field))
}

fn check_record<F>(
    report: &mut ValidationReport,
    scope: &ScopeKey,
    fields: &FieldSet,
    record: &Record,
    file_present: F,
) where
    F: Fn(&FieldDefinition, Option<&str>) -> bool,
{
    for def in fields {
        let value = field_value(record, &def.name);
        let error = if def.is_file() {
            (def.required && !file_present(def, value)).then(|| format!("Please upload {}.", def.label))
        } else {
            check_value(def, value)
        };
        if let Some(message) = error {
            report.insert(scope, &def.name, message);
        }
    }
}

fn check_value(def: &FieldDefinition, value: Option<&str>) -> Option<String> {
    let Some(value) = value else {
        return def.required.then(|| format!("{} is required.", def.label));
    };

    match &def.field_type {
        _ if is_phone_field(def) => (!is_valid_phone(value)).then(|| PHONE_MESSAGE.to_string()),
        _ if is_email_field(def) => (!is_valid_email(value)).then(|| EMAIL_MESSAGE.to_string()),
        FieldType::Number => value
            .parse::<u32>()
            .is_err()
            .then(|| format!("{} must be a whole number.", def.label)),
        FieldType::Select { options } => (!options.iter().any(|o| o.value == value))
            .then(|| format!("Choose a valid {}.", def.label.to_lowercase())),
        _ => None,
    }
}

fn is_phone_field(def: &FieldDefinition) -> bool {
    def.field_type == FieldType::Phone || def.name == "contactNo"
}

fn is_email_field(def: &FieldDefinition) -> bool {
    def.field_type == FieldType::Email || def.name == "email" || def.name == "collegeMailId"
}

/// Exactly ten ASCII digits once whitespace is removed
#[must_use]
pub fn is_valid_phone(value: &str) -> bool {
    let digits: Vec<char> = value.chars().filter(|c| !c.is_whitespace()).collect();
    digits.len() == 10 && digits.iter().all(char::is_ascii_digit)
}

/// `local@domain.tld` shape
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value.trim())
}
