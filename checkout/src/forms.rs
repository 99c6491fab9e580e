//! Entered form data, keyed by group signature.
//!
//! Text values are part of the local draft. Attached files are not: they
//! live only in memory until uploaded.

use crate::types::{FileRef, GroupSignature, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Files attached to one form, by field name
pub type FileMap = BTreeMap<String, FileRef>;

/// Everything the visitor typed or attached
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormsState {
    /// Main form of each group (the leader, for team groups)
    pub group_forms: BTreeMap<GroupSignature, Record>,
    /// Additional member records of each team group
    pub team_members: BTreeMap<GroupSignature, Vec<Record>>,
    /// Visitor-pass holder details
    pub visitor_pass: Record,
    /// Files attached to group forms
    #[serde(skip)]
    pub group_files: BTreeMap<GroupSignature, FileMap>,
    /// Files attached to member records, by member index
    #[serde(skip)]
    pub member_files: BTreeMap<GroupSignature, BTreeMap<usize, FileMap>>,
}

impl FormsState {
    /// Main form of a group, if anything was entered
    #[must_use]
    pub fn group_form(&self, group: &GroupSignature) -> Option<&Record> {
        self.group_forms.get(group)
    }

    /// Member records of a team group
    #[must_use]
    pub fn members(&self, group: &GroupSignature) -> &[Record] {
        self.team_members.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Set a field of a group's main form
    pub fn set_group_field(&mut self, group: GroupSignature, field: String, value: String) {
        self.group_forms.entry(group).or_default().insert(field, value);
    }

    /// Attach a file to a group form; the file name doubles as the field's
    /// text value
    pub fn attach_group_file(&mut self, group: GroupSignature, field: String, file: FileRef) {
        self.group_forms
            .entry(group.clone())
            .or_default()
            .insert(field.clone(), file.name.clone());
        self.group_files.entry(group).or_default().insert(field, file);
    }

    /// Append blank member records until the group has `count`
    pub fn ensure_members(&mut self, group: GroupSignature, count: usize) {
        let members = self.team_members.entry(group).or_default();
        if members.len() < count {
            members.resize_with(count, Record::new);
        }
    }

    /// Append one blank member record
    pub fn add_member(&mut self, group: GroupSignature) {
        self.team_members.entry(group).or_default().push(Record::new());
    }

    /// Remove a member record; later members (and their files) shift down.
    ///
    /// Returns `false` if there is no such member.
    pub fn remove_member(&mut self, group: &GroupSignature, index: usize) -> bool {
        let Some(members) = self.team_members.get_mut(group) else {
            return false;
        };
        if index >= members.len() {
            return false;
        }
        members.remove(index);

        if let Some(files) = self.member_files.get_mut(group) {
            *files = std::mem::take(files)
                .into_iter()
                .filter(|(i, _)| *i != index)
                .map(|(i, f)| if i > index { (i - 1, f) } else { (i, f) })
                .collect();
        }
        true
    }

    /// Set a field of a member record.
    ///
    /// Returns `false` if there is no such member.
    pub fn set_member_field(
        &mut self,
        group: &GroupSignature,
        index: usize,
        field: String,
        value: String,
    ) -> bool {
        match self.team_members.get_mut(group).and_then(|m| m.get_mut(index)) {
            Some(record) => {
                record.insert(field, value);
                true
            },
            None => false,
        }
    }

    /// Attach a file to a member record.
    ///
    /// Returns `false` if there is no such member.
    pub fn attach_member_file(
        &mut self,
        group: &GroupSignature,
        index: usize,
        field: String,
        file: FileRef,
    ) -> bool {
        if !self.set_member_field(group, index, field.clone(), file.name.clone()) {
            return false;
        }
        self.member_files
            .entry(group.clone())
            .or_default()
            .entry(index)
            .or_default()
            .insert(field, file);
        true
    }

    /// Files attached to a group's main form
    #[must_use]
    pub fn group_file_map(&self, group: &GroupSignature) -> Option<&FileMap> {
        self.group_files.get(group)
    }

    /// Files attached to one member
    #[must_use]
    pub fn member_file_map(&self, group: &GroupSignature, index: usize) -> Option<&FileMap> {
        self.member_files.get(group).and_then(|m| m.get(&index))
    }

    /// Whether any file is attached anywhere
    #[must_use]
    pub fn has_files(&self) -> bool {
        self.group_files.values().any(|f| !f.is_empty())
            || self
                .member_files
                .values()
                .flat_map(BTreeMap::values)
                .any(|f| !f.is_empty())
    }
}
