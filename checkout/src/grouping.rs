//! Form grouping: which selected items share a form.
//!
//! All solo items share one form. Every team item gets its own. Each group
//! carries a signature so data entered into it survives rebuilds.

use crate::catalog::{Catalog, CatalogItem};
use crate::fields::{FieldSet, FieldSetKind, fields_for_item};
use crate::forms::FormsState;
use crate::selection::SelectionState;
use crate::team::{
    MemberRequirement, RequirementSource, TeamSizeTable, adjusted_minimum, member_requirement,
};
use crate::types::GroupSignature;
use sha2::{Digest, Sha256};

/// Hex characters kept from the signature digest
const SIGNATURE_LEN: usize = 16;

/// A set of items filled in through one form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormGroup {
    /// Stable key for the group's data
    pub signature: GroupSignature,
    /// Form kind of the group
    pub kind: FieldSetKind,
    /// Fields of the group's main form
    pub fields: &'static FieldSet,
    /// Items covered, ascending by id
    pub items: Vec<CatalogItem>,
}

impl FormGroup {
    /// Whether this is a dedicated team group
    #[must_use]
    pub const fn is_team(&self) -> bool {
        self.kind.is_team()
    }

    /// The single item of a team group
    #[must_use]
    pub fn team_item(&self) -> Option<&CatalogItem> {
        match self.items.as_slice() {
            [item] if self.is_team() => Some(item),
            _ => None,
        }
    }

    /// Member requirement of a team group, `None` for the solo group
    #[must_use]
    pub fn member_requirement(
        &self,
        forms: &FormsState,
        selection: &SelectionState,
        table: &TeamSizeTable,
    ) -> Option<MemberRequirement> {
        let item = self.team_item()?;
        Some(member_requirement(
            item,
            self.fields,
            forms.group_form(&self.signature),
            selection.benefit_qty(item.id),
            table,
        ))
    }

    /// Member records to prepare for a team group, `None` for the solo
    /// group.
    ///
    /// An entered `numMembers` total counts only while it lies within the
    /// item's adjusted bounds; otherwise the adjusted minimum is used. The
    /// leader is not a member, so the result never exceeds `max - 1`.
    #[must_use]
    pub fn member_slots(
        &self,
        forms: &FormsState,
        selection: &SelectionState,
        table: &TeamSizeTable,
    ) -> Option<usize> {
        let item = self.team_item()?;
        let requirement = self.member_requirement(forms, selection, table)?;
        let config = table.config_for_item(item);
        let adjusted_min = adjusted_minimum(config, selection.benefit_qty(item.id));
        let total = match requirement.source {
            RequirementSource::DeclaredTotal { total }
                if (adjusted_min..=config.max).contains(&total) =>
            {
                total
            },
            _ => adjusted_min,
        };
        Some(total.min(config.max).saturating_sub(1) as usize)
    }
}

fn signature(seed: &str) -> GroupSignature {
    let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));
    GroupSignature::new(&digest[..SIGNATURE_LEN])
}

/// Group the selected items.
///
/// The solo group (if any) comes first; its signature is derived from the
/// sorted solo item ids and the solo field-set hash. Team groups follow in
/// ascending item id, each signed by its item id and field-set hash. Ids the
/// catalog does not know are skipped.
#[must_use]
pub fn build_groups(selection: &SelectionState, catalog: &Catalog) -> Vec<FormGroup> {
    let (solo, team): (Vec<_>, Vec<_>) = selection
        .selected_items(catalog)
        .map(|item| (fields_for_item(item), item))
        .partition(|(kind, _)| !kind.is_team());

    let mut groups = Vec::with_capacity(team.len() + 1);

    if !solo.is_empty() {
        let fields = FieldSetKind::Solo.fields();
        let ids = solo
            .iter()
            .map(|(_, item)| item.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        groups.push(FormGroup {
            signature: signature(&format!("solo:{ids}:{}", fields.structural_hash())),
            kind: FieldSetKind::Solo,
            fields,
            items: solo.into_iter().map(|(_, item)| item.clone()).collect(),
        });
    }

    for (kind, item) in team {
        let fields = kind.fields();
        groups.push(FormGroup {
            signature: signature(&format!("team:{}:{}", item.id, fields.structural_hash())),
            kind,
            fields,
            items: vec![item.clone()],
        });
    }

    groups
}

/// Give every team group at least as many member records as it requires.
///
/// Run on entry to the forms step. Only appends; records the visitor added
/// beyond the requirement are never removed here.
pub fn ensure_member_slots(
    groups: &[FormGroup],
    forms: &mut FormsState,
    selection: &SelectionState,
    table: &TeamSizeTable,
) {
    for group in groups {
        if let Some(slots) = group.member_slots(forms, selection, table) {
            forms.ensure_members(group.signature.clone(), slots);
        }
    }
}
