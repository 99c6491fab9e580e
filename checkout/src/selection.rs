//! Selection state: chosen items, visitor-pass days and flagship benefits.
//!
//! All mutators keep the invariants intact after every call:
//! - `visitor_pass_days` is within `0..=3`
//! - every benefit line holds exactly `qty` detail records
//! - benefits only exist for selected flagship items

use crate::catalog::{Catalog, CatalogItem};
use crate::types::{ItemId, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Most visitor-pass days that can be bought
pub const MAX_VISITOR_PASS_DAYS: u8 = 3;

/// Flagship add-on kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BenefitKind {
    /// Support artist accompanying the performers
    SupportArtist,
    /// Bonus visitor pass for the team
    VisitorPass,
    /// Bonus visitor pass for a solo performer
    SoloVisitorPass,
}

impl BenefitKind {
    /// All kinds, in display order
    pub const ALL: [Self; 3] = [Self::SupportArtist, Self::VisitorPass, Self::SoloVisitorPass];
}

/// A quantity and one detail record per unit
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BenefitLineRepr")]
pub struct BenefitLine {
    qty: u32,
    details: Vec<Record>,
}

#[derive(Deserialize)]
struct BenefitLineRepr {
    qty: u32,
    #[serde(default)]
    details: Vec<Record>,
}

impl From<BenefitLineRepr> for BenefitLine {
    fn from(repr: BenefitLineRepr) -> Self {
        let mut line = Self {
            qty: 0,
            details: repr.details,
        };
        line.resize(repr.qty);
        line
    }
}

impl BenefitLine {
    /// Quantity
    #[must_use]
    pub const fn qty(&self) -> u32 {
        self.qty
    }

    /// Detail records, one per unit
    #[must_use]
    pub fn details(&self) -> &[Record] {
        &self.details
    }

    /// Change the quantity, appending blank records or truncating.
    /// Records below the new quantity are kept as they were.
    pub fn resize(&mut self, qty: u32) {
        self.qty = qty;
        self.details.resize_with(qty as usize, Record::new);
    }

    fn detail_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.details.get_mut(index)
    }
}

/// Add-ons attached to one flagship item
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagshipBenefits {
    /// Support artists
    pub support_artist: BenefitLine,
    /// Bonus visitor passes
    pub visitor_pass: BenefitLine,
    /// Bonus solo visitor passes
    pub solo_visitor_pass: BenefitLine,
}

impl FlagshipBenefits {
    /// The line for a kind
    #[must_use]
    pub const fn line(&self, kind: BenefitKind) -> &BenefitLine {
        match kind {
            BenefitKind::SupportArtist => &self.support_artist,
            BenefitKind::VisitorPass => &self.visitor_pass,
            BenefitKind::SoloVisitorPass => &self.solo_visitor_pass,
        }
    }

    fn line_mut(&mut self, kind: BenefitKind) -> &mut BenefitLine {
        match kind {
            BenefitKind::SupportArtist => &mut self.support_artist,
            BenefitKind::VisitorPass => &mut self.visitor_pass,
            BenefitKind::SoloVisitorPass => &mut self.solo_visitor_pass,
        }
    }

    /// Sum of all quantities
    #[must_use]
    pub fn total_qty(&self) -> u32 {
        BenefitKind::ALL
            .iter()
            .map(|kind| self.line(*kind).qty())
            .fold(0, u32::saturating_add)
    }
}

/// Reserved hook deciding whether an item may join the current selection.
pub trait ConflictCheck: Send + Sync {
    /// Return `Err(reason)` to refuse `candidate`
    ///
    /// # Errors
    ///
    /// Returns a user-facing reason when the candidate conflicts.
    fn check(&self, candidate: &CatalogItem, selected: &[&CatalogItem]) -> Result<(), String>;
}

/// Accepts every item
#[derive(Clone, Copy, Debug, Default)]
pub struct NoConflicts;

impl ConflictCheck for NoConflicts {
    fn check(&self, _candidate: &CatalogItem, _selected: &[&CatalogItem]) -> Result<(), String> {
        Ok(())
    }
}

/// Refuses an item whose schedule overlaps an already selected one.
///
/// Not installed by default; whether overlapping events should block
/// co-selection is a product decision.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeOverlap;

impl ConflictCheck for TimeOverlap {
    fn check(&self, candidate: &CatalogItem, selected: &[&CatalogItem]) -> Result<(), String> {
        let Some((start, end)) = candidate.schedule() else {
            return Ok(());
        };
        for other in selected {
            if let Some((other_start, other_end)) = other.schedule() {
                if start < other_end && other_start < end {
                    return Err(format!(
                        "{} overlaps with {} ({} {}-{})",
                        candidate.title, other.title, other.date, other.time, other.end_time
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Result of toggling an item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The item was added
    Added,
    /// The item was removed (with any flagship benefits it had)
    Removed,
    /// The conflict check refused the item; nothing changed
    Rejected {
        /// Why
        reason: String,
    },
    /// No such item in the catalog; nothing changed
    UnknownItem,
}

/// What the visitor has chosen
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    selected_item_ids: BTreeSet<ItemId>,
    visitor_pass_days: u8,
    flagship_benefits: BTreeMap<ItemId, FlagshipBenefits>,
}

impl SelectionState {
    /// Selected ids, ascending
    #[must_use]
    pub const fn selected_item_ids(&self) -> &BTreeSet<ItemId> {
        &self.selected_item_ids
    }

    /// Whether an item is selected
    #[must_use]
    pub fn is_selected(&self, id: ItemId) -> bool {
        self.selected_item_ids.contains(&id)
    }

    /// Visitor-pass days, `0..=3`
    #[must_use]
    pub const fn visitor_pass_days(&self) -> u8 {
        self.visitor_pass_days
    }

    /// Benefits per flagship item
    #[must_use]
    pub const fn flagship_benefits(&self) -> &BTreeMap<ItemId, FlagshipBenefits> {
        &self.flagship_benefits
    }

    /// Benefits of one item
    #[must_use]
    pub fn benefits_for(&self, id: ItemId) -> Option<&FlagshipBenefits> {
        self.flagship_benefits.get(&id)
    }

    /// Sum of benefit quantities of one item
    #[must_use]
    pub fn benefit_qty(&self, id: ItemId) -> u32 {
        self.benefits_for(id).map_or(0, FlagshipBenefits::total_qty)
    }

    /// Nothing chosen at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected_item_ids.is_empty() && self.visitor_pass_days == 0
    }

    /// Selected items that exist in the catalog, ascending by id
    pub fn selected_items<'a>(
        &'a self,
        catalog: &'a Catalog,
    ) -> impl Iterator<Item = &'a CatalogItem> + 'a {
        self.selected_item_ids
            .iter()
            .filter_map(|id| catalog.get(*id))
    }

    /// Add the item if absent, remove it if present.
    ///
    /// Adding consults `conflicts` first. Removing a flagship item drops its
    /// benefits.
    pub fn toggle_item(
        &mut self,
        id: ItemId,
        catalog: &Catalog,
        conflicts: &dyn ConflictCheck,
    ) -> ToggleOutcome {
        let Some(item) = catalog.get(id) else {
            return ToggleOutcome::UnknownItem;
        };

        if self.selected_item_ids.remove(&id) {
            self.flagship_benefits.remove(&id);
            return ToggleOutcome::Removed;
        }

        let selected: Vec<&CatalogItem> = self.selected_items(catalog).collect();
        if let Err(reason) = conflicts.check(item, &selected) {
            return ToggleOutcome::Rejected { reason };
        }

        self.selected_item_ids.insert(id);
        if item.is_flagship() {
            self.flagship_benefits.entry(id).or_default();
        }
        ToggleOutcome::Added
    }

    /// Set visitor-pass days, clamped to `0..=3`
    pub fn set_visitor_pass_days(&mut self, days: i32) {
        let clamped = days.clamp(0, i32::from(MAX_VISITOR_PASS_DAYS));
        self.visitor_pass_days = u8::try_from(clamped).unwrap_or(0);
    }

    /// Set a benefit quantity (negative clamps to zero) and resize its
    /// detail list.
    ///
    /// Returns `false` and changes nothing when the item is not a selected
    /// flagship item.
    pub fn set_flagship_qty(&mut self, id: ItemId, kind: BenefitKind, qty: i32) -> bool {
        let Some(benefits) = self.flagship_benefits.get_mut(&id) else {
            return false;
        };
        let qty = u32::try_from(qty.max(0)).unwrap_or(0);
        benefits.line_mut(kind).resize(qty);
        true
    }

    /// Set one field of one benefit detail record.
    ///
    /// Returns `false` when the record does not exist.
    pub fn set_benefit_field(
        &mut self,
        id: ItemId,
        kind: BenefitKind,
        index: usize,
        field: &str,
        value: String,
    ) -> bool {
        let Some(record) = self
            .flagship_benefits
            .get_mut(&id)
            .and_then(|b| b.line_mut(kind).detail_mut(index))
        else {
            return false;
        };
        record.insert(field.to_string(), value);
        true
    }

    /// Re-establish invariants on a selection loaded from a draft: drop ids
    /// the catalog no longer has, and benefits of anything that is not a
    /// selected flagship item.
    #[must_use]
    pub fn restored(mut self, catalog: &Catalog) -> Self {
        self.selected_item_ids.retain(|id| catalog.contains(*id));
        self.visitor_pass_days = self.visitor_pass_days.min(MAX_VISITOR_PASS_DAYS);
        let selected = &self.selected_item_ids;
        self.flagship_benefits.retain(|id, _| {
            selected.contains(id) && catalog.get(*id).is_some_and(CatalogItem::is_flagship)
        });
        for id in selected {
            if catalog.get(*id).is_some_and(CatalogItem::is_flagship) {
                self.flagship_benefits.entry(*id).or_default();
            }
        }
        self
    }
}
