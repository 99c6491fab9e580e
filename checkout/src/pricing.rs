//! Pricing: subtotal, promo discount and payable total.

use crate::catalog::Catalog;
use crate::forms::FormsState;
use crate::grouping::FormGroup;
use crate::promo::PromoApplication;
use crate::selection::{BenefitKind, SelectionState};
use crate::types::{Money, Record, field_value};
use crate::validation::is_valid_email;
use serde::{Deserialize, Serialize};

/// Price of one visitor-pass day
pub const VISITOR_PASS_PRICE: Money = Money::from_rupees(69);

/// Subtotal movement above which an applied promo is revalidated
pub const REVALIDATION_THRESHOLD: Money = Money::from_rupees(1);

/// Email used for promo validation before the visitor has entered one
pub const FALLBACK_EMAIL: &str = "guest@festival.invalid";

/// Order totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Items plus visitor-pass days
    pub subtotal: Money,
    /// Applied promo discount
    pub discount: Money,
    /// `max(0, subtotal - discount)`
    pub total: Money,
}

/// Sum of selected item base prices plus visitor-pass days
#[must_use]
pub fn subtotal(selection: &SelectionState, catalog: &Catalog) -> Money {
    let items: Money = selection
        .selected_items(catalog)
        .map(|item| item.base_price())
        .sum();
    items + VISITOR_PASS_PRICE.times(u64::from(selection.visitor_pass_days()))
}

/// Compute the totals for the current selection and applied promo
#[must_use]
pub fn compute_totals(
    selection: &SelectionState,
    catalog: &Catalog,
    promo: Option<&PromoApplication>,
) -> Totals {
    let subtotal = subtotal(selection, catalog);
    let discount = promo.map_or(Money::ZERO, |p| p.discount);
    Totals {
        subtotal,
        discount,
        total: subtotal.saturating_sub(discount),
    }
}

/// Whether the subtotal moved enough since the last validation that the
/// server has to confirm the promo again
#[must_use]
pub fn needs_promo_revalidation(previous: Money, current: Money) -> bool {
    previous.abs_diff(current) > REVALIDATION_THRESHOLD
}

/// Records that may identify the customer, most authoritative first: group
/// forms, the visitor-pass form, then flagship visitor, solo-visitor and
/// support-artist records.
#[must_use]
pub fn contact_records<'a>(
    groups: &[FormGroup],
    forms: &'a FormsState,
    selection: &'a SelectionState,
) -> Vec<&'a Record> {
    let mut records: Vec<&Record> = groups
        .iter()
        .filter_map(|group| forms.group_form(&group.signature))
        .collect();
    records.push(&forms.visitor_pass);

    for kind in [
        BenefitKind::VisitorPass,
        BenefitKind::SoloVisitorPass,
        BenefitKind::SupportArtist,
    ] {
        for benefits in selection.flagship_benefits().values() {
            records.extend(benefits.line(kind).details());
        }
    }
    records
}

/// The email to quote to the promo endpoint: the first well-formed email
/// among the contact records, or [`FALLBACK_EMAIL`].
#[must_use]
pub fn resolve_customer_email(
    groups: &[FormGroup],
    forms: &FormsState,
    selection: &SelectionState,
) -> String {
    contact_records(groups, forms, selection)
        .into_iter()
        .filter_map(|record| field_value(record, "email"))
        .find(|email| is_valid_email(email))
        .map_or_else(|| FALLBACK_EMAIL.to_string(), str::to_string)
}
