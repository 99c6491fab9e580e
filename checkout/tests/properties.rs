//! Property tests for selection, grouping, team sizing and pricing.

#![allow(clippy::unwrap_used)] // Test code can use unwrap

use festival_checkout::catalog::{Catalog, parse_price};
use festival_checkout::grouping::build_groups;
use festival_checkout::pricing::compute_totals;
use festival_checkout::promo::PromoApplication;
use festival_checkout::selection::{BenefitKind, NoConflicts, SelectionState};
use festival_checkout::team::{MIN_ADJUSTED_TEAM, TeamSizeConfig, adjusted_minimum};
use festival_checkout::types::{ItemId, Money};
use proptest::prelude::*;

fn benefit_kind() -> impl Strategy<Value = BenefitKind> {
    prop_oneof![
        Just(BenefitKind::SupportArtist),
        Just(BenefitKind::VisitorPass),
        Just(BenefitKind::SoloVisitorPass),
    ]
}

fn select(ids: &[u32]) -> SelectionState {
    let catalog = Catalog::festival();
    let mut selection = SelectionState::default();
    for id in ids {
        if !selection.is_selected(ItemId(*id)) {
            selection.toggle_item(ItemId(*id), &catalog, &NoConflicts);
        }
    }
    selection
}

proptest! {
    #[test]
    fn detail_lists_track_quantity(
        steps in prop::collection::vec((benefit_kind(), -3i32..8), 1..25)
    ) {
        let catalog = Catalog::festival();
        let mut selection = SelectionState::default();
        selection.toggle_item(ItemId(2), &catalog, &NoConflicts);

        for (n, (kind, qty)) in steps.into_iter().enumerate() {
            let before = selection.benefits_for(ItemId(2)).unwrap().line(kind).clone();
            // mark existing records so preservation is observable
            for index in 0..before.details().len() {
                let marker = format!("p{n}-{index}");
                let marked = selection.set_benefit_field(ItemId(2), kind, index, "name", marker);
                prop_assert!(marked);
            }
            let marked = selection.benefits_for(ItemId(2)).unwrap().line(kind).clone();

            prop_assert!(selection.set_flagship_qty(ItemId(2), kind, qty));

            let after = selection.benefits_for(ItemId(2)).unwrap().line(kind);
            let expected = u32::try_from(qty.max(0)).unwrap();
            prop_assert_eq!(after.qty(), expected);
            prop_assert_eq!(after.details().len(), expected as usize);
            let kept = marked.details().len().min(after.details().len());
            prop_assert_eq!(&after.details()[..kept], &marked.details()[..kept]);
        }
    }

    #[test]
    fn grouping_ignores_selection_order(ids in prop::collection::vec(1u32..=14, 0..10)) {
        let catalog = Catalog::festival();
        let mut reversed = ids.clone();
        reversed.reverse();

        let forward = build_groups(&select(&ids), &catalog);
        let again = build_groups(&select(&ids), &catalog);
        let backward = build_groups(&select(&reversed), &catalog);

        let signatures = |groups: &[festival_checkout::grouping::FormGroup]| {
            groups.iter().map(|g| g.signature.clone()).collect::<Vec<_>>()
        };
        prop_assert_eq!(signatures(&forward), signatures(&again));
        prop_assert_eq!(signatures(&forward), signatures(&backward));
        prop_assert!(forward.iter().filter(|g| !g.is_team()).count() <= 1);
    }

    #[test]
    fn adjusted_minimum_never_drops_below_two(min in 1u32..30, extra in 0u32..10, benefits in 0u32..40) {
        let config = TeamSizeConfig { min, max: min + extra };
        let adjusted = adjusted_minimum(config, benefits);

        prop_assert!(adjusted >= MIN_ADJUSTED_TEAM);
        prop_assert!(adjusted <= min.max(MIN_ADJUSTED_TEAM));
    }

    #[test]
    fn totals_never_go_negative(
        ids in prop::collection::vec(1u32..=14, 0..6),
        days in 0i32..=3,
        discount in 0u64..3000,
    ) {
        let catalog = Catalog::festival();
        let mut selection = select(&ids);
        selection.set_visitor_pass_days(days);
        let promo = PromoApplication { code: "ANY".into(), discount: Money::from_rupees(discount) };

        let totals = compute_totals(&selection, &catalog, Some(&promo));

        prop_assert!(totals.total <= totals.subtotal);
        prop_assert_eq!(totals.total, totals.subtotal.saturating_sub(totals.discount));
    }

    #[test]
    fn price_parsing_never_panics(text in "\\PC{0,24}") {
        let _ = parse_price(&text);
    }
}

#[test]
fn price_examples() {
    assert_eq!(parse_price("Free"), Money::ZERO);
    assert_eq!(parse_price("₹85-120"), Money::from_rupees(85));
    assert_eq!(parse_price("₹40/squad"), Money::from_rupees(40));
    assert_eq!(parse_price(""), Money::ZERO);
}
