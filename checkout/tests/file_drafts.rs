//! `FileDraftStore` on a real filesystem.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use festival_checkout::catalog::Catalog;
use festival_checkout::draft::{DRAFT_VERSION, Draft, DraftStore, FileDraftStore};
use festival_checkout::error::DraftError;
use festival_checkout::forms::FormsState;
use festival_checkout::promo::{PromoApplication, PromoState};
use festival_checkout::selection::{NoConflicts, SelectionState};
use festival_checkout::types::{FileRef, ItemId, Money};
use festival_testing::mocks::test_instant;
use tempfile::TempDir;

fn sample_draft() -> Draft {
    let catalog = Catalog::festival();
    let mut selection = SelectionState::default();
    selection.toggle_item(ItemId(1), &catalog, &NoConflicts);
    selection.set_visitor_pass_days(2);

    let mut forms = FormsState::default();
    forms.visitor_pass.insert("name".into(), "Ravi Kumar".into());

    let mut promo = PromoState::default();
    promo.restore(
        "FEST20".into(),
        Some(PromoApplication {
            code: "FEST20".into(),
            discount: Money::from_rupees(20),
        }),
    );

    Draft::capture(&selection, &forms, &promo, test_instant())
}

#[tokio::test]
async fn missing_file_means_no_draft() {
    let dir = TempDir::new().unwrap();
    let store = FileDraftStore::new(dir.path().join("draft.json"));

    assert!(store.load().await.unwrap().is_none());
    store.clear().await.unwrap();
}

#[tokio::test]
async fn saved_draft_loads_back() {
    let dir = TempDir::new().unwrap();
    let store = FileDraftStore::new(dir.path().join("draft.json"));
    let draft = sample_draft();

    store.save(draft.clone()).await.unwrap();

    assert_eq!(store.load().await.unwrap(), Some(draft));
    assert!(!dir.path().join("draft.json.tmp").exists());
}

#[tokio::test]
async fn later_saves_replace_earlier_ones() {
    let dir = TempDir::new().unwrap();
    let store = FileDraftStore::new(dir.path().join("draft.json"));
    let first = sample_draft();
    let mut second = sample_draft();
    second.selection.set_visitor_pass_days(3);

    store.save(first).await.unwrap();
    store.save(second.clone()).await.unwrap();

    assert_eq!(store.load().await.unwrap(), Some(second));
}

#[tokio::test]
async fn attached_files_are_not_written() {
    let dir = TempDir::new().unwrap();
    let store = FileDraftStore::new(dir.path().join("draft.json"));

    let mut forms = FormsState::default();
    let catalog = Catalog::festival();
    let mut selection = SelectionState::default();
    selection.toggle_item(ItemId(5), &catalog, &NoConflicts);
    let group = festival_checkout::grouping::build_groups(&selection, &catalog)
        .remove(0)
        .signature;
    forms.attach_group_file(
        group.clone(),
        "idCard".into(),
        FileRef::new("secret-id.png", "image/png", vec![1, 2, 3]),
    );
    let draft = Draft::capture(&selection, &forms, &PromoState::default(), test_instant());

    store.save(draft).await.unwrap();

    let text = std::fs::read_to_string(store.path()).unwrap();
    let saved: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(saved["forms"].get("groupFiles").is_none());
    assert!(saved["forms"].get("memberFiles").is_none());
    assert!(!text.contains("image/png"));

    // the file name stays behind as the field's text
    let loaded = store.load().await.unwrap().unwrap();
    assert!(!loaded.forms.has_files());
    assert_eq!(
        loaded
            .forms
            .group_form(&group)
            .and_then(|f| f.get("idCard"))
            .map(String::as_str),
        Some("secret-id.png")
    );
}

#[tokio::test]
async fn corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("draft.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let error = FileDraftStore::new(&path).load().await.unwrap_err();

    assert!(matches!(error, DraftError::Corrupt(_)));
}

#[tokio::test]
async fn other_format_versions_are_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("draft.json");
    let mut draft = sample_draft();
    draft.version = DRAFT_VERSION + 1;
    std::fs::write(&path, serde_json::to_vec(&draft).unwrap()).unwrap();

    assert!(FileDraftStore::new(&path).load().await.unwrap().is_none());
}

#[tokio::test]
async fn clear_removes_the_file() {
    let dir = TempDir::new().unwrap();
    let store = FileDraftStore::new(dir.path().join("draft.json"));
    store.save(sample_draft()).await.unwrap();

    store.clear().await.unwrap();

    assert!(!store.path().exists());
    assert!(store.load().await.unwrap().is_none());
}
