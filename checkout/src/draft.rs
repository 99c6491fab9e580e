//! Local draft persistence.
//!
//! The draft is a single JSON document holding the selection, entered form
//! text and promo input. It is a best-effort snapshot: written after a quiet
//! period, read once when the checkout starts. Attached files are never
//! stored.

use crate::error::DraftError;
use crate::forms::FormsState;
use crate::promo::{PromoApplication, PromoState};
use crate::selection::SelectionState;
use chrono::{DateTime, Utc};
use festival_core::effect::EffectKey;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Debounce key for autosave
pub const DRAFT_AUTOSAVE: EffectKey = EffectKey("draft-autosave");

/// Default quiet period before the draft is written
pub const DRAFT_DEBOUNCE: Duration = Duration::from_millis(800);

/// Format version; drafts of another version are ignored on load
pub const DRAFT_VERSION: u32 = 1;

/// Promo part of a draft
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoDraft {
    /// Code as typed
    #[serde(default)]
    pub input: String,
    /// Applied promo; revalidated after restore
    #[serde(default)]
    pub applied: Option<PromoApplication>,
}

/// Persisted checkout snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    /// Format version
    pub version: u32,
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,
    /// Selection
    pub selection: SelectionState,
    /// Entered form text, team members and visitor-pass details
    pub forms: FormsState,
    /// Promo input
    #[serde(default)]
    pub promo: PromoDraft,
}

impl Draft {
    /// Snapshot the persistable parts of a checkout
    #[must_use]
    pub fn capture(
        selection: &SelectionState,
        forms: &FormsState,
        promo: &PromoState,
        saved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: DRAFT_VERSION,
            saved_at,
            selection: selection.clone(),
            forms: FormsState {
                group_forms: forms.group_forms.clone(),
                team_members: forms.team_members.clone(),
                visitor_pass: forms.visitor_pass.clone(),
                ..FormsState::default()
            },
            promo: PromoDraft {
                input: promo.input.clone(),
                applied: promo.applied.clone(),
            },
        }
    }
}

/// Where drafts live
pub trait DraftStore: Send + Sync + 'static {
    /// Read the draft, `None` if there is none (or it is from another
    /// format version).
    ///
    /// # Errors
    ///
    /// I/O failures and corrupt content.
    fn load(&self) -> impl Future<Output = Result<Option<Draft>, DraftError>> + Send;

    /// Replace the stored draft.
    ///
    /// # Errors
    ///
    /// I/O and serialization failures.
    fn save(&self, draft: Draft) -> impl Future<Output = Result<(), DraftError>> + Send;

    /// Delete the stored draft; deleting a missing draft succeeds.
    ///
    /// # Errors
    ///
    /// I/O failures.
    fn clear(&self) -> impl Future<Output = Result<(), DraftError>> + Send;
}

/// Draft kept as a JSON file.
///
/// Saves write a sibling temp file and rename it over the target, so a
/// crash mid-write leaves the previous draft intact.
#[derive(Clone, Debug)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    /// Store the draft at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Draft file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn accept_version(draft: Draft) -> Option<Draft> {
    if draft.version == DRAFT_VERSION {
        Some(draft)
    } else {
        tracing::warn!(version = draft.version, "Ignoring draft from another format version");
        None
    }
}

impl DraftStore for FileDraftStore {
    fn load(&self) -> impl Future<Output = Result<Option<Draft>, DraftError>> + Send {
        let path = self.path.clone();
        async move {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
                Err(error) => return Err(error.into()),
            };
            let draft: Draft = serde_json::from_slice(&bytes)?;
            tracing::debug!(path = %path.display(), saved_at = %draft.saved_at, "Loaded draft");
            Ok(accept_version(draft))
        }
    }

    fn save(&self, draft: Draft) -> impl Future<Output = Result<(), DraftError>> + Send {
        let path = self.path.clone();
        let temp = self.temp_path();
        async move {
            let bytes = serde_json::to_vec_pretty(&draft)?;
            tokio::fs::write(&temp, bytes).await?;
            tokio::fs::rename(&temp, &path).await?;
            tracing::debug!(path = %path.display(), "Saved draft");
            Ok(())
        }
    }

    fn clear(&self) -> impl Future<Output = Result<(), DraftError>> + Send {
        let path = self.path.clone();
        async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
                Err(error) => Err(error.into()),
            }
        }
    }
}

/// In-memory draft store, shared between clones
#[derive(Clone, Debug, Default)]
pub struct MemoryDraftStore {
    draft: Arc<Mutex<Option<Draft>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryDraftStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `draft`
    #[must_use]
    pub fn with_draft(draft: Draft) -> Self {
        let store = Self::default();
        *store.draft.lock().unwrap_or_else(PoisonError::into_inner) = Some(draft);
        store
    }

    /// Current draft
    #[must_use]
    pub fn current(&self) -> Option<Draft> {
        self.draft
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful saves
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DraftStore for MemoryDraftStore {
    fn load(&self) -> impl Future<Output = Result<Option<Draft>, DraftError>> + Send {
        let draft = self.current().and_then(accept_version);
        async move { Ok(draft) }
    }

    fn save(&self, draft: Draft) -> impl Future<Output = Result<(), DraftError>> + Send {
        *self.draft.lock().unwrap_or_else(PoisonError::into_inner) = Some(draft);
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        async { Ok(()) }
    }

    fn clear(&self) -> impl Future<Output = Result<(), DraftError>> + Send {
        *self.draft.lock().unwrap_or_else(PoisonError::into_inner) = None;
        async { Ok(()) }
    }
}
