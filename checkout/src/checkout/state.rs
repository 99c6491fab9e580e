//! Checkout state.

use crate::backend::PaymentSession;
use crate::catalog::Catalog;
use crate::forms::FormsState;
use crate::grouping::{FormGroup, build_groups};
use crate::pricing::{Totals, compute_totals, subtotal};
use crate::promo::PromoState;
use crate::selection::SelectionState;
use crate::validation::ValidationReport;
use crate::verification::VerificationState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checkout steps, in order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    /// Choose events, visitor-pass days and flagship add-ons
    #[default]
    Select,
    /// Fill in participant details
    Forms,
    /// Confirm the order
    Review,
    /// Pay
    Payment,
}

impl Step {
    /// The step after this one
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Select => Some(Self::Forms),
            Self::Forms => Some(Self::Review),
            Self::Review => Some(Self::Payment),
            Self::Payment => None,
        }
    }

    /// The step before this one
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Select => None,
            Self::Forms => Some(Self::Select),
            Self::Review => Some(Self::Forms),
            Self::Payment => Some(Self::Review),
        }
    }
}

/// Which call of the payment critical path is running
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStage {
    /// Creating the user record
    Registering,
    /// Creating the order and payment session
    CreatingOrder,
}

/// Payment session status
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PaymentPhase {
    /// Nothing requested
    #[default]
    Idle,
    /// Waiting for the backend
    Loading(PaymentStage),
    /// Session obtained; the provider checkout can open
    Ready(PaymentSession),
    /// Initialisation failed after retries
    Failed {
        /// What went wrong
        error: String,
        /// Automatic retries made before giving up
        retry_count: u32,
        /// Alternate payment form, always offered on failure
        fallback_url: String,
    },
}

/// Payment step bookkeeping
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaymentState {
    /// Bumped on every initialisation and whenever the session is
    /// invalidated; responses for older attempts are ignored
    pub attempt: u64,
    /// Current phase
    pub phase: PaymentPhase,
    /// Registered user, reused across attempts
    pub user_id: Option<String>,
    /// Manual retries requested by the visitor
    pub retries: u32,
}

impl PaymentState {
    /// The session, when ready
    #[must_use]
    pub const fn session(&self) -> Option<&PaymentSession> {
        match &self.phase {
            PaymentPhase::Ready(session) => Some(session),
            _ => None,
        }
    }
}

/// Background document upload status
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum UploadStatus {
    /// Not started
    #[default]
    Idle,
    /// Compressing and sending
    Uploading,
    /// All files delivered
    Uploaded {
        /// Parts sent
        files: usize,
    },
    /// Gave up after retries; can be retried
    Failed {
        /// What went wrong
        error: String,
    },
}

/// Draft persistence bookkeeping
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DraftStatus {
    /// The stored draft has been read (or found missing)
    pub hydrated: bool,
    /// Last successful save
    pub last_saved: Option<DateTime<Utc>>,
    /// Last load or save failure
    pub last_error: Option<String>,
}

/// The whole checkout as one value
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutState {
    /// Current step
    pub step: Step,
    /// Incremented on every step change; the view scrolls to the top when
    /// it changes
    pub scroll_epoch: u64,
    /// Chosen items
    pub selection: SelectionState,
    /// Entered details
    pub forms: FormsState,
    /// Promo code
    pub promo: PromoState,
    /// Errors from the last refused forms submission, kept up to date while
    /// the visitor fixes them
    pub last_errors: Option<ValidationReport>,
    /// One-off message for the visitor
    pub notice: Option<String>,
    /// Continue was pressed on review while the promo still had to be
    /// confirmed for the current subtotal; payment starts once it is
    pub awaiting_promo: bool,
    /// Payment step
    pub payment: PaymentState,
    /// Document upload
    pub upload: UploadStatus,
    /// Post-redirect verification
    pub verification: VerificationState,
    /// Local draft
    pub draft: DraftStatus,
}

impl CheckoutState {
    /// Form groups for the current selection
    #[must_use]
    pub fn groups(&self, catalog: &Catalog) -> Vec<FormGroup> {
        build_groups(&self.selection, catalog)
    }

    /// Totals with the applied promo, if it still fits the subtotal
    #[must_use]
    pub fn totals(&self, catalog: &Catalog) -> Totals {
        let amount = subtotal(&self.selection, catalog);
        compute_totals(&self.selection, catalog, self.promo.effective(amount))
    }

    /// Nothing chosen or typed yet
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.selection.is_empty()
            && self.forms.group_forms.is_empty()
            && self.forms.visitor_pass.is_empty()
            && self.promo.input.is_empty()
    }

    /// Change step and reset the scroll position
    pub(crate) fn go_to(&mut self, step: Step) {
        tracing::debug!(from = ?self.step, to = ?step, "Step change");
        self.step = step;
        self.scroll_epoch += 1;
    }
}
