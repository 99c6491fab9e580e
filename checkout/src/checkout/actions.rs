//! Checkout actions.
//!
//! Visitor input and the results of backend calls fed back by effects share
//! one enum; the reducer is the only place either changes state.

use super::state::PaymentStage;
use crate::backend::{PaymentSession, PromoValidationResponse};
use crate::draft::Draft;
use crate::error::BackendError;
use crate::selection::BenefitKind;
use crate::types::{FileRef, GroupSignature, ItemId};
use crate::verification::VerificationOutcome;
use chrono::{DateTime, Utc};

/// Everything that can happen to a checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutAction {
    // ----- selection -----
    /// Select or deselect an item
    ToggleItem {
        /// Item
        item: ItemId,
    },
    /// Set visitor-pass days (clamped to `0..=3`)
    SetVisitorPassDays {
        /// Days
        days: i32,
    },
    /// Set a flagship benefit quantity
    SetFlagshipQty {
        /// Flagship item
        item: ItemId,
        /// Benefit kind
        kind: BenefitKind,
        /// Quantity (negative clamps to zero)
        qty: i32,
    },
    /// Edit a benefit detail record
    SetBenefitField {
        /// Flagship item
        item: ItemId,
        /// Benefit kind
        kind: BenefitKind,
        /// Record index
        index: usize,
        /// Field name
        field: String,
        /// Value
        value: String,
    },

    // ----- forms -----
    /// Edit a group's main form
    SetGroupField {
        /// Group
        group: GroupSignature,
        /// Field name
        field: String,
        /// Value
        value: String,
    },
    /// Attach a file to a group's main form
    AttachGroupFile {
        /// Group
        group: GroupSignature,
        /// File field
        field: String,
        /// File
        file: FileRef,
    },
    /// Append a blank team member
    AddTeamMember {
        /// Team group
        group: GroupSignature,
    },
    /// Remove a team member
    RemoveTeamMember {
        /// Team group
        group: GroupSignature,
        /// Member index
        index: usize,
    },
    /// Edit a team member
    SetMemberField {
        /// Team group
        group: GroupSignature,
        /// Member index
        index: usize,
        /// Field name
        field: String,
        /// Value
        value: String,
    },
    /// Attach a file to a team member
    AttachMemberFile {
        /// Team group
        group: GroupSignature,
        /// Member index
        index: usize,
        /// File field
        field: String,
        /// File
        file: FileRef,
    },
    /// Edit the visitor-pass holder form
    SetVisitorPassField {
        /// Field name
        field: String,
        /// Value
        value: String,
    },

    // ----- promo -----
    /// Edit the promo code input
    SetPromoInput {
        /// Code as typed
        code: String,
    },
    /// Validate the typed code
    ApplyPromo,
    /// Drop the promo code
    RemovePromo,
    /// Debounced: confirm the applied promo for the current subtotal
    RevalidatePromo,
    /// Promo endpoint answered
    PromoValidated {
        /// Request sequence number
        seq: u64,
        /// Answer
        result: Result<PromoValidationResponse, BackendError>,
    },

    // ----- navigation -----
    /// Advance one step, if allowed
    GoNext,
    /// Go back one step
    GoBack,

    // ----- payment -----
    /// Registration finished
    PaymentUserRegistered {
        /// Payment attempt that asked
        attempt: u64,
        /// New user
        user_id: String,
    },
    /// Order created
    PaymentSessionReady {
        /// Payment attempt that asked
        attempt: u64,
        /// Session
        session: PaymentSession,
    },
    /// Registration or order creation failed after retries
    PaymentInitFailed {
        /// Payment attempt that asked
        attempt: u64,
        /// Failing call
        stage: PaymentStage,
        /// Error
        error: String,
        /// Attempts made
        attempts: u32,
    },
    /// Try payment initialisation again
    RetryPayment,

    // ----- uploads -----
    /// Background upload finished
    DocumentsUploaded {
        /// Parts sent
        files: usize,
    },
    /// Background upload failed after retries
    DocumentUploadFailed {
        /// Error
        error: String,
    },
    /// Try the upload again
    RetryUpload,

    // ----- verification -----
    /// The provider redirected back with an order id
    VerifyPayment {
        /// Order
        order_id: String,
    },
    /// Status lookup finished
    PaymentVerified {
        /// Order
        order_id: String,
        /// Classification
        outcome: VerificationOutcome,
    },

    // ----- drafts -----
    /// Read the stored draft once
    HydrateDraft,
    /// Draft read
    DraftLoaded {
        /// Stored draft, if any
        draft: Option<Box<Draft>>,
    },
    /// Reading the draft failed
    DraftLoadFailed {
        /// Error
        error: String,
    },
    /// Debounced: write the draft
    PersistDraft,
    /// Draft written
    DraftSaved {
        /// Snapshot time
        at: DateTime<Utc>,
    },
    /// Writing the draft failed
    DraftSaveFailed {
        /// Error
        error: String,
    },
}

impl CheckoutAction {
    /// Whether the action edits what the visitor is buying or has entered.
    ///
    /// Edits are refused while on the payment step.
    #[must_use]
    pub const fn is_edit(&self) -> bool {
        matches!(
            self,
            Self::ToggleItem { .. }
                | Self::SetVisitorPassDays { .. }
                | Self::SetFlagshipQty { .. }
                | Self::SetBenefitField { .. }
                | Self::SetGroupField { .. }
                | Self::AttachGroupFile { .. }
                | Self::AddTeamMember { .. }
                | Self::RemoveTeamMember { .. }
                | Self::SetMemberField { .. }
                | Self::AttachMemberFile { .. }
                | Self::SetVisitorPassField { .. }
                | Self::SetPromoInput { .. }
                | Self::ApplyPromo
                | Self::RemovePromo
        )
    }
}
