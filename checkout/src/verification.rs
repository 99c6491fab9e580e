//! Post-redirect payment verification.

use crate::backend::PaymentStatusResponse;
use crate::error::BackendError;
use serde::{Deserialize, Serialize};

/// Classified payment status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationOutcome {
    /// Paid; the checkout is reset
    Success,
    /// Failed, cancelled, dropped or expired
    Failed,
    /// Not settled yet
    Pending,
    /// The order is unknown
    NotFound,
    /// Status could not be determined
    Error,
}

impl VerificationOutcome {
    /// Message for the visitor
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Success => "Payment successful. Your registration is confirmed.",
            Self::Failed => "Payment failed. No money was taken; you can try again.",
            Self::Pending => "Payment is still processing. Check back in a few minutes.",
            Self::NotFound => "We could not find this order.",
            Self::Error => "We could not verify your payment right now.",
        }
    }

    /// Whether the status can still change
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::NotFound)
    }
}

/// Classify a provider status string
#[must_use]
pub fn classify_status_text(status: &str) -> VerificationOutcome {
    match status.trim().to_ascii_uppercase().as_str() {
        "SUCCESS" | "PAID" | "COMPLETED" => VerificationOutcome::Success,
        "FAILED" | "CANCELLED" | "USER_DROPPED" | "EXPIRED" | "TERMINATED" => {
            VerificationOutcome::Failed
        },
        "PENDING" | "ACTIVE" | "NOT_ATTEMPTED" => VerificationOutcome::Pending,
        _ => VerificationOutcome::Error,
    }
}

/// Classify the result of a status lookup; a 404 means the order is unknown
#[must_use]
pub fn classify_payment_status(
    result: &Result<PaymentStatusResponse, BackendError>,
) -> VerificationOutcome {
    match result {
        Ok(response) => classify_status_text(&response.status),
        Err(error) if error.status() == Some(404) => VerificationOutcome::NotFound,
        Err(_) => VerificationOutcome::Error,
    }
}

/// Verification progress of the current order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationState {
    /// Order being verified
    pub order_id: Option<String>,
    /// Lookup in flight
    pub checking: bool,
    /// Latest classification
    pub outcome: Option<VerificationOutcome>,
}
