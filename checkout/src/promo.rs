//! Promo code lifecycle.
//!
//! Every validation request carries a sequence number. Only the response to
//! the most recent request is applied, so rapid re-triggers coalesce into
//! the last one and a slow stale answer can never overwrite a newer one.

use crate::backend::PromoValidationResponse;
use crate::error::BackendError;
use crate::pricing::needs_promo_revalidation;
use crate::types::Money;
use festival_core::effect::EffectKey;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Debounce key for automatic revalidation
pub const PROMO_REVALIDATE: EffectKey = EffectKey("promo-revalidate");

/// Default quiet period before an automatic revalidation fires
pub const PROMO_DEBOUNCE: Duration = Duration::from_millis(600);

/// A server-confirmed discount
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoApplication {
    /// Normalised code
    pub code: String,
    /// Discount granted for the validated amount
    pub discount: Money,
}

/// Why a validation was requested
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromoTrigger {
    /// The visitor pressed apply
    Apply,
    /// The subtotal moved while a promo was applied
    Revalidate,
}

/// An in-flight validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromoRequest {
    /// Sequence number; only the latest is honoured
    pub seq: u64,
    /// Code sent
    pub code: String,
    /// Subtotal sent
    pub amount: Money,
    /// What started it
    pub trigger: PromoTrigger,
}

/// What a validation response did to the promo state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromoOutcome {
    /// Superseded by a newer request; ignored
    Stale,
    /// Discount applied (or confirmed)
    Applied(PromoApplication),
    /// The server refused the code; any applied promo was cleared
    Rejected(String),
    /// The call failed
    Failed(String),
}

/// Promo input, applied discount and in-flight validation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromoState {
    /// What the visitor typed
    pub input: String,
    /// Currently applied discount
    pub applied: Option<PromoApplication>,
    /// Latest request still awaiting a response
    pub pending: Option<PromoRequest>,
    /// Message to show next to the promo field
    pub error: Option<String>,
    /// Subtotal the applied discount was validated against
    pub last_validated_subtotal: Option<Money>,
    next_seq: u64,
}

/// Upper-case and trim a code as typed
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl PromoState {
    /// Start a validation, superseding any pending one
    pub fn begin(&mut self, code: &str, amount: Money, trigger: PromoTrigger) -> PromoRequest {
        self.next_seq += 1;
        let request = PromoRequest {
            seq: self.next_seq,
            code: normalize_code(code),
            amount,
            trigger,
        };
        if trigger == PromoTrigger::Apply {
            self.error = None;
        }
        self.pending = Some(request.clone());
        request
    }

    /// Whether a validation is in flight
    #[must_use]
    pub const fn is_validating(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply the response to request `seq`.
    ///
    /// A success whose discount exceeds the quoted amount is treated as a
    /// rejection. A failed apply leaves a previously applied promo in place;
    /// a failed revalidation clears it.
    pub fn accept(
        &mut self,
        seq: u64,
        result: Result<PromoValidationResponse, BackendError>,
    ) -> PromoOutcome {
        let Some(request) = self.pending.take_if(|pending| pending.seq == seq) else {
            return PromoOutcome::Stale;
        };

        match result {
            Ok(response) if response.success && response.discount_amount <= request.amount => {
                let application = PromoApplication {
                    code: request.code,
                    discount: response.discount_amount,
                };
                self.applied = Some(application.clone());
                self.last_validated_subtotal = Some(request.amount);
                self.error = None;
                PromoOutcome::Applied(application)
            },
            Ok(response) => {
                let message = if response.success {
                    "Promo code is not valid for this order amount.".to_string()
                } else {
                    response
                        .message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| "Invalid promo code.".to_string())
                };
                self.drop_applied();
                self.error = Some(message.clone());
                PromoOutcome::Rejected(message)
            },
            Err(error) => {
                let message = match request.trigger {
                    PromoTrigger::Apply => format!("Could not validate promo code: {error}"),
                    PromoTrigger::Revalidate => {
                        self.drop_applied();
                        "Promo code removed: it could not be confirmed for the new total."
                            .to_string()
                    },
                };
                self.error = Some(message.clone());
                PromoOutcome::Failed(message)
            },
        }
    }

    /// Remove the promo entirely, including the typed code
    pub fn clear(&mut self) {
        *self = Self {
            next_seq: self.next_seq,
            ..Self::default()
        };
    }

    /// The applied promo, if it is still usable against `subtotal`
    #[must_use]
    pub fn effective(&self, subtotal: Money) -> Option<&PromoApplication> {
        self.applied
            .as_ref()
            .filter(|promo| promo.discount <= subtotal)
    }

    /// Whether the applied promo, if any, was validated for `subtotal`.
    ///
    /// A promo restored from a draft has no validated amount and is never
    /// confirmed.
    #[must_use]
    pub fn is_confirmed_for(&self, subtotal: Money) -> bool {
        match (&self.applied, self.last_validated_subtotal) {
            (None, _) => true,
            (Some(_), Some(amount)) => !needs_promo_revalidation(amount, subtotal),
            (Some(_), None) => false,
        }
    }

    /// Whether the applied promo must be confirmed again for `subtotal`.
    ///
    /// Compared against the amount of the in-flight request when there is
    /// one, so a pending revalidation for the same amount is not repeated.
    #[must_use]
    pub fn needs_revalidation(&self, subtotal: Money) -> bool {
        if self.applied.is_none() {
            return false;
        }
        let reference = self
            .pending
            .as_ref()
            .map(|pending| pending.amount)
            .or(self.last_validated_subtotal);
        reference.is_none_or(|amount| needs_promo_revalidation(amount, subtotal))
    }

    /// Restore input and applied promo from a draft. The applied promo is
    /// unconfirmed until revalidated.
    pub fn restore(&mut self, input: String, applied: Option<PromoApplication>) {
        self.clear();
        self.input = input;
        self.applied = applied;
    }

    fn drop_applied(&mut self) {
        self.applied = None;
        self.last_validated_subtotal = None;
    }
}
