//! The checkout state machine.
//!
//! One reducer owns the whole flow: selection, forms, promo, the payment
//! critical path, background uploads, post-redirect verification and the
//! local draft. Backend calls run as effects and report back as actions.

mod actions;
mod environment;
mod payment;
mod reducer;
mod state;

pub use actions::CheckoutAction;
pub use environment::CheckoutEnvironment;
pub use payment::{
    SYNTHETIC_PASSWORD_LEN, order_request, primary_contact, registration_request,
    synthetic_password,
};
pub use reducer::{
    CONFIRMING_PROMO_NOTICE, CheckoutReducer, FIX_ERRORS_NOTICE, PROMO_NOT_CONFIRMED_NOTICE,
    apply_action,
};
pub use state::{
    CheckoutState, DraftStatus, PaymentPhase, PaymentStage, PaymentState, Step, UploadStatus,
};
