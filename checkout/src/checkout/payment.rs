//! Requests of the payment critical path.

use super::state::CheckoutState;
use crate::backend::{CreateOrderRequest, OrderItem, RegistrationRequest};
use crate::catalog::Catalog;
use crate::grouping::FormGroup;
use crate::pricing::contact_records;
use crate::types::{Record, field_value};
use crate::validation::is_valid_email;
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of generated passwords
pub const SYNTHETIC_PASSWORD_LEN: usize = 16;

/// Random alphanumeric password for accounts created by the checkout, which
/// never asks for one
#[must_use]
pub fn synthetic_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SYNTHETIC_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// The record that identifies the customer: the first contact record with a
/// valid email, else the first with a name, else an empty record
#[must_use]
pub fn primary_contact(state: &CheckoutState, groups: &[FormGroup]) -> Record {
    let records = contact_records(groups, &state.forms, &state.selection);
    records
        .iter()
        .find(|r| field_value(r, "email").is_some_and(is_valid_email))
        .or_else(|| records.iter().find(|r| field_value(r, "name").is_some()))
        .map(|r| (*r).clone())
        .unwrap_or_default()
}

fn text(record: &Record, field: &str) -> String {
    field_value(record, field).unwrap_or_default().to_string()
}

/// Registration for the customer
#[must_use]
pub fn registration_request(contact: &Record) -> RegistrationRequest {
    RegistrationRequest {
        name: text(contact, "name"),
        email: text(contact, "email"),
        password: synthetic_password(),
        contact_no: text(contact, "contactNo"),
        gender: text(contact, "gender"),
        age: text(contact, "age"),
        university_name: text(contact, "universityName"),
        address: text(contact, "address"),
        referral_code: field_value(contact, "referralCode").map(str::to_string),
    }
}

/// Order for the current selection and totals. The idempotency key is
/// filled in by the effect that sends it.
#[must_use]
pub fn order_request(
    state: &CheckoutState,
    catalog: &Catalog,
    user_id: String,
    contact: &Record,
) -> CreateOrderRequest {
    let totals = state.totals(catalog);
    let promo_code = (!totals.discount.is_zero())
        .then(|| state.promo.applied.as_ref().map(|p| p.code.clone()))
        .flatten();

    CreateOrderRequest {
        user_id,
        amount: totals.total,
        customer_name: text(contact, "name"),
        customer_email: text(contact, "email"),
        customer_phone: text(contact, "contactNo"),
        items: state
            .selection
            .selected_items(catalog)
            .map(|item| OrderItem {
                id: item.id.0,
                title: item.title.clone(),
                price: item.base_price(),
            })
            .collect(),
        visitor_pass_days: state.selection.visitor_pass_days(),
        promo_code,
        applied_discount: totals.discount,
        idempotency_key: String::new(),
    }
}
