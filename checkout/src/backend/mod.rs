//! Backend interface: promo validation, registration, order creation,
//! document upload and payment status.
//!
//! The reducer only sees [`CheckoutBackend`]. [`HttpBackend`] talks to the
//! real service; [`crate::mocks::MockBackend`] is scriptable for tests.

mod http;

pub use http::HttpBackend;

use crate::error::BackendError;
use crate::types::{FileRef, Money, rupees};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// `POST /admin/promo-codes/validate`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoValidationRequest {
    /// Code as typed, normalised
    pub code: String,
    /// Best known customer email
    pub user_email: String,
    /// Subtotal the discount is requested for
    #[serde(with = "rupees")]
    pub order_amount: Money,
}

/// Promo endpoint answer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoValidationResponse {
    /// Whether the code applies
    pub success: bool,
    /// Discount granted
    #[serde(default, with = "rupees")]
    pub discount_amount: Money,
    /// Reason shown to the visitor
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /register`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// Full name
    pub name: String,
    /// Email
    pub email: String,
    /// Generated; the checkout never asks for one
    pub password: String,
    /// Mobile number
    pub contact_no: String,
    /// Gender option value
    pub gender: String,
    /// Age as entered
    pub age: String,
    /// College or university
    pub university_name: String,
    /// Postal address
    pub address: String,
    /// Optional referral code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
}

/// Registration answer
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    /// Identity the order and documents are filed under
    #[serde(alias = "user_id")]
    pub user_id: String,
}

/// One line of an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Catalog id
    pub id: u32,
    /// Title
    pub title: String,
    /// Base price
    #[serde(with = "rupees")]
    pub price: Money,
}

/// `POST /api/payments/create-order`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Registered user
    pub user_id: String,
    /// Payable total
    #[serde(with = "rupees")]
    pub amount: Money,
    /// Customer name
    pub customer_name: String,
    /// Customer email
    pub customer_email: String,
    /// Customer phone
    pub customer_phone: String,
    /// Selected items
    pub items: Vec<OrderItem>,
    /// Visitor-pass days bought
    pub visitor_pass_days: u8,
    /// Applied promo code
    pub promo_code: Option<String>,
    /// Applied discount
    #[serde(with = "rupees")]
    pub applied_discount: Money,
    /// Sent as the `Idempotency-Key` header; stable across retries of one
    /// payment attempt
    #[serde(skip)]
    pub idempotency_key: String,
}

/// Opaque handle redeemed by the payment provider's checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Provider session id
    pub payment_session_id: String,
    /// Order id, used again for verification
    pub order_id: String,
    /// Amount the provider will charge
    #[serde(with = "rupees")]
    pub amount: Money,
}

/// One multipart file part
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPart {
    /// Part name, `files_<signature>_<field>` or
    /// `files_<signature>_member<index>_<field>`
    pub name: String,
    /// File, already compressed
    pub file: FileRef,
}

/// `POST /api/upload-documents`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadBatch {
    /// Registered user the documents belong to
    pub user_id: String,
    /// Files
    pub parts: Vec<UploadPart>,
}

/// `GET /api/payments/status/{order_id}` answer
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    /// Provider status string (`SUCCESS`, `PAID`, `PENDING`, ...)
    #[serde(alias = "order_status", alias = "orderStatus")]
    pub status: String,
    /// Order id echoed back
    #[serde(default, alias = "order_id")]
    pub order_id: Option<String>,
}

/// Remote collaborator of the checkout.
///
/// Futures must be `Send` and own their inputs: the runtime drives them on
/// its own tasks.
pub trait CheckoutBackend: Send + Sync + 'static {
    /// Validate a promo code against an order amount.
    ///
    /// # Errors
    ///
    /// Transport and server failures. A refused code is an `Ok` response
    /// with `success: false`.
    fn validate_promo(
        &self,
        request: PromoValidationRequest,
    ) -> impl Future<Output = Result<PromoValidationResponse, BackendError>> + Send;

    /// Create the user record orders are filed under.
    ///
    /// # Errors
    ///
    /// Transport, server and validation failures.
    fn register(
        &self,
        request: RegistrationRequest,
    ) -> impl Future<Output = Result<RegistrationResponse, BackendError>> + Send;

    /// Create an order and obtain a payment session.
    ///
    /// # Errors
    ///
    /// Transport, server and validation failures.
    fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> impl Future<Output = Result<PaymentSession, BackendError>> + Send;

    /// Upload identity documents.
    ///
    /// # Errors
    ///
    /// Transport and server failures.
    fn upload_documents(
        &self,
        batch: UploadBatch,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Fetch the provider status of an order.
    ///
    /// # Errors
    ///
    /// `Client { status: 404, .. }` when the order is unknown; otherwise
    /// transport and server failures.
    fn payment_status(
        &self,
        order_id: String,
    ) -> impl Future<Output = Result<PaymentStatusResponse, BackendError>> + Send;
}
