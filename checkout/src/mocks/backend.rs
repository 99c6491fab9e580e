//! Scriptable backend.

use crate::backend::{
    CheckoutBackend, CreateOrderRequest, PaymentSession, PaymentStatusResponse,
    PromoValidationRequest, PromoValidationResponse, RegistrationRequest, RegistrationResponse,
    UploadBatch,
};
use crate::error::BackendError;
use crate::types::Money;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// In-memory backend.
///
/// Each endpoint answers from its script queue first; once the queue is
/// empty it falls back to a happy-path default:
///
/// - promo: `FEST20` gives ₹20 off, `BIG100` gives ₹100 off orders of at
///   least ₹500, anything else is refused
/// - register: `user-<n>`
/// - create order: `session-<n>` / `order-<n>` for the requested amount
/// - upload: success
/// - payment status: `SUCCESS`
///
/// Every request is recorded. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    promo_script: VecDeque<Result<PromoValidationResponse, BackendError>>,
    register_script: VecDeque<Result<RegistrationResponse, BackendError>>,
    order_script: VecDeque<Result<PaymentSession, BackendError>>,
    upload_script: VecDeque<Result<(), BackendError>>,
    status_script: VecDeque<Result<PaymentStatusResponse, BackendError>>,

    promo_delay: Option<Duration>,
    upload_delay: Option<Duration>,

    promo_requests: Vec<PromoValidationRequest>,
    registrations: Vec<RegistrationRequest>,
    orders: Vec<CreateOrderRequest>,
    uploads: Vec<UploadBatch>,
    status_requests: Vec<String>,
}

fn builtin_promo(request: &PromoValidationRequest) -> PromoValidationResponse {
    let refuse = |message: &str| PromoValidationResponse {
        success: false,
        discount_amount: Money::ZERO,
        message: Some(message.to_string()),
    };
    let grant = |rupees: u64| PromoValidationResponse {
        success: true,
        discount_amount: Money::from_rupees(rupees),
        message: None,
    };

    match request.code.as_str() {
        "FEST20" => grant(20),
        "BIG100" if request.order_amount >= Money::from_rupees(500) => grant(100),
        "BIG100" => refuse("BIG100 needs an order of at least ₹500."),
        _ => refuse("Invalid promo code."),
    }
}

async fn answer<T>(delay: Option<Duration>, result: T) -> T {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    result
}

impl MockBackend {
    /// Backend with empty scripts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a promo answer
    #[must_use]
    pub fn push_promo(self, result: Result<PromoValidationResponse, BackendError>) -> Self {
        self.state().promo_script.push_back(result);
        self
    }

    /// Queue a registration answer
    #[must_use]
    pub fn push_register(self, result: Result<RegistrationResponse, BackendError>) -> Self {
        self.state().register_script.push_back(result);
        self
    }

    /// Queue an order answer
    #[must_use]
    pub fn push_order(self, result: Result<PaymentSession, BackendError>) -> Self {
        self.state().order_script.push_back(result);
        self
    }

    /// Queue an upload answer
    #[must_use]
    pub fn push_upload(self, result: Result<(), BackendError>) -> Self {
        self.state().upload_script.push_back(result);
        self
    }

    /// Queue a payment status answer
    #[must_use]
    pub fn push_status(self, result: Result<PaymentStatusResponse, BackendError>) -> Self {
        self.state().status_script.push_back(result);
        self
    }

    /// Delay every promo answer
    #[must_use]
    pub fn with_promo_delay(self, delay: Duration) -> Self {
        self.state().promo_delay = Some(delay);
        self
    }

    /// Delay every upload answer
    #[must_use]
    pub fn with_upload_delay(self, delay: Duration) -> Self {
        self.state().upload_delay = Some(delay);
        self
    }

    /// Promo requests received
    #[must_use]
    pub fn promo_requests(&self) -> Vec<PromoValidationRequest> {
        self.state().promo_requests.clone()
    }

    /// Registrations received
    #[must_use]
    pub fn registrations(&self) -> Vec<RegistrationRequest> {
        self.state().registrations.clone()
    }

    /// Orders received
    #[must_use]
    pub fn orders(&self) -> Vec<CreateOrderRequest> {
        self.state().orders.clone()
    }

    /// Upload batches received
    #[must_use]
    pub fn uploads(&self) -> Vec<UploadBatch> {
        self.state().uploads.clone()
    }

    /// Order ids whose status was requested
    #[must_use]
    pub fn status_requests(&self) -> Vec<String> {
        self.state().status_requests.clone()
    }
}

impl CheckoutBackend for MockBackend {
    fn validate_promo(
        &self,
        request: PromoValidationRequest,
    ) -> impl Future<Output = Result<PromoValidationResponse, BackendError>> + Send {
        let mut state = self.state();
        let result = state
            .promo_script
            .pop_front()
            .unwrap_or_else(|| Ok(builtin_promo(&request)));
        state.promo_requests.push(request);
        answer(state.promo_delay, result)
    }

    fn register(
        &self,
        request: RegistrationRequest,
    ) -> impl Future<Output = Result<RegistrationResponse, BackendError>> + Send {
        let mut state = self.state();
        state.registrations.push(request);
        let n = state.registrations.len();
        let result = state.register_script.pop_front().unwrap_or_else(|| {
            Ok(RegistrationResponse {
                user_id: format!("user-{n}"),
            })
        });
        answer(None, result)
    }

    fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> impl Future<Output = Result<PaymentSession, BackendError>> + Send {
        let mut state = self.state();
        let n = state.orders.len() + 1;
        let result = state.order_script.pop_front().unwrap_or_else(|| {
            Ok(PaymentSession {
                payment_session_id: format!("session-{n}"),
                order_id: format!("order-{n}"),
                amount: request.amount,
            })
        });
        state.orders.push(request);
        answer(None, result)
    }

    fn upload_documents(
        &self,
        batch: UploadBatch,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        let mut state = self.state();
        state.uploads.push(batch);
        let result = state.upload_script.pop_front().unwrap_or(Ok(()));
        answer(state.upload_delay, result)
    }

    fn payment_status(
        &self,
        order_id: String,
    ) -> impl Future<Output = Result<PaymentStatusResponse, BackendError>> + Send {
        let mut state = self.state();
        let result = state.status_script.pop_front().unwrap_or_else(|| {
            Ok(PaymentStatusResponse {
                status: "SUCCESS".to_string(),
                order_id: Some(order_id.clone()),
            })
        });
        state.status_requests.push(order_id);
        answer(None, result)
    }
}
