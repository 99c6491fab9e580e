//! `HttpBackend` against a local mock server.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use festival_checkout::backend::{
    CheckoutBackend, CreateOrderRequest, HttpBackend, PromoValidationRequest, RegistrationRequest,
    UploadBatch, UploadPart,
};
use festival_checkout::error::BackendError;
use festival_checkout::types::{FileRef, Money};
use festival_checkout::verification::{VerificationOutcome, classify_payment_status};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(server.uri(), Duration::from_secs(2))
}

fn promo_request(code: &str, rupees: u64) -> PromoValidationRequest {
    PromoValidationRequest {
        code: code.into(),
        user_email: "meera@college.edu".into(),
        order_amount: Money::from_rupees(rupees),
    }
}

#[tokio::test]
async fn promo_success_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/promo-codes/validate"))
        .and(body_partial_json(json!({
            "code": "FEST20",
            "userEmail": "meera@college.edu",
            "orderAmount": 85.0,
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "discountAmount": 20})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = backend(&server)
        .validate_promo(promo_request("FEST20", 85))
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.discount_amount, Money::from_rupees(20));
}

#[tokio::test]
async fn promo_refusal_with_client_status_is_an_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/promo-codes/validate"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "message": "Promo code has expired.",
        })))
        .mount(&server)
        .await;

    let response = backend(&server)
        .validate_promo(promo_request("OLD10", 85))
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("Promo code has expired."));
}

#[tokio::test]
async fn registration_accepts_either_id_spelling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_partial_json(json!({"email": "meera@college.edu", "contactNo": "9876543210"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"user_id": "u-77"})))
        .mount(&server)
        .await;

    let response = backend(&server)
        .register(RegistrationRequest {
            name: "Meera Iyer".into(),
            email: "meera@college.edu".into(),
            contact_no: "9876543210".into(),
            ..RegistrationRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(response.user_id, "u-77");
}

#[tokio::test]
async fn order_carries_the_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/create-order"))
        .and(header("Idempotency-Key", "attempt-key-1"))
        .and(body_partial_json(json!({"userId": "u-77", "amount": 109.0, "visitorPassDays": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payment_session_id": "ps_123",
            "order_id": "order_9",
            "amount": 109,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = backend(&server)
        .create_order(CreateOrderRequest {
            user_id: "u-77".into(),
            amount: Money::from_rupees(109),
            customer_name: "Meera Iyer".into(),
            customer_email: "meera@college.edu".into(),
            customer_phone: "9876543210".into(),
            items: Vec::new(),
            visitor_pass_days: 1,
            promo_code: None,
            applied_discount: Money::ZERO,
            idempotency_key: "attempt-key-1".into(),
        })
        .await
        .unwrap();

    assert_eq!(session.payment_session_id, "ps_123");
    assert_eq!(session.order_id, "order_9");
    assert_eq!(session.amount, Money::from_rupees(109));
}

#[tokio::test]
async fn server_errors_are_retryable_and_client_errors_are_not() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/payments/status/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let backend = backend(&server);
    let error = backend
        .register(RegistrationRequest::default())
        .await
        .unwrap_err();
    assert_eq!(
        error,
        BackendError::Server {
            status: 503,
            message: "maintenance".into()
        }
    );
    assert!(error.is_retryable());

    let missing = backend.payment_status("missing".into()).await;
    assert!(!missing.as_ref().unwrap_err().is_retryable());
    assert_eq!(classify_payment_status(&missing), VerificationOutcome::NotFound);
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/payments/status/order_9"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "PAID"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri(), Duration::from_millis(100));
    let error = backend.payment_status("order_9".into()).await.unwrap_err();

    assert_eq!(error, BackendError::Timeout);
    assert!(error.is_retryable());
}

#[tokio::test]
async fn payment_status_accepts_provider_field_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/payments/status/order_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"order_status": "PAID"})))
        .mount(&server)
        .await;

    let result = backend(&server).payment_status("order_9".into()).await;

    assert_eq!(classify_payment_status(&result), VerificationOutcome::Success);
}

#[tokio::test]
async fn documents_go_up_as_one_multipart_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-documents"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server)
        .upload_documents(UploadBatch {
            user_id: "u-77".into(),
            parts: vec![UploadPart {
                name: "files_abc123_idCard".into(),
                file: FileRef::new("id.pdf", "application/pdf", b"%PDF-1.4".to_vec()),
            }],
        })
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"userId\""));
    assert!(body.contains("u-77"));
    assert!(body.contains("name=\"files_abc123_idCard\"; filename=\"id.pdf\""));
}
