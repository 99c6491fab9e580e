//! HTTP implementation of [`CheckoutBackend`].

use super::{
    CheckoutBackend, CreateOrderRequest, PaymentSession, PaymentStatusResponse,
    PromoValidationRequest, PromoValidationResponse, RegistrationRequest, RegistrationResponse,
    UploadBatch,
};
use crate::config::CheckoutConfig;
use crate::error::BackendError;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// Backend client over `reqwest`.
///
/// Every call is bounded by `timeout`, covering both the request and reading
/// the response body.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Create a client for `base_url` (no trailing slash needed)
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Create a client from configuration
    #[must_use]
    pub fn from_config(config: &CheckoutConfig) -> Self {
        Self::new(config.api_base_url.clone(), config.http_timeout)
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => Err(transport_error(&error)),
            Err(_) => Err(BackendError::Timeout),
        }
    }

    async fn body(&self, response: Response) -> Result<String, BackendError> {
        match tokio::time::timeout(self.timeout, response.text()).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(error)) => Err(transport_error(&error)),
            Err(_) => Err(BackendError::Timeout),
        }
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = self.execute(request).await?;
        let status = response.status();
        let body = self.body(response).await?;

        if !status.is_success() {
            return Err(status_error(status, body));
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    #[tracing::instrument(skip(self, request), fields(code = %request.code))]
    async fn post_promo(
        &self,
        request: PromoValidationRequest,
    ) -> Result<PromoValidationResponse, BackendError> {
        let builder = self
            .client
            .post(self.url("/admin/promo-codes/validate"))
            .json(&request);
        let response = self.execute(builder).await?;
        let status = response.status();
        let body = self.body(response).await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()));
        }
        // the promo endpoint reports refused codes as 4xx with a regular body
        if status.is_client_error() {
            if let Ok(refusal) = serde_json::from_str::<PromoValidationResponse>(&body) {
                return Ok(refusal);
            }
        }
        Err(status_error(status, body))
    }

    #[tracing::instrument(skip(self, request))]
    async fn post_register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationResponse, BackendError> {
        self.json(self.client.post(self.url("/register")).json(&request))
            .await
    }

    #[tracing::instrument(skip(self, request), fields(amount = request.amount.paise()))]
    async fn post_order(&self, request: CreateOrderRequest) -> Result<PaymentSession, BackendError> {
        let builder = self
            .client
            .post(self.url("/api/payments/create-order"))
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&request);
        self.json(builder).await
    }

    #[tracing::instrument(skip(self, batch), fields(user_id = %batch.user_id, parts = batch.parts.len()))]
    async fn post_documents(&self, batch: UploadBatch) -> Result<(), BackendError> {
        let mut form = Form::new().text("userId", batch.user_id);
        for part in batch.parts {
            let file = Part::bytes(part.file.bytes.to_vec())
                .file_name(part.file.name.clone())
                .mime_str(&part.file.content_type)
                .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;
            form = form.part(part.name, file);
        }

        let response = self
            .execute(self.client.post(self.url("/api/upload-documents")).multipart(form))
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = self.body(response).await.unwrap_or_default();
        Err(status_error(status, body))
    }

    #[tracing::instrument(skip(self))]
    async fn get_status(&self, order_id: String) -> Result<PaymentStatusResponse, BackendError> {
        self.json(
            self.client
                .get(self.url(&format!("/api/payments/status/{order_id}"))),
        )
        .await
    }
}

fn transport_error(error: &reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout
    } else if error.is_builder() {
        BackendError::InvalidRequest(error.to_string())
    } else {
        BackendError::Network(error.to_string())
    }
}

fn status_error(status: StatusCode, message: String) -> BackendError {
    if status.is_server_error() {
        BackendError::Server {
            status: status.as_u16(),
            message,
        }
    } else {
        BackendError::Client {
            status: status.as_u16(),
            message,
        }
    }
}

impl CheckoutBackend for HttpBackend {
    fn validate_promo(
        &self,
        request: PromoValidationRequest,
    ) -> impl Future<Output = Result<PromoValidationResponse, BackendError>> + Send {
        self.post_promo(request)
    }

    fn register(
        &self,
        request: RegistrationRequest,
    ) -> impl Future<Output = Result<RegistrationResponse, BackendError>> + Send {
        self.post_register(request)
    }

    fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> impl Future<Output = Result<PaymentSession, BackendError>> + Send {
        self.post_order(request)
    }

    fn upload_documents(
        &self,
        batch: UploadBatch,
    ) -> impl Future<Output = Result<(), BackendError>> + Send {
        self.post_documents(batch)
    }

    fn payment_status(
        &self,
        order_id: String,
    ) -> impl Future<Output = Result<PaymentStatusResponse, BackendError>> + Send {
        self.get_status(order_id)
    }
}
