use crate::ports::payment_gateway::{
    CheckoutRequest, CheckoutSession, PaymentGateway as PaymentGatewayTrait, PaymentRejected,
    Result, SessionStatus,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("Stripe request failed")]
    Http(#[from] reqwest::Error),

    #[error("Stripe API returned {status}: {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Amount cannot be charged: {0}")]
    InvalidAmount(Decimal),
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
    status: Option<String>,
    payment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Convert a major-unit amount to the integer minor units Stripe expects
///
/// 2.50 USD becomes 250. Zero, negative or oversized amounts are rejected.
fn to_minor_units(amount: Decimal) -> std::result::Result<i64, StripeError> {
    if amount <= Decimal::ZERO {
        return Err(StripeError::InvalidAmount(amount));
    }
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or(StripeError::InvalidAmount(amount))
}

/// Errors that resending the same checkout request cannot fix become
/// `PaymentRejected`. Rate limiting and server errors stay retryable.
fn into_port_error(err: StripeError) -> Box<dyn std::error::Error + Send + Sync> {
    match err {
        StripeError::Api { status, message }
            if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS =>
        {
            Box::new(PaymentRejected(message))
        }
        StripeError::InvalidAmount(amount) => {
            Box::new(PaymentRejected(format!("amount cannot be charged: {}", amount)))
        }
        other => Box::new(other),
    }
}

fn map_session_status(session: &SessionResponse) -> SessionStatus {
    match (session.status.as_deref(), session.payment_status.as_deref()) {
        (Some("expired"), _) => SessionStatus::Expired,
        (_, Some("paid")) | (_, Some("no_payment_required")) => SessionStatus::Paid,
        _ => SessionStatus::Pending,
    }
}

/// Stripe Checkout implementation of PaymentGateway
///
/// Creates hosted checkout sessions through the Checkout Sessions API.
/// After payment Stripe redirects to `{base_url}/payments/success` with the
/// session id appended, and to `{base_url}/payments/cancel` on cancel.
pub struct PaymentGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    base_url: String,
}

impl PaymentGateway {
    pub fn new(secret_key: String, base_url: String) -> std::result::Result<Self, StripeError> {
        Self::with_api_base(secret_key, base_url, STRIPE_API_BASE.to_string())
    }

    /// Point the gateway at a different API host (stripe-mock, proxies)
    pub fn with_api_base(
        secret_key: String,
        base_url: String,
        api_base: String,
    ) -> std::result::Result<Self, StripeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn checkout_form(
        &self,
        request: &CheckoutRequest,
    ) -> std::result::Result<Vec<(String, String)>, StripeError> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            (
                "success_url".to_string(),
                format!(
                    "{}/payments/success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.base_url
                ),
            ),
            (
                "cancel_url".to_string(),
                format!("{}/payments/cancel", self.base_url),
            ),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                to_minor_units(request.amount)?.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.description.clone(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];

        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        Ok(form)
    }

    async fn parse_session(
        response: reqwest::Response,
    ) -> std::result::Result<SessionResponse, StripeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<SessionResponse>().await?);
        }

        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope
                .error
                .message
                .unwrap_or_else(|| "unknown error".to_string()),
            Err(_) => "unreadable error body".to_string(),
        };

        Err(StripeError::Api { status, message })
    }
}

#[async_trait]
impl PaymentGatewayTrait for PaymentGateway {
    async fn open_session(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        let form = self.checkout_form(&request).map_err(into_port_error)?;

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(StripeError::from)?;

        let session = Self::parse_session(response)
            .await
            .map_err(into_port_error)?;
        let session_url = session.url.ok_or_else(|| StripeError::Api {
            status: reqwest::StatusCode::OK,
            message: format!("session {} has no checkout url", session.id),
        })?;

        tracing::debug!(session_id = %session.id, "Stripe checkout session created");

        Ok(CheckoutSession {
            session_id: session.id,
            session_url,
        })
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.api_base, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(StripeError::from)?;

        let session = Self::parse_session(response).await?;
        Ok(map_session_status(&session))
    }
}
