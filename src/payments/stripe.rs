//! Stripe-compatible HTTP gateway

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    to_minor_units, GatewayError, Metadata, PaymentGateway, PaymentIntent, PaymentIntentRequest,
    Refund, RefundRequest,
};

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

/// Talks to the provider's REST API with form-encoded requests
pub struct StripeGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl StripeGateway {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, GatewayError> {
        let url = format!("{}/v1/{}", self.api_url, path);
        tracing::debug!(url = %url, "Calling payment provider");

        let mut request = self.client.post(&url).bearer_auth(&self.api_key).form(form);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| format!("provider returned {}", status));
            tracing::warn!(status = %status, path = %path, "Payment provider rejected request");
            return Err(GatewayError::Rejected(message));
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

fn push_metadata(form: &mut Vec<(String, String)>, metadata: &Metadata) {
    for (key, value) in metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_customer(&self, email: &str) -> Result<String, GatewayError> {
        let form = vec![("email".to_string(), email.to_string())];
        let customer: Customer = self.post("customers", &form, None).await?;
        Ok(customer.id)
    }

    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut form = vec![
            ("amount".to_string(), to_minor_units(request.amount)?.to_string()),
            ("currency".to_string(), request.currency),
            ("customer".to_string(), request.customer_id),
            ("capture_method".to_string(), request.capture_method),
            ("receipt_email".to_string(), request.receipt_email),
        ];
        push_metadata(&mut form, &request.metadata);

        self.post("payment_intents", &form, None).await
    }

    async fn create_refund(&self, request: RefundRequest) -> Result<Refund, GatewayError> {
        let mut form = vec![
            ("payment_intent".to_string(), request.payment_intent_id),
            ("amount".to_string(), to_minor_units(request.amount)?.to_string()),
        ];
        push_metadata(&mut form, &request.metadata);

        self.post("refunds", &form, Some(&request.idempotency_key))
            .await
    }
}
