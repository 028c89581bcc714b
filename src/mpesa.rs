//! Daraja (M-Pesa) STK push client.
//!
//! The provider is an opaque external collaborator: one fallible initiation
//! call per payment attempt, no internal retry. Completion arrives later on
//! the callback webhook and is reconciled by `transaction_id`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub api_base: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
    pub timeout_secs: u64,
}

impl MpesaConfig {
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).unwrap_or_default();
        Self {
            api_base: std::env::var("MPESA_API_BASE")
                .unwrap_or_else(|_| "https://api.safaricom.co.ke".to_string()),
            consumer_key: var("MPESA_CONSUMER_KEY"),
            consumer_secret: var("MPESA_CONSUMER_SECRET"),
            shortcode: var("MPESA_SHORTCODE"),
            passkey: var("MPESA_PASSKEY"),
            callback_url: var("MPESA_CALLBACK_URL"),
            timeout_secs: std::env::var("MPESA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("payment provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment provider rejected the request: {0}")]
    Rejected(String),

    #[error("payment provider response missing {0}")]
    MalformedResponse(&'static str),
}

/// What the core keeps from a successful initiation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StkPushResponse {
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: String,
    pub response_description: Option<String>,
    pub customer_message: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn initiate_stk_push(
        &self,
        phone_number: &str,
        amount: i64,
        account_reference: &str,
        transaction_desc: &str,
    ) -> Result<StkPushResponse, ProviderError>;
}

pub struct DarajaClient {
    http: reqwest::Client,
    config: MpesaConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DarajaStkResponse {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
    #[serde(rename = "CustomerMessage")]
    customer_message: Option<String>,
}

impl DarajaClient {
    /// The request timeout bounds how long a stalled provider can hold a
    /// request-handling worker.
    pub fn new(config: MpesaConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.api_base
        );
        let response = self
            .http
            .get(url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await?
            .error_for_status()?;

        let token: TokenResponse = response.json().await?;
        token
            .access_token
            .ok_or(ProviderError::MalformedResponse("access_token"))
    }

    fn stk_password(&self, timestamp: &str) -> String {
        BASE64.encode(format!(
            "{}{}{timestamp}",
            self.config.shortcode, self.config.passkey
        ))
    }
}

#[async_trait]
impl PaymentProvider for DarajaClient {
    async fn initiate_stk_push(
        &self,
        phone_number: &str,
        amount: i64,
        account_reference: &str,
        transaction_desc: &str,
    ) -> Result<StkPushResponse, ProviderError> {
        let access_token = self.access_token().await?;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let payload = serde_json::json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": self.stk_password(&timestamp),
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount,
            "PartyA": phone_number,
            "PartyB": self.config.shortcode,
            "PhoneNumber": phone_number,
            "CallBackURL": self.config.callback_url,
            "AccountReference": account_reference,
            "TransactionDesc": transaction_desc,
        });

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.api_base);
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected(format!("{status}: {detail}")));
        }

        let body: DarajaStkResponse = response.json().await?;
        if body.response_code.as_deref() != Some("0") {
            return Err(ProviderError::Rejected(
                body.response_description
                    .unwrap_or_else(|| "initiation declined".to_string()),
            ));
        }

        let checkout_request_id = body
            .checkout_request_id
            .ok_or(ProviderError::MalformedResponse("CheckoutRequestID"))?;

        Ok(StkPushResponse {
            merchant_request_id: body.merchant_request_id,
            checkout_request_id,
            response_description: body.response_description,
            customer_message: body.customer_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MpesaConfig {
        MpesaConfig {
            api_base: "https://example.invalid".into(),
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
            shortcode: "174379".into(),
            passkey: "passkey".into(),
            callback_url: "https://example.invalid/callback".into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn stk_password_encodes_shortcode_passkey_timestamp() {
        let client = DarajaClient::new(config()).expect("client");
        let encoded = client.stk_password("20250101120000");
        let decoded = BASE64.decode(encoded).expect("valid base64");
        assert_eq!(decoded, b"174379passkey20250101120000");
    }

    #[test]
    fn stk_response_parses_provider_field_names() {
        let body: DarajaStkResponse = serde_json::from_str(
            r#"{
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResponseCode": "0",
                "ResponseDescription": "Success. Request accepted for processing",
                "CustomerMessage": "Success. Request accepted for processing"
            }"#,
        )
        .expect("parse");
        assert_eq!(
            body.checkout_request_id.as_deref(),
            Some("ws_CO_191220191020363925")
        );
        assert_eq!(body.response_code.as_deref(), Some("0"));
    }
}
