use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{models::Payment, mpesa::StkPushResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct MpesaPaymentRequest {
    pub order_id: Uuid,
    pub phone_number: String,
    /// Defaults to the order total.
    pub amount: Option<i64>,
    pub account_reference: Option<String>,
    pub transaction_desc: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentInitiated {
    pub payment: Payment,
    pub provider: StkPushResponse,
}

/// The provider's callback envelope, as delivered to the webhook.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MpesaCallback {
    #[serde(rename = "Body")]
    pub body: MpesaCallbackBody,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MpesaCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_parses_provider_envelope() {
        let callback: MpesaCallback = serde_json::from_str(
            r#"{
                "Body": {
                    "stkCallback": {
                        "MerchantRequestID": "29115-34620561-1",
                        "CheckoutRequestID": "ws_CO_191220191020363925",
                        "ResultCode": 0,
                        "ResultDesc": "The service request is processed successfully."
                    }
                }
            }"#,
        )
        .expect("parse");
        assert_eq!(callback.body.stk_callback.result_code, 0);
        assert_eq!(
            callback.body.stk_callback.checkout_request_id,
            "ws_CO_191220191020363925"
        );
    }
}
