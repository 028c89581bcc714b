use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::payments::{MpesaCallback, MpesaPaymentRequest, PaymentInitiated},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Payment,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mpesa", post(initiate_mpesa))
        .route("/mpesa/callback", post(mpesa_callback))
        .route("/{id}", get(get_payment))
}

#[utoipa::path(
    post,
    path = "/api/payments/mpesa",
    request_body = MpesaPaymentRequest,
    responses(
        (status = 200, description = "STK push accepted, payment pending", body = ApiResponse<PaymentInitiated>),
        (status = 403, description = "Not the order owner"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already has an active payment"),
        (status = 502, description = "Provider declined or unreachable")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initiate_mpesa(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<MpesaPaymentRequest>,
) -> AppResult<Json<ApiResponse<PaymentInitiated>>> {
    let resp = payment_service::initiate_mpesa(&state, &user, payload).await?;
    Ok(Json(resp))
}

/// Provider webhook; authenticated out of band by the provider, not by a
/// bearer token.
#[utoipa::path(
    post,
    path = "/api/payments/mpesa/callback",
    request_body = MpesaCallback,
    responses(
        (status = 200, description = "Callback reconciled or acknowledged", body = ApiResponse<serde_json::Value>)
    ),
    tag = "Payments"
)]
pub async fn mpesa_callback(
    State(state): State<AppState>,
    Json(payload): Json<MpesaCallback>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = payment_service::reconcile_mpesa(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment detail", body = ApiResponse<Payment>),
        (status = 403, description = "Neither order owner nor admin"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::get_payment(&state, &user, id).await?;
    Ok(Json(resp))
}
