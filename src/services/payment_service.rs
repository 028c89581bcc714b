use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr,
    TransactionTrait, Value,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{MpesaCallback, MpesaPaymentRequest, PaymentInitiated},
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        payments::{self, Column as PayCol, Entity as Payments},
        statuses::{OrderStatus, PaymentStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::{AccessRule, AuthUser, authorize},
    models::Payment,
    response::{ApiResponse, Meta},
    state::AppState,
};

const PAYMENT_METHOD_MPESA: &str = "mpesa";
const DEFAULT_ACCOUNT_REFERENCE: &str = "VETCARE";

/// Kick off an STK push for an order the caller owns.
///
/// The provider call happens before any row is written; a declined or
/// failed initiation leaves no payment behind. An order admits one payment
/// record: a `failed` attempt is re-armed in place (guarded by a
/// conditional update), anything else is a conflict.
pub async fn initiate_mpesa(
    state: &AppState,
    user: &AuthUser,
    payload: MpesaPaymentRequest,
) -> AppResult<ApiResponse<PaymentInitiated>> {
    if payload.phone_number.trim().is_empty() {
        return Err(AppError::BadRequest("phone_number is required".to_string()));
    }

    let order = Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    authorize(user, order.user_id, AccessRule::Owner)?;

    let amount = payload.amount.unwrap_or(order.total_price);
    if amount <= 0 {
        return Err(AppError::BadRequest(
            "amount must be greater than 0".to_string(),
        ));
    }

    let existing = Payments::find()
        .filter(PayCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?;
    if let Some(payment) = &existing {
        if payment.status != PaymentStatus::Failed {
            return Err(AppError::Conflict(
                "order already has an active payment".to_string(),
            ));
        }
    }

    let reference = payload
        .account_reference
        .unwrap_or_else(|| DEFAULT_ACCOUNT_REFERENCE.to_string());
    let description = payload
        .transaction_desc
        .unwrap_or_else(|| format!("Payment for order {}", order.id));

    let provider = state
        .payments
        .initiate_stk_push(&payload.phone_number, amount, &reference, &description)
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?;

    let txn = state.orm.begin().await?;
    let payment = match existing {
        Some(prior) => {
            let updated = Payments::update_many()
                .col_expr(PayCol::Status, Expr::value(Value::from(PaymentStatus::Pending.into_value())))
                .col_expr(PayCol::Amount, Expr::value(Value::from(amount)))
                .col_expr(
                    PayCol::TransactionId,
                    Expr::value(Value::from(provider.checkout_request_id.clone())),
                )
                .col_expr(PayCol::UpdatedAt, Expr::value(Value::from(Utc::now())))
                .filter(PayCol::Id.eq(prior.id))
                .filter(PayCol::Status.eq(PaymentStatus::Failed))
                .exec(&txn)
                .await?;
            if updated.rows_affected == 0 {
                return Err(AppError::Conflict(
                    "order already has an active payment".to_string(),
                ));
            }
            Payments::find_by_id(prior.id)
                .one(&txn)
                .await?
                .ok_or(AppError::NotFound)?
        }
        None => {
            let insert = payments::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                payment_method: Set(PAYMENT_METHOD_MPESA.to_string()),
                amount: Set(amount),
                status: Set(PaymentStatus::Pending),
                transaction_id: Set(Some(provider.checkout_request_id.clone())),
                created_at: NotSet,
                updated_at: NotSet,
            };
            match insert.insert(&txn).await {
                Ok(payment) => payment,
                Err(err) => {
                    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                        return Err(AppError::Conflict(
                            "order already has an active payment".to_string(),
                        ));
                    }
                    return Err(err.into());
                }
            }
        }
    };
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_initiated",
        Some("payments"),
        Some(serde_json::json!({
            "payment_id": payment.id,
            "order_id": order.id,
            "amount": amount,
            "transaction_id": payment.transaction_id,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment initiated",
        PaymentInitiated {
            payment: Payment::from(payment),
            provider,
        },
        Some(Meta::empty()),
    ))
}

/// Provider webhook. Finalizes the payment matched by `transaction_id`.
///
/// The status write is conditional on the row still being `pending`, so the
/// first callback wins and duplicate or out-of-order deliveries are no-ops.
/// An unknown transaction id is an anomaly on the provider's side: logged
/// and acknowledged, never retried from here.
pub async fn reconcile_mpesa(
    state: &AppState,
    payload: MpesaCallback,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let callback = payload.body.stk_callback;

    let payment = Payments::find()
        .filter(PayCol::TransactionId.eq(callback.checkout_request_id.clone()))
        .one(&state.orm)
        .await?;
    let payment = match payment {
        Some(p) => p,
        None => {
            tracing::warn!(
                transaction_id = %callback.checkout_request_id,
                result_code = callback.result_code,
                "payment callback matched no payment record"
            );
            return Ok(ApiResponse::success(
                "Callback acknowledged",
                serde_json::json!({}),
                Some(Meta::empty()),
            ));
        }
    };

    let next = if callback.result_code == 0 {
        PaymentStatus::Completed
    } else {
        PaymentStatus::Failed
    };

    let txn = state.orm.begin().await?;
    let updated = Payments::update_many()
        .col_expr(PayCol::Status, Expr::value(Value::from(next.into_value())))
        .col_expr(PayCol::UpdatedAt, Expr::value(Value::from(Utc::now())))
        .filter(PayCol::Id.eq(payment.id))
        .filter(PayCol::Status.eq(PaymentStatus::Pending))
        .exec(&txn)
        .await?;

    if updated.rows_affected == 0 {
        txn.commit().await?;
        tracing::info!(
            payment_id = %payment.id,
            status = payment.status.as_str(),
            "payment already terminal, callback ignored"
        );
        return Ok(ApiResponse::success(
            "Callback acknowledged",
            serde_json::json!({}),
            Some(Meta::empty()),
        ));
    }

    // A completed payment approves its pending order; same conditional
    // shape so a concurrent admin decision is not overwritten.
    if next == PaymentStatus::Completed {
        Orders::update_many()
            .col_expr(OrderCol::Status, Expr::value(Value::from(OrderStatus::Approved.into_value())))
            .col_expr(OrderCol::UpdatedAt, Expr::value(Value::from(Utc::now())))
            .filter(OrderCol::Id.eq(payment.order_id))
            .filter(OrderCol::Status.eq(OrderStatus::Pending))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        None,
        "payment_reconciled",
        Some("payments"),
        Some(serde_json::json!({
            "payment_id": payment.id,
            "order_id": payment.order_id,
            "result_code": callback.result_code,
            "status": next.as_str(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment status updated",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn get_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Payment>> {
    let payment = Payments::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let order = Orders::find_by_id(payment.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    authorize(user, order.user_id, AccessRule::OwnerOrAdmin)?;

    Ok(ApiResponse::success(
        "OK",
        Payment::from(payment),
        Some(Meta::empty()),
    ))
}
