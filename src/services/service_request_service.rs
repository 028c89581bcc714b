use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::service_requests::{
        CreateServiceRequestRequest, RescheduleRequest, ServiceRequestList,
        UpdateRequestStatusRequest,
    },
    entity::{
        service_requests::{self, Column as RequestCol, Entity as ServiceRequests},
        services::Entity as Services,
        statuses::RequestStatus,
    },
    error::{AppError, AppResult},
    middleware::auth::{AccessRule, AuthUser, authorize, ensure_admin},
    models::ServiceRequest,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn create_request(
    state: &AppState,
    user: &AuthUser,
    payload: CreateServiceRequestRequest,
) -> AppResult<ApiResponse<ServiceRequest>> {
    Services::find_by_id(payload.service_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("service not found".to_string()))?;

    if payload.appointment_time <= Utc::now() {
        return Err(AppError::BadRequest(
            "appointment_time must be in the future".to_string(),
        ));
    }

    let request = service_requests::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        service_id: Set(payload.service_id),
        appointment_time: Set(payload.appointment_time.into()),
        status: Set(RequestStatus::Pending),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "service_request_create",
        Some("service_requests"),
        Some(serde_json::json!({ "request_id": request.id, "service_id": request.service_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Service request created",
        ServiceRequest::from(request),
        Some(Meta::empty()),
    ))
}

pub async fn list_requests(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ServiceRequestList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = ServiceRequests::find()
        .filter(RequestCol::UserId.eq(user.user_id))
        .order_by_desc(RequestCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ServiceRequest::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "OK",
        ServiceRequestList { items },
        Some(meta),
    ))
}

pub async fn get_request(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ServiceRequest>> {
    let request = ServiceRequests::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    authorize(user, request.user_id, AccessRule::OwnerOrAdmin)?;

    Ok(ApiResponse::success(
        "OK",
        ServiceRequest::from(request),
        Some(Meta::empty()),
    ))
}

/// Owner may move the appointment while the request is still pending.
pub async fn reschedule_request(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RescheduleRequest,
) -> AppResult<ApiResponse<ServiceRequest>> {
    let request = ServiceRequests::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    authorize(user, request.user_id, AccessRule::Owner)?;

    if request.status.is_terminal() {
        return Err(AppError::Conflict(
            "request is no longer pending".to_string(),
        ));
    }
    if payload.appointment_time <= Utc::now() {
        return Err(AppError::BadRequest(
            "appointment_time must be in the future".to_string(),
        ));
    }

    let mut active: service_requests::ActiveModel = request.into();
    active.appointment_time = Set(payload.appointment_time.into());
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Service request updated",
        ServiceRequest::from(updated),
        Some(Meta::empty()),
    ))
}

pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateRequestStatusRequest,
) -> AppResult<ApiResponse<ServiceRequest>> {
    ensure_admin(user)?;
    let next: RequestStatus = payload
        .status
        .parse()
        .map_err(|e: String| AppError::BadRequest(e))?;

    let request = ServiceRequests::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if !request.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "cannot transition request from {} to {}",
            request.status, next
        )));
    }

    let mut active: service_requests::ActiveModel = request.into();
    active.status = Set(next);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "service_request_status_update",
        Some("service_requests"),
        Some(serde_json::json!({ "request_id": updated.id, "status": updated.status.as_str() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Service request updated",
        ServiceRequest::from(updated),
        Some(Meta::empty()),
    ))
}

pub async fn delete_request(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let request = ServiceRequests::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    authorize(user, request.user_id, AccessRule::OwnerOrAdmin)?;

    ServiceRequests::delete_by_id(request.id)
        .exec(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Service request deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
