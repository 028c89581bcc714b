use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    dto::service_requests::{
        CreateServiceRequestRequest, RescheduleRequest, ServiceRequestList,
        UpdateRequestStatusRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::ServiceRequest,
    response::ApiResponse,
    routes::params::Pagination,
    services::service_request_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route(
            "/{id}",
            get(get_request).put(reschedule_request).delete(delete_request),
        )
        .route("/{id}/status", put(update_status))
}

#[utoipa::path(
    get,
    path = "/api/service-requests",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Own service requests", body = ApiResponse<ServiceRequestList>)
    ),
    security(("bearer_auth" = [])),
    tag = "ServiceRequests"
)]
pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ServiceRequestList>>> {
    let resp = service_request_service::list_requests(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/service-requests",
    request_body = CreateServiceRequestRequest,
    responses(
        (status = 201, description = "Booking created", body = ApiResponse<ServiceRequest>),
        (status = 400, description = "Unknown service or appointment not in the future")
    ),
    security(("bearer_auth" = [])),
    tag = "ServiceRequests"
)]
pub async fn create_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateServiceRequestRequest>,
) -> AppResult<Json<ApiResponse<ServiceRequest>>> {
    let resp = service_request_service::create_request(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/service-requests/{id}",
    params(("id" = Uuid, Path, description = "Service request ID")),
    responses(
        (status = 200, description = "Service request detail", body = ApiResponse<ServiceRequest>),
        (status = 403, description = "Neither owner nor admin"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "ServiceRequests"
)]
pub async fn get_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ServiceRequest>>> {
    let resp = service_request_service::get_request(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/service-requests/{id}",
    params(("id" = Uuid, Path, description = "Service request ID")),
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Appointment rescheduled", body = ApiResponse<ServiceRequest>),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Request already decided")
    ),
    security(("bearer_auth" = [])),
    tag = "ServiceRequests"
)]
pub async fn reschedule_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RescheduleRequest>,
) -> AppResult<Json<ApiResponse<ServiceRequest>>> {
    let resp = service_request_service::reschedule_request(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/service-requests/{id}/status",
    params(("id" = Uuid, Path, description = "Service request ID")),
    request_body = UpdateRequestStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<ServiceRequest>),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Transition not allowed")
    ),
    security(("bearer_auth" = [])),
    tag = "ServiceRequests"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRequestStatusRequest>,
) -> AppResult<Json<ApiResponse<ServiceRequest>>> {
    let resp = service_request_service::update_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/service-requests/{id}",
    params(("id" = Uuid, Path, description = "Service request ID")),
    responses(
        (status = 200, description = "Service request deleted", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Neither owner nor admin"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "ServiceRequests"
)]
pub async fn delete_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = service_request_service::delete_request(&state, &user, id).await?;
    Ok(Json(resp))
}
