use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ServiceRequest;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateServiceRequestRequest {
    pub service_id: Uuid,
    pub appointment_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RescheduleRequest {
    pub appointment_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRequestStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceRequestList {
    pub items: Vec<ServiceRequest>,
}
