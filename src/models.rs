use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity;
use crate::entity::statuses::{OrderStatus, PaymentStatus, RequestStatus};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_verified: bool,
    pub two_fa_enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub image_url: String,
    pub category: String,
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub duration_minutes: i32,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_price: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_method: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub appointment_time: DateTime<Utc>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<entity::users::Model> for User {
    fn from(model: entity::users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role,
            is_verified: model.is_verified,
            two_fa_enabled: model.two_fa_enabled,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::products::Model> for Product {
    fn from(model: entity::products::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            image_url: model.image_url,
            category: model.category,
            stock_quantity: model.stock_quantity,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::services::Model> for Service {
    fn from(model: entity::services::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            duration_minutes: model.duration_minutes,
            image_url: model.image_url,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::carts::Model> for Cart {
    fn from(model: entity::carts::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            total_price: model.total_price,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::cart_items::Model> for CartItem {
    fn from(model: entity::cart_items::Model) -> Self {
        Self {
            id: model.id,
            cart_id: model.cart_id,
            product_id: model.product_id,
            service_id: model.service_id,
            quantity: model.quantity,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::orders::Model> for Order {
    fn from(model: entity::orders::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            total_price: model.total_price,
            status: model.status,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::order_items::Model> for OrderItem {
    fn from(model: entity::order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            service_id: model.service_id,
            quantity: model.quantity,
            unit_price: model.unit_price,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::payments::Model> for Payment {
    fn from(model: entity::payments::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            payment_method: model.payment_method,
            amount: model.amount,
            status: model.status,
            transaction_id: model.transaction_id,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<entity::service_requests::Model> for ServiceRequest {
    fn from(model: entity::service_requests::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            service_id: model.service_id,
            appointment_time: model.appointment_time.with_timezone(&Utc),
            status: model.status,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

/// The catalog entity a line item points at. A line references a product or
/// a service, never both and never neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTarget {
    Product(Uuid),
    Service(Uuid),
}

impl LineTarget {
    pub fn from_refs(
        product_id: Option<Uuid>,
        service_id: Option<Uuid>,
    ) -> Result<Self, &'static str> {
        match (product_id, service_id) {
            (Some(id), None) => Ok(LineTarget::Product(id)),
            (None, Some(id)) => Ok(LineTarget::Service(id)),
            (Some(_), Some(_)) => Err("a line item cannot reference both a product and a service"),
            (None, None) => Err("a line item must reference a product or a service"),
        }
    }

    pub fn product_id(self) -> Option<Uuid> {
        match self {
            LineTarget::Product(id) => Some(id),
            LineTarget::Service(_) => None,
        }
    }

    pub fn service_id(self) -> Option<Uuid> {
        match self {
            LineTarget::Service(id) => Some(id),
            LineTarget::Product(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_target_requires_exactly_one_reference() {
        let p = Uuid::new_v4();
        let s = Uuid::new_v4();

        assert_eq!(
            LineTarget::from_refs(Some(p), None),
            Ok(LineTarget::Product(p))
        );
        assert_eq!(
            LineTarget::from_refs(None, Some(s)),
            Ok(LineTarget::Service(s))
        );
        assert!(LineTarget::from_refs(Some(p), Some(s)).is_err());
        assert!(LineTarget::from_refs(None, None).is_err());
    }

    #[test]
    fn line_target_splits_back_into_refs() {
        let id = Uuid::new_v4();
        let target = LineTarget::Product(id);
        assert_eq!(target.product_id(), Some(id));
        assert_eq!(target.service_id(), None);
    }
}
