use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Cart, CartItem, Product, Service};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

/// A cart line with the referenced catalog entity embedded.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemDetail {
    pub id: Uuid,
    pub quantity: i32,
    pub product: Option<Product>,
    pub service: Option<Service>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub cart: Cart,
    pub items: Vec<CartItemDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub item: CartItem,
    /// Cart total after the mutation's recompute.
    pub cart_total: i64,
}
