use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{
        AddCartItemRequest, CartItemDetail, CartItemResponse, CartResponse, UpdateCartItemRequest,
    },
    entity::{
        cart_items::{self, Column as ItemCol, Entity as CartItems},
        carts::{self, Column as CartCol, Entity as Carts},
        products::Entity as Products,
        services::Entity as Services,
    },
    error::{AppError, AppResult},
    middleware::auth::{AccessRule, AuthUser, authorize},
    models::{Cart, CartItem, LineTarget},
    pricing::{self, PricedLine},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Atomic insert-if-absent on the cart's unique `user_id`, so two
/// concurrent first-time cart operations cannot create two carts.
pub async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<carts::Model> {
    let fresh = carts::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_price: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    };
    Carts::insert(fresh)
        .on_conflict(OnConflict::column(CartCol::UserId).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await?;

    Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart row missing after upsert")))
}

/// Rewrite the cached cart total from the current line items and live
/// catalog prices. Every line mutation calls this inside its own
/// transaction before committing.
async fn recompute_total<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<i64> {
    let lines = CartItems::find()
        .filter(ItemCol::CartId.eq(cart_id))
        .all(conn)
        .await?;

    let mut priced = Vec::with_capacity(lines.len());
    for line in &lines {
        // A line only survives while its catalog target exists (FK cascade),
        // so a missing target inside this transaction prices at zero.
        let unit_price = if let Some(product_id) = line.product_id {
            Products::find_by_id(product_id)
                .one(conn)
                .await?
                .map(|p| p.price)
        } else if let Some(service_id) = line.service_id {
            Services::find_by_id(service_id)
                .one(conn)
                .await?
                .map(|s| s.price)
        } else {
            None
        };
        priced.push(PricedLine::new(unit_price.unwrap_or(0), line.quantity));
    }

    let total = pricing::total(&priced)
        .ok_or_else(|| AppError::BadRequest("cart total overflows".to_string()))?;

    let cart = Carts::find_by_id(cart_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut active: carts::ActiveModel = cart.into();
    active.total_price = Set(total);
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;

    Ok(total)
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartResponse>> {
    let txn = state.orm.begin().await?;
    let cart = get_or_create_cart(&txn, user.user_id).await?;
    let total = recompute_total(&txn, cart.id).await?;

    let lines = CartItems::find()
        .filter(ItemCol::CartId.eq(cart.id))
        .all(&txn)
        .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let product = match line.product_id {
            Some(id) => Products::find_by_id(id).one(&txn).await?.map(Into::into),
            None => None,
        };
        let service = match line.service_id {
            Some(id) => Services::find_by_id(id).one(&txn).await?.map(Into::into),
            None => None,
        };
        items.push(CartItemDetail {
            id: line.id,
            quantity: line.quantity,
            product,
            service,
        });
    }
    txn.commit().await?;

    let cart = Cart {
        total_price: total,
        ..cart.into()
    };
    Ok(ApiResponse::success(
        "OK",
        CartResponse { cart, items },
        Some(Meta::empty()),
    ))
}

pub async fn add_line(
    state: &AppState,
    user: &AuthUser,
    payload: AddCartItemRequest,
) -> AppResult<ApiResponse<CartItemResponse>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    let target = LineTarget::from_refs(payload.product_id, payload.service_id)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let txn = state.orm.begin().await?;
    let cart = get_or_create_cart(&txn, user.user_id).await?;

    match target {
        LineTarget::Product(id) => {
            Products::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::BadRequest("product not found".to_string()))?;
        }
        LineTarget::Service(id) => {
            Services::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::BadRequest("service not found".to_string()))?;
        }
    }

    let mut finder = CartItems::find().filter(ItemCol::CartId.eq(cart.id));
    finder = match target {
        LineTarget::Product(id) => finder.filter(ItemCol::ProductId.eq(id)),
        LineTarget::Service(id) => finder.filter(ItemCol::ServiceId.eq(id)),
    };
    let existing = finder.one(&txn).await?;

    let item = if let Some(line) = existing {
        let mut active: cart_items::ActiveModel = line.into();
        active.quantity = Set(payload.quantity);
        active.update(&txn).await?
    } else {
        cart_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            product_id: Set(target.product_id()),
            service_id: Set(target.service_id()),
            quantity: Set(payload.quantity),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?
    };

    let cart_total = recompute_total(&txn, cart.id).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({
            "item_id": item.id,
            "product_id": item.product_id,
            "service_id": item.service_id,
            "quantity": item.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Added to cart",
        CartItemResponse {
            item: CartItem::from(item),
            cart_total,
        },
        None,
    ))
}

pub async fn update_line(
    state: &AppState,
    user: &AuthUser,
    line_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItemResponse>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let txn = state.orm.begin().await?;
    let line = CartItems::find_by_id(line_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let cart = Carts::find_by_id(line.cart_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    authorize(user, cart.user_id, AccessRule::Owner)?;

    let mut active: cart_items::ActiveModel = line.into();
    active.quantity = Set(payload.quantity);
    let item = active.update(&txn).await?;

    let cart_total = recompute_total(&txn, cart.id).await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Cart item updated",
        CartItemResponse {
            item: CartItem::from(item),
            cart_total,
        },
        None,
    ))
}

pub async fn remove_line(
    state: &AppState,
    user: &AuthUser,
    line_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let line = CartItems::find_by_id(line_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let cart = Carts::find_by_id(line.cart_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    authorize(user, cart.user_id, AccessRule::Owner)?;

    CartItems::delete_by_id(line.id).exec(&txn).await?;
    recompute_total(&txn, cart.id).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "item_id": line_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let cart = get_or_create_cart(&txn, user.user_id).await?;

    CartItems::delete_many()
        .filter(ItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    recompute_total(&txn, cart.id).await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
