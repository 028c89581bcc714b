use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CreateOrderRequest, OrderItemList, OrderLineRequest, OrderList, OrderWithItems,
        UpdateOrderStatusRequest,
    },
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{self, Column as CartCol, Entity as Carts},
        order_items::{self, Column as OrderItemCol, Entity as OrderItems},
        orders::{self, Column as OrderCol, Entity as Orders},
        products::Entity as Products,
        services::Entity as Services,
        statuses::OrderStatus,
    },
    error::{AppError, AppResult},
    middleware::auth::{AccessRule, AuthUser, authorize, ensure_admin},
    models::{LineTarget, Order, OrderItem},
    pricing::{self, PricedLine},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// A validated line with its price frozen, ready to be written.
struct FrozenLine {
    target: LineTarget,
    quantity: i32,
    unit_price: i64,
}

/// Validate one requested line and freeze its unit price: the supplied
/// price wins, otherwise the live catalog price at this instant.
async fn freeze_line<C: ConnectionTrait>(
    conn: &C,
    line: &OrderLineRequest,
) -> AppResult<FrozenLine> {
    let target = LineTarget::from_refs(line.product_id, line.service_id)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if line.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let live_price = match target {
        LineTarget::Product(id) => {
            Products::find_by_id(id)
                .one(conn)
                .await?
                .ok_or_else(|| AppError::BadRequest(format!("product {id} not found")))?
                .price
        }
        LineTarget::Service(id) => {
            Services::find_by_id(id)
                .one(conn)
                .await?
                .ok_or_else(|| AppError::BadRequest(format!("service {id} not found")))?
                .price
        }
    };

    let unit_price = line.unit_price.unwrap_or(live_price);
    if unit_price < 0 {
        return Err(AppError::BadRequest(
            "unit_price must not be negative".to_string(),
        ));
    }

    Ok(FrozenLine {
        target,
        quantity: line.quantity,
        unit_price,
    })
}

/// Write the order and its lines. Caller owns the transaction; an error on
/// any line rolls back the whole write.
async fn insert_order<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    frozen: Vec<FrozenLine>,
) -> AppResult<(orders::Model, Vec<OrderItem>)> {
    let priced: Vec<PricedLine> = frozen
        .iter()
        .map(|line| PricedLine::new(line.unit_price, line.quantity))
        .collect();
    let total_price = pricing::total(&priced)
        .ok_or_else(|| AppError::BadRequest("order total overflows".to_string()))?;

    let order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_price: Set(total_price),
        status: Set(OrderStatus::Pending),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(frozen.len());
    for line in frozen {
        let item = order_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.target.product_id()),
            service_id: Set(line.target.service_id()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            created_at: NotSet,
        }
        .insert(conn)
        .await?;
        items.push(OrderItem::from(item));
    }

    Ok((order, items))
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest(
            "order must contain at least one item".to_string(),
        ));
    }

    let txn = state.orm.begin().await?;
    let mut frozen = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        frozen.push(freeze_line(&txn, line).await?);
    }
    let (order, items) = insert_order(&txn, user.user_id, frozen).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_price": order.total_price })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Convert the caller's cart into an order, freezing the live prices, then
/// clear the cart. One transaction end to end.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let cart = match cart {
        Some(c) => c,
        None => return Err(AppError::BadRequest("Cart is empty".to_string())),
    };

    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .lock(LockType::Update)
        .all(&txn)
        .await?;
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".to_string()));
    }

    let mut frozen = Vec::with_capacity(lines.len());
    for line in &lines {
        let request = OrderLineRequest {
            product_id: line.product_id,
            service_id: line.service_id,
            quantity: line.quantity,
            unit_price: None,
        };
        frozen.push(freeze_line(&txn, &request).await?);
    }
    let (order, items) = insert_order(&txn, user.user_id, frozen).await?;

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    let mut emptied: carts::ActiveModel = cart.into();
    emptied.total_price = Set(0);
    emptied.updated_at = Set(Utc::now().into());
    emptied.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_price": order.total_price })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status: OrderStatus = status
            .parse()
            .map_err(|e: String| AppError::BadRequest(e))?;
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    authorize(user, order.user_id, AccessRule::OwnerOrAdmin)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_order_items(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderItemList>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    authorize(user, order.user_id, AccessRule::OwnerOrAdmin)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderItemList { items },
        Some(Meta::empty()),
    ))
}

pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let next: OrderStatus = payload
        .status
        .parse()
        .map_err(|e: String| AppError::BadRequest(e))?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if !existing.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "cannot transition order from {} to {}",
            existing.status, next
        )));
    }

    let mut active: orders::ActiveModel = existing.into();
    active.status = Set(next);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status.as_str() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        Order::from(order),
        Some(Meta::empty()),
    ))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    authorize(user, order.user_id, AccessRule::OwnerOrAdmin)?;

    // Items and the payment record go with the order (FK cascade).
    Orders::delete_by_id(order.id).exec(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
