use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::OrderList,
    dto::users::UserList,
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::{self, Entity as Products},
        statuses::OrderStatus,
        users::{Column as UserCol, Entity as Users},
    },
    error::AppError,
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, Product, User},
    response::{ApiResponse, Meta},
    routes::admin::{RevenueStats, UpdateStockRequest},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status: OrderStatus = status
            .parse()
            .map_err(|e: String| AppError::BadRequest(e))?;
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
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
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn update_stock(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateStockRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.stock_quantity < 0 {
        return Err(AppError::BadRequest(
            "stock_quantity must not be negative".to_string(),
        ));
    }

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: products::ActiveModel = existing.into();
    active.stock_quantity = Set(payload.stock_quantity);
    let product = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "stock_update",
        Some("products"),
        Some(serde_json::json!({
            "product_id": product.id,
            "stock_quantity": product.stock_quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Stock updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

/// Raw-SQL aggregate over approved orders.
pub async fn revenue_stats(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<RevenueStats>> {
    ensure_admin(user)?;

    #[derive(FromRow)]
    struct RevenueRow {
        total_revenue: i64,
        total_orders: i64,
    }

    // SUM over BIGINT widens to NUMERIC in Postgres, hence the cast back.
    let row: RevenueRow = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(total_price), 0)::BIGINT AS total_revenue,
               COUNT(*) AS total_orders
        FROM orders
        WHERE status = 'approved'
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Revenue stats",
        RevenueStats {
            total_revenue: row.total_revenue,
            total_orders: row.total_orders,
        },
        Some(Meta::empty()),
    ))
}
