mod common;

use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;
use vetcare_api::{
    dto::cart::{AddCartItemRequest, UpdateCartItemRequest},
    dto::orders::{CreateOrderRequest, OrderLineRequest, UpdateOrderStatusRequest},
    dto::products::UpdateProductRequest,
    entity::{orders::Column as OrderCol, orders::Entity as Orders},
    entity::statuses::OrderStatus,
    error::AppError,
    middleware::auth::AuthUser,
    routes::params::{OrderListQuery, Pagination},
    services::{admin_service, cart_service, order_service, product_service},
};

use common::{StubMailer, StubProvider, create_product, create_service, create_user, setup_state,
    test_database_url};

// Integration flow: cart recompute invariant -> checkout -> frozen order
// prices -> creation atomicity -> ownership checks -> status transitions.
#[tokio::test]
async fn cart_checkout_and_order_lifecycle_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match test_database_url() {
        Some(url) => url,
        None => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(
        &database_url,
        Arc::new(StubProvider::new()),
        Arc::new(StubMailer::default()),
    )
    .await?;

    let user_id = create_user(&state, "user", "owner", "owner@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin", "admin@example.com").await?;
    let stranger_id = create_user(&state, "user", "stranger", "stranger@example.com").await?;

    let product = create_product(&state, "Dog Food", 1000, 10).await?;
    let service = create_service(&state, "Grooming", 500).await?;

    let owner = AuthUser {
        user_id,
        role: "user".into(),
    };
    let admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };
    let stranger = AuthUser {
        user_id: stranger_id,
        role: "user".into(),
    };

    // Product x2 -> 2000.
    let added = cart_service::add_line(
        &state,
        &owner,
        AddCartItemRequest {
            product_id: Some(product.id),
            service_id: None,
            quantity: 2,
        },
    )
    .await?;
    let added = added.data.unwrap();
    assert_eq!(added.cart_total, 2000);

    // Plus service x1 -> 2500.
    let service_line = cart_service::add_line(
        &state,
        &owner,
        AddCartItemRequest {
            product_id: None,
            service_id: Some(service.id),
            quantity: 1,
        },
    )
    .await?;
    let service_line = service_line.data.unwrap();
    assert_eq!(service_line.cart_total, 2500);

    // Quantity update recomputes.
    let updated = cart_service::update_line(
        &state,
        &owner,
        added.item.id,
        UpdateCartItemRequest { quantity: 3 },
    )
    .await?;
    assert_eq!(updated.data.unwrap().cart_total, 3500);
    let updated = cart_service::update_line(
        &state,
        &owner,
        added.item.id,
        UpdateCartItemRequest { quantity: 2 },
    )
    .await?;
    assert_eq!(updated.data.unwrap().cart_total, 2500);

    // Removing the service line drops the total back.
    cart_service::remove_line(&state, &owner, service_line.item.id).await?;
    let cart = cart_service::get_cart(&state, &owner).await?.data.unwrap();
    assert_eq!(cart.cart.total_price, 2000);
    assert_eq!(cart.items.len(), 1);

    // A stranger cannot touch someone else's cart line.
    let forbidden = cart_service::update_line(
        &state,
        &stranger,
        added.item.id,
        UpdateCartItemRequest { quantity: 1 },
    )
    .await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    // Both-or-neither reference is rejected.
    let both = cart_service::add_line(
        &state,
        &owner,
        AddCartItemRequest {
            product_id: Some(product.id),
            service_id: Some(service.id),
            quantity: 1,
        },
    )
    .await;
    assert!(matches!(both, Err(AppError::BadRequest(_))));
    let neither = cart_service::add_line(
        &state,
        &owner,
        AddCartItemRequest {
            product_id: None,
            service_id: None,
            quantity: 1,
        },
    )
    .await;
    assert!(matches!(neither, Err(AppError::BadRequest(_))));

    // Checkout freezes prices and clears the cart.
    let checkout = order_service::checkout(&state, &owner).await?.data.unwrap();
    assert_eq!(checkout.order.total_price, 2000);
    assert_eq!(checkout.items.len(), 1);
    assert_eq!(checkout.items[0].unit_price, 1000);
    let cart = cart_service::get_cart(&state, &owner).await?.data.unwrap();
    assert_eq!(cart.cart.total_price, 0);
    assert!(cart.items.is_empty());

    // Catalog price change does not touch the frozen order total.
    product_service::update_product(
        &state,
        &admin,
        product.id,
        UpdateProductRequest {
            name: None,
            description: None,
            price: Some(1500),
            image_url: None,
            category: None,
            stock_quantity: None,
        },
    )
    .await?;
    let fetched = order_service::get_order(&state, &owner, checkout.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.order.total_price, 2000);
    assert_eq!(fetched.items[0].unit_price, 1000);

    // But a fresh cart total follows the live price.
    cart_service::add_line(
        &state,
        &owner,
        AddCartItemRequest {
            product_id: Some(product.id),
            service_id: None,
            quantity: 2,
        },
    )
    .await
    .map(|resp| assert_eq!(resp.data.unwrap().cart_total, 3000))?;
    cart_service::clear_cart(&state, &owner).await?;

    // One bad line rolls back the whole order.
    let before = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .all(&state.orm)
        .await?
        .len();
    let atomic = order_service::create_order(
        &state,
        &owner,
        CreateOrderRequest {
            items: vec![
                OrderLineRequest {
                    product_id: Some(product.id),
                    service_id: None,
                    quantity: 1,
                    unit_price: None,
                },
                OrderLineRequest {
                    product_id: Some(product.id),
                    service_id: None,
                    quantity: 0,
                    unit_price: None,
                },
            ],
        },
    )
    .await;
    assert!(matches!(atomic, Err(AppError::BadRequest(_))));
    let after = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .all(&state.orm)
        .await?
        .len();
    assert_eq!(before, after, "failed order creation must write nothing");

    // Unknown catalog reference rolls back too.
    let unknown = order_service::create_order(
        &state,
        &owner,
        CreateOrderRequest {
            items: vec![OrderLineRequest {
                product_id: Some(Uuid::new_v4()),
                service_id: None,
                quantity: 1,
                unit_price: None,
            }],
        },
    )
    .await;
    assert!(matches!(unknown, Err(AppError::BadRequest(_))));

    // Supplied unit_price wins over the live catalog price.
    let explicit = order_service::create_order(
        &state,
        &owner,
        CreateOrderRequest {
            items: vec![OrderLineRequest {
                product_id: Some(product.id),
                service_id: None,
                quantity: 2,
                unit_price: Some(1000),
            }],
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(explicit.order.total_price, 2000);

    // Ownership: a stranger sees Forbidden, not the order.
    let forbidden = order_service::get_order(&state, &stranger, checkout.order.id).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));
    // The admin may read it.
    order_service::get_order(&state, &admin, checkout.order.id).await?;

    // Only admins change status, and only along the transition table.
    let not_admin = order_service::update_status(
        &state,
        &owner,
        checkout.order.id,
        UpdateOrderStatusRequest {
            status: "approved".into(),
        },
    )
    .await;
    assert!(matches!(not_admin, Err(AppError::Forbidden)));

    let unknown_status = order_service::update_status(
        &state,
        &admin,
        checkout.order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
        },
    )
    .await;
    assert!(matches!(unknown_status, Err(AppError::BadRequest(_))));

    let approved = order_service::update_status(
        &state,
        &admin,
        checkout.order.id,
        UpdateOrderStatusRequest {
            status: "approved".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(approved.status, OrderStatus::Approved);

    let terminal = order_service::update_status(
        &state,
        &admin,
        checkout.order.id,
        UpdateOrderStatusRequest {
            status: "disapproved".into(),
        },
    )
    .await;
    assert!(matches!(terminal, Err(AppError::Conflict(_))));

    // Admin listing and revenue across the approved order.
    let all = admin_service::list_all_orders(
        &state,
        &admin,
        OrderListQuery {
            pagination: Pagination {
                page: Some(1),
                per_page: Some(20),
            },
            status: Some("approved".into()),
            sort_order: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert!(all.items.iter().any(|o| o.id == checkout.order.id));

    let stats = admin_service::revenue_stats(&state, &admin).await?.data.unwrap();
    assert_eq!(stats.total_revenue, 2000);
    assert_eq!(stats.total_orders, 1);

    Ok(())
}
