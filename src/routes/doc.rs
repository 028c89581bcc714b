use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginResponse, TwoFaEnabled},
        cart::{CartItemResponse, CartResponse},
        orders::{OrderItemList, OrderList, OrderWithItems},
        payments::PaymentInitiated,
        products::ProductList,
        services::ServiceList,
        service_requests::ServiceRequestList,
        users::UserList,
    },
    entity::statuses::{OrderStatus, PaymentStatus, RequestStatus},
    models::{Cart, CartItem, Order, OrderItem, Payment, Product, Service, ServiceRequest, User},
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, health, orders, params, payments, products, service_requests,
        services as service_routes, users,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::signup,
        auth::verify_email,
        auth::login,
        auth::request_password_reset,
        auth::confirm_password_reset,
        auth::enable_two_fa,
        auth::disable_two_fa,
        users::me,
        users::update_me,
        users::delete_user,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        service_routes::list_services,
        service_routes::get_service,
        service_routes::create_service,
        service_routes::update_service,
        service_routes::delete_service,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        orders::list_orders,
        orders::create_order,
        orders::checkout,
        orders::get_order,
        orders::list_order_items,
        orders::update_status,
        orders::delete_order,
        payments::initiate_mpesa,
        payments::mpesa_callback,
        payments::get_payment,
        service_requests::list_requests,
        service_requests::create_request,
        service_requests::get_request,
        service_requests::reschedule_request,
        service_requests::update_status,
        service_requests::delete_request,
        admin::list_users,
        admin::list_all_orders,
        admin::update_stock,
        admin::revenue_stats
    ),
    components(
        schemas(
            User,
            Product,
            Service,
            Cart,
            CartItem,
            Order,
            OrderItem,
            Payment,
            ServiceRequest,
            OrderStatus,
            PaymentStatus,
            RequestStatus,
            LoginResponse,
            TwoFaEnabled,
            CartResponse,
            CartItemResponse,
            OrderList,
            OrderWithItems,
            OrderItemList,
            PaymentInitiated,
            ProductList,
            ServiceList,
            ServiceRequestList,
            UserList,
            admin::UpdateStockRequest,
            admin::RevenueStats,
            params::Pagination,
            params::ProductQuery,
            params::ServiceQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<User>,
            ApiResponse<Product>,
            ApiResponse<Service>,
            ApiResponse<CartResponse>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentInitiated>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Users", description = "User profile endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Services", description = "Service catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payments", description = "Payment and reconciliation endpoints"),
        (name = "ServiceRequests", description = "Service booking endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
