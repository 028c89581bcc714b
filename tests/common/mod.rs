#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

use vetcare_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    entity::{products, services, users},
    mailer::{Mailer, MailerError},
    mpesa::{PaymentProvider, ProviderError, StkPushResponse},
    state::AppState,
};

/// Accepts every initiation and hands out sequential transaction ids.
pub struct StubProvider {
    counter: AtomicU64,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl PaymentProvider for StubProvider {
    async fn initiate_stk_push(
        &self,
        _phone_number: &str,
        _amount: i64,
        _account_reference: &str,
        _transaction_desc: &str,
    ) -> Result<StkPushResponse, ProviderError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(StkPushResponse {
            merchant_request_id: Some(format!("MR-{n}")),
            checkout_request_id: format!("ws_CO_TEST_{n}"),
            response_description: Some("Success. Request accepted for processing".into()),
            customer_message: None,
        })
    }
}

pub struct FailingProvider;

#[async_trait]
impl PaymentProvider for FailingProvider {
    async fn initiate_stk_push(
        &self,
        _phone_number: &str,
        _amount: i64,
        _account_reference: &str,
        _transaction_desc: &str,
    ) -> Result<StkPushResponse, ProviderError> {
        Err(ProviderError::Rejected("provider unavailable".into()))
    }
}

/// Records every message instead of delivering it.
#[derive(Default)]
pub struct StubMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl Mailer for StubMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailerError> {
        self.sent
            .lock()
            .expect("mailer lock")
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), MailerError> {
        Err(MailerError::Rejected("mail relay unavailable".into()))
    }
}

/// Connect, migrate and wipe the test database.
pub async fn setup_state(
    database_url: &str,
    payments: Arc<dyn PaymentProvider>,
    mailer: Arc<dyn Mailer>,
) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE audit_logs, payments, order_items, orders, cart_items, carts, \
         service_requests, products, services, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        payments,
        mailer,
    })
}

/// Database URL from the environment, or `None` to skip the test.
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

pub async fn create_user(
    state: &AppState,
    role: &str,
    username: &str,
    email: &str,
) -> anyhow::Result<Uuid> {
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.to_string()),
        is_verified: Set(true),
        verification_code: Set(None),
        verification_expires_at: Set(None),
        reset_code: Set(None),
        reset_expires_at: Set(None),
        two_fa_secret: Set(None),
        two_fa_enabled: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    stock_quantity: i32,
) -> anyhow::Result<products::Model> {
    let product = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(Some("A product for testing".into())),
        price: Set(price),
        image_url: Set(String::new()),
        category: Set("test".into()),
        stock_quantity: Set(stock_quantity),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product)
}

pub async fn create_service(
    state: &AppState,
    name: &str,
    price: i64,
) -> anyhow::Result<services::Model> {
    let service = services::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(Some("A service for testing".into())),
        price: Set(price),
        duration_minutes: Set(30),
        image_url: Set(String::new()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(service)
}
