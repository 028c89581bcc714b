use std::sync::Arc;

use crate::{
    db::{DbPool, OrmConn},
    mailer::Mailer,
    mpesa::PaymentProvider,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub payments: Arc<dyn PaymentProvider>,
    pub mailer: Arc<dyn Mailer>,
}
