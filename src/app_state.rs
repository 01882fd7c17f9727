use std::sync::Arc;

use crate::{checkout::orders::CheckoutService, db::DbPool};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub checkout: Arc<CheckoutService>,
}
