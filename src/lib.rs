pub mod adapters;
pub mod domain;
pub mod infra;
pub mod services;

use std::sync::Arc;

use domain::gateway::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub stripe_webhook_secret: Arc<str>,
    pub gateway: Arc<dyn PaymentGateway>,
}
