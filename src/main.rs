use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use storefront_orderservice::{
    api::notifications::HttpNotifier,
    app_state::AppState,
    bootstrap, config, db,
    checkout::{order_number::RandomOrderNumbers, orders::CheckoutService},
    notifications::relay::{NotificationRelay, RetryPolicy},
    routes, swagger,
};
use tower_http::trace::TraceLayer;

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();
    bootstrap::init_tracing();

    let config = config::load()?;
    tracing::debug!(?config, "Loaded configuration");

    let routes = routes::carts::routes_with_openapi()
        .merge(routes::checkout::routes_with_openapi())
        .merge(routes::orders::routes_with_openapi())
        .merge(routes::shipping::routes_with_openapi());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Storefront OrderService API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi);

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    tracing::info!("Bootstrapping...");
    let db_pool = db::create_pool(&config.database).await?;

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;
    let notifier = HttpNotifier::new(http_client, config.notification_service_url.clone());

    let relay = NotificationRelay::new(
        db_pool.clone(),
        Arc::new(notifier),
        config.notification_batch_size,
        config.notification_poll_interval,
    )
    .with_retry_policy(RetryPolicy::from_base(config.notification_retry_base));
    let checkout = CheckoutService::new(
        db_pool.clone(),
        Arc::new(RandomOrderNumbers::new(config.order_number_prefix.clone())),
        relay.wakeup(),
    );
    let _relay = relay.spawn();

    let app = Router::new()
        .merge(routes)
        .merge(swagger_ui)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            db_pool,
            checkout: Arc::new(checkout),
        });

    bootstrap::serve("OrderService", config.server_port, app).await
}
