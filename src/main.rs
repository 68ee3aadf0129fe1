use library_borrowing::{
    adapters::{
        mock::NotificationSink as LogNotificationSink, postgres::PostgresBorrowingStore,
        stripe::StripePaymentGateway, telegram::TelegramNotificationSink,
    },
    api::{handlers::AppState, router::create_router},
    application::borrowing::{ServiceDependencies, spawn_sweeps},
    config::AppConfig,
    ports::NotificationSink,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_borrowing=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // Initialize database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // Initialize adapters
    let store = Arc::new(PostgresBorrowingStore::new(pool));
    let payment_gateway = Arc::new(StripePaymentGateway::new(
        config.stripe_secret_key.clone(),
        config.base_url.clone(),
    )?);
    let notification_sink: Arc<dyn NotificationSink> = match &config.telegram {
        Some(telegram) => Arc::new(TelegramNotificationSink::new(
            &telegram.token,
            telegram.chat_id.clone(),
        )?),
        None => {
            tracing::warn!("TG_TOKEN/CHAT_ID not set, notifications are only logged");
            Arc::new(LogNotificationSink::log_only())
        }
    };

    // Create service dependencies
    let service_deps = ServiceDependencies {
        store,
        payment_gateway,
        notification_sink,
        currency: config.payment_currency.clone(),
    };

    // Background sweeps (overdue check, payment session expiration)
    let sweeps = spawn_sweeps(
        service_deps.clone(),
        config.overdue_check_interval,
        config.session_check_interval,
    );

    // Create application state
    let app_state = Arc::new(AppState { service_deps });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    let result = axum::serve(listener, app).await;
    sweeps.abort();
    result?;

    Ok(())
}
