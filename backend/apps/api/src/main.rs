//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, http,
    http::{Method, header},
};
use chat::infra::json_file::JsonFileUsageStore;
use chat::infra::openai::OpenAiCompletionClient;
use chat::infra::postgres::PgUsageStore;
use chat::infra::scheduler::{spawn_limiter_pruning, spawn_usage_reporter, watch_task};
use chat::infra::webhook::{LogNotifier, NotifierBackend, WebhookNotifier};
use chat::{
    ChatAppState, DEFAULT_SYSTEM_PROMPT, SystemPromptCache, UsageCounter, UsageReporter,
    UsageStoreBackend, chat_router,
};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ApiConfig;

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,chat=info,platform=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env()?;

    // Usage store: Postgres when configured, JSON file otherwise
    let store = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;

            tracing::info!("Connected to database");

            sqlx::migrate!("../../../database/migrations")
                .run(&pool)
                .await?;

            tracing::info!("Migrations completed");

            UsageStoreBackend::Postgres(PgUsageStore::new(pool))
        }
        None => {
            let store = JsonFileUsageStore::new(&config.usage_store_path);
            tracing::info!(path = %store.path().display(), "Using JSON file usage store");
            UsageStoreBackend::File(store)
        }
    };
    tracing::info!(backend = store.name(), "Usage store selected");

    let counter = Arc::new(UsageCounter::new(store, config.chat.report_schedule));
    let window = counter.read_or_init(Utc::now()).await;
    tracing::info!(
        window_start = %window.window_start_timestamp,
        prompts_in_window = window.prompts_in_window,
        "Usage window loaded"
    );

    // Background tasks
    let notifier = match &config.report_webhook_url {
        Some(url) => NotifierBackend::Webhook(WebhookNotifier::new(url)?),
        None => {
            tracing::info!("REPORT_WEBHOOK_URL not set, usage reports will only be logged");
            NotifierBackend::Log(LogNotifier)
        }
    };
    let reporter = Arc::new(UsageReporter::new(counter.clone(), Arc::new(notifier)));
    tokio::spawn(watch_task("usage_reporter", spawn_usage_reporter(reporter)));

    let limiters = Arc::new(config.chat.limiter_chain());
    for (scope, policy) in limiters.policies() {
        tracing::info!(
            scope = %scope,
            max_requests = policy.max_requests,
            window_ms = policy.window_ms(),
            "Rate limit configured"
        );
    }
    tokio::spawn(watch_task(
        "limiter_pruning",
        spawn_limiter_pruning(limiters.clone()),
    ));

    // Chat state
    let client = OpenAiCompletionClient::new(config.openai.clone())?;
    tracing::info!(model = client.model(), "Completion client ready");

    let system_prompt = SystemPromptCache::new(
        config.system_prompt_file.clone(),
        DEFAULT_SYSTEM_PROMPT,
        config.chat.system_prompt_ttl,
    );

    let state = ChatAppState::new(
        Arc::new(client),
        counter,
        limiters,
        Arc::new(system_prompt),
        Arc::new(config.chat.clone()),
    );

    // Build router
    let app = Router::new()
        .merge(chat_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.frontend_origins.as_deref()));

    // Start server
    let addr = config.bind_addr;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Allow-list when origins are configured, any origin otherwise
fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let allow_origin = match origins {
        Some(origins) => {
            let allowed: Vec<http::HeaderValue> = origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            AllowOrigin::list(allowed)
        }
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE, header::ACCEPT]))
}
