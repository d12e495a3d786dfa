use std::sync::{Arc, Mutex};

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use frontdesk::config::AppConfig;
use frontdesk::db;
use frontdesk::handlers;
use frontdesk::services::ai::gateway::ChatGateway;
use frontdesk::services::notify::email::ResendEmailProvider;
use frontdesk::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.gateway_api_key.is_empty() {
        tracing::warn!("GATEWAY_API_KEY not set; chat requests will fail until it is configured");
    }
    let chat = ChatGateway::new(
        config.gateway_url.clone(),
        config.gateway_api_key.clone(),
        config.gateway_model.clone(),
    );
    let notifier = ResendEmailProvider::new(config.email_api_key.clone(), config.email_from.clone());

    let cors = match config.widget_origin.parse::<HeaderValue>() {
        Ok(origin) if !config.widget_origin.is_empty() => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        _ => CorsLayer::permissive(),
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        chat: Box::new(chat),
        notifier: Box::new(notifier),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/chat", post(handlers::chat::chat_stream))
        .route("/api/chat/select-day", post(handlers::chat::select_day))
        .route("/api/chat/select-slot", post(handlers::chat::select_slot))
        .route("/api/chat/book", post(handlers::chat::book))
        .route("/api/chat/dismiss", post(handlers::chat::dismiss))
        .route(
            "/api/availability/days",
            get(handlers::availability::get_days),
        )
        .route(
            "/api/availability/slots",
            get(handlers::availability::get_slots),
        )
        .route(
            "/api/admin/settings",
            get(handlers::admin::get_settings).put(handlers::admin::update_settings),
        )
        .route(
            "/api/admin/appointments",
            get(handlers::admin::list_appointments),
        )
        .route(
            "/api/admin/appointments/:id/cancel",
            post(handlers::admin::cancel_appointment),
        )
        .route(
            "/api/admin/appointments/:id/status",
            post(handlers::admin::finish_appointment),
        )
        .route("/api/admin/status", get(handlers::admin::get_status))
        .route(
            "/api/admin/blocked",
            get(handlers::admin::list_blocked).post(handlers::admin::create_blocked),
        )
        .route(
            "/api/admin/blocked/:id",
            delete(handlers::admin::delete_blocked),
        )
        .route(
            "/calendar/:appointment_id",
            get(handlers::calendar::download_ics),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
