//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, GeminiAnswerAdapter, JsonFileAdapter, OpenAiAnswerAdapter},
    config::{AnswerProvider, Config},
    error::ApiError,
    web::{
        attachment_content_handler, create_session_handler, delete_attachment_handler,
        delete_session_handler, feedback_handler, list_attachments_handler,
        list_sessions_handler,
        persistence_task::{persistence_process, restore},
        rest::ApiDoc,
        state::AppState,
        upload_attachment_handler, ws_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use research_assistant_core::{
    ports::{AnswerService, SessionRepository},
    store::SessionStore,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Choose the Session Repository ---
    let repository: Arc<dyn SessionRepository> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            info!(
                "DATABASE_URL not set. Persisting sessions to {}.",
                config.sessions_path.display()
            );
            Arc::new(JsonFileAdapter::new(config.sessions_path.clone()))
        }
    };

    // --- 3. Restore Sessions & Start Persisting Changes ---
    let sessions = restore(repository.as_ref()).await;
    let store = Arc::new(SessionStore::new(sessions));
    tokio::spawn(persistence_process(repository, store.subscribe()));

    // --- 4. Initialize the Answer Adapter ---
    let answer_adapter: Arc<dyn AnswerService> = match config.answer_provider {
        AnswerProvider::Gemini => {
            let api_key = config
                .gemini_api_key
                .as_ref()
                .ok_or_else(|| ApiError::Internal("GEMINI_API_KEY is required".to_string()))?;
            Arc::new(GeminiAnswerAdapter::new(api_key.clone()))
        }
        AnswerProvider::OpenAi => {
            let openai_config = OpenAIConfig::new().with_api_key(
                config
                    .openai_api_key
                    .as_ref()
                    .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
            );
            Arc::new(OpenAiAnswerAdapter::new(
                Client::with_config(openai_config),
                config.openai_model.clone(),
            ))
        }
    };
    info!("Answering with {:?}.", config.answer_provider);

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(config.clone(), store, answer_adapter));

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    let api_router = Router::new()
        .route(
            "/sessions",
            get(list_sessions_handler).post(create_session_handler),
        )
        .route("/sessions/{id}", delete(delete_session_handler))
        .route(
            "/sessions/{id}/messages/{message_id}/feedback",
            post(feedback_handler),
        )
        .route(
            "/sessions/{id}/messages/{message_id}/attachments/{attachment_id}",
            get(attachment_content_handler),
        )
        .route(
            "/attachments",
            get(list_attachments_handler).post(upload_attachment_handler),
        )
        .route("/attachments/{id}", delete(delete_attachment_handler))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
