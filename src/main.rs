use axum::{
    routing::{get, patch, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meishi_sfa_api::config::Config;
use meishi_sfa_api::gemini::GeminiClient;
use meishi_sfa_api::handlers::{self, AppState};
use meishi_sfa_api::notify::Notifier;
use meishi_sfa_api::store::MemoryStore;

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the record table, the Gemini client,
/// and the industry-analysis cache, then serves the HTTP surface. Batch
/// passes are triggered through their endpoints by the external scheduler.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meishi_sfa_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // The in-process record table. Synchronisation with the external sheet
    // is handled outside this service.
    let store = Arc::new(MemoryStore::new());
    tracing::info!("Record table initialized");

    let gemini = Arc::new(GeminiClient::new(&config).map_err(|e| anyhow::anyhow!("{}", e))?);
    tracing::info!(
        "Gemini client initialized: {} (model {})",
        config.gemini_base_url,
        config.gemini_model
    );

    let notifier = Notifier::new(&config).map_err(|e| anyhow::anyhow!("{}", e))?;

    // Industry analyses are expensive and batch passes revisit the same
    // companies; cache successful answers for an hour.
    let analysis_cache = Cache::builder()
        .time_to_live(Duration::from_secs(3600))
        .max_capacity(10_000)
        .build();
    tracing::info!("Industry analysis cache initialized (1h TTL, 10k capacity)");

    let app_state = Arc::new(AppState {
        config: config.clone(),
        store,
        gemini,
        notifier,
        analysis_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/cards", post(handlers::register_cards))
        .route("/api/v1/records", get(handlers::list_records))
        .route("/api/v1/records/:row", patch(handlers::update_record))
        .route("/api/v1/dashboard", get(handlers::dashboard))
        .route("/api/v1/batch/dormant", post(handlers::run_dormant_batch))
        .route("/api/v1/batch/similar", post(handlers::run_similar_batch))
        .layer(
            ServiceBuilder::new()
                // Card uploads carry base64 images; cap the payload at 10MB
                .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting for the platform prober
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
