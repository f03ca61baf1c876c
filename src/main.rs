use std::sync::Arc;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use study_system::{
    api::{create_router, AppState},
    config::Config,
    database::Database,
    deck_service::DeckService,
    generator::ItemGenerator,
    ingestion::{IngestionPipeline, IngestionSettings},
    llm_providers::LlmProvider,
    log_system_event,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _guard = setup_logging(&config)?;
    config.validate()?;

    log_system_event!(startup, component = "server", "Starting study system server");

    let db = Database::new(&config.database.url).await?;
    info!("Database initialized successfully");

    let provider = LlmProvider::new(
        config.llm.provider,
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
    );
    info!(
        provider = ?config.llm.provider,
        model = provider.model_name(),
        "Initialized completion provider"
    );

    let generator = ItemGenerator::new(Arc::new(provider));
    let deck_service = DeckService::new(db.clone());
    let pipeline = IngestionPipeline::new(
        db,
        generator.clone(),
        IngestionSettings::from(&config.ingestion),
    );

    let state = AppState {
        deck_service,
        pipeline,
        generator,
    };

    let app = create_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    log_system_event!(shutdown, component = "server", "Server stopped");
    Ok(())
}

fn setup_logging(config: &Config) -> Result<WorkerGuard> {
    use std::fs;
    use tracing_subscriber::fmt;

    fs::create_dir_all(&config.logging.log_directory).unwrap_or_else(|e| {
        eprintln!("Warning: Could not create logs directory: {}", e);
    });

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // Daily-rotated file output alongside the console.
    let file_appender =
        tracing_appender::rolling::daily(&config.logging.log_directory, "study-system.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(non_blocking_file);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        directory = %config.logging.log_directory,
        "Logging initialized with daily rotation"
    );

    Ok(guard)
}
