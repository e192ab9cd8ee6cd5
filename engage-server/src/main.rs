use std::net::SocketAddr;
use std::sync::Arc;

use engage_server::{
    api,
    clients::{SlackClient, UnipileClient},
    config::Settings,
    db::{repositories::ReviewRepository, Database},
    pacing::Pacer,
    review::ReviewMachine,
    state::AppState,
    worker::DecisionQueue,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "engage_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load settings; missing credentials abort before anything starts
    let settings = Settings::new().expect("Failed to load settings");
    if let Err(e) = settings.ensure_server_ready() {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }

    // Initialize database
    let db = Database::new(&settings.database.path).expect("Failed to create database");
    db.initialize()
        .expect("Failed to initialize database schema");
    tracing::info!("Database initialized successfully");

    // External collaborators
    let publisher = UnipileClient::new(&settings.unipile).expect("Failed to build Unipile client");
    let notifier = SlackClient::new(&settings.slack).expect("Failed to build Slack client");

    let machine = ReviewMachine::new(
        ReviewRepository::new(db.pool.clone()),
        Arc::new(publisher),
        Arc::new(notifier),
        Pacer::new(settings.pacing.clone()),
        settings.run.dry_run,
    );
    if settings.run.dry_run {
        tracing::warn!("DRY RUN: approved comments are recorded but never published");
    }

    // Decision workers
    let (queue, dispatcher) = DecisionQueue::start(
        machine,
        settings.workers.queue_capacity,
        settings.workers.concurrency,
    );

    let app = api::router(AppState::new(db, queue));

    // Start server
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .expect("Failed to parse server address");
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // The router (and with it the queue sender) is gone; let in-flight decisions finish
    tracing::info!("Waiting for in-flight decisions");
    if let Err(e) = dispatcher.await {
        tracing::error!("Decision dispatcher panicked: {}", e);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
