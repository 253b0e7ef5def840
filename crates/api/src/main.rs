//! Subscription service API binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use subscribe_common::config::AppConfig;
use subscribe_notifier::{
    HttpMailTransport, LogTransport, MailSender, MailTransport, ManualGenerator, Pipeline,
    PipelineConfig,
};

use subscribe_api::catalog::PlanCatalog;
use subscribe_api::routes::create_router;
use subscribe_api::signals::watch_termination;
use subscribe_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("subscribe_api=debug,subscribe_notifier=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting subscription service...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Mail transport: HTTP API when configured, log output otherwise
    let sender = MailSender {
        domain: config.mail_domain.clone(),
        from_name: config.mail_from_name.clone(),
        from_address: config.mail_from_address.clone(),
    };
    let transport: Arc<dyn MailTransport> = match &config.mail_api_url {
        Some(url) => Arc::new(HttpMailTransport::new(
            url.clone(),
            config.mail_api_key.clone(),
            sender,
        )),
        None => {
            tracing::warn!("MAIL_API_URL not set, mail will only be logged");
            Arc::new(LogTransport::new(sender))
        }
    };
    let documents = Arc::new(ManualGenerator::new(Duration::from_millis(
        config.document_render_delay_ms,
    )));

    // Start the fulfillment pipeline
    let pipeline = Pipeline::start(PipelineConfig::from(&config), transport, documents);

    // Build application state
    let state = AppState::new(pipeline.coordinator(), PlanCatalog::seeded());

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Watch for termination: OS signal or fatal failure
    let terminate = CancellationToken::new();
    tokio::spawn(watch_termination(terminate.clone(), pipeline.halted()));

    // Start server; stops accepting requests once termination fires
    let addr = SocketAddr::from(([0, 0, 0, 0], config.web_port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(terminate.cancelled_owned())
        .await;

    // Drain in-flight fulfillment work, then release the pipeline
    let report = pipeline.shutdown().await?;
    served?;
    if report.halted {
        anyhow::bail!(
            "service halted after {} fulfillment failure(s)",
            report.failures_aggregated
        );
    }

    tracing::info!("Subscription service stopped.");
    Ok(())
}
