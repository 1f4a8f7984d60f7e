use std::sync::Arc;

use anyhow::Context;

use email_triage::config::ServiceConfig;
use email_triage::llm::create_provider;
use email_triage::logging;
use email_triage::pipeline::classifier::Classifier;
use email_triage::routes::app_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Refuse to start without the inference credential.
    let config = ServiceConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export OPENAI_API_KEY=sk-...");
        std::process::exit(1);
    });

    let _log_guard = logging::init(config.log_dir.as_deref())
        .context("failed to initialize logging")?;

    eprintln!("📨 Email Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   API: http://{}/process", config.bind_addr());
    if let Some(ref dir) = config.log_dir {
        eprintln!("   Log dir: {}", dir.display());
    }

    let llm = create_provider(&config.llm).context("failed to create LLM provider")?;
    let classifier = Arc::new(Classifier::new(llm));
    let app = app_routes(classifier, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    tracing::info!(addr = %config.bind_addr(), "Email triage server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
