use anyhow::{Context, Result};
use clap::Parser;
use convo_relay::cli::{Cli, Commands};
use convo_relay::http::{build_router, AppState};
use convo_relay::storage::{ConversationLog, FileConversationLog};
use convo_relay::{build_relay, utils, ChatRequest, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new().context("Failed to load configuration")?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => handle_serve(settings, host, port).await,
        Commands::Chat {
            message,
            name,
            phone,
        } => handle_chat(settings, message, name, phone).await,
        Commands::LogCount => handle_log_count(settings).await,
    }
}

async fn handle_serve(settings: Settings, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let relay = build_relay(&settings).await?;
    let router = build_router(AppState::new(relay));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {}", addr))?;

    tracing::info!("✅ Relay running on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("🔻 Relay stopped");
    Ok(())
}

async fn handle_chat(
    settings: Settings,
    message: String,
    name: Option<String>,
    phone: Option<String>,
) -> Result<()> {
    utils::print_info("Sending request...");

    let relay = build_relay(&settings).await?;
    let request = ChatRequest {
        caller_name: name,
        caller_phone: phone,
        message,
        session_id: None,
    };

    match relay.handle_chat(&request).await {
        Ok(reply) => {
            println!("\n{}", reply.reply);
            Ok(())
        }
        Err(e) => {
            utils::print_error(&format!("Chat service failed: {}", e));
            Err(e.into())
        }
    }
}

async fn handle_log_count(settings: Settings) -> Result<()> {
    let log = FileConversationLog::new(settings.log.path.clone()).await?;
    let records = log.records().await?;

    utils::print_success(&format!(
        "{} conversations in {:?}",
        records.len(),
        log.path()
    ));
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
