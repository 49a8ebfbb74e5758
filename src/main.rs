use std::sync::Arc;

use mailgate::block::SenderRules;
use mailgate::config::RelayConfig;
use mailgate::forward::SmtpForwarder;
use mailgate::intake::Intake;
use mailgate::notify::TelegramNotifier;
use mailgate::store::MemoryStatusStore;
use mailgate::web::{AppState, app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = RelayConfig::from_env();

    let port: u16 = std::env::var("MAILGATE_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        guardian = config.guardian,
        recipients = config.forward_to.len(),
        "mailgate starting"
    );

    let intake = Intake::new(
        Arc::new(MemoryStatusStore::new()),
        Arc::new(SenderRules),
        Arc::new(SmtpForwarder::new(config.smtp.clone())),
        Arc::new(TelegramNotifier::new()),
    );

    let state = AppState {
        intake: Arc::new(intake),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Listening on 0.0.0.0:{port}");
    axum::serve(listener, app(state)).await?;

    Ok(())
}
