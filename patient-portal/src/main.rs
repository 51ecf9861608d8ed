use anyhow::Context;
use patient_portal::{PortalConfig, create_app};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// JSON logs unless `LOG_FORMAT=pretty`; levels from `RUST_LOG`.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "patient_portal=debug,triage_flow=debug,tower_http=info".into());

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = PortalConfig::from_env().context("invalid portal configuration")?;
    let port = config.port;
    let app = create_app(config);

    let listener = TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("cannot bind port {port}"))?;
    let addr = listener.local_addr()?;

    info!("Patient triage portal listening on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Open a session: POST http://{}/sessions", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
