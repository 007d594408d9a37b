use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use quantflow::api::routes::{router, ApiState};
use quantflow::api::{HealthState, LatencyStats};
use quantflow::config::Config;
use quantflow::error::Result;
use quantflow::gemini::GeminiClient;
use quantflow::screener::Screener;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Model backend: a missing credential stops startup ---
    let client = GeminiClient::new(cfg.gemini_settings())?;
    let model = client.model().to_string();
    info!(
        model = %model,
        base_url = %cfg.gemini_api_url,
        timeout_secs = cfg.gemini_timeout_secs,
        "Gemini backend ready"
    );

    // --- HTTP API server ---
    let api_state = ApiState {
        screener: Arc::new(Screener::new(client)),
        health: Arc::new(HealthState::new()),
        latency: Arc::new(LatencyStats::new()),
        model,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
