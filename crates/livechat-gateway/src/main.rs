//! Livechat gateway demo
//!
//! Run with:
//! ```bash
//! cargo run -p livechat-gateway
//! ```
//!
//! Connects with the bot credentials from the environment, registers one
//! guest, sends a greeting as that guest, and logs whatever arrives in the
//! guest's room until Ctrl-C.

use livechat_common::{try_init_tracing, try_init_tracing_with_config, AppConfig, TracingConfig};
use livechat_core::{GuestDetails, LivechatMessage, MessageMeta};
use livechat_gateway::LivechatGateway;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Load configuration first so LOG_LEVEL applies to tracing
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            if let Err(e) = try_init_tracing() {
                eprintln!("Warning: Failed to initialize tracing: {e}");
            }
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::from_log_config(&config.log, config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Livechat gateway failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        app = %config.app.name,
        env = ?config.app.env,
        backend = %config.backend.websocket_url(),
        department = ?config.livechat.department,
        "Starting livechat gateway..."
    );

    let gateway = LivechatGateway::from_config(&config);
    gateway.connect().await?;

    let room_key = gateway
        .register_guest(
            GuestDetails::new("test guest"),
            |message: &LivechatMessage, _meta: &MessageMeta| {
                warn!("msg for guest from {}: {}", message.sender_username(), message.msg);
            },
        )
        .await?;

    let sent = gateway.send_message(&room_key, "hello test").await?;
    info!(room = %room_key, message_id = %sent.id, "Greeting sent");

    let outcome = tokio::select! {
        result = gateway.closed() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    };

    gateway.shutdown().await;
    outcome?;

    Ok(())
}
