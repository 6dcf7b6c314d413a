//! Bot entry point.
//!
//! Registers the bundled plugins, prints the intents they need, and replays
//! gateway frames (one JSON object per line on stdin) through the bus. Point a
//! websocket dump at it to see which handlers fire:
//!
//! ```text
//! RUST_LOG=debug discord_event_bus < frames.ndjson
//! ```

use std::io::{self, BufRead};
use std::process::ExitCode;

use tracing::{error, info, warn};

use discord_event_bus::handlers::{MemberGreeter, MessageLogger, TypingWatcher};
use discord_event_bus::{gateway, Bot, BotConfig, Error, GatewayPayload};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    dotenv::dotenv().ok();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "bot failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;
    let bot = Bot::new(config)
        .with_plugin(MessageLogger::new())?
        .with_plugin(MemberGreeter::new())?
        .with_plugin(TypingWatcher::new())?;

    let intents = bot.intents();
    info!(
        bits = intents.bits(),
        intents = %intents,
        plugins = ?bot.plugin_names(),
        "subscriptions registered"
    );

    match bot.gateway_config() {
        Ok(gateway_config) => info!(
            url = %gateway::gateway_url("wss://gateway.discord.gg"),
            identify = %gateway_config.redacted(),
            "identify payload"
        ),
        Err(Error::MissingToken) => warn!("DISCORD_TOKEN not set; skipping IDENTIFY"),
        Err(e) => return Err(e.into()),
    }

    let mut frames = 0u64;
    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let frame: GatewayPayload = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping malformed frame");
                continue;
            }
        };

        frames += 1;
        if let Some(dispatched) = bot.handle_payload(&frame) {
            info!(
                event = %dispatched.event,
                handled = dispatched.delivery.handled,
                failed = dispatched.delivery.failed,
                "dispatched"
            );
        }
    }

    info!(frames, "input exhausted");
    Ok(())
}
