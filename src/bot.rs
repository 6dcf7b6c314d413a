//! The top-level bot object: owns the event bus and the plugins.
//!
//! Startup happens in two phases:
//!   1. plugins are added one by one; each `init` subscribes its handlers on
//!      the shared [`EventBus`];
//!   2. [`Bot::gateway_config`] snapshots the resulting intents into the
//!      IDENTIFY payload, after which frames are fed to
//!      [`Bot::handle_payload`].
//!
//! Subscribing after phase 2 works but the new events' intents were not
//! requested, so Discord may never send them.

use tracing::{debug, info, trace, warn};

use crate::bus::{Delivery, EventBus};
use crate::config::BotConfig;
use crate::error::Error;
use crate::events::EventName;
use crate::gateway::{self, GatewayConfig, GatewayPayload};
use crate::intents::Intents;

/// A unit of bot behaviour that registers handlers at startup.
pub trait Plugin: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Subscribe this plugin's handlers.
    fn init(&self, bus: &EventBus) -> anyhow::Result<()>;
}

pub struct Bot {
    config: BotConfig,
    bus: EventBus,
    plugins: Vec<Box<dyn Plugin>>,
}

impl Bot {
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            bus: EventBus::new(),
            plugins: Vec::new(),
        }
    }

    /// Builder form of [`add_plugin`](Self::add_plugin).
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Result<Self, Error> {
        self.add_plugin(plugin)?;
        Ok(self)
    }

    /// Run `plugin.init` against the bus and keep the plugin.
    ///
    /// A failing `init` is reported and the plugin is dropped together with
    /// every handler it subscribed before failing.
    pub fn add_plugin(&mut self, plugin: impl Plugin + 'static) -> Result<(), Error> {
        let name = plugin.name().to_string();
        let mark = self.bus.next_subscription_id();
        if let Err(source) = plugin.init(&self.bus) {
            let removed = self.bus.unsubscribe_from(mark);
            warn!(plugin = %name, removed, "plugin init failed; handlers removed");
            return Err(Error::PluginInit {
                plugin: name,
                source,
            });
        }
        debug!(plugin = %name, "plugin initialised");
        self.plugins.push(Box::new(plugin));
        Ok(())
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Names of the plugins added so far, in order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Intents to request: everything the subscriptions need plus the
    /// configured extras.
    pub fn intents(&self) -> Intents {
        self.bus.calculate_intents() | self.config.extra_intents
    }

    /// IDENTIFY options for the current subscriptions.
    pub fn gateway_config(&self) -> Result<GatewayConfig, Error> {
        let token = self.config.token.clone().ok_or(Error::MissingToken)?;
        let intents = self.intents();
        if intents.is_privileged() {
            info!(
                privileged = %intents.privileged(),
                "privileged intents requested; they must be enabled for the application"
            );
        }
        Ok(GatewayConfig {
            token,
            intents,
            shard: self.config.shard,
        })
    }

    /// Publish a received frame on the bus.
    ///
    /// Returns `None` when the frame is not a dispatch the bus knows about.
    pub fn handle_payload(&self, frame: &GatewayPayload) -> Option<Dispatched> {
        let Some(route) = gateway::route(frame) else {
            match frame.t.as_deref() {
                Some(name) => trace!(event = %name, "unhandled gateway event"),
                None => trace!(op = frame.op, "non-dispatch frame"),
            }
            return None;
        };

        let delivery = self.bus.publish(route.event, route.payload);
        if delivery.failed > 0 {
            warn!(
                event = %route.event,
                failed = delivery.failed,
                handled = delivery.handled,
                "some handlers failed"
            );
        }
        Some(Dispatched {
            event: route.event,
            delivery,
        })
    }
}

/// A frame [`Bot::handle_payload`] published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    /// Event the frame was published under, after guild/DM routing.
    pub event: EventName,
    pub delivery: Delivery,
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("plugins", &self.plugin_names())
            .field("bus", &self.bus)
            .field("shard", &self.config.shard)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
