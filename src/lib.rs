//! Named-event bus for a Discord gateway client.
//!
//! Plugins subscribe handlers to [`EventName`]s on an [`EventBus`]. The union
//! of the subscribed events' [`Intents`] is what the client requests in its
//! IDENTIFY payload, so Discord sends exactly the events someone listens to.
//! Inbound dispatch frames are routed by [`gateway::route`] (which also
//! splits guild traffic from DM traffic) and published to the handlers in
//! registration order.
//!
//! ```
//! use discord_event_bus::{EventBus, EventName, Intents};
//! use serde_json::json;
//!
//! let bus = EventBus::new();
//! bus.subscribe(EventName::MessageCreate, |payload| {
//!     println!("message in {}", payload["channel_id"]);
//!     Ok(())
//! });
//!
//! assert_eq!(bus.calculate_intents(), Intents::GUILD_MESSAGES);
//! bus.publish(EventName::MessageCreate, &json!({"channel_id": "1"}));
//! ```

pub mod bot;
pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod intents;
pub mod types;

pub use bot::{Bot, Dispatched, Plugin};
pub use bus::{Delivery, EventBus, Payload, SubscriptionId};
pub use config::BotConfig;
pub use error::Error;
pub use events::EventName;
pub use gateway::{GatewayConfig, GatewayPayload, OpCode};
pub use intents::Intents;
