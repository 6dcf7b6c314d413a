//! Crate-wide error type.
//!
//! Handler failures are not represented here: they are logged by the bus and
//! never returned to the publisher. These variants cover configuration,
//! parsing, and plugin start-up.

use thiserror::Error;

/// Errors returned by configuration, parsing, and plugin registration.
#[derive(Debug, Error)]
pub enum Error {
    /// A string did not name any known [`EventName`](crate::events::EventName).
    #[error("unknown event name: {0}")]
    UnknownEvent(String),

    /// A gateway connection was requested but no token is configured.
    #[error("DISCORD_TOKEN is not set")]
    MissingToken,

    /// `DISCORD_SHARD` was not of the form `id/count` with `id < count`.
    #[error("invalid shard specification: {0}")]
    InvalidShard(String),

    /// An intents value could not be parsed.
    #[error("invalid intents: {0}")]
    InvalidIntents(String),

    /// A plugin's `init` returned an error.
    #[error("plugin `{plugin}` failed to initialise")]
    PluginInit {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },
}
