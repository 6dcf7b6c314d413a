//! Gateway boundary: the frame envelope, dispatch routing, and IDENTIFY.
//!
//! The websocket connection itself (HELLO, heartbeats, RESUME, backoff) is
//! not implemented here. This module covers the two points where a transport
//! meets the bus:
//!   - before connecting, the intents from [`EventBus::calculate_intents`]
//!     go into the IDENTIFY payload built by [`GatewayConfig`];
//!   - for every inbound frame, [`route`] picks the [`EventName`] to publish
//!     under, including the guild/DM split Discord does not make on the wire.
//!
//! [`EventBus::calculate_intents`]: crate::bus::EventBus::calculate_intents

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_repr::{Deserialize_repr, Serialize_repr};
use tracing::trace;

use crate::bus::Payload;
use crate::events::EventName;
use crate::intents::Intents;

/// Gateway API version this crate targets.
pub const API_VERSION: u8 = 10;

/// Payload used for dispatch frames whose `d` is absent (e.g. `RESUMED`).
static EMPTY_PAYLOAD: Payload = Payload::Null;

// ---------------------------------------------------------------------------
// Opcodes and the frame envelope
// ---------------------------------------------------------------------------

/// Gateway opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize_repr, Serialize_repr)]
#[repr(u8)]
pub enum OpCode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    VoiceStateUpdate = 4,
    Resume = 6,
    Reconnect = 7,
    RequestGuildMembers = 8,
    InvalidSession = 9,
    Hello = 10,
    HeartbeatAck = 11,
}

impl OpCode {
    pub const fn from_u8(op: u8) -> Option<Self> {
        Some(match op {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            _ => return None,
        })
    }
}

/// Raw gateway frame. Every message on the websocket has this shape.
///
/// `op` stays a plain integer so frames with opcodes we don't know still
/// parse.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Option<Payload>,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayPayload {
    /// A dispatch frame, as the gateway would send it.
    pub fn dispatch(name: impl Into<String>, sequence: u64, data: Payload) -> Self {
        Self {
            op: OpCode::Dispatch as u8,
            d: Some(data),
            s: Some(sequence),
            t: Some(name.into()),
        }
    }

    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_u8(self.op)
    }
}

// ---------------------------------------------------------------------------
// Dispatch routing
// ---------------------------------------------------------------------------

/// Where a dispatch frame should be published.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Route<'a> {
    pub event: EventName,
    pub payload: &'a Payload,
}

/// Map an inbound frame to the event it should be published under.
///
/// Returns `None` for non-dispatch frames and for dispatch names not in
/// [`EventName`]. Events with a DM-scoped twin are published under the twin
/// when the payload has no `guild_id`.
pub fn route(frame: &GatewayPayload) -> Option<Route<'_>> {
    if frame.op != OpCode::Dispatch as u8 {
        return None;
    }

    let name = frame.t.as_deref()?;
    let Some(event) = EventName::from_wire(name) else {
        trace!(event = name, "dispatch not in event table");
        return None;
    };

    let payload = frame.d.as_ref().unwrap_or(&EMPTY_PAYLOAD);
    Some(Route {
        event: scope_for_origin(event, payload),
        payload,
    })
}

/// Pick the guild or DM variant of `event` based on the payload's origin.
pub fn scope_for_origin(event: EventName, payload: &Payload) -> EventName {
    match event.dm_variant() {
        Some(dm) if !has_guild_id(payload) => dm,
        _ => event,
    }
}

fn has_guild_id(payload: &Payload) -> bool {
    payload.get("guild_id").is_some_and(|id| !id.is_null())
}

// ---------------------------------------------------------------------------
// IDENTIFY
// ---------------------------------------------------------------------------

/// Options for the IDENTIFY handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub token: String,
    pub intents: Intents,
    /// Optional shard info: `[shard_id, num_shards]`.
    pub shard: Option<[u32; 2]>,
}

impl GatewayConfig {
    /// The op-2 IDENTIFY frame.
    pub fn identify_payload(&self) -> serde_json::Value {
        self.identify_with_token(&self.token)
    }

    /// IDENTIFY with the token masked, safe to log.
    pub fn redacted(&self) -> serde_json::Value {
        self.identify_with_token("<redacted>")
    }

    fn identify_with_token(&self, token: &str) -> serde_json::Value {
        let mut identify = json!({
            "op": OpCode::Identify,
            "d": {
                "token": token,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": env!("CARGO_PKG_NAME"),
                    "device": env!("CARGO_PKG_NAME"),
                },
                "intents": self.intents,
            }
        });

        if let Some(shard) = self.shard {
            identify["d"]["shard"] = json!([shard[0], shard[1]]);
        }

        identify
    }
}

/// Gateway URL with the query string this crate expects.
pub fn gateway_url(base: &str) -> String {
    let query = format!("v={API_VERSION}&encoding=json");
    match base.split_once('?') {
        Some((_, existing)) if has_query_key(existing, "v") => base.to_string(),
        Some(_) => format!("{base}&{query}"),
        None => format!("{base}?{query}"),
    }
}

fn has_query_key(query: &str, key: &str) -> bool {
    query
        .split('&')
        .map(|pair| pair.split_once('=').map_or(pair, |(k, _)| k))
        .any(|k| k == key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
