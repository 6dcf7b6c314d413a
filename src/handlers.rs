//! Plugins bundled with the binary.
//!
//! Each plugin subscribes typed handlers on the bus and keeps a small piece of
//! shared state that callers (and tests) can inspect through a cheap clone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::bot::Plugin;
use crate::bus::EventBus;
use crate::events::EventName;
use crate::types::*;

// ---------------------------------------------------------------------------
// MessageLogger
// ---------------------------------------------------------------------------

/// Logs every message from a non-bot user and counts guild vs DM traffic.
#[derive(Debug, Clone, Default)]
pub struct MessageLogger {
    counts: Arc<MessageCounts>,
}

#[derive(Debug, Default)]
struct MessageCounts {
    guild: AtomicU64,
    direct: AtomicU64,
}

impl MessageLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages seen in guild channels.
    pub fn guild_messages(&self) -> u64 {
        self.counts.guild.load(Ordering::Relaxed)
    }

    /// Messages seen in DM channels.
    pub fn direct_messages(&self) -> u64 {
        self.counts.direct.load(Ordering::Relaxed)
    }
}

impl Plugin for MessageLogger {
    fn name(&self) -> &str {
        "message-logger"
    }

    fn init(&self, bus: &EventBus) -> anyhow::Result<()> {
        for event in [EventName::MessageCreate, EventName::DmMessageCreate] {
            let counts = Arc::clone(&self.counts);
            bus.subscribe_typed(event, move |msg: Message| {
                if msg.author.bot {
                    return Ok(());
                }
                let counter = if msg.is_dm() {
                    &counts.direct
                } else {
                    &counts.guild
                };
                counter.fetch_add(1, Ordering::Relaxed);

                info!(
                    message_id = %msg.id,
                    author = %msg.author.tag(),
                    channel_id = %msg.channel_id,
                    dm = msg.is_dm(),
                    content_len = msg.content.len(),
                    "message"
                );
                Ok(())
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemberGreeter
// ---------------------------------------------------------------------------

/// Builds a welcome line for each member that joins a guild.
///
/// Greetings are kept rather than sent; posting them is the transport's job.
#[derive(Debug, Clone, Default)]
pub struct MemberGreeter {
    greetings: Arc<Mutex<Vec<Greeting>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    pub text: String,
}

impl MemberGreeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn greetings(&self) -> Vec<Greeting> {
        self.greetings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Plugin for MemberGreeter {
    fn name(&self) -> &str {
        "member-greeter"
    }

    fn init(&self, bus: &EventBus) -> anyhow::Result<()> {
        let greetings = Arc::clone(&self.greetings);
        bus.subscribe_typed(EventName::GuildMemberAdd, move |add: MemberAdd| {
            let user = add
                .member
                .user
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("GUILD_MEMBER_ADD without user"))?;
            if user.bot {
                debug!(user = %user.tag(), "not greeting bot account");
                return Ok(());
            }

            let greeting = Greeting {
                guild_id: add.guild_id,
                user_id: user.id,
                text: format_greeting(user, add.member.nick.as_deref()),
            };
            info!(guild_id = %greeting.guild_id, user = %user.tag(), "member joined");

            greetings
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(greeting);
            Ok(())
        });
        Ok(())
    }
}

fn format_greeting(user: &User, nick: Option<&str>) -> String {
    let name = nick.unwrap_or_else(|| user.display_name());
    let created = user
        .id
        .created_at()
        .map(|dt| dt.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "👋 Welcome <@{}>! Glad to have you here, {}.\n\
         • **Account created:** {}",
        user.id, name, created
    )
}

// ---------------------------------------------------------------------------
// TypingWatcher
// ---------------------------------------------------------------------------

/// Remembers who last started typing in each channel, guild or DM.
#[derive(Debug, Clone, Default)]
pub struct TypingWatcher {
    last: Arc<Mutex<HashMap<Snowflake, TypingStart>>>,
}

impl TypingWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent typing indicator in `channel_id`.
    pub fn last_in(&self, channel_id: Snowflake) -> Option<TypingStart> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel_id)
            .cloned()
    }

    pub fn channels(&self) -> usize {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Plugin for TypingWatcher {
    fn name(&self) -> &str {
        "typing-watcher"
    }

    fn init(&self, bus: &EventBus) -> anyhow::Result<()> {
        for event in [EventName::TypingStart, EventName::DmTypingStart] {
            let last = Arc::clone(&self.last);
            bus.subscribe_typed(event, move |typing: TypingStart| {
                debug!(
                    channel_id = %typing.channel_id,
                    user_id = %typing.user_id,
                    "typing"
                );
                let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
                // Frames can arrive out of order after a resume.
                let newer = last
                    .get(&typing.channel_id)
                    .map_or(true, |prev| prev.timestamp <= typing.timestamp);
                if newer {
                    last.insert(typing.channel_id, typing);
                }
                Ok(())
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
