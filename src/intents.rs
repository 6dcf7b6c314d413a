//! Gateway intent bits.
//!
//! The IDENTIFY payload carries a `u32` bitmask declaring which categories of
//! events the client wants. Three of the bits are *privileged*: Discord only
//! honours them for applications that enabled them in the developer portal.
//! This module exposes that metadata but never strips or rejects privileged
//! bits; the gateway closes the connection with code 4014 if they are not
//! allowed.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

bitflags! {
    /// Gateway intents bitmask.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Intents: u32 {
        /// Guild, role, channel, thread, and stage instance lifecycle.
        const GUILDS                        = 1 << 0;
        /// Member join/update/leave. Privileged.
        const GUILD_MEMBERS                 = 1 << 1;
        /// Bans and audit log entries.
        const GUILD_MODERATION              = 1 << 2;
        /// Emoji, sticker, and soundboard updates.
        const GUILD_EXPRESSIONS             = 1 << 3;
        const GUILD_INTEGRATIONS            = 1 << 4;
        const GUILD_WEBHOOKS                = 1 << 5;
        const GUILD_INVITES                 = 1 << 6;
        const GUILD_VOICE_STATES            = 1 << 7;
        /// Presence updates. Privileged.
        const GUILD_PRESENCES               = 1 << 8;
        const GUILD_MESSAGES                = 1 << 9;
        const GUILD_MESSAGE_REACTIONS       = 1 << 10;
        const GUILD_MESSAGE_TYPING          = 1 << 11;
        const DIRECT_MESSAGES               = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS      = 1 << 13;
        const DIRECT_MESSAGE_TYPING         = 1 << 14;
        /// Message content, embeds, attachments, and components. Privileged.
        const MESSAGE_CONTENT               = 1 << 15;
        const GUILD_SCHEDULED_EVENTS        = 1 << 16;
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        const AUTO_MODERATION_EXECUTION     = 1 << 21;
        const GUILD_MESSAGE_POLLS           = 1 << 24;
        const DIRECT_MESSAGE_POLLS          = 1 << 25;
    }
}

impl Intents {
    /// Bits that need explicit approval before the gateway accepts them.
    pub const PRIVILEGED: Self = Self::GUILD_MEMBERS
        .union(Self::GUILD_PRESENCES)
        .union(Self::MESSAGE_CONTENT);

    /// The privileged subset of `self`.
    pub const fn privileged(self) -> Self {
        self.intersection(Self::PRIVILEGED)
    }

    /// Whether any bit in `self` is privileged.
    pub const fn is_privileged(self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }

    /// Flag names set in `self`, lowest bit first.
    pub fn names(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

impl Display for Intents {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        f.write_str(&self.names().join(" | "))
    }
}

/// Parses either a decimal bitmask (`"33281"`) or `|`-separated flag names
/// (`"GUILDS | MESSAGE_CONTENT"`). Unknown decimal bits are rejected; empty
/// segments such as a trailing `|` are skipped.
impl FromStr for Intents {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::empty());
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            let bits: u32 = s
                .parse()
                .map_err(|_| Error::InvalidIntents(s.to_string()))?;
            return Self::from_bits(bits).ok_or_else(|| Error::InvalidIntents(s.to_string()));
        }

        s.split('|')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .try_fold(Self::empty(), |acc, name| {
                Self::from_name(name)
                    .map(|flag| acc | flag)
                    .ok_or_else(|| Error::InvalidIntents(name.to_string()))
            })
    }
}

// Discord wants the raw integer on the wire.
impl Serialize for Intents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_bits_truncate(u32::deserialize(deserializer)?))
    }
}
