//! The closed set of gateway event names and their intent classification.
//!
//! Every dispatch event Discord can send has an [`EventName`] variant. A
//! handful of message-related events also have a *DM-scoped* twin
//! (`DM_MESSAGE_CREATE`, `DM_TYPING_START`, ...). Discord itself sends the
//! same wire name for both; the gateway boundary picks the DM variant when the
//! payload carries no `guild_id` (see [`crate::gateway::route`]).
//!
//! [`EventName::intents`] is the classification table used by
//! [`EventBus::calculate_intents`](crate::bus::EventBus::calculate_intents).

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;
use crate::intents::Intents;

macro_rules! event_names {
    ($($(#[$meta:meta])* $variant:ident => $wire:literal,)*) => {
        /// A named category of inbound gateway event.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventName {
            $($(#[$meta])* $variant,)*
        }

        impl EventName {
            /// Every event name, in declaration order.
            pub const ALL: &'static [EventName] = &[$(EventName::$variant,)*];

            /// Uppercase snake-case name, e.g. `MESSAGE_CREATE`.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(EventName::$variant => $wire,)*
                }
            }
        }
    };
}

event_names! {
    /// Sent once after IDENTIFY succeeds.
    Ready => "READY",
    Resumed => "RESUMED",
    ApplicationCommandPermissionsUpdate => "APPLICATION_COMMAND_PERMISSIONS_UPDATE",
    AutoModerationRuleCreate => "AUTO_MODERATION_RULE_CREATE",
    AutoModerationRuleUpdate => "AUTO_MODERATION_RULE_UPDATE",
    AutoModerationRuleDelete => "AUTO_MODERATION_RULE_DELETE",
    AutoModerationActionExecution => "AUTO_MODERATION_ACTION_EXECUTION",
    ChannelCreate => "CHANNEL_CREATE",
    ChannelUpdate => "CHANNEL_UPDATE",
    ChannelDelete => "CHANNEL_DELETE",
    ChannelPinsUpdate => "CHANNEL_PINS_UPDATE",
    ThreadCreate => "THREAD_CREATE",
    ThreadUpdate => "THREAD_UPDATE",
    ThreadDelete => "THREAD_DELETE",
    ThreadListSync => "THREAD_LIST_SYNC",
    ThreadMemberUpdate => "THREAD_MEMBER_UPDATE",
    ThreadMembersUpdate => "THREAD_MEMBERS_UPDATE",
    EntitlementCreate => "ENTITLEMENT_CREATE",
    EntitlementUpdate => "ENTITLEMENT_UPDATE",
    EntitlementDelete => "ENTITLEMENT_DELETE",
    /// Full guild object, sent lazily after READY and when joining a guild.
    GuildCreate => "GUILD_CREATE",
    GuildUpdate => "GUILD_UPDATE",
    GuildDelete => "GUILD_DELETE",
    GuildAuditLogEntryCreate => "GUILD_AUDIT_LOG_ENTRY_CREATE",
    GuildBanAdd => "GUILD_BAN_ADD",
    GuildBanRemove => "GUILD_BAN_REMOVE",
    GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE",
    GuildStickersUpdate => "GUILD_STICKERS_UPDATE",
    GuildSoundboardSoundCreate => "GUILD_SOUNDBOARD_SOUND_CREATE",
    GuildSoundboardSoundUpdate => "GUILD_SOUNDBOARD_SOUND_UPDATE",
    GuildSoundboardSoundDelete => "GUILD_SOUNDBOARD_SOUND_DELETE",
    GuildIntegrationsUpdate => "GUILD_INTEGRATIONS_UPDATE",
    GuildMemberAdd => "GUILD_MEMBER_ADD",
    GuildMemberRemove => "GUILD_MEMBER_REMOVE",
    GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
    /// Response to op 8 (Request Guild Members).
    GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
    GuildRoleCreate => "GUILD_ROLE_CREATE",
    GuildRoleUpdate => "GUILD_ROLE_UPDATE",
    GuildRoleDelete => "GUILD_ROLE_DELETE",
    GuildScheduledEventCreate => "GUILD_SCHEDULED_EVENT_CREATE",
    GuildScheduledEventUpdate => "GUILD_SCHEDULED_EVENT_UPDATE",
    GuildScheduledEventDelete => "GUILD_SCHEDULED_EVENT_DELETE",
    GuildScheduledEventUserAdd => "GUILD_SCHEDULED_EVENT_USER_ADD",
    GuildScheduledEventUserRemove => "GUILD_SCHEDULED_EVENT_USER_REMOVE",
    IntegrationCreate => "INTEGRATION_CREATE",
    IntegrationUpdate => "INTEGRATION_UPDATE",
    IntegrationDelete => "INTEGRATION_DELETE",
    InteractionCreate => "INTERACTION_CREATE",
    InviteCreate => "INVITE_CREATE",
    InviteDelete => "INVITE_DELETE",
    MessageCreate => "MESSAGE_CREATE",
    MessageUpdate => "MESSAGE_UPDATE",
    MessageDelete => "MESSAGE_DELETE",
    MessageDeleteBulk => "MESSAGE_DELETE_BULK",
    MessageReactionAdd => "MESSAGE_REACTION_ADD",
    MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
    MessageReactionRemoveAll => "MESSAGE_REACTION_REMOVE_ALL",
    MessageReactionRemoveEmoji => "MESSAGE_REACTION_REMOVE_EMOJI",
    MessagePollVoteAdd => "MESSAGE_POLL_VOTE_ADD",
    MessagePollVoteRemove => "MESSAGE_POLL_VOTE_REMOVE",
    PresenceUpdate => "PRESENCE_UPDATE",
    StageInstanceCreate => "STAGE_INSTANCE_CREATE",
    StageInstanceUpdate => "STAGE_INSTANCE_UPDATE",
    StageInstanceDelete => "STAGE_INSTANCE_DELETE",
    TypingStart => "TYPING_START",
    UserUpdate => "USER_UPDATE",
    VoiceStateUpdate => "VOICE_STATE_UPDATE",
    VoiceServerUpdate => "VOICE_SERVER_UPDATE",
    WebhooksUpdate => "WEBHOOKS_UPDATE",

    // ---- DM-scoped variants (never on the wire) ---------------------------
    DmMessageCreate => "DM_MESSAGE_CREATE",
    DmMessageUpdate => "DM_MESSAGE_UPDATE",
    DmMessageDelete => "DM_MESSAGE_DELETE",
    DmChannelPinsUpdate => "DM_CHANNEL_PINS_UPDATE",
    DmMessageReactionAdd => "DM_MESSAGE_REACTION_ADD",
    DmMessageReactionRemove => "DM_MESSAGE_REACTION_REMOVE",
    DmMessageReactionRemoveAll => "DM_MESSAGE_REACTION_REMOVE_ALL",
    DmMessageReactionRemoveEmoji => "DM_MESSAGE_REACTION_REMOVE_EMOJI",
    DmTypingStart => "DM_TYPING_START",
}

impl EventName {
    /// Look up a name as Discord sends it in the `t` field of a dispatch.
    ///
    /// DM-scoped names are not wire names and return `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|event| !event.is_dm_scoped() && event.as_str() == name)
    }

    /// The DM-scoped twin of a guild event, if it has one.
    pub const fn dm_variant(self) -> Option<Self> {
        use EventName::*;
        match self {
            MessageCreate => Some(DmMessageCreate),
            MessageUpdate => Some(DmMessageUpdate),
            MessageDelete => Some(DmMessageDelete),
            ChannelPinsUpdate => Some(DmChannelPinsUpdate),
            MessageReactionAdd => Some(DmMessageReactionAdd),
            MessageReactionRemove => Some(DmMessageReactionRemove),
            MessageReactionRemoveAll => Some(DmMessageReactionRemoveAll),
            MessageReactionRemoveEmoji => Some(DmMessageReactionRemoveEmoji),
            TypingStart => Some(DmTypingStart),
            _ => None,
        }
    }

    /// The guild event a DM-scoped variant shadows. Guild events return
    /// themselves.
    pub const fn guild_counterpart(self) -> Self {
        use EventName::*;
        match self {
            DmMessageCreate => MessageCreate,
            DmMessageUpdate => MessageUpdate,
            DmMessageDelete => MessageDelete,
            DmChannelPinsUpdate => ChannelPinsUpdate,
            DmMessageReactionAdd => MessageReactionAdd,
            DmMessageReactionRemove => MessageReactionRemove,
            DmMessageReactionRemoveAll => MessageReactionRemoveAll,
            DmMessageReactionRemoveEmoji => MessageReactionRemoveEmoji,
            DmTypingStart => TypingStart,
            other => other,
        }
    }

    pub const fn is_dm_scoped(self) -> bool {
        matches!(
            self,
            EventName::DmMessageCreate
                | EventName::DmMessageUpdate
                | EventName::DmMessageDelete
                | EventName::DmChannelPinsUpdate
                | EventName::DmMessageReactionAdd
                | EventName::DmMessageReactionRemove
                | EventName::DmMessageReactionRemoveAll
                | EventName::DmMessageReactionRemoveEmoji
                | EventName::DmTypingStart
        )
    }

    /// Intent bits the gateway must be asked for to receive this event.
    ///
    /// DM-scoped variants share their guild counterpart's bit, except
    /// `DM_TYPING_START` which only needs `DIRECT_MESSAGE_TYPING`.
    /// `TYPING_START` requests both typing bits. Events Discord sends
    /// regardless of intents return an empty set.
    pub const fn intents(self) -> Intents {
        use EventName::*;
        match self {
            GuildCreate | GuildUpdate | GuildDelete | GuildRoleCreate | GuildRoleUpdate
            | GuildRoleDelete | ChannelCreate | ChannelUpdate | ChannelDelete
            | ChannelPinsUpdate | DmChannelPinsUpdate | ThreadCreate | ThreadUpdate
            | ThreadDelete | ThreadListSync | ThreadMemberUpdate | StageInstanceCreate
            | StageInstanceUpdate | StageInstanceDelete => Intents::GUILDS,

            ThreadMembersUpdate => Intents::GUILDS.union(Intents::GUILD_MEMBERS),

            GuildMemberAdd | GuildMemberUpdate | GuildMemberRemove => Intents::GUILD_MEMBERS,

            GuildAuditLogEntryCreate | GuildBanAdd | GuildBanRemove => Intents::GUILD_MODERATION,

            GuildEmojisUpdate
            | GuildStickersUpdate
            | GuildSoundboardSoundCreate
            | GuildSoundboardSoundUpdate
            | GuildSoundboardSoundDelete => Intents::GUILD_EXPRESSIONS,

            GuildIntegrationsUpdate | IntegrationCreate | IntegrationUpdate
            | IntegrationDelete => Intents::GUILD_INTEGRATIONS,

            WebhooksUpdate => Intents::GUILD_WEBHOOKS,

            InviteCreate | InviteDelete => Intents::GUILD_INVITES,

            VoiceStateUpdate => Intents::GUILD_VOICE_STATES,

            PresenceUpdate => Intents::GUILD_PRESENCES,

            MessageCreate | MessageUpdate | MessageDelete | MessageDeleteBulk
            | DmMessageCreate | DmMessageUpdate | DmMessageDelete => Intents::GUILD_MESSAGES,

            MessageReactionAdd
            | MessageReactionRemove
            | MessageReactionRemoveAll
            | MessageReactionRemoveEmoji
            | DmMessageReactionAdd
            | DmMessageReactionRemove
            | DmMessageReactionRemoveAll
            | DmMessageReactionRemoveEmoji => Intents::GUILD_MESSAGE_REACTIONS,

            TypingStart => Intents::GUILD_MESSAGE_TYPING.union(Intents::DIRECT_MESSAGE_TYPING),
            DmTypingStart => Intents::DIRECT_MESSAGE_TYPING,

            GuildScheduledEventCreate
            | GuildScheduledEventUpdate
            | GuildScheduledEventDelete
            | GuildScheduledEventUserAdd
            | GuildScheduledEventUserRemove => Intents::GUILD_SCHEDULED_EVENTS,

            AutoModerationRuleCreate | AutoModerationRuleUpdate | AutoModerationRuleDelete => {
                Intents::AUTO_MODERATION_CONFIGURATION
            }
            AutoModerationActionExecution => Intents::AUTO_MODERATION_EXECUTION,

            MessagePollVoteAdd | MessagePollVoteRemove => Intents::GUILD_MESSAGE_POLLS,

            Ready
            | Resumed
            | ApplicationCommandPermissionsUpdate
            | EntitlementCreate
            | EntitlementUpdate
            | EntitlementDelete
            | GuildMembersChunk
            | InteractionCreate
            | UserUpdate
            | VoiceServerUpdate => Intents::empty(),
        }
    }
}

impl Display for EventName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Accepts every name, DM-scoped ones included.
impl FromStr for EventName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| Error::UnknownEvent(s.to_string()))
    }
}

impl Serialize for EventName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
