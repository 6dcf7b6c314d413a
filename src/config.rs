//! Bot configuration from environment variables.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `DISCORD_TOKEN` | bot token; only needed to build an IDENTIFY payload |
//! | `DISCORD_SHARD` | `id/count`, e.g. `0/2` |
//! | `DISCORD_EXTRA_INTENTS` | bits OR-ed onto the computed intents, as a decimal mask or `A|B` flag names |
//!
//! The binary loads a `.env` file first, so these can live there.

use crate::error::Error;
use crate::intents::Intents;

pub const TOKEN_VAR: &str = "DISCORD_TOKEN";
pub const SHARD_VAR: &str = "DISCORD_SHARD";
pub const EXTRA_INTENTS_VAR: &str = "DISCORD_EXTRA_INTENTS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotConfig {
    pub token: Option<String>,
    /// `[shard_id, num_shards]`.
    pub shard: Option<[u32; 2]>,
    /// Intents requested regardless of subscriptions. `MESSAGE_CONTENT` is
    /// never implied by an event, so bots that read message text add it here.
    pub extra_intents: Intents,
}

impl BotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// or `None` when it is unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let token = lookup(TOKEN_VAR)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let shard = lookup(SHARD_VAR)
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_shard(&s))
            .transpose()?;

        let extra_intents = match lookup(EXTRA_INTENTS_VAR) {
            Some(raw) => raw.parse()?,
            None => Intents::empty(),
        };

        Ok(Self {
            token,
            shard,
            extra_intents,
        })
    }
}

fn parse_shard(raw: &str) -> Result<[u32; 2], Error> {
    let invalid = || Error::InvalidShard(raw.to_string());

    let (id, count) = raw.trim().split_once('/').ok_or_else(invalid)?;
    let id: u32 = id.trim().parse().map_err(|_| invalid())?;
    let count: u32 = count.trim().parse().map_err(|_| invalid())?;

    if id >= count {
        return Err(invalid());
    }
    Ok([id, count])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<BotConfig, Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(load(&[]).unwrap(), BotConfig::default());
    }

    #[test]
    fn reads_all_variables() {
        let config = load(&[
            ("DISCORD_TOKEN", " abc.def "),
            ("DISCORD_SHARD", "1/4"),
            ("DISCORD_EXTRA_INTENTS", "MESSAGE_CONTENT|DIRECT_MESSAGES"),
        ])
        .unwrap();

        assert_eq!(config.token.as_deref(), Some("abc.def"));
        assert_eq!(config.shard, Some([1, 4]));
        assert_eq!(
            config.extra_intents,
            Intents::MESSAGE_CONTENT | Intents::DIRECT_MESSAGES
        );
    }

    #[test]
    fn blank_token_is_none() {
        assert_eq!(load(&[("DISCORD_TOKEN", "  ")]).unwrap().token, None);
    }

    #[test]
    fn extra_intents_as_decimal() {
        let config = load(&[("DISCORD_EXTRA_INTENTS", "32768")]).unwrap();
        assert_eq!(config.extra_intents, Intents::MESSAGE_CONTENT);
    }

    #[test]
    fn bad_extra_intents_fail() {
        assert!(matches!(
            load(&[("DISCORD_EXTRA_INTENTS", "EVERYTHING")]),
            Err(Error::InvalidIntents(_))
        ));
    }

    #[test]
    fn shard_must_be_id_over_count() {
        for raw in ["1", "a/2", "2/2", "3/2", "1/"] {
            assert!(
                matches!(load(&[("DISCORD_SHARD", raw)]), Err(Error::InvalidShard(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn shard_tolerates_whitespace() {
        assert_eq!(
            load(&[("DISCORD_SHARD", " 0 / 2 ")]).unwrap().shard,
            Some([0, 2])
        );
    }
}
