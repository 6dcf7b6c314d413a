//! Named-event publish/subscribe registry and intent aggregation.
//!
//! The bus is an ordinary value: the [`Bot`](crate::bot::Bot) owns one and
//! lends `&EventBus` to plugins while they initialise. Registration happens
//! before the gateway connects because the IDENTIFY payload needs the final
//! intent bitmask, but the registry is behind a lock so late subscriptions
//! from another thread are still safe.
//!
//! Handlers for one event run in registration order. A handler that returns
//! an error or panics is logged and skipped; the remaining handlers still see
//! the payload.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::{debug, error, trace};

use crate::events::EventName;
use crate::intents::Intents;

/// Raw decoded dispatch payload (the gateway's `d` field).
pub type Payload = serde_json::Value;

type Handler = Arc<dyn Fn(&Payload) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Outcome counts for one [`EventBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Handlers that returned `Ok`.
    pub handled: usize,
    /// Handlers that returned `Err` or panicked.
    pub failed: usize,
}

impl Delivery {
    /// Total handlers invoked.
    pub fn invoked(&self) -> usize {
        self.handled + self.failed
    }
}

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    handlers: HashMap<EventName, Vec<Subscription>>,
    next_id: u64,
}

/// Subscription registry keyed by [`EventName`].
#[derive(Default)]
pub struct EventBus {
    registry: RwLock<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `event`.
    ///
    /// Registering the same closure twice means it runs twice per publish.
    pub fn subscribe<F>(&self, event: EventName, handler: F) -> SubscriptionId
    where
        F: Fn(&Payload) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut registry = self.write();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.handlers.entry(event).or_default().push(Subscription {
            id,
            handler: Arc::new(handler),
        });
        debug!(event = %event, subscription = id.0, "handler subscribed");
        id
    }

    /// Like [`subscribe`](Self::subscribe), but decodes the payload into `T`
    /// first. A payload that does not decode counts as a failed handler.
    pub fn subscribe_typed<T, F>(&self, event: EventName, handler: F) -> SubscriptionId
    where
        T: DeserializeOwned,
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(event, move |payload| {
            let decoded = T::deserialize(payload)
                .with_context(|| format!("failed to decode {event} payload"))?;
            handler(decoded)
        })
    }

    /// Remove one registration. Returns `false` if `id` is not registered.
    ///
    /// Once an event has no handlers left it no longer contributes to
    /// [`calculate_intents`](Self::calculate_intents).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.write();
        let found = registry.handlers.iter_mut().find_map(|(event, subs)| {
            let index = subs.iter().position(|s| s.id == id)?;
            subs.remove(index);
            Some((*event, subs.is_empty()))
        });

        match found {
            Some((event, now_empty)) => {
                if now_empty {
                    registry.handlers.remove(&event);
                }
                debug!(event = %event, subscription = id.0, "handler unsubscribed");
                true
            }
            None => false,
        }
    }

    /// The id the next [`subscribe`](Self::subscribe) call will return.
    pub(crate) fn next_subscription_id(&self) -> SubscriptionId {
        SubscriptionId(self.read().next_id)
    }

    /// Remove every registration whose id is `first` or later. Returns how
    /// many were removed.
    pub(crate) fn unsubscribe_from(&self, first: SubscriptionId) -> usize {
        let mut registry = self.write();
        let mut removed = 0;
        registry.handlers.retain(|event, subs| {
            let before = subs.len();
            subs.retain(|s| s.id < first);
            if subs.len() < before {
                debug!(event = %event, count = before - subs.len(), "handlers rolled back");
            }
            removed += before - subs.len();
            !subs.is_empty()
        });
        removed
    }

    /// Invoke every handler registered for `event`, in registration order.
    ///
    /// The handler list is snapshotted first, so handlers may subscribe or
    /// unsubscribe without deadlocking; such changes apply from the next
    /// publish on.
    pub fn publish(&self, event: EventName, payload: &Payload) -> Delivery {
        let handlers: Vec<(SubscriptionId, Handler)> = {
            let registry = self.read();
            match registry.handlers.get(&event) {
                Some(subs) => subs
                    .iter()
                    .map(|s| (s.id, Arc::clone(&s.handler)))
                    .collect(),
                None => Vec::new(),
            }
        };

        if handlers.is_empty() {
            trace!(event = %event, "no handlers subscribed");
            return Delivery::default();
        }

        let mut delivery = Delivery::default();
        for (id, handler) in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => delivery.handled += 1,
                Ok(Err(e)) => {
                    delivery.failed += 1;
                    let error = format!("{e:#}");
                    error!(event = %event, subscription = id.0, error = %error, "event handler failed");
                }
                Err(panic) => {
                    delivery.failed += 1;
                    let reason = panic_reason(panic.as_ref());
                    error!(event = %event, subscription = id.0, panic = %reason, "event handler panicked");
                }
            }
        }

        trace!(
            event = %event,
            handled = delivery.handled,
            failed = delivery.failed,
            "event published"
        );
        delivery
    }

    /// OR of the intent bits of every event that has at least one handler.
    ///
    /// Depends only on which events are subscribed, not on handler count or
    /// registration order.
    pub fn calculate_intents(&self) -> Intents {
        self.read()
            .handlers
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .fold(Intents::empty(), |acc, (event, _)| acc | event.intents())
    }

    /// Number of handlers currently registered for `event`.
    pub fn handler_count(&self, event: EventName) -> usize {
        self.read().handlers.get(&event).map_or(0, Vec::len)
    }

    /// Events with at least one handler, sorted.
    pub fn subscribed_events(&self) -> Vec<EventName> {
        let mut events: Vec<EventName> = self
            .read()
            .handlers
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .map(|(event, _)| *event)
            .collect();
        events.sort_unstable();
        events
    }

    pub fn is_empty(&self) -> bool {
        self.read().handlers.values().all(Vec::is_empty)
    }

    // Handlers never run while the lock is held, so a poisoned lock can only
    // come from a panic inside this module; the registry is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for EventBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let registry = self.read();
        let mut counts: Vec<(EventName, usize)> = registry
            .handlers
            .iter()
            .map(|(event, subs)| (*event, subs.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("EventBus")
            .field("handlers", &counts)
            .field("next_id", &registry.next_id)
            .finish()
    }
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    static_assertions::assert_impl_all!(EventBus: Send, Sync, Default);

    fn noop(_: &Payload) -> anyhow::Result<()> {
        Ok(())
    }

    /// Shared log handlers append to, so tests can observe call order.
    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    ) -> impl Fn(&Payload) -> anyhow::Result<()> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_| {
            log.lock().unwrap().push(tag.to_string());
            Ok(())
        }
    }

    // -- calculate_intents() -----------------------------------------------

    #[test]
    fn no_subscriptions_means_no_intents() {
        let bus = EventBus::new();
        assert_eq!(bus.calculate_intents().bits(), 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn message_create_only() {
        let bus = EventBus::new();
        bus.subscribe(EventName::MessageCreate, noop);
        assert_eq!(bus.calculate_intents().bits(), 512);
    }

    #[test]
    fn guild_member_add_only_is_privileged() {
        let bus = EventBus::new();
        bus.subscribe(EventName::GuildMemberAdd, noop);
        let intents = bus.calculate_intents();
        assert_eq!(intents.bits(), 2);
        assert_eq!(intents.privileged(), Intents::GUILD_MEMBERS);
    }

    #[test]
    fn typing_start_only() {
        let bus = EventBus::new();
        bus.subscribe(EventName::TypingStart, noop);
        assert_eq!(bus.calculate_intents().bits(), 18432);
    }

    #[test]
    fn intents_ignore_handler_count() {
        let bus = EventBus::new();
        bus.subscribe(EventName::GuildCreate, noop);
        let once = bus.calculate_intents();
        bus.subscribe(EventName::GuildCreate, noop);
        bus.subscribe(EventName::GuildCreate, noop);
        assert_eq!(bus.calculate_intents(), once);
    }

    #[test]
    fn intents_are_order_independent() {
        let events = [
            EventName::MessageCreate,
            EventName::PresenceUpdate,
            EventName::InviteCreate,
            EventName::TypingStart,
            EventName::Ready,
        ];

        let forward = EventBus::new();
        for event in events {
            forward.subscribe(event, noop);
        }
        let backward = EventBus::new();
        for event in events.iter().rev() {
            backward.subscribe(*event, noop);
        }

        assert_eq!(forward.calculate_intents(), backward.calculate_intents());
        assert_eq!(
            forward.calculate_intents(),
            Intents::GUILD_MESSAGES
                | Intents::GUILD_PRESENCES
                | Intents::GUILD_INVITES
                | Intents::GUILD_MESSAGE_TYPING
                | Intents::DIRECT_MESSAGE_TYPING
        );
    }

    #[test]
    fn intents_are_idempotent() {
        let bus = EventBus::new();
        bus.subscribe(EventName::VoiceStateUpdate, noop);
        bus.subscribe(EventName::GuildBanAdd, noop);
        assert_eq!(bus.calculate_intents(), bus.calculate_intents());
    }

    #[test]
    fn unsubscribed_events_contribute_nothing() {
        let bus = EventBus::new();
        bus.subscribe(EventName::GuildCreate, noop);
        let intents = bus.calculate_intents();
        assert!(!intents.contains(Intents::GUILD_MESSAGES));
        assert!(!intents.contains(Intents::GUILD_PRESENCES));
    }

    #[test]
    fn guild_and_dm_variant_share_one_bit() {
        let bus = EventBus::new();
        bus.subscribe(EventName::MessageCreate, noop);
        bus.subscribe(EventName::DmMessageCreate, noop);
        assert_eq!(bus.calculate_intents(), Intents::GUILD_MESSAGES);
    }

    #[test]
    fn typing_and_dm_typing_overlap() {
        let bus = EventBus::new();
        bus.subscribe(EventName::DmTypingStart, noop);
        assert_eq!(bus.calculate_intents(), Intents::DIRECT_MESSAGE_TYPING);
        bus.subscribe(EventName::TypingStart, noop);
        assert_eq!(bus.calculate_intents().bits(), 18432);
    }

    #[test]
    fn intent_free_events_leave_mask_empty() {
        let bus = EventBus::new();
        bus.subscribe(EventName::Ready, noop);
        bus.subscribe(EventName::InteractionCreate, noop);
        assert!(bus.calculate_intents().is_empty());
        assert!(!bus.is_empty());
    }

    // -- publish() ---------------------------------------------------------

    #[test]
    fn publish_without_handlers_is_a_no_op() {
        let bus = EventBus::new();
        let delivery = bus.publish(EventName::MessageCreate, &json!({"content": "hi"}));
        assert_eq!(delivery, Delivery::default());
        assert_eq!(delivery.invoked(), 0);
    }

    #[test]
    fn publish_other_event_does_not_invoke() {
        let bus = EventBus::new();
        let calls = log();
        bus.subscribe(EventName::MessageCreate, recorder(&calls, "msg"));
        bus.publish(EventName::MessageUpdate, &json!({}));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let calls = log();
        bus.subscribe(EventName::MessageCreate, recorder(&calls, "h1"));
        bus.subscribe(EventName::MessageCreate, recorder(&calls, "h2"));

        let delivery = bus.publish(EventName::MessageCreate, &json!({}));

        assert_eq!(*calls.lock().unwrap(), vec!["h1", "h2"]);
        assert_eq!(delivery.handled, 2);
        assert_eq!(delivery.failed, 0);
    }

    static COUNTED: AtomicUsize = AtomicUsize::new(0);

    fn counting(_: &Payload) -> anyhow::Result<()> {
        COUNTED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[test]
    fn duplicate_registration_runs_twice() {
        let bus = EventBus::new();
        bus.subscribe(EventName::GuildCreate, counting);
        bus.subscribe(EventName::GuildCreate, counting);

        bus.publish(EventName::GuildCreate, &json!({}));
        assert_eq!(COUNTED.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn both_handlers_see_the_same_payload() {
        let bus = EventBus::new();
        let seen: Arc<Mutex<Vec<(String, usize, Payload)>>> = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(EventName::GuildCreate, move |payload| {
                let addr = payload as *const Payload as usize;
                seen.lock()
                    .unwrap()
                    .push((tag.to_string(), addr, payload.clone()));
                Ok(())
            });
        }

        let payload = json!({"id": "123"});
        bus.publish(EventName::GuildCreate, &payload);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "first");
        assert_eq!(seen[1].0, "second");
        assert_eq!(seen[0].1, seen[1].1, "handlers got different references");
        assert_eq!(seen[0].2, payload);
        assert_eq!(seen[1].2, payload);
    }

    #[test]
    fn failing_handler_does_not_stop_later_handlers() {
        let bus = EventBus::new();
        let calls = log();
        bus.subscribe(EventName::MessageCreate, recorder(&calls, "before"));
        bus.subscribe(EventName::MessageCreate, |_| anyhow::bail!("broken plugin"));
        bus.subscribe(EventName::MessageCreate, recorder(&calls, "after"));

        let delivery = bus.publish(EventName::MessageCreate, &json!({}));

        assert_eq!(*calls.lock().unwrap(), vec!["before", "after"]);
        assert_eq!(delivery, Delivery { handled: 2, failed: 1 });
    }

    #[test]
    fn panicking_handler_is_isolated() {
        let bus = EventBus::new();
        let calls = log();
        bus.subscribe(EventName::MessageCreate, |_| panic!("handler exploded"));
        bus.subscribe(EventName::MessageCreate, recorder(&calls, "survivor"));

        let delivery = bus.publish(EventName::MessageCreate, &json!({}));

        assert_eq!(*calls.lock().unwrap(), vec!["survivor"]);
        assert_eq!(delivery, Delivery { handled: 1, failed: 1 });

        // The bus is still usable afterwards.
        bus.subscribe(EventName::GuildCreate, noop);
        assert_eq!(bus.handler_count(EventName::GuildCreate), 1);
    }

    #[test]
    fn handler_may_subscribe_during_publish() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(EventName::Ready, move |_| {
            inner.subscribe(EventName::MessageCreate, noop);
            Ok(())
        });

        let delivery = bus.publish(EventName::Ready, &json!({}));
        assert_eq!(delivery.handled, 1);
        assert_eq!(bus.handler_count(EventName::MessageCreate), 1);
        // New Ready handlers are not added mid-publish, so only one ran.
        assert_eq!(bus.handler_count(EventName::Ready), 1);
    }

    // -- subscribe_typed() -------------------------------------------------

    #[derive(Debug, Deserialize)]
    struct GuildStub {
        id: String,
    }

    #[test]
    fn typed_handler_receives_decoded_payload() {
        let bus = EventBus::new();
        let ids = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ids);
        bus.subscribe_typed(EventName::GuildCreate, move |guild: GuildStub| {
            sink.lock().unwrap().push(guild.id);
            Ok(())
        });

        let delivery = bus.publish(EventName::GuildCreate, &json!({"id": "123", "name": "x"}));
        assert_eq!(delivery.handled, 1);
        assert_eq!(*ids.lock().unwrap(), vec!["123"]);
    }

    #[test]
    fn typed_handler_decode_failure_counts_as_failed() {
        let bus = EventBus::new();
        bus.subscribe_typed(EventName::GuildCreate, |_: GuildStub| Ok(()));
        let delivery = bus.publish(EventName::GuildCreate, &json!({"name": "no id"}));
        assert_eq!(delivery, Delivery { handled: 0, failed: 1 });
    }

    // -- unsubscribe() -----------------------------------------------------

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let bus = EventBus::new();
        let calls = log();
        let first = bus.subscribe(EventName::MessageCreate, recorder(&calls, "h1"));
        bus.subscribe(EventName::MessageCreate, recorder(&calls, "h2"));

        assert!(bus.unsubscribe(first));
        bus.publish(EventName::MessageCreate, &json!({}));

        assert_eq!(*calls.lock().unwrap(), vec!["h2"]);
        assert_eq!(bus.handler_count(EventName::MessageCreate), 1);
    }

    #[test]
    fn unsubscribing_last_handler_drops_its_intents() {
        let bus = EventBus::new();
        let presence = bus.subscribe(EventName::PresenceUpdate, noop);
        bus.subscribe(EventName::GuildCreate, noop);
        assert!(bus.calculate_intents().contains(Intents::GUILD_PRESENCES));

        assert!(bus.unsubscribe(presence));
        assert_eq!(bus.calculate_intents(), Intents::GUILDS);
        assert_eq!(bus.subscribed_events(), vec![EventName::GuildCreate]);
    }

    #[test]
    fn unsubscribe_twice_returns_false() {
        let bus = EventBus::new();
        let id = bus.subscribe(EventName::MessageCreate, noop);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn unsubscribe_from_keeps_earlier_handlers() {
        let bus = EventBus::new();
        let calls = log();
        bus.subscribe(EventName::MessageCreate, recorder(&calls, "kept"));
        let mark = bus.next_subscription_id();
        bus.subscribe(EventName::MessageCreate, recorder(&calls, "dropped"));
        bus.subscribe(EventName::PresenceUpdate, noop);

        assert_eq!(bus.unsubscribe_from(mark), 2);
        bus.publish(EventName::MessageCreate, &json!({}));

        assert_eq!(*calls.lock().unwrap(), vec!["kept"]);
        assert_eq!(bus.subscribed_events(), vec![EventName::MessageCreate]);
        assert_eq!(bus.calculate_intents(), Intents::GUILD_MESSAGES);
    }

    #[test]
    fn next_subscription_id_matches_subscribe() {
        let bus = EventBus::new();
        let expected = bus.next_subscription_id();
        assert_eq!(bus.subscribe(EventName::Ready, noop), expected);
        assert!(bus.next_subscription_id() > expected);
    }

    // -- introspection -----------------------------------------------------

    #[test]
    fn subscribed_events_are_sorted_and_distinct() {
        let bus = EventBus::new();
        bus.subscribe(EventName::TypingStart, noop);
        bus.subscribe(EventName::Ready, noop);
        bus.subscribe(EventName::TypingStart, noop);
        assert_eq!(
            bus.subscribed_events(),
            vec![EventName::Ready, EventName::TypingStart]
        );
    }

    #[test]
    fn debug_lists_handler_counts() {
        let bus = EventBus::new();
        bus.subscribe(EventName::Ready, noop);
        let text = format!("{bus:?}");
        assert!(text.contains("Ready"));
        assert!(text.contains("next_id: 1"));
    }

    #[test]
    fn concurrent_subscribe_and_publish() {
        let bus = Arc::new(EventBus::new());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        bus.subscribe(EventName::MessageCreate, noop);
                        bus.publish(EventName::MessageCreate, &json!({}));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(bus.handler_count(EventName::MessageCreate), 200);
    }
}
