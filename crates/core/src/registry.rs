//! Dispatch registry. Owns the registered integrations, drives their
//! lifecycle and fans messages out to them.
//!
//! An integration is not called at all until `loaded()` returns true. Its
//! `initialize` runs on the first successful probe, after which it is
//! `Ready` and receives event calls. Messages that arrive earlier are queued
//! per integration (bounded, oldest dropped first) and replayed in arrival
//! order on readiness.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::facade::{Identify, Message, Page, Track};
use crate::integration::{Integration, Lifecycle};
use crate::user::UserContext;

struct Slot {
    integration: Box<dyn Integration>,
    state: Lifecycle,
    queue: VecDeque<Message>,
}

impl Slot {
    fn name(&self) -> &'static str {
        self.integration.name()
    }

    /// Enter `Initializing`. With `ready_on_initialize` the vendor is probed
    /// right away; otherwise the next [`Analytics::poll`] does it.
    fn start(&mut self, user: &UserContext) {
        self.state = Lifecycle::Initializing;
        debug!(integration = self.name(), "integration initializing");
        if self.integration.descriptor().ready_on_initialize {
            self.check_ready(user);
        }
    }

    /// Once the vendor SDK is reachable: run `initialize` (exactly once),
    /// promote to `Ready` and replay the queue.
    fn check_ready(&mut self, user: &UserContext) -> bool {
        if self.state != Lifecycle::Initializing || !self.integration.loaded() {
            return false;
        }
        self.integration.initialize(user);
        self.state = Lifecycle::Ready;
        info!(
            integration = self.name(),
            queued = self.queue.len(),
            "integration ready"
        );
        while let Some(message) = self.queue.pop_front() {
            forward(self.integration.as_mut(), &message);
        }
        true
    }

    fn enqueue(&mut self, message: Message, capacity: usize) {
        if capacity == 0 {
            warn!(
                integration = self.name(),
                kind = message.kind(),
                "integration not ready and queueing disabled, dropping message"
            );
            return;
        }
        if self.queue.len() >= capacity {
            if let Some(dropped) = self.queue.pop_front() {
                warn!(
                    integration = self.name(),
                    message_id = %dropped.envelope().message_id,
                    "queue full, dropping oldest message"
                );
            }
        }
        self.queue.push_back(message);
    }

    /// Remove and return the first queued page, if any.
    fn take_queued_page(&mut self) -> Option<Message> {
        let index = self
            .queue
            .iter()
            .position(|message| matches!(message, Message::Page(_)))?;
        self.queue.remove(index)
    }
}

fn forward(integration: &mut dyn Integration, message: &Message) {
    let name = integration.name();
    match message {
        Message::Page(page) => integration.page(page),
        Message::Identify(identify) => integration.identify(identify),
        Message::Track(track) if track.is_completed_order() => integration.completed_order(track),
        Message::Track(track) => integration.track(track, track.options(name)),
    }
    debug!(
        integration = name,
        kind = message.kind(),
        message_id = %message.envelope().message_id,
        "message forwarded"
    );
}

/// The analytics dispatch registry.
pub struct Analytics {
    slots: Vec<Slot>,
    user: UserContext,
    queue_capacity: usize,
    initialized: bool,
}

impl Analytics {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            user: UserContext::default(),
            queue_capacity,
            initialized: false,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.queue_capacity)
    }

    /// Seed the user context, e.g. from a persisted session.
    pub fn with_user(mut self, user: UserContext) -> Self {
        self.user = user;
        self
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    /// Register an integration. Registering after [`Analytics::initialize`]
    /// starts it right away (unless it waits for a pageview).
    pub fn add_integration(&mut self, integration: Box<dyn Integration>) -> BridgeResult<()> {
        let name = integration.name();
        if self.slots.iter().any(|slot| slot.name() == name) {
            return Err(BridgeError::DuplicateIntegration(name.to_string()));
        }

        let mut slot = Slot {
            integration,
            state: Lifecycle::Uninitialized,
            queue: VecDeque::new(),
        };
        if self.initialized && !slot.integration.descriptor().assumes_pageview {
            slot.start(&self.user);
        }
        debug!(integration = name, "integration registered");
        self.slots.push(slot);
        Ok(())
    }

    pub fn integrations(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(Slot::name)
    }

    pub fn state(&self, name: &str) -> BridgeResult<Lifecycle> {
        self.slots
            .iter()
            .find(|slot| slot.name() == name)
            .map(|slot| slot.state)
            .ok_or_else(|| BridgeError::UnknownIntegration(name.to_string()))
    }

    /// Number of messages waiting for `name` to become ready.
    pub fn queued(&self, name: &str) -> BridgeResult<usize> {
        self.slots
            .iter()
            .find(|slot| slot.name() == name)
            .map(|slot| slot.queue.len())
            .ok_or_else(|| BridgeError::UnknownIntegration(name.to_string()))
    }

    /// Start every registered integration. Integrations that assume a
    /// pageview wait for the first page message instead. Calling this twice
    /// is a no-op.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        let Self { slots, user, .. } = self;
        for slot in slots.iter_mut() {
            if slot.state != Lifecycle::Uninitialized {
                continue;
            }
            if !slot.integration.descriptor().assumes_pageview
                || slot.take_queued_page().is_some()
            {
                slot.start(user);
            }
        }
    }

    /// Re-check `loaded()` on every initializing integration. Returns how many
    /// became ready.
    pub fn poll(&mut self) -> usize {
        let Self { slots, user, .. } = self;
        slots
            .iter_mut()
            .filter(|slot| slot.state == Lifecycle::Initializing)
            .map(|slot| slot.check_ready(user))
            .filter(|became_ready| *became_ready)
            .count()
    }

    pub fn is_ready(&self) -> bool {
        self.slots.iter().all(|slot| slot.state == Lifecycle::Ready)
    }

    pub fn page(&mut self, page: Page) {
        self.dispatch(Message::Page(page));
    }

    /// Update the user context, then fan the identify out.
    pub fn identify(&mut self, identify: Identify) {
        self.dispatch(Message::Identify(identify));
    }

    /// Completed-order events reach `completed_order`, everything else `track`.
    pub fn track(&mut self, track: Track) {
        self.dispatch(Message::Track(track));
    }

    pub fn dispatch(&mut self, message: Message) {
        if let Message::Identify(identify) = &message {
            self.user.identify(identify);
        }

        let capacity = self.queue_capacity;
        let initialized = self.initialized;
        let Self { slots, user, .. } = self;

        for slot in slots.iter_mut() {
            if !message.envelope().is_enabled_for(slot.name()) {
                debug!(
                    integration = slot.name(),
                    kind = message.kind(),
                    "integration disabled for message"
                );
                continue;
            }

            match slot.state {
                Lifecycle::Ready => forward(slot.integration.as_mut(), &message),
                Lifecycle::Uninitialized
                    if initialized
                        && slot.integration.descriptor().assumes_pageview
                        && matches!(message, Message::Page(_)) =>
                {
                    slot.start(user);
                }
                Lifecycle::Uninitialized | Lifecycle::Initializing => {
                    slot.enqueue(message.clone(), capacity);
                }
            }
        }
    }
}

impl Default for Analytics {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::integration::IntegrationDescriptor;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Spy {
        calls: Arc<Mutex<Vec<String>>>,
        present: Arc<AtomicBool>,
    }

    impl Spy {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn set_present(&self, present: bool) {
            self.present.store(present, Ordering::SeqCst);
        }
    }

    struct FakeIntegration {
        descriptor: IntegrationDescriptor,
        spy: Spy,
    }

    impl FakeIntegration {
        fn boxed(descriptor: IntegrationDescriptor, spy: &Spy) -> Box<dyn Integration> {
            Box::new(Self {
                descriptor,
                spy: spy.clone(),
            })
        }

        fn record(&self, call: String) {
            self.spy.calls.lock().unwrap().push(call);
        }
    }

    impl Integration for FakeIntegration {
        fn descriptor(&self) -> &IntegrationDescriptor {
            &self.descriptor
        }

        fn initialize(&mut self, user: &UserContext) {
            self.record(format!("initialize:{}", user.id().unwrap_or("-")));
        }

        fn loaded(&self) -> bool {
            self.spy.present.load(Ordering::SeqCst)
        }

        fn page(&mut self, page: &Page) {
            self.record(format!("page:{}", page.url().unwrap_or_default()));
        }

        fn identify(&mut self, identify: &Identify) {
            self.record(format!("identify:{}", identify.user_id().unwrap_or("-")));
        }

        fn track(&mut self, track: &Track, options: Option<&Value>) {
            let with_options = if options.is_some() { "+options" } else { "" };
            self.record(format!("track:{}{}", track.event(), with_options));
        }
    }

    fn eager(name: &'static str) -> IntegrationDescriptor {
        IntegrationDescriptor::new(name, name).ready_on_initialize()
    }

    #[test]
    fn test_ready_on_initialize_when_loaded() {
        let spy = Spy::default();
        spy.set_present(true);
        let mut analytics = Analytics::default();
        analytics
            .add_integration(FakeIntegration::boxed(eager("A"), &spy))
            .unwrap();
        assert_eq!(analytics.state("A").unwrap(), Lifecycle::Uninitialized);

        analytics.initialize();
        assert_eq!(analytics.state("A").unwrap(), Lifecycle::Ready);

        analytics.track(Track::new("Signed Up", json!({})));
        assert_eq!(spy.calls(), vec!["initialize:-", "track:Signed Up"]);
    }

    #[test]
    fn test_messages_queue_until_loaded() {
        let spy = Spy::default();
        let mut analytics = Analytics::default();
        analytics
            .add_integration(FakeIntegration::boxed(eager("A"), &spy))
            .unwrap();

        analytics.track(Track::new("Early", json!({})));
        analytics.initialize();
        analytics.page(Page::new(None, json!({ "url": "app://home" })));
        assert_eq!(analytics.state("A").unwrap(), Lifecycle::Initializing);
        assert_eq!(analytics.queued("A").unwrap(), 2);
        assert_eq!(analytics.poll(), 0);
        assert!(spy.calls().is_empty());

        spy.set_present(true);
        assert_eq!(analytics.poll(), 1);
        assert!(analytics.is_ready());
        assert_eq!(
            spy.calls(),
            vec!["initialize:-", "track:Early", "page:app://home"]
        );
        assert_eq!(analytics.queued("A").unwrap(), 0);
    }

    #[test]
    fn test_not_ready_on_initialize_waits_for_poll() {
        let spy = Spy::default();
        spy.set_present(true);
        let mut analytics = Analytics::default();
        analytics
            .add_integration(FakeIntegration::boxed(IntegrationDescriptor::new("A", "a"), &spy))
            .unwrap();
        analytics.initialize();
        assert_eq!(analytics.state("A").unwrap(), Lifecycle::Initializing);
        assert!(spy.calls().is_empty());
        assert_eq!(analytics.poll(), 1);
        assert_eq!(analytics.state("A").unwrap(), Lifecycle::Ready);
        assert_eq!(analytics.poll(), 0);
        assert_eq!(spy.calls(), vec!["initialize:-"]);
    }

    #[test]
    fn test_queue_drops_oldest_when_full() {
        let spy = Spy::default();
        let mut analytics = Analytics::new(2);
        analytics
            .add_integration(FakeIntegration::boxed(eager("A"), &spy))
            .unwrap();
        for event in ["one", "two", "three"] {
            analytics.track(Track::new(event, json!({})));
        }
        assert_eq!(analytics.queued("A").unwrap(), 2);

        spy.set_present(true);
        analytics.initialize();
        assert_eq!(
            spy.calls(),
            vec!["initialize:-", "track:two", "track:three"]
        );
    }

    #[test]
    fn test_assumes_pageview_initializes_on_first_page() {
        let spy = Spy::default();
        spy.set_present(true);
        let mut analytics = Analytics::default();
        analytics
            .add_integration(FakeIntegration::boxed(eager("Q").assumes_pageview(), &spy))
            .unwrap();

        analytics.initialize();
        assert_eq!(analytics.state("Q").unwrap(), Lifecycle::Uninitialized);

        analytics.track(Track::new("Before", json!({})));
        analytics.page(Page::new(None, json!({ "url": "app://first" })));
        analytics.page(Page::new(None, json!({ "url": "app://second" })));

        assert_eq!(
            spy.calls(),
            vec!["initialize:-", "track:Before", "page:app://second"]
        );
    }

    #[test]
    fn test_assumes_pageview_with_page_queued_before_initialize() {
        let spy = Spy::default();
        spy.set_present(true);
        let mut analytics = Analytics::default();
        analytics
            .add_integration(FakeIntegration::boxed(eager("Q").assumes_pageview(), &spy))
            .unwrap();

        analytics.page(Page::new(None, json!({ "url": "app://first" })));
        analytics.initialize();
        assert_eq!(analytics.state("Q").unwrap(), Lifecycle::Ready);
        assert_eq!(spy.calls(), vec!["initialize:-"]);
    }

    #[test]
    fn test_identify_updates_user_before_initialize() {
        let spy = Spy::default();
        spy.set_present(true);
        let mut analytics = Analytics::default();
        analytics
            .add_integration(FakeIntegration::boxed(eager("A"), &spy))
            .unwrap();

        analytics.identify(Identify::new(Some("u-7"), json!({ "plan": "pro" })));
        assert_eq!(analytics.user().id(), Some("u-7"));
        assert_eq!(analytics.user().trait_value("plan"), Some(&json!("pro")));

        analytics.initialize();
        assert_eq!(spy.calls(), vec!["initialize:u-7", "identify:u-7"]);
    }

    #[test]
    fn test_integration_switches() {
        let a = Spy::default();
        let b = Spy::default();
        a.set_present(true);
        b.set_present(true);
        let mut analytics = Analytics::default();
        analytics.add_integration(FakeIntegration::boxed(eager("A"), &a)).unwrap();
        analytics.add_integration(FakeIntegration::boxed(eager("B"), &b)).unwrap();
        analytics.initialize();

        let mut track = Track::new("Only B", json!({}));
        track.envelope.integrations.insert("All".into(), json!(false));
        track.envelope.integrations.insert("B".into(), json!({ "x": 1 }));
        analytics.track(track);

        assert_eq!(a.calls(), vec!["initialize:-"]);
        assert_eq!(b.calls(), vec!["initialize:-", "track:Only B+options"]);
    }

    #[test]
    fn test_completed_order_defaults_to_track() {
        let spy = Spy::default();
        spy.set_present(true);
        let mut analytics = Analytics::default();
        analytics
            .add_integration(FakeIntegration::boxed(eager("A"), &spy))
            .unwrap();
        analytics.initialize();
        analytics.track(Track::new("Completed Order", json!({ "orderId": "O1" })));
        assert_eq!(spy.calls(), vec!["initialize:-", "track:Completed Order"]);
    }

    #[test]
    fn test_duplicate_and_unknown_integrations() {
        let spy = Spy::default();
        let mut analytics = Analytics::default();
        analytics
            .add_integration(FakeIntegration::boxed(eager("A"), &spy))
            .unwrap();
        let err = analytics
            .add_integration(FakeIntegration::boxed(eager("A"), &spy))
            .unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateIntegration(_)));
        assert!(matches!(
            analytics.state("Z"),
            Err(BridgeError::UnknownIntegration(_))
        ));
        assert_eq!(analytics.integrations().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn test_late_registration_starts_immediately() {
        let spy = Spy::default();
        spy.set_present(true);
        let mut analytics = Analytics::default();
        analytics.initialize();
        analytics
            .add_integration(FakeIntegration::boxed(eager("A"), &spy))
            .unwrap();
        assert_eq!(analytics.state("A").unwrap(), Lifecycle::Ready);
    }

    #[test]
    fn test_initialize_runs_once() {
        let spy = Spy::default();
        spy.set_present(true);
        let mut analytics = Analytics::default();
        analytics
            .add_integration(FakeIntegration::boxed(eager("A"), &spy))
            .unwrap();
        analytics.initialize();
        analytics.initialize();
        assert_eq!(spy.calls(), vec!["initialize:-"]);
    }
}
