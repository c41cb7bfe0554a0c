//! Per-session handle: a decoder, its idle timer and its subscribers behind
//! one lock, so key events and timer fires are applied one at a time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use phone_core::keymap::KeyMap;
use phone_core::store::{MessageRecord, MessageStore};

use super::events::{EventBus, Subscription, SubscriptionId};
use super::timer::{TimeoutScheduler, TimerId};
use super::types::{DecoderEvent, DecoderResponse, DecoderState, TimerAction};
use super::Decoder;

/// The armed idle timer, if any. `generation` changes on every cancel so a
/// task that was already dequeued when its timer got cancelled finds itself
/// stale once it acquires the session lock.
#[derive(Default)]
struct IdleTimer {
    pending: Option<TimerId>,
    generation: u64,
}

struct SessionInner {
    decoder: Decoder,
    timer: IdleTimer,
    closed: bool,
    last_activity: Instant,
}

pub struct PhoneSession {
    id: String,
    me: Weak<PhoneSession>,
    inner: Mutex<SessionInner>,
    subscribers: EventBus,
    scheduler: Arc<dyn TimeoutScheduler>,
    idle_timeout: Duration,
    store: Option<Arc<dyn MessageStore>>,
    created_at: Instant,
}

impl PhoneSession {
    pub fn new(
        id: &str,
        keymap: Arc<KeyMap>,
        scheduler: Arc<dyn TimeoutScheduler>,
        idle_timeout: Duration,
        store: Option<Arc<dyn MessageStore>>,
    ) -> Arc<Self> {
        let now = Instant::now();
        Arc::new_cyclic(|me| Self {
            id: id.to_string(),
            me: me.clone(),
            inner: Mutex::new(SessionInner {
                decoder: Decoder::new(keymap),
                timer: IdleTimer::default(),
                closed: false,
                last_activity: now,
            }),
            subscribers: EventBus::default(),
            scheduler,
            idle_timeout,
            store,
            created_at: now,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock for a caller-initiated operation. `None` once the session is closed.
    fn lock_active(&self, op: &str) -> Option<MutexGuard<'_, SessionInner>> {
        let mut inner = self.lock();
        if inner.closed {
            debug!(session_id = %self.id, op, "session closed, ignored");
            return None;
        }
        inner.last_activity = Instant::now();
        Some(inner)
    }

    pub fn process_key(&self, key: char) {
        let Some(mut inner) = self.lock_active("process_key") else {
            return;
        };
        let resp = inner.decoder.process_key(key);
        self.apply(&mut inner.timer, resp);
    }

    pub fn process_backspace(&self) {
        let Some(mut inner) = self.lock_active("process_backspace") else {
            return;
        };
        let resp = inner.decoder.process_backspace();
        self.apply(&mut inner.timer, resp);
    }

    pub fn process_timeout(&self) {
        let Some(mut inner) = self.lock_active("process_timeout") else {
            return;
        };
        let resp = inner.decoder.process_timeout();
        self.apply(&mut inner.timer, resp);
    }

    pub fn process_complete(&self) {
        let Some(mut inner) = self.lock_active("process_complete") else {
            return;
        };
        let resp = inner.decoder.process_complete();
        self.apply(&mut inner.timer, resp);
    }

    pub fn process_cleaning(&self) {
        let Some(mut inner) = self.lock_active("process_cleaning") else {
            return;
        };
        let resp = inner.decoder.process_cleaning();
        self.apply(&mut inner.timer, resp);
    }

    /// Replay a recorded stream through this session; see [`Decoder::decode`].
    ///
    /// The whole stream is applied under one lock, so no timer fire or other
    /// caller interleaves with it.
    pub fn decode(&self, input: &str) -> String {
        let Some(mut inner) = self.lock_active("decode") else {
            return String::new();
        };
        let SessionInner { decoder, timer, .. } = &mut *inner;
        decoder.replay(input, |resp| self.apply(timer, resp))
    }

    pub fn current_text(&self) -> String {
        self.lock().decoder.current_text().to_string()
    }

    pub fn state(&self) -> DecoderState {
        self.lock().decoder.state()
    }

    /// Whether an idle timer is armed.
    pub fn has_pending_timeout(&self) -> bool {
        self.lock().timer.pending.is_some()
    }

    pub fn subscribe(&self) -> Subscription {
        self.subscribers.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Cancel the idle timer and disconnect subscribers. Later operations are
    /// ignored. Idempotent.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        self.cancel_timer(&mut inner.timer);
        self.subscribers.clear();
        debug!(session_id = %self.id, "session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Time since the last caller-initiated operation.
    pub fn idle_for(&self) -> Duration {
        self.lock().last_activity.elapsed()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    fn apply(&self, timer: &mut IdleTimer, resp: DecoderResponse) {
        match resp.timer {
            TimerAction::Keep => {}
            TimerAction::Arm => self.arm_timer(timer),
            TimerAction::Cancel => self.cancel_timer(timer),
        }
        for event in &resp.events {
            if let DecoderEvent::TextCompleted(text) = event {
                self.persist(text);
            }
            self.subscribers.publish(event);
        }
    }

    fn arm_timer(&self, timer: &mut IdleTimer) {
        self.cancel_timer(timer);
        let generation = timer.generation;
        let me = Weak::clone(&self.me);
        let id = self.scheduler.schedule(
            self.idle_timeout,
            Box::new(move || {
                if let Some(session) = me.upgrade() {
                    session.fire_timeout(generation);
                }
            }),
        );
        timer.pending = Some(id);
    }

    fn cancel_timer(&self, timer: &mut IdleTimer) {
        timer.generation = timer.generation.wrapping_add(1);
        if let Some(id) = timer.pending.take() {
            self.scheduler.cancel(id);
        }
    }

    /// Timer callback; serialized with key events through the session lock.
    fn fire_timeout(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.closed || inner.timer.generation != generation || inner.timer.pending.is_none() {
            debug!(session_id = %self.id, generation, "stale idle timeout dropped");
            return;
        }
        inner.timer.pending = None;
        let resp = inner.decoder.process_timeout();
        self.apply(&mut inner.timer, resp);
    }

    fn persist(&self, text: &str) {
        let Some(ref store) = self.store else {
            return;
        };
        if text.is_empty() {
            return;
        }
        if let Err(e) = store.put(MessageRecord::new(&self.id, text)) {
            warn!(session_id = %self.id, error = %e, "failed to store completed text");
        }
    }
}
