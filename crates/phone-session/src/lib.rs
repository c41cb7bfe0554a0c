//! Multi-tap keypad decoding.
//!
//! `Decoder` owns one session's text and cycle state and turns each key event
//! into a [`DecoderResponse`]. `PhoneSession` wraps a decoder with its idle
//! timer and subscribers, and `SessionRegistry` keeps one session per id.

pub mod registry;
pub mod session;
pub mod timer;

mod events;
mod key_handlers;
mod types;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use phone_core::input::Symbol;
use phone_core::keymap::KeyMap;

pub use events::{Subscription, SubscriptionId};
pub use registry::{RegistryConfig, RegistryStats, SessionRegistry};
pub use session::PhoneSession;
pub use timer::{ManualScheduler, ThreadScheduler, TimeoutScheduler, TimerId, TimerTask};
pub use types::{DecoderEvent, DecoderResponse, DecoderState, TimerAction};

/// Single-session multi-tap state machine.
///
/// Holds no timer itself: operations report the [`TimerAction`] the owner
/// must take, so the same logic serves live sessions and recorded replays.
#[derive(Debug, Clone)]
pub struct Decoder {
    keymap: Arc<KeyMap>,
    text: String,
    state: DecoderState,
}

impl Decoder {
    pub fn new(keymap: Arc<KeyMap>) -> Self {
        Self {
            keymap,
            text: String::new(),
            state: DecoderState::Idle,
        }
    }

    /// Decoder over the process-wide keypad.
    pub fn standard() -> Self {
        Self::new(KeyMap::global())
    }

    pub fn current_text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    /// Feed a recorded symbol stream and return the resulting text.
    ///
    /// `#` completes and ends the stream: the completed text is returned and
    /// the rest of `input` is ignored. `*` is backspace and a space stands for
    /// the idle pause. Everything else goes through `process_key`.
    pub fn decode(&mut self, input: &str) -> String {
        self.replay(input, |_| {})
    }

    /// Like [`decode`](Self::decode), handing every response to `apply` in order.
    pub fn replay<F>(&mut self, input: &str, mut apply: F) -> String
    where
        F: FnMut(DecoderResponse),
    {
        for c in input.chars() {
            let resp = self.handle(Symbol::classify(c));
            let completed = resp.completed().map(str::to_owned);
            apply(resp);
            if let Some(text) = completed {
                return text;
            }
        }
        self.text.clone()
    }
}
