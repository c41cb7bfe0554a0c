mod session;

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use phone_core::keymap::KeyMap;

use crate::timer::ManualScheduler;
use crate::{Decoder, DecoderEvent, DecoderState, PhoneSession};

pub(super) const IDLE: Duration = Duration::from_millis(1000);

pub(super) fn decoder() -> Decoder {
    Decoder::new(Arc::new(KeyMap::standard()))
}

/// Session on a virtual clock; advance the returned scheduler to fire timers.
pub(super) fn manual_session(id: &str) -> (Arc<PhoneSession>, Arc<ManualScheduler>) {
    let sched = Arc::new(ManualScheduler::new());
    let session = PhoneSession::new(
        id,
        Arc::new(KeyMap::standard()),
        sched.clone(),
        IDLE,
        None,
    );
    (session, sched)
}

// Helper: press each character as a key, one at a time
pub(super) fn press_keys(decoder: &mut Decoder, keys: &str) {
    for key in keys.chars() {
        decoder.process_key(key);
    }
}

pub(super) fn drain(rx: &Receiver<DecoderEvent>) -> Vec<DecoderEvent> {
    rx.try_iter().collect()
}

pub(super) fn changed(text: &str) -> DecoderEvent {
    DecoderEvent::TextChanged(text.to_string())
}

pub(super) fn completed(text: &str) -> DecoderEvent {
    DecoderEvent::TextCompleted(text.to_string())
}

/// If a key is mid-cycle, the last character is that key's current letter.
pub(super) fn assert_cycle_invariant(decoder: &Decoder) {
    if let DecoderState::Cycling { key, press_count } = decoder.state() {
        let cycle = decoder
            .keymap()
            .cycle_for(key)
            .expect("active key must be in the keymap");
        assert!(
            press_count < cycle.len(),
            "press_count {press_count} out of range for key {key}"
        );
        assert_eq!(
            decoder.current_text().chars().last(),
            Some(cycle[press_count]),
            "last character must be the in-progress letter of {key}"
        );
    }
}
