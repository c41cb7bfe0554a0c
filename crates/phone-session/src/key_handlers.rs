use std::mem;

use tracing::{debug, debug_span};

use phone_core::input::Symbol;

use super::types::{DecoderEvent, DecoderResponse, DecoderState, TimerAction};
use super::Decoder;

impl Decoder {
    /// Dispatch one stream symbol to the matching operation.
    pub fn handle(&mut self, symbol: Symbol) -> DecoderResponse {
        match symbol {
            Symbol::Key(key) => self.process_key(key),
            Symbol::Backspace => self.process_backspace(),
            Symbol::Pause => self.process_timeout(),
            Symbol::Complete => self.process_complete(),
        }
    }

    pub fn process_key(&mut self, key: char) -> DecoderResponse {
        let _span = debug_span!("process_key", key = %key).entered();

        let Some(cycle) = self.keymap.cycle_for(key) else {
            debug!("not a keypad key, ignored");
            return DecoderResponse::unchanged();
        };

        let press_count = match self.state {
            DecoderState::Cycling {
                key: active,
                press_count,
            } if active == key => {
                // Same key: replace the in-progress letter with the next one
                self.text.pop();
                (press_count + 1) % cycle.len()
            }
            _ => 0,
        };
        self.text.push(cycle[press_count]);
        self.state = DecoderState::Cycling { key, press_count };

        debug!(press_count, text = %self.text);
        DecoderResponse::with_event(DecoderEvent::TextChanged(self.text.clone()), TimerAction::Arm)
    }

    pub fn process_backspace(&mut self) -> DecoderResponse {
        let _span = debug_span!("process_backspace").entered();

        if self.text.pop().is_none() {
            return DecoderResponse::unchanged();
        }
        self.state = DecoderState::Idle;
        DecoderResponse::with_event(
            DecoderEvent::TextChanged(self.text.clone()),
            TimerAction::Cancel,
        )
    }

    /// Commit the in-progress letter. Text is untouched and nothing is emitted.
    pub fn process_timeout(&mut self) -> DecoderResponse {
        let _span = debug_span!("process_timeout").entered();
        self.state = DecoderState::Idle;
        DecoderResponse::reset()
    }

    /// Emit the current text as completed, then clear it. Empty text still completes.
    pub fn process_complete(&mut self) -> DecoderResponse {
        let _span = debug_span!("process_complete").entered();
        let completed = mem::take(&mut self.text);
        self.state = DecoderState::Idle;
        debug!(text = %completed, "completed");
        DecoderResponse::with_event(DecoderEvent::TextCompleted(completed), TimerAction::Cancel)
    }

    /// Clear the text without notifying.
    pub fn process_cleaning(&mut self) -> DecoderResponse {
        let _span = debug_span!("process_cleaning").entered();
        self.text.clear();
        self.state = DecoderState::Idle;
        DecoderResponse::reset()
    }
}
