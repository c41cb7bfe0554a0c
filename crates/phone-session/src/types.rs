/// Cycle state of a [`Decoder`](crate::Decoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// No key mid-cycle; the next digit press starts a new letter.
    Idle,
    /// `key` is mid-cycle and the last character of the text is
    /// `cycle(key)[press_count]`.
    Cycling { key: char, press_count: usize },
}

impl DecoderState {
    pub fn active_key(&self) -> Option<char> {
        match *self {
            DecoderState::Cycling { key, .. } => Some(key),
            DecoderState::Idle => None,
        }
    }
}

/// Notification published to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    TextChanged(String),
    TextCompleted(String),
}

/// What the owning session must do with its idle timer after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Leave any armed timer as it is.
    Keep,
    /// Cancel any armed timer and arm a fresh one.
    Arm,
    /// Cancel any armed timer.
    Cancel,
}

/// Response from a decoder operation, returned to the owning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderResponse {
    pub events: Vec<DecoderEvent>,
    pub timer: TimerAction,
}

impl DecoderResponse {
    pub(crate) fn unchanged() -> Self {
        Self {
            events: Vec::new(),
            timer: TimerAction::Keep,
        }
    }

    pub(crate) fn reset() -> Self {
        Self {
            events: Vec::new(),
            timer: TimerAction::Cancel,
        }
    }

    pub(crate) fn with_event(event: DecoderEvent, timer: TimerAction) -> Self {
        Self {
            events: vec![event],
            timer,
        }
    }

    /// Text carried by a `TextCompleted` event, if this response has one.
    pub fn completed(&self) -> Option<&str> {
        self.events.iter().find_map(|e| match e {
            DecoderEvent::TextCompleted(text) => Some(text.as_str()),
            DecoderEvent::TextChanged(_) => None,
        })
    }
}
