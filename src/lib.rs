//! Old-phone keypad engine.
//!
//! Facade over the workspace crates: `phone_core` holds the keypad layout,
//! settings and message store; `phone_session` holds the multi-tap decoder,
//! per-session timers and the session registry.

pub mod trace_init;

pub use phone_core::input::{self, Command, InputError, Symbol};
pub use phone_core::keymap::{self, KeyMap, KeymapConfigError};
pub use phone_core::settings::{self, Settings, SettingsError};
pub use phone_core::store::{
    self, JournalStore, MemoryStore, MessageRecord, MessageStore, StoreError,
};
pub use phone_session::{
    Decoder, DecoderEvent, DecoderResponse, DecoderState, ManualScheduler, PhoneSession,
    RegistryConfig, RegistryStats, SessionRegistry, Subscription, SubscriptionId,
    ThreadScheduler, TimeoutScheduler, TimerAction,
};

/// Decode a recorded keypad stream on the standard keypad.
///
/// A space stands for the idle pause, `*` deletes, and `#` ends the input;
/// the text completed at `#` is returned. Pure: no timers, no shared state.
pub fn decode(input: &str) -> String {
    Decoder::standard().decode(input)
}

pub fn engine_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
