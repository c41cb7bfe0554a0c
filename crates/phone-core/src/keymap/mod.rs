//! Digit key → letter cycle table.
//!
//! The standard keypad is embedded as TOML; a custom layout can be installed
//! before the global table is first used, the same way settings are.

mod config;
mod table;

pub use config::{parse_keymap_toml, KeymapConfigError};
pub use table::{default_toml, KeyMap};
