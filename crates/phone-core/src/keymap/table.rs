use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use super::config::{parse_keymap_toml, KeymapConfigError};

const DEFAULT_TOML: &str = include_str!("default_keymap.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Returns the embedded standard keypad TOML.
pub fn default_toml() -> &'static str {
    DEFAULT_TOML
}

/// Immutable table from digit key to its ordered letter cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    cycles: BTreeMap<char, Vec<char>>,
}

impl KeyMap {
    /// Set custom TOML before first `global()` call.
    pub fn init_custom(toml_content: String) -> Result<(), KeymapConfigError> {
        // Validate eagerly
        parse_keymap_toml(&toml_content)?;
        CUSTOM_TOML
            .set(toml_content)
            .map_err(|_| KeymapConfigError::AlreadyInitialized)
    }

    /// Get or initialize the process-wide keypad.
    pub fn global() -> Arc<KeyMap> {
        static INSTANCE: OnceLock<Arc<KeyMap>> = OnceLock::new();
        let map = INSTANCE.get_or_init(|| {
            let toml_str = CUSTOM_TOML
                .get()
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_TOML);
            let cycles = parse_keymap_toml(toml_str).expect("keymap TOML must be valid");
            Arc::new(KeyMap { cycles })
        });
        Arc::clone(map)
    }

    /// The standard keypad, independent of any custom global layout.
    pub fn standard() -> KeyMap {
        let cycles = parse_keymap_toml(DEFAULT_TOML).expect("keymap TOML must be valid");
        KeyMap { cycles }
    }

    pub fn from_toml(toml_str: &str) -> Result<KeyMap, KeymapConfigError> {
        Ok(KeyMap {
            cycles: parse_keymap_toml(toml_str)?,
        })
    }

    /// Ordered letter cycle for `key`, or `None` if `key` is not a keypad digit.
    pub fn cycle_for(&self, key: char) -> Option<&[char]> {
        self.cycles.get(&key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: char) -> bool {
        self.cycles.contains_key(&key)
    }

    /// Digit keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = char> + '_ {
        self.cycles.keys().copied()
    }
}
