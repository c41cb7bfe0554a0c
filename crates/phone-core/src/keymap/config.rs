use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Deserialize)]
struct KeymapConfig {
    cycles: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum KeymapConfigError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("[cycles] table is empty")]
    Empty,
    #[error("key must be a single digit 0-9: {0:?}")]
    InvalidKey(String),
    #[error("empty cycle for key: {0}")]
    EmptyCycle(char),
    #[error("keymap already initialized")]
    AlreadyInitialized,
}

/// Parse TOML text into a sorted `BTreeMap<digit, cycle>`.
pub fn parse_keymap_toml(toml_str: &str) -> Result<BTreeMap<char, Vec<char>>, KeymapConfigError> {
    let config: KeymapConfig =
        toml::from_str(toml_str).map_err(|e| KeymapConfigError::Parse(e.to_string()))?;

    if config.cycles.is_empty() {
        return Err(KeymapConfigError::Empty);
    }

    let mut cycles = BTreeMap::new();
    for (key, letters) in config.cycles {
        let mut chars = key.chars();
        let digit = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_digit() => c,
            _ => return Err(KeymapConfigError::InvalidKey(key)),
        };
        if letters.is_empty() {
            return Err(KeymapConfigError::EmptyCycle(digit));
        }
        cycles.insert(digit, letters.chars().collect());
    }

    Ok(cycles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_toml() {
        let toml = r#"
[cycles]
"2" = "abc"
"0" = " "
"#;
        let map = parse_keymap_toml(toml).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&'2'], vec!['a', 'b', 'c']);
        assert_eq!(map[&'0'], vec![' ']);
    }

    #[test]
    fn parse_default_toml() {
        let map = parse_keymap_toml(super::super::default_toml()).unwrap();
        assert_eq!(map.len(), 10);
        assert_eq!(map[&'7'].len(), 4);
        assert_eq!(map[&'1'], vec!['&', '\'', '(']);
    }

    #[test]
    fn error_empty_cycles() {
        let err = parse_keymap_toml("[cycles]\n").unwrap_err();
        assert!(matches!(err, KeymapConfigError::Empty));
    }

    #[test]
    fn error_non_digit_key() {
        let toml = r#"
[cycles]
"a" = "xyz"
"#;
        let err = parse_keymap_toml(toml).unwrap_err();
        assert!(matches!(err, KeymapConfigError::InvalidKey(_)));
    }

    #[test]
    fn error_multi_char_key() {
        let toml = r#"
[cycles]
"22" = "ABC"
"#;
        let err = parse_keymap_toml(toml).unwrap_err();
        assert!(err.to_string().contains("\"22\""));
    }

    #[test]
    fn error_empty_cycle() {
        let toml = r#"
[cycles]
"5" = ""
"#;
        let err = parse_keymap_toml(toml).unwrap_err();
        assert!(matches!(err, KeymapConfigError::EmptyCycle('5')));
    }

    #[test]
    fn error_invalid_toml() {
        let err = parse_keymap_toml("not valid toml {{{").unwrap_err();
        assert!(matches!(err, KeymapConfigError::Parse(_)));
    }
}
