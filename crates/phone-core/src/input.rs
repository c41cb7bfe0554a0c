//! Raw keypad input: control symbols, console commands and line validation.

/// Completes the current text (commit, notify, clear).
pub const COMPLETE_KEY: char = '#';
/// Deletes the last character.
pub const BACKSPACE_KEY: char = '*';
/// Stands in for the idle pause in recorded input.
pub const PAUSE_KEY: char = ' ';

/// One symbol of a recorded keypad stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Key(char),
    Backspace,
    Pause,
    Complete,
}

impl Symbol {
    pub fn classify(c: char) -> Symbol {
        match c {
            COMPLETE_KEY => Symbol::Complete,
            BACKSPACE_KEY => Symbol::Backspace,
            PAUSE_KEY => Symbol::Pause,
            other => Symbol::Key(other),
        }
    }
}

/// Console commands recognised at the start of a line or as a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `S`: feed each character as a live key press.
    SingleKeyMode,
    /// `O`: decode whole lines.
    StringMode,
    /// `M`: show the menu.
    Menu,
    /// `Q`: quit.
    Quit,
}

impl Command {
    pub fn parse(c: char) -> Option<Command> {
        match c {
            'S' => Some(Command::SingleKeyMode),
            'O' => Some(Command::StringMode),
            'M' => Some(Command::Menu),
            'Q' => Some(Command::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("input is empty")]
    Empty,
    #[error("invalid character {ch:?} at position {position}")]
    InvalidChar { ch: char, position: usize },
}

fn is_line_char(c: char) -> bool {
    c.is_ascii_digit()
        || c == COMPLETE_KEY
        || c == BACKSPACE_KEY
        || c.is_whitespace()
        || Command::parse(c).is_some()
}

/// Accept only digits, `*`, `#`, whitespace and the console command letters.
pub fn validate_line(line: &str) -> Result<(), InputError> {
    if line.is_empty() {
        return Err(InputError::Empty);
    }
    match line.chars().enumerate().find(|(_, c)| !is_line_char(*c)) {
        Some((position, ch)) => Err(InputError::InvalidChar { ch, position }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_control_symbols() {
        assert_eq!(Symbol::classify('#'), Symbol::Complete);
        assert_eq!(Symbol::classify('*'), Symbol::Backspace);
        assert_eq!(Symbol::classify(' '), Symbol::Pause);
        assert_eq!(Symbol::classify('7'), Symbol::Key('7'));
        assert_eq!(Symbol::classify('x'), Symbol::Key('x'));
    }

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse('S'), Some(Command::SingleKeyMode));
        assert_eq!(Command::parse('O'), Some(Command::StringMode));
        assert_eq!(Command::parse('M'), Some(Command::Menu));
        assert_eq!(Command::parse('Q'), Some(Command::Quit));
        assert_eq!(Command::parse('s'), None);
        assert_eq!(Command::parse('2'), None);
    }

    #[test]
    fn validate_accepts_keypad_lines() {
        assert!(validate_line("4433555 555666#").is_ok());
        assert!(validate_line("8 88777444666*664#").is_ok());
        assert!(validate_line("S").is_ok());
        assert!(validate_line("0\t1").is_ok());
    }

    #[test]
    fn validate_rejects_other_chars() {
        assert_eq!(validate_line(""), Err(InputError::Empty));
        assert_eq!(
            validate_line("22a#"),
            Err(InputError::InvalidChar { ch: 'a', position: 2 })
        );
        assert!(validate_line("X").is_err());
    }
}
