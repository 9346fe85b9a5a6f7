//! Control command grammar.
//!
//! A control client sends exactly one short text message per connection:
//!
//! - `<c> <id>` - run action `c` against window `id`, e.g. `f 3` to focus
//!   window 3. Trailing whitespace (such as a newline) is accepted.
//! - `q` - toggle sorted snapshot output; takes no id.
//!
//! | char | action        |
//! |------|---------------|
//! | `f`  | focus         |
//! | `a`  | maximize      |
//! | `u`  | unmaximize    |
//! | `i`  | minimize      |
//! | `r`  | restore       |
//! | `c`  | close         |
//! | `s`  | fullscreen    |
//! | `S`  | unfullscreen  |
//!
//! There is no reply. Unknown window ids are ignored by the receiver.

use std::fmt;

use crate::store::WindowId;

/// Remote action issued against a toplevel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Focus,
    Maximize,
    Unmaximize,
    Minimize,
    Restore,
    Close,
    Fullscreen,
    Unfullscreen,
}

impl Action {
    /// Map a command character to its action.
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'f' => Action::Focus,
            'a' => Action::Maximize,
            'u' => Action::Unmaximize,
            'i' => Action::Minimize,
            'r' => Action::Restore,
            'c' => Action::Close,
            's' => Action::Fullscreen,
            'S' => Action::Unfullscreen,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            Action::Focus => 'f',
            Action::Maximize => 'a',
            Action::Unmaximize => 'u',
            Action::Minimize => 'i',
            Action::Restore => 'r',
            Action::Close => 'c',
            Action::Fullscreen => 's',
            Action::Unfullscreen => 'S',
        }
    }
}

/// A validated control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Flip the process-wide sorted-output flag.
    ToggleSort,
    /// Run `action` against the window with `id`.
    Window { action: Action, id: WindowId },
}

/// Why a control message was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(char),
    #[error("expected a single space after the command character")]
    MissingSeparator,
    #[error("no digits found in window id")]
    MissingId,
    #[error("invalid characters after window id: {0:?}")]
    TrailingGarbage(String),
    #[error("window id out of range")]
    IdOutOfRange,
}

impl Request {
    /// Parse one control message.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut chars = input.chars();
        let command = chars.next().ok_or(ParseError::Empty)?;
        let rest = chars.as_str();

        if command == 'q' {
            return if rest.trim_end().is_empty() {
                Ok(Request::ToggleSort)
            } else {
                Err(ParseError::TrailingGarbage(rest.trim().to_string()))
            };
        }

        let action = Action::from_char(command).ok_or(ParseError::UnknownCommand(command))?;
        let argument = rest.strip_prefix(' ').ok_or(ParseError::MissingSeparator)?;
        let argument = argument.trim_start();

        let digits_len = argument
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(argument.len());
        if digits_len == 0 {
            return Err(ParseError::MissingId);
        }

        let (digits, tail) = argument.split_at(digits_len);
        if !tail.trim_end().is_empty() {
            return Err(ParseError::TrailingGarbage(tail.trim().to_string()));
        }

        let id = digits
            .parse::<u64>()
            .map_err(|_| ParseError::IdOutOfRange)?;
        Ok(Request::Window {
            action,
            id: WindowId(id),
        })
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::ToggleSort => write!(f, "q"),
            Request::Window { action, id } => write!(f, "{} {}", action.as_char(), id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(action: Action, id: u64) -> Request {
        Request::Window {
            action,
            id: WindowId(id),
        }
    }

    #[test]
    fn test_parse_focus() {
        assert_eq!(Request::parse("f 3"), Ok(window(Action::Focus, 3)));
    }

    #[test]
    fn test_parse_every_action_char() {
        let cases = [
            ("f 1", Action::Focus),
            ("a 1", Action::Maximize),
            ("u 1", Action::Unmaximize),
            ("i 1", Action::Minimize),
            ("r 1", Action::Restore),
            ("c 1", Action::Close),
            ("s 1", Action::Fullscreen),
            ("S 1", Action::Unfullscreen),
        ];
        for (input, action) in cases {
            assert_eq!(Request::parse(input), Ok(window(action, 1)), "{input}");
        }
    }

    #[test]
    fn test_parse_toggle_sort() {
        assert_eq!(Request::parse("q"), Ok(Request::ToggleSort));
        assert_eq!(Request::parse("q\n"), Ok(Request::ToggleSort));
        assert!(matches!(
            Request::parse("q 3"),
            Err(ParseError::TrailingGarbage(_))
        ));
    }

    #[test]
    fn test_parse_accepts_trailing_whitespace() {
        assert_eq!(Request::parse("c 12\n"), Ok(window(Action::Close, 12)));
        assert_eq!(Request::parse("c 12  \t"), Ok(window(Action::Close, 12)));
    }

    #[test]
    fn test_parse_rejects_missing_id() {
        assert_eq!(Request::parse("f"), Err(ParseError::MissingSeparator));
        assert_eq!(Request::parse("f "), Err(ParseError::MissingId));
        assert_eq!(Request::parse("f abc"), Err(ParseError::MissingId));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Request::parse(""), Err(ParseError::Empty));
        assert_eq!(Request::parse("x 1"), Err(ParseError::UnknownCommand('x')));
        assert_eq!(Request::parse("f3"), Err(ParseError::MissingSeparator));
        assert_eq!(
            Request::parse("f 3abc"),
            Err(ParseError::TrailingGarbage("abc".into()))
        );
        assert_eq!(
            Request::parse("f 3 4"),
            Err(ParseError::TrailingGarbage("4".into()))
        );
        assert_eq!(Request::parse("f -3"), Err(ParseError::MissingId));
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert_eq!(
            Request::parse("f 4294967296"),
            Ok(window(Action::Focus, 4_294_967_296))
        );
        assert_eq!(
            Request::parse("f 18446744073709551616"),
            Err(ParseError::IdOutOfRange)
        );
    }

    #[test]
    fn test_display_is_wire_form() {
        assert_eq!(window(Action::Unfullscreen, 7).to_string(), "S 7");
        assert_eq!(Request::ToggleSort.to_string(), "q");
    }
}
