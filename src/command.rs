use std::fmt;

use crate::limits::MAX_LINE_LEN;
use crate::model::Secs;

/// Parsed request line.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Set the connection's `Cookie:` header.
    Cookie {
        header: String,
    },
    List,
    View {
        resource_id: String,
    },
    Book {
        resource_id: String,
        duration_minutes: i64,
        info: String,
    },
    Cancel {
        resource_id: String,
        start: Secs,
    },
    Claim {
        resource_id: String,
        start: Secs,
    },
    Quit,
}

#[derive(Debug, PartialEq)]
pub enum CommandError {
    Empty,
    UnknownVerb(String),
    MissingArgument(&'static str),
    UnexpectedArgument(String),
    BadTimestamp(String),
    /// The framing layer discarded a line over the length limit.
    LineTooLong,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty request"),
            CommandError::UnknownVerb(v) => write!(f, "unknown command: {v}"),
            CommandError::MissingArgument(what) => write!(f, "missing {what}"),
            CommandError::UnexpectedArgument(arg) => write!(f, "unexpected argument: {arg}"),
            CommandError::BadTimestamp(raw) => write!(f, "bad timestamp: {raw}"),
            CommandError::LineTooLong => write!(f, "request longer than {MAX_LINE_LEN} bytes"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Split off the next whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], s[end..].trim_start()),
        None => (s, ""),
    }
}

fn require<'a>(s: &'a str, what: &'static str) -> Result<(&'a str, &'a str), CommandError> {
    let (word, rest) = split_word(s);
    if word.is_empty() {
        return Err(CommandError::MissingArgument(what));
    }
    Ok((word, rest))
}

fn no_more(rest: &str) -> Result<(), CommandError> {
    let rest = rest.trim();
    if rest.is_empty() {
        Ok(())
    } else {
        Err(CommandError::UnexpectedArgument(rest.to_string()))
    }
}

fn parse_start(raw: &str) -> Result<Secs, CommandError> {
    raw.parse()
        .map_err(|_| CommandError::BadTimestamp(raw.to_string()))
}

/// Decode a `m_duration=..&m_info=..` form body. A missing or non-numeric
/// duration becomes 0 so the engine reports it as out of range.
fn parse_book_form(body: &str) -> (i64, String) {
    let mut duration_minutes = 0;
    let mut info = String::new();
    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        match key.as_ref() {
            "m_duration" => duration_minutes = value.trim().parse().unwrap_or(0),
            "m_info" => info = value.into_owned(),
            _ => {}
        }
    }
    (duration_minutes, info)
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let (verb, rest) = split_word(line);
    if verb.is_empty() {
        return Err(CommandError::Empty);
    }

    match verb.to_ascii_uppercase().as_str() {
        "COOKIE" => Ok(Command::Cookie {
            header: rest.trim_end().to_string(),
        }),
        "LIST" => {
            no_more(rest)?;
            Ok(Command::List)
        }
        "VIEW" => {
            let (resource_id, rest) = require(rest, "resource id")?;
            no_more(rest)?;
            Ok(Command::View {
                resource_id: resource_id.to_string(),
            })
        }
        "BOOK" => {
            let (resource_id, rest) = require(rest, "resource id")?;
            let (body, rest) = require(rest, "form body")?;
            no_more(rest)?;
            let (duration_minutes, info) = parse_book_form(body);
            Ok(Command::Book {
                resource_id: resource_id.to_string(),
                duration_minutes,
                info,
            })
        }
        "CANCEL" | "CLAIM" => {
            let (resource_id, rest) = require(rest, "resource id")?;
            let (start, rest) = require(rest, "start timestamp")?;
            no_more(rest)?;
            let resource_id = resource_id.to_string();
            let start = parse_start(start)?;
            if verb.eq_ignore_ascii_case("CANCEL") {
                Ok(Command::Cancel { resource_id, start })
            } else {
                Ok(Command::Claim { resource_id, start })
            }
        }
        "QUIT" => Ok(Command::Quit),
        _ => Err(CommandError::UnknownVerb(verb.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_and_quit() {
        assert_eq!(parse_command("LIST").unwrap(), Command::List);
        assert_eq!(parse_command("  list  ").unwrap(), Command::List);
        assert_eq!(parse_command("quit").unwrap(), Command::Quit);
    }

    #[test]
    fn parse_view() {
        assert_eq!(
            parse_command("VIEW cluster9").unwrap(),
            Command::View {
                resource_id: "cluster9".into()
            }
        );
        assert_eq!(
            parse_command("VIEW"),
            Err(CommandError::MissingArgument("resource id"))
        );
        assert_eq!(
            parse_command("VIEW a b"),
            Err(CommandError::UnexpectedArgument("b".into()))
        );
    }

    #[test]
    fn parse_book_decodes_form() {
        let cmd = parse_command("BOOK cluster9 m_duration=60&m_info=Jane+Doe%20%28lab%29").unwrap();
        assert_eq!(
            cmd,
            Command::Book {
                resource_id: "cluster9".into(),
                duration_minutes: 60,
                info: "Jane Doe (lab)".into(),
            }
        );
    }

    #[test]
    fn parse_book_bad_duration_becomes_zero() {
        let cmd = parse_command("BOOK x m_duration=soon&m_info=a").unwrap();
        assert!(matches!(cmd, Command::Book { duration_minutes: 0, .. }));

        let cmd = parse_command("BOOK x m_info=a").unwrap();
        assert!(matches!(cmd, Command::Book { duration_minutes: 0, .. }));
    }

    #[test]
    fn parse_book_without_body() {
        assert_eq!(
            parse_command("BOOK cluster9"),
            Err(CommandError::MissingArgument("form body"))
        );
    }

    #[test]
    fn parse_cancel_and_claim() {
        assert_eq!(
            parse_command("CANCEL cluster9 1704479574").unwrap(),
            Command::Cancel {
                resource_id: "cluster9".into(),
                start: 1704479574
            }
        );
        assert_eq!(
            parse_command("claim cluster9 42").unwrap(),
            Command::Claim {
                resource_id: "cluster9".into(),
                start: 42
            }
        );
        assert_eq!(
            parse_command("CANCEL cluster9 tomorrow"),
            Err(CommandError::BadTimestamp("tomorrow".into()))
        );
        assert_eq!(
            parse_command("CLAIM cluster9"),
            Err(CommandError::MissingArgument("start timestamp"))
        );
    }

    #[test]
    fn parse_cookie_keeps_header() {
        assert_eq!(
            parse_command("COOKIE theme=dark; bookit_sid=abc").unwrap(),
            Command::Cookie {
                header: "theme=dark; bookit_sid=abc".into()
            }
        );
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_command("   "), Err(CommandError::Empty));
        assert_eq!(
            parse_command("DELETE x"),
            Err(CommandError::UnknownVerb("DELETE".into()))
        );
    }
}
