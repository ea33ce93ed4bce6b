use std::fmt;

use base64::Engine as _;
use rand::TryRngCore as _;
use rand::rngs::OsRng;

use crate::limits::{COOKIE_MAX_AGE_SECS, COOKIE_NAME, SESSION_TOKEN_BYTES};
use crate::model::OPEN_SID;

#[derive(Debug)]
pub enum SessionError {
    RandomUnavailable(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::RandomUnavailable(e) => {
                write!(f, "cannot issue session token, random source unavailable: {e}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Token charset: `[A-Za-z0-9._-]`.
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token != OPEN_SID
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Keep a well-formed cookie value, otherwise issue a fresh token.
pub fn resolve(cookie_value: Option<&str>) -> Result<String, SessionError> {
    match cookie_value {
        Some(token) if is_valid_token(token) => Ok(token.to_string()),
        _ => generate_token(),
    }
}

/// 64 bytes from the OS random source, URL-safe base64 without padding.
pub fn generate_token() -> Result<String, SessionError> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SessionError::RandomUnavailable(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Find `name` in a `Cookie:` header value (`a=1; b=2`).
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v)
}

/// `Set-Cookie` value refreshing the session cookie.
pub fn set_cookie(token: &str) -> String {
    format!("{COOKIE_NAME}={token}; SameSite=Strict; Path=/; Max-Age={COOKIE_MAX_AGE_SECS}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_token_is_kept() {
        let token = resolve(Some("Abc-123_x.y")).unwrap();
        assert_eq!(token, "Abc-123_x.y");
    }

    #[test]
    fn missing_cookie_issues_token() {
        let token = resolve(None).unwrap();
        assert!(is_valid_token(&token));
        // 64 bytes → 86 base64 chars without padding
        assert_eq!(token.len(), 86);
    }

    #[test]
    fn invalid_charset_issues_token() {
        for bad in ["", "has space", "semi;colon", "slash/", "plus+", "pad=="] {
            let token = resolve(Some(bad)).unwrap();
            assert_ne!(token, bad);
            assert!(is_valid_token(&token));
        }
    }

    #[test]
    fn open_sentinel_is_not_a_session() {
        let token = resolve(Some("open")).unwrap();
        assert_ne!(token, "open");
    }

    #[test]
    fn generated_tokens_differ() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_token_round_trips_through_resolve() {
        let token = generate_token().unwrap();
        assert_eq!(resolve(Some(&token)).unwrap(), token);
    }

    #[test]
    fn cookie_header_lookup() {
        let header = "theme=dark; bookit_sid=tok-1; other=x";
        assert_eq!(cookie_value(header, "bookit_sid"), Some("tok-1"));
        assert_eq!(cookie_value(header, "missing"), None);
        assert_eq!(cookie_value("bookit_sid=", "bookit_sid"), None);
        assert_eq!(cookie_value("", "bookit_sid"), None);
    }

    #[test]
    fn set_cookie_attributes() {
        assert_eq!(
            set_cookie("t"),
            "bookit_sid=t; SameSite=Strict; Path=/; Max-Age=3628800"
        );
    }
}
