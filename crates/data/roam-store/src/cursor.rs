//! Cursor encoding for keyset pagination.
//!
//! A cursor names the last item of a page by `(timestamp, id)`; the next
//! page starts strictly after it in feed order (newest first, id ascending
//! on ties). The token is opaque to callers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use roam_core::{Cursor, FeedError};

const SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageKey {
    pub at: DateTime<Utc>,
    pub id: String,
}

impl PageKey {
    pub fn new(at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self { at, id: id.into() }
    }

    pub fn encode(&self) -> Cursor {
        let raw = format!(
            "{}{}{}",
            self.at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            SEPARATOR,
            self.id
        );
        Cursor::new(URL_SAFE_NO_PAD.encode(raw))
    }

    pub fn decode(cursor: &Cursor) -> Result<Self, FeedError> {
        let invalid = || FeedError::Internal(format!("invalid cursor: {}", cursor));

        let bytes = URL_SAFE_NO_PAD
            .decode(cursor.as_str())
            .map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (at, id) = raw.split_once(SEPARATOR).ok_or_else(invalid)?;
        let at = DateTime::parse_from_rfc3339(at)
            .map_err(|_| invalid())?
            .with_timezone(&Utc);

        Ok(Self::new(at, id))
    }

    /// True when `(at, id)` sorts after this key in feed order
    pub fn precedes(&self, at: DateTime<Utc>, id: &str) -> bool {
        at < self.at || (at == self.at && id > self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cursor_is_opaque_and_decodes() {
        let key = PageKey::new(Utc.with_ymd_and_hms(2024, 5, 3, 9, 30, 0).unwrap(), "log|7");
        let cursor = key.encode();

        assert!(!cursor.as_str().contains("log"));
        assert_eq!(PageKey::decode(&cursor).unwrap(), key);
    }

    #[test]
    fn test_garbage_cursor_is_rejected() {
        let err = PageKey::decode(&Cursor::new("%%%not-base64")).unwrap_err();
        assert!(matches!(err, FeedError::Internal(_)));
    }

    #[test]
    fn test_precedes_follows_feed_order() {
        let at = Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap();
        let key = PageKey::new(at, "m");

        assert!(key.precedes(at - chrono::Duration::seconds(1), "a"));
        assert!(key.precedes(at, "z"));
        assert!(!key.precedes(at, "m"));
        assert!(!key.precedes(at, "a"));
        assert!(!key.precedes(at + chrono::Duration::seconds(1), "z"));
    }
}
