//! Run tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Per-run uniqueness token: `"{day}-{hour}-{minute}-{second}-{8 hex}"`.
///
/// The timestamp part is UTC and zero-padded; the suffix is the first eight
/// hex digits of a random v4 UUID, so two runs started within the same second
/// still get distinct tokens. Every job name, output prefix and model name of
/// a run derives from its token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunToken(String);

impl RunToken {
    /// Generates a token for a run starting now.
    #[must_use]
    pub fn generate() -> Self {
        Self::at(Utc::now(), Uuid::new_v4())
    }

    /// Builds the token for a given start time and random id.
    #[must_use]
    pub fn at(time: DateTime<Utc>, id: Uuid) -> Self {
        let hex = id.simple().to_string();
        Self(format!("{}-{}", time.format("%d-%H-%M-%S"), &hex[..8]))
    }

    /// Wraps an existing token, e.g. one handed back by a scheduler.
    #[must_use]
    pub fn from_existing(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_token_format() {
        let time = Utc.with_ymd_and_hms(2024, 3, 7, 4, 5, 9).unwrap();
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();

        assert_eq!(RunToken::at(time, id).as_str(), "07-04-05-09-a1b2c3d4");
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let time = Utc.with_ymd_and_hms(2024, 3, 7, 4, 5, 9).unwrap();
        let tokens: HashSet<_> = (0..100).map(|_| RunToken::at(time, Uuid::new_v4())).collect();

        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn test_generated_shape() {
        let token = RunToken::generate();
        let parts: Vec<_> = token.as_str().split('-').collect();

        assert_eq!(parts.len(), 5);
        assert!(parts[..4].iter().all(|p| p.len() == 2));
        assert_eq!(parts[4].len(), 8);
        assert!(parts[4].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let token = RunToken::from_existing("01-02-03-04-deadbeef");
        assert_eq!(serde_json::to_value(&token).unwrap(), "01-02-03-04-deadbeef");
    }
}
