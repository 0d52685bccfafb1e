//! # Configuration Module
//!
//! Serde-friendly configuration structs plus the human-readable duration
//! format used throughout stratacache configuration (`"30s"`, `"5m"`,
//! `"2h"`, `"500ms"`).
//!
//! ## Usage
//!
//! ```rust
//! use stratacache_core::config::{parse_duration, AutoCleanupConfig};
//! use std::time::Duration;
//!
//! let config: AutoCleanupConfig = serde_json::from_str(r#"{"frequency": "30s"}"#).unwrap();
//! assert_eq!(config.frequency, Duration::from_secs(30));
//! assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// Configuration for the background auto-cleanup extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCleanupConfig {
    /// How often expired entries are compacted. Must be strictly positive.
    #[serde(with = "duration_serde")]
    pub frequency: Duration,
}

impl Default for AutoCleanupConfig {
    fn default() -> Self {
        Self {
            frequency: Duration::from_secs(60),
        }
    }
}

/// Parse a human-readable duration string.
///
/// Accepts `ms`, `s`, `m`, and `h` suffixes; seconds may be fractional.
pub fn parse_duration(s: &str) -> CacheResult<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(CacheError::usage("empty duration string"));
    }
    if let Some(stripped) = s.strip_suffix("ms") {
        let num: u64 = stripped
            .parse()
            .map_err(|_| CacheError::usage(format!("invalid duration number: {stripped}")))?;
        return Ok(Duration::from_millis(num));
    }
    if let Some(stripped) = s.strip_suffix('s') {
        let num: f64 = stripped
            .parse()
            .map_err(|_| CacheError::usage(format!("invalid duration number: {stripped}")))?;
        let secs = num.trunc() as u64;
        let nanos = (num.fract() * 1_000_000_000.0).round() as u32;
        return Ok(Duration::new(secs, nanos));
    }
    if let Some(stripped) = s.strip_suffix('m') {
        let num: u64 = stripped
            .parse()
            .map_err(|_| CacheError::usage(format!("invalid duration number: {stripped}")))?;
        return Ok(Duration::from_secs(num * 60));
    }
    if let Some(stripped) = s.strip_suffix('h') {
        let num: u64 = stripped
            .parse()
            .map_err(|_| CacheError::usage(format!("invalid duration number: {stripped}")))?;
        return Ok(Duration::from_secs(num * 3600));
    }
    Err(CacheError::usage(format!("unknown duration unit: {s}")))
}

/// Serde adapter for the duration string format.
pub mod duration_serde {
    use super::parse_duration;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() > 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => parse_duration(&s).map_err(Error::custom),
            Value::Number(n) => {
                let secs = n
                    .as_u64()
                    .ok_or_else(|| Error::custom("duration seconds must be a positive integer"))?;
                Ok(Duration::from_secs(secs))
            }
            _ => Err(Error::custom("invalid duration format")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_duration_formats() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn rejects_invalid_duration_formats() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30x").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn cleanup_config_round_trips_through_serde() {
        let config = AutoCleanupConfig {
            frequency: Duration::from_secs(90),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AutoCleanupConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.frequency, config.frequency);

        let from_number: AutoCleanupConfig = serde_json::from_str(r#"{"frequency": 45}"#).unwrap();
        assert_eq!(from_number.frequency, Duration::from_secs(45));
    }
}
