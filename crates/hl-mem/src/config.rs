//! Collector configuration.
//!
//! Configuration can be set programmatically or loaded from environment
//! variables:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HL_GC_YOUNG_SIZE` | Young-generation buffer size in bytes | 65536 (64 KiB) |
//! | `HL_GC_OLD_THRESHOLD` | Old bytes in use that trigger a major collection | 2097152 (2 MiB) |
//! | `HL_GC_TENURING_AGE` | Minor collections survived before promotion | 2 |
//! | `HL_GC_PRETENURE` | `forward-progress` or `respect-threshold` | `forward-progress` |
//!
//! # Example
//!
//! ```
//! use hl_mem::config::{GcConfig, PretenurePolicy};
//!
//! let config = GcConfig::default()
//!     .young_size(16 * 1024)
//!     .tenuring_age(3)
//!     .pretenure_policy(PretenurePolicy::RespectThreshold);
//!
//! assert!(config.validate().is_ok());
//! ```

use std::env;
use std::str::FromStr;

use hl_log::warn;

use crate::error::{Error, Result};

/// Default young-generation size: 64 KiB, sized to stay in L2.
pub const DEFAULT_YOUNG_SIZE: usize = 64 * 1024;

/// Default old-generation threshold: 2 MiB.
pub const DEFAULT_OLD_THRESHOLD: usize = 2 * 1024 * 1024;

/// Default tenuring age.
pub const DEFAULT_TENURING_AGE: u8 = 2;

/// What happens after an allocation falls through to the old generation
/// because a minor collection could not make room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PretenurePolicy {
    /// Allocate in the old generation and never collect on this path.
    #[default]
    ForwardProgress,
    /// Run a major collection once old usage exceeds the threshold.
    RespectThreshold,
}

impl PretenurePolicy {
    /// Returns the environment spelling of this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PretenurePolicy::ForwardProgress => "forward-progress",
            PretenurePolicy::RespectThreshold => "respect-threshold",
        }
    }
}

impl FromStr for PretenurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward-progress" | "forward" => Ok(PretenurePolicy::ForwardProgress),
            "respect-threshold" | "threshold" => Ok(PretenurePolicy::RespectThreshold),
            other => Err(Error::InvalidConfig {
                reason: format!("unknown pretenure policy '{other}'"),
            }),
        }
    }
}

/// Collector configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    /// Young-generation buffer size in bytes.
    pub young_size: usize,
    /// Old bytes in use (headers included) above which `sweep` runs a major
    /// collection.
    pub old_threshold: usize,
    /// Age at which a surviving young object is promoted.
    pub tenuring_age: u8,
    /// Behaviour of the direct-to-old allocation fallback.
    pub pretenure_policy: PretenurePolicy,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            young_size: DEFAULT_YOUNG_SIZE,
            old_threshold: DEFAULT_OLD_THRESHOLD,
            tenuring_age: DEFAULT_TENURING_AGE,
            pretenure_policy: PretenurePolicy::ForwardProgress,
        }
    }
}

impl GcConfig {
    /// Loads the defaults, overridden by any `HL_GC_*` variable that parses.
    ///
    /// Unparsable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("HL_GC_YOUNG_SIZE") {
            config.young_size = v;
        }
        if let Some(v) = env_parse::<usize>("HL_GC_OLD_THRESHOLD") {
            config.old_threshold = v;
        }
        if let Some(v) = env_parse::<u8>("HL_GC_TENURING_AGE") {
            config.tenuring_age = v;
        }
        if let Some(v) = env_parse::<PretenurePolicy>("HL_GC_PRETENURE") {
            config.pretenure_policy = v;
        }

        config
    }

    /// Sets the young-generation size.
    #[must_use]
    pub fn young_size(mut self, bytes: usize) -> Self {
        self.young_size = bytes;
        self
    }

    /// Sets the old-generation threshold.
    #[must_use]
    pub fn old_threshold(mut self, bytes: usize) -> Self {
        self.old_threshold = bytes;
        self
    }

    /// Sets the tenuring age.
    #[must_use]
    pub fn tenuring_age(mut self, age: u8) -> Self {
        self.tenuring_age = age;
        self
    }

    /// Sets the direct-to-old policy.
    #[must_use]
    pub fn pretenure_policy(mut self, policy: PretenurePolicy) -> Self {
        self.pretenure_policy = policy;
        self
    }

    /// Checks that a collector can be built from this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.tenuring_age == 0 {
            return Err(Error::InvalidConfig {
                reason: "tenuring age must be at least 1".to_string(),
            });
        }
        if self.young_size % crate::align::ALIGNMENT != 0 {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "young size {} is not a multiple of {}",
                    self.young_size,
                    crate::align::ALIGNMENT
                ),
            });
        }
        let min = crate::gc::HEADER_SIZE + crate::align::ALIGNMENT;
        if self.young_size < min {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "young size {} cannot hold a single object (minimum {min})",
                    self.young_size
                ),
            });
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {name}={raw:?}: not a valid value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GcConfig::default();
        assert_eq!(config.young_size, 64 * 1024);
        assert_eq!(config.old_threshold, 2 * 1024 * 1024);
        assert_eq!(config.tenuring_age, 2);
        assert_eq!(config.pretenure_policy, PretenurePolicy::ForwardProgress);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = GcConfig::default()
            .young_size(4096)
            .old_threshold(1024)
            .tenuring_age(5)
            .pretenure_policy(PretenurePolicy::RespectThreshold);
        assert_eq!(config.young_size, 4096);
        assert_eq!(config.old_threshold, 1024);
        assert_eq!(config.tenuring_age, 5);
        assert_eq!(config.pretenure_policy, PretenurePolicy::RespectThreshold);
    }

    #[test]
    fn test_validate_rejects_zero_tenuring_age() {
        let err = GcConfig::default().tenuring_age(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_rejects_tiny_young_buffer() {
        assert!(GcConfig::default().young_size(8).validate().is_err());
        assert!(GcConfig::default().young_size(0).validate().is_err());
        assert!(GcConfig::default().young_size(1001).validate().is_err());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "forward-progress".parse::<PretenurePolicy>(),
            Ok(PretenurePolicy::ForwardProgress)
        );
        assert_eq!(
            "Respect-Threshold".parse::<PretenurePolicy>(),
            Ok(PretenurePolicy::RespectThreshold)
        );
        assert!("eager".parse::<PretenurePolicy>().is_err());
        assert_eq!(
            PretenurePolicy::RespectThreshold.as_str(),
            "respect-threshold"
        );
    }
}
