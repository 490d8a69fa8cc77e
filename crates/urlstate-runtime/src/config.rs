//! Engine configuration.
//!
//! On the wire the delay is expressed in whole milliseconds:
//!
//! ```toml
//! delay_ms = 250
//! preserve_unmanaged = true
//! ```
//!
//! Missing keys take their defaults. Loading from TOML or JSON text requires
//! the `policy-config` feature.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default minimum spacing between two URL writes.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Configuration supplied once when the engine is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum spacing between two URL writes.
    #[serde(rename = "delay_ms", with = "duration_ms")]
    pub delay: Duration,
    /// Carry query parameters that no field manages into every write instead
    /// of dropping them.
    pub preserve_unmanaged: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            preserve_unmanaged: false,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_delay_ms(self, ms: u64) -> Self {
        self.with_delay(Duration::from_millis(ms))
    }

    #[must_use]
    pub fn with_preserve_unmanaged(mut self, preserve: bool) -> Self {
        self.preserve_unmanaged = preserve;
        self
    }

    /// Parse a TOML document.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(text: &str) -> crate::Result<Self> {
        toml::from_str(text).map_err(|e| crate::SyncError::Config(e.to_string()))
    }

    /// Parse a JSON document.
    #[cfg(feature = "policy-config")]
    pub fn from_json_str(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::SyncError::Config(e.to_string()))
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delay: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
