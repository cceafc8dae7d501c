use std::time::Duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default cadence for a resource that does not configure one.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Refresh configuration of a single remote resource.
///
/// Intervals are (de)serialized as seconds. A negative, non finite or overflowing
/// value deserializes to [`RefreshParameters::INFINITE`], which serializes as `-1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshParameters {
    /// Unique key of the resource, used for storage and diagnostics
    pub id: String,
    pub url: String,
    /// Storage key override. When absent, `id` is used
    #[serde(default)]
    pub file_name: Option<String>,
    /// Minimum time between two successful fetches
    #[serde(default = "default_refresh_interval", with = "seconds")]
    pub refresh_interval: Duration,
    /// Base of the linear error cooldown. When absent, cooldown gating is disabled
    #[serde(default, with = "optional_seconds")]
    pub error_cooldown_base_interval: Option<Duration>,
}

impl RefreshParameters {
    /// An interval that never elapses.
    pub const INFINITE: Duration = Duration::MAX;

    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        RefreshParameters {
            id: id.into(),
            url: url.into(),
            file_name: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            error_cooldown_base_interval: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_error_cooldown_base_interval(mut self, interval: Option<Duration>) -> Self {
        self.error_cooldown_base_interval = interval;
        self
    }

    /// Key under which the resource is persisted: `file_name` if configured, else `id`.
    pub fn storage_key(&self) -> &str {
        self.file_name.as_deref().unwrap_or(&self.id)
    }
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

/// Retry behaviour of a [`ResourceRetriever`](crate::retriever::ResourceRetriever).
///
/// Retry `n` (starting at 1) is attempted `retry_delay * n` after the previous failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay", with = "seconds")]
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn duration_from_secs(secs: f64) -> Duration {
    if !secs.is_finite() || secs < 0.0 {
        return RefreshParameters::INFINITE;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(RefreshParameters::INFINITE)
}

fn duration_to_secs(duration: &Duration) -> f64 {
    if *duration == RefreshParameters::INFINITE {
        return -1.0;
    }
    duration.as_secs_f64()
}

mod seconds {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration_to_secs(duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(duration_from_secs(f64::deserialize(deserializer)?))
    }
}

mod optional_seconds {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => serializer.serialize_some(&duration_to_secs(d)),
            None => serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.map(duration_from_secs))
    }
}
