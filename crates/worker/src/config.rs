use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use framecast_minimax::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use framecast_pipeline::SchedulerConfig;

/// Errors from reading [`WorkerConfig`] out of the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Worker configuration loaded from environment variables.
#[derive(Clone)]
pub struct WorkerConfig {
    pub api_key: String,
    pub base_url: String,
    pub output_dir: PathBuf,
    pub model: String,
    pub max_concurrent: usize,
    pub poll_interval_secs: u64,
    pub videos_per_image: u32,
    pub max_processing_polls: Option<u32>,
    pub stats_interval_secs: u64,
    /// JSON-lines file receiving every lifecycle event, if set.
    pub event_journal: Option<PathBuf>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                        |
    /// |----------------------------------|--------------------------------|
    /// | `MINIMAX_API_KEY`                | required                       |
    /// | `MINIMAX_BASE_URL`               | `https://api.minimaxi.chat/v1` |
    /// | `FRAMECAST_OUTPUT_DIR`           | `./videos`                     |
    /// | `FRAMECAST_MODEL`                | `I2V-01-Director`              |
    /// | `FRAMECAST_MAX_CONCURRENT`       | `3`                            |
    /// | `FRAMECAST_POLL_INTERVAL_SECS`   | `10`                           |
    /// | `FRAMECAST_VIDEOS_PER_IMAGE`     | `1`                            |
    /// | `FRAMECAST_MAX_PROCESSING_POLLS` | unset                          |
    /// | `FRAMECAST_STATS_INTERVAL_SECS`  | `5`                            |
    /// | `FRAMECAST_EVENT_JOURNAL`        | unset                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("MINIMAX_API_KEY").ok_or(ConfigError::Missing("MINIMAX_API_KEY"))?;

        Ok(Self {
            api_key,
            base_url: get("MINIMAX_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            output_dir: get("FRAMECAST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./videos")),
            model: get("FRAMECAST_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_concurrent: positive("FRAMECAST_MAX_CONCURRENT", get("FRAMECAST_MAX_CONCURRENT"), 3)?,
            poll_interval_secs: positive(
                "FRAMECAST_POLL_INTERVAL_SECS",
                get("FRAMECAST_POLL_INTERVAL_SECS"),
                10,
            )?,
            videos_per_image: positive(
                "FRAMECAST_VIDEOS_PER_IMAGE",
                get("FRAMECAST_VIDEOS_PER_IMAGE"),
                1,
            )?,
            max_processing_polls: get("FRAMECAST_MAX_PROCESSING_POLLS")
                .map(|raw| positive("FRAMECAST_MAX_PROCESSING_POLLS", Some(raw), 1))
                .transpose()?,
            stats_interval_secs: positive(
                "FRAMECAST_STATS_INTERVAL_SECS",
                get("FRAMECAST_STATS_INTERVAL_SECS"),
                5,
            )?,
            event_journal: get("FRAMECAST_EVENT_JOURNAL").map(PathBuf::from),
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_concurrency_limit(self.max_concurrent)
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_max_processing_polls(self.max_processing_polls)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("output_dir", &self.output_dir)
            .field("model", &self.model)
            .field("max_concurrent", &self.max_concurrent)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("videos_per_image", &self.videos_per_image)
            .field("max_processing_polls", &self.max_processing_polls)
            .field("stats_interval_secs", &self.stats_interval_secs)
            .field("event_journal", &self.event_journal)
            .finish()
    }
}

/// Parse a strictly positive integer, falling back to `default` when unset.
fn positive<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = load(&[("MINIMAX_API_KEY", "sk-test")]).unwrap();

        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.output_dir, PathBuf::from("./videos"));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.videos_per_image, 1);
        assert_eq!(config.max_processing_polls, None);
        assert_eq!(config.stats_interval_secs, 5);
        assert!(config.event_journal.is_none());
    }

    #[test]
    fn missing_api_key_is_rejected() {
        assert_matches!(load(&[]), Err(ConfigError::Missing("MINIMAX_API_KEY")));
        assert_matches!(
            load(&[("MINIMAX_API_KEY", "  ")]),
            Err(ConfigError::Missing(_))
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("MINIMAX_API_KEY", "sk-test"),
            ("FRAMECAST_MAX_CONCURRENT", "5"),
            ("FRAMECAST_POLL_INTERVAL_SECS", "2"),
            ("FRAMECAST_MAX_PROCESSING_POLLS", "90"),
            ("FRAMECAST_EVENT_JOURNAL", "/tmp/events.jsonl"),
        ])
        .unwrap();

        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.concurrency_limit, 5);
        assert_eq!(scheduler.poll_interval, Duration::from_secs(2));
        assert_eq!(scheduler.max_processing_polls, Some(90));
        assert_eq!(
            config.event_journal,
            Some(PathBuf::from("/tmp/events.jsonl"))
        );
    }

    #[test]
    fn zero_and_garbage_values_are_rejected() {
        assert_matches!(
            load(&[("MINIMAX_API_KEY", "k"), ("FRAMECAST_MAX_CONCURRENT", "0")]),
            Err(ConfigError::Invalid { var: "FRAMECAST_MAX_CONCURRENT", .. })
        );
        assert_matches!(
            load(&[("MINIMAX_API_KEY", "k"), ("FRAMECAST_POLL_INTERVAL_SECS", "soon")]),
            Err(ConfigError::Invalid { var: "FRAMECAST_POLL_INTERVAL_SECS", .. })
        );
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = load(&[("MINIMAX_API_KEY", "sk-secret")]).unwrap();
        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
