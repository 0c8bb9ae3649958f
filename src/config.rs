use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest number of records a single `PutRecords` call accepts.
pub const MAX_BATCH_SIZE: usize = 500;

/// `PutRecords` rejects requests of 5 MiB or more.
pub const MAX_BATCH_SIZE_BYTES: usize = 5 * 1024 * 1024 - 1;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub stream: StreamConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    pub region: String,
    pub stream_name: String,
    #[serde(default)]
    pub partition_key: Option<String>,
    #[serde(default)]
    pub partition_key_provider: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_size_bytes")]
    pub batch_size_bytes: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_source_name")]
    pub source_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_min_ms")]
    pub min_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub factor: f64,
    #[serde(default = "default_backoff_jitter")]
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_ms: default_backoff_min_ms(),
            max_ms: default_backoff_max_ms(),
            factor: default_backoff_factor(),
            jitter: default_backoff_jitter(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("KINESIS_SHIPPER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.stream.validate()?;
        self.backoff.validate()
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.region.is_empty() {
            return Err(Error::Config("region is not defined".to_string()));
        }

        if self.stream_name.is_empty() {
            return Err(Error::Config("stream_name is not defined".to_string()));
        }

        if self.batch_size > MAX_BATCH_SIZE || self.batch_size < 1 {
            return Err(Error::Config(format!(
                "invalid batch size got:{}",
                self.batch_size
            )));
        }

        if self.batch_size_bytes > MAX_BATCH_SIZE_BYTES || self.batch_size_bytes < 1 {
            return Err(Error::Config(format!(
                "invalid batch size bytes got:{}",
                self.batch_size_bytes
            )));
        }

        match self.partition_key_provider.as_deref() {
            None | Some("") => {
                if self.partition_key.as_deref().unwrap_or("").is_empty() {
                    return Err(Error::Config(
                        "partition_key must be set when no partition_key_provider is configured"
                            .to_string(),
                    ));
                }
            }
            Some(GENERATOR_UUID) | Some(GENERATOR_XID) => {}
            Some(other) => {
                return Err(Error::Config(format!(
                    "invalid partition key provider '{}': supported providers are `uuid` and `xid`",
                    other
                )));
            }
        }

        Ok(())
    }

    pub fn uses_key_generator(&self) -> bool {
        matches!(
            self.partition_key_provider.as_deref(),
            Some(GENERATOR_UUID) | Some(GENERATOR_XID)
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_ms > self.max_ms {
            return Err(Error::Config(format!(
                "backoff min_ms ({}) exceeds max_ms ({})",
                self.min_ms, self.max_ms
            )));
        }

        if self.factor.is_nan() || self.factor < 1.0 {
            return Err(Error::Config(format!(
                "backoff factor must be >= 1, got {}",
                self.factor
            )));
        }

        Ok(())
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

const GENERATOR_UUID: &str = "uuid";
const GENERATOR_XID: &str = "xid";

fn default_batch_size() -> usize {
    50
}

fn default_batch_size_bytes() -> usize {
    MAX_BATCH_SIZE_BYTES
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    90
}

fn default_source_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_backoff_min_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_backoff_jitter() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn stream_config() -> StreamConfig {
        StreamConfig {
            region: "eu-central-1".to_string(),
            stream_name: "foo".to_string(),
            partition_key: Some("mypartitionkey".to_string()),
            partition_key_provider: None,
            batch_size: 50,
            batch_size_bytes: 5,
            max_retries: 3,
            timeout_secs: 90,
            source_name: "test".to_string(),
        }
    }

    #[test]
    fn test_validate_requires_region() {
        let mut config = stream_config();
        config.region = String::new();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_requires_stream_name() {
        let mut config = stream_config();
        config.stream_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_batch_size_bounds() {
        let mut config = stream_config();
        assert!(config.validate().is_ok());

        config.batch_size = 501;
        assert!(config.validate().is_err());

        config.batch_size = 0;
        assert!(config.validate().is_err());

        config.batch_size = 500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_batch_size_bytes_bounds() {
        let mut config = stream_config();

        config.batch_size_bytes = 5 * 1024 * 1024;
        assert!(config.validate().is_err());

        config.batch_size_bytes = 5 * 1024 * 1024 - 2;
        assert!(config.validate().is_ok());

        config.batch_size_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_partition_key_provider() {
        let mut config = stream_config();

        config.partition_key_provider = Some("random".to_string());
        assert!(config.validate().is_err());

        config.partition_key_provider = Some("xid".to_string());
        config.partition_key = None;
        assert!(config.validate().is_ok());
        assert!(config.uses_key_generator());

        config.partition_key_provider = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_backoff() {
        let mut backoff = BackoffConfig::default();
        assert!(backoff.validate().is_ok());

        backoff.min_ms = 120_000;
        assert!(backoff.validate().is_err());

        let backoff = BackoffConfig {
            factor: 0.5,
            ..BackoffConfig::default()
        };
        assert!(backoff.validate().is_err());
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[stream]
region = "eu-central-1"
stream_name = "events"
partition_key_provider = "uuid"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.stream.batch_size, 50);
        assert_eq!(config.stream.batch_size_bytes, MAX_BATCH_SIZE_BYTES);
        assert_eq!(config.stream.max_retries, 3);
        assert_eq!(config.backoff.min(), Duration::from_secs(1));
        assert_eq!(config.backoff.max(), Duration::from_secs(60));
        assert!(config.backoff.jitter);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[stream]
region = "eu-central-1"
stream_name = "events"
partition_key = "id"
batch_size = 1000
"#
        )
        .unwrap();

        assert!(matches!(
            Config::from_file(file.path()),
            Err(Error::Config(_))
        ));
    }
}
