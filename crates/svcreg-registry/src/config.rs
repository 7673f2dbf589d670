//! Registry node configuration.
//!
//! Loaded from YAML. Every section is optional; an empty file yields a
//! founding node on the well-known port with the built-in probe table.
//!
//! ```yaml
//! server:
//!   port: 1099
//! dht:
//!   mode: join
//!   bootstrap_host: root
//! liveness:
//!   interval: 10s
//!   failure_threshold: 2
//!   probe_timeout: 3s
//!   on_key_listing_failure: skip
//! probes:
//!   - service: CacheService
//!     kind: tcp
//!     protocol: GRPC
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use svcreg_monitoring::ProbeSpec;

/// Well-known port of the ring-founding node.
pub const DEFAULT_PORT: u16 = 1099;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub server: ServerOptions,
    pub dht: DhtConfig,
    pub liveness: LivenessConfig,
    /// Probe table; empty means the built-in service kinds.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<ProbeSpec>,
}

/// HTTP server options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Whether this node founds a new ring or joins an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DhtMode {
    #[default]
    Found,
    Join,
}

/// DHT bootstrap options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DhtConfig {
    pub mode: DhtMode,
    /// Host of the founding node (join mode).
    pub bootstrap_host: String,
    /// Well-known port of the founding node (join mode).
    pub port: u16,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            mode: DhtMode::Found,
            bootstrap_host: "root".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// What a sweep does when the DHT keys cannot be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyListingFailurePolicy {
    /// Log, count the failure, retry on the next tick.
    #[default]
    Skip,
    /// Stop the liveness engine with `KeyListingFailed`.
    Abort,
}

/// Liveness engine options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    #[serde(with = "duration_serde")]
    pub interval: Duration,

    /// Consecutive failed probes before an endpoint is evicted.
    pub failure_threshold: u32,

    /// Upper bound on a single probe call; unset leaves bounding to the probe.
    #[serde(with = "option_duration_serde", skip_serializing_if = "Option::is_none")]
    pub probe_timeout: Option<Duration>,

    /// Connect timeout handed to the built-in TCP/HTTP probes.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    pub on_key_listing_failure: KeyListingFailurePolicy,

    /// Run sweeps only on the node that founded the ring.
    pub only_on_first_node: bool,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            failure_threshold: 2,
            probe_timeout: None,
            connect_timeout: Duration::from_secs(5),
            on_key_listing_failure: KeyListingFailurePolicy::Skip,
            only_on_first_node: true,
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: RegistryConfig = if content.trim().is_empty() {
            RegistryConfig::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.liveness.interval.is_zero() {
            return Err(anyhow!("Liveness interval must be greater than 0"));
        }
        if self.liveness.failure_threshold == 0 {
            return Err(anyhow!("Failure threshold must be at least 1"));
        }
        if self.liveness.probe_timeout.is_some_and(|t| t.is_zero()) {
            return Err(anyhow!("Probe timeout must be greater than 0"));
        }
        if self.dht.mode == DhtMode::Join {
            if self.dht.bootstrap_host.is_empty() {
                return Err(anyhow!("Join mode requires a bootstrap host"));
            }
            if self.dht.port == 0 {
                return Err(anyhow!("Join mode requires a non-zero bootstrap port"));
            }
        }
        for spec in &self.probes {
            if spec.protocol.is_empty() {
                return Err(anyhow!("Probe for {} has an empty protocol", spec.service));
            }
        }
        Ok(())
    }

    /// Probe specs in effect: configured ones, or the built-in table.
    pub fn probe_specs(&self) -> Vec<ProbeSpec> {
        if self.probes.is_empty() {
            ProbeSpec::builtin()
        } else {
            self.probes.clone()
        }
    }
}

// Custom serialization for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn format_duration(duration: &Duration) -> String {
        if duration.subsec_millis() != 0 {
            format!("{}ms", duration.as_millis())
        } else {
            format!("{}s", duration.as_secs())
        }
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let invalid = || format!("Invalid duration: {}", s);
        // "ms" before "s"
        if let Some(num) = s.strip_suffix("ms") {
            Ok(Duration::from_millis(num.trim().parse().map_err(|_| invalid())?))
        } else if let Some(num) = s.strip_suffix('s') {
            Ok(Duration::from_secs(num.trim().parse().map_err(|_| invalid())?))
        } else if let Some(num) = s.strip_suffix('m') {
            let mins: u64 = num.trim().parse().map_err(|_| invalid())?;
            Ok(Duration::from_secs(mins * 60))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}

// Custom serialization for Option<Duration>
mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&super::duration_serde::format_duration(d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| super::duration_serde::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
