//! Configuration loading and typed config structures for the dispatch engine.
//!
//! The canonical configuration lives in `dispatch-config.yaml` at the
//! project root. Every section and field has a default, so a missing file
//! or a partial file is valid. A few deployment-specific values can be
//! overridden from the environment.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is outside its permitted range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `dispatch-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DispatchConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Candidate ranking parameters.
    #[serde(default)]
    pub dispatch: RankingConfig,

    /// Movement simulation parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Event stream parameters.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Routing oracle backend.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Triage classifier backend.
    #[serde(default)]
    pub triage: TriageConfig,

    /// Retry policy for HTTP collaborators.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Startup data seeding.
    #[serde(default)]
    pub seed: SeedConfig,
}

impl DispatchConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DISPATCH_PORT` overrides `server.port`
    /// - `ROUTING_URL` overrides `routing.osrm_url`
    /// - `TRIAGE_URL` overrides `triage.url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    /// Environment overrides and validation apply either way.
    ///
    /// # Errors
    ///
    /// Same as [`DispatchConfig::from_file`], except that a missing file
    /// is not an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DISPATCH_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("ROUTING_URL") {
            self.routing.osrm_url = val;
            self.routing.backend = RoutingBackend::Osrm;
        }
        if let Ok(val) = std::env::var("TRIAGE_URL") {
            self.triage.url = val;
            self.triage.backend = TriageBackend::Http;
        }
    }

    /// Check cross-field constraints.
    ///
    /// Each simulator tick must advance at least one simulated second so
    /// that the reported remaining ETA strictly decreases tick over tick.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.candidate_top_k == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.candidate_top_k must be at least 1".to_owned(),
            ));
        }
        if self.dispatch.assumed_speed_kmh <= 0.0 {
            return Err(ConfigError::Invalid(
                "dispatch.assumed_speed_kmh must be positive".to_owned(),
            ));
        }
        if self.simulation.time_scale <= 0.0 {
            return Err(ConfigError::Invalid(
                "simulation.time_scale must be positive".to_owned(),
            ));
        }
        if self.simulation.tick_interval_ms < 100 {
            return Err(ConfigError::Invalid(
                "simulation.tick_interval_ms must be at least 100".to_owned(),
            ));
        }
        if f64::from(self.simulation.tick_interval_ms) * self.simulation.time_scale < 1000.0 {
            return Err(ConfigError::Invalid(
                "simulation.tick_interval_ms * time_scale must cover at least one simulated second"
                    .to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::Invalid(
                "retry.jitter must be within [0, 1]".to_owned(),
            ));
        }
        if self.broadcast.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "broadcast.channel_capacity must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Candidate ranking configuration (the `dispatch` section).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RankingConfig {
    /// Number of nearest candidates routed through the oracle per ranking.
    #[serde(default = "default_candidate_top_k")]
    pub candidate_top_k: usize,

    /// Per-call routing timeout in milliseconds.
    #[serde(default = "default_routing_timeout_ms")]
    pub routing_timeout_ms: u32,

    /// Speed used for straight-line ETA estimates.
    #[serde(default = "default_assumed_speed_kmh")]
    pub assumed_speed_kmh: f64,

    /// Seconds added to a route that passes through an active hazard.
    #[serde(default = "default_hazard_penalty_seconds")]
    pub hazard_penalty_seconds: u32,
}

impl RankingConfig {
    /// Routing timeout as a [`Duration`].
    pub fn routing_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.routing_timeout_ms))
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            candidate_top_k: default_candidate_top_k(),
            routing_timeout_ms: default_routing_timeout_ms(),
            assumed_speed_kmh: default_assumed_speed_kmh(),
            hazard_penalty_seconds: default_hazard_penalty_seconds(),
        }
    }
}

/// Movement simulation configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Real milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u32,

    /// Simulated seconds per real second.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Simulated seconds the crew spends at the scene before transport.
    #[serde(default = "default_on_scene_seconds")]
    pub on_scene_seconds: u32,
}

impl SimulationConfig {
    /// Tick interval as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_interval_ms))
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            time_scale: default_time_scale(),
            on_scene_seconds: default_on_scene_seconds(),
        }
    }
}

/// Event stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastConfig {
    /// Per-session buffered events before the oldest are dropped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Seconds between `WebSocket` pings.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

/// Which routing oracle to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingBackend {
    /// Densified straight line at the assumed speed.
    #[default]
    StraightLine,
    /// An OSRM-compatible HTTP routing service.
    Osrm,
}

/// Routing oracle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoutingConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: RoutingBackend,

    /// Base URL of the OSRM service.
    #[serde(default = "default_osrm_url")]
    pub osrm_url: String,

    /// Attempts per route request (including the first).
    #[serde(default = "default_routing_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            backend: RoutingBackend::default(),
            osrm_url: default_osrm_url(),
            max_attempts: default_routing_max_attempts(),
        }
    }
}

/// Which triage classifier to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageBackend {
    /// Built-in keyword tables.
    #[default]
    Keyword,
    /// External HTTP classifier.
    Http,
}

/// Triage classifier configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TriageConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: TriageBackend,

    /// URL of the HTTP classifier.
    #[serde(default = "default_triage_url")]
    pub url: String,

    /// Upper bound on one classification, in milliseconds.
    #[serde(default = "default_triage_timeout_ms")]
    pub timeout_ms: u32,
}

impl TriageConfig {
    /// Classification timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            backend: TriageBackend::default(),
            url: default_triage_url(),
            timeout_ms: default_triage_timeout_ms(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling on any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Attempts before giving up.
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    /// Relative jitter applied to each delay, in `[0, 1]`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_retry_max_attempts(),
            jitter: default_jitter(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-field lines.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Startup seeding configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SeedConfig {
    /// Whether to load the built-in hospitals and fleet at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Fixed seed for random incident generation; entropy when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            random_seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_candidate_top_k() -> usize {
    5
}

const fn default_routing_timeout_ms() -> u32 {
    3000
}

const fn default_assumed_speed_kmh() -> f64 {
    40.0
}

const fn default_hazard_penalty_seconds() -> u32 {
    120
}

const fn default_tick_interval_ms() -> u32 {
    1000
}

const fn default_time_scale() -> f64 {
    1.0
}

const fn default_on_scene_seconds() -> u32 {
    30
}

const fn default_channel_capacity() -> usize {
    256
}

const fn default_ping_interval_secs() -> u64 {
    30
}

fn default_osrm_url() -> String {
    "http://localhost:5000".to_owned()
}

const fn default_routing_max_attempts() -> u32 {
    2
}

fn default_triage_url() -> String {
    "http://localhost:8000/analyze".to_owned()
}

const fn default_triage_timeout_ms() -> u32 {
    2000
}

const fn default_base_delay_ms() -> u64 {
    1000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_retry_max_attempts() -> u32 {
    10
}

const fn default_jitter() -> f64 {
    0.2
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DispatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.dispatch.candidate_top_k, 5);
        assert_eq!(config.simulation.on_scene_seconds, 30);
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.routing.backend, RoutingBackend::StraightLine);
    }

    #[test]
    fn parse_partial_yaml_fills_defaults() {
        let yaml = r"
dispatch:
  candidate_top_k: 3
  hazard_penalty_seconds: 60
simulation:
  tick_interval_ms: 500
  time_scale: 4.0
logging:
  level: debug
  format: pretty
";
        let config: DispatchConfig = serde_yml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatch.candidate_top_k, 3);
        assert_eq!(config.dispatch.routing_timeout_ms, 3000);
        assert_eq!(config.simulation.tick_interval_ms, 500);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.broadcast.channel_capacity, 256);
    }

    #[test]
    fn parse_backends() {
        let yaml = r"
routing:
  backend: osrm
  osrm_url: http://osrm:5000
triage:
  backend: http
  timeout_ms: 500
";
        let config: DispatchConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.routing.backend, RoutingBackend::Osrm);
        assert_eq!(config.routing.osrm_url, "http://osrm:5000");
        assert_eq!(config.triage.backend, TriageBackend::Http);
        assert_eq!(config.triage.timeout(), Duration::from_millis(500));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let mut config = DispatchConfig::default();
        config.dispatch.candidate_top_k = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn sub_second_ticks_are_rejected() {
        let mut config = DispatchConfig::default();
        config.simulation.tick_interval_ms = 500;
        config.simulation.time_scale = 1.0;
        assert!(config.validate().is_err());

        config.simulation.time_scale = 2.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn jitter_out_of_range_is_rejected() {
        let mut config = DispatchConfig::default();
        config.retry.jitter = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let result: Result<DispatchConfig, _> = serde_yml::from_str("dispatch: [");
        assert!(result.is_err());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let shipped: DispatchConfig =
            serde_yml::from_str(include_str!("../../../dispatch-config.yaml")).unwrap();
        assert_eq!(shipped, DispatchConfig::default());
    }
}
