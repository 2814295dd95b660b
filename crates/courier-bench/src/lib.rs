//! Shared setup for the courier benchmark binaries.
//!
//! Configuration can be loaded from:
//! - `COURIER_CONFIG` pointing at a TOML file
//! - `courier.toml` or `~/.config/courier/courier.toml`
//! - Environment variables (COURIER_*) on top of defaults

use anyhow::{Context, Result};
use courier_core::BrokerConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Benchmark configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Broker configuration.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Workload shape.
    #[serde(default)]
    pub workload: WorkloadConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Workload configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Number of concurrent producer tasks.
    #[serde(default = "default_producers")]
    pub producers: usize,

    /// Number of registered subscribers, each drained by its own task.
    #[serde(default = "default_subscribers")]
    pub subscribers: usize,

    /// Messages sent by each producer.
    #[serde(default = "default_messages_per_producer")]
    pub messages_per_producer: usize,

    /// Every n-th message is a broadcast; 0 disables broadcasts.
    #[serde(default = "default_broadcast_every")]
    pub broadcast_every: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Exporter port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn default_producers() -> usize {
    env_or("COURIER_PRODUCERS", 8)
}

fn default_subscribers() -> usize {
    env_or("COURIER_SUBSCRIBERS", 16)
}

fn default_messages_per_producer() -> usize {
    env_or("COURIER_MESSAGES", 10_000)
}

fn default_broadcast_every() -> usize {
    10
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            producers: default_producers(),
            subscribers: default_subscribers(),
            messages_per_producer: default_messages_per_producer(),
            broadcast_every: default_broadcast_every(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl BenchConfig {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("COURIER_CONFIG") {
            return Self::from_file(&*shellexpand::tilde(&path));
        }

        let config_paths = ["courier.toml", "~/.config/courier/courier.toml"];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(&*expanded).exists() {
                return Self::from_file(&*expanded);
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .broker
            .validate()
            .with_context(|| format!("Invalid broker section in {}", path.display()))?;

        Ok(config)
    }
}

/// Initialize tracing from `RUST_LOG`, defaulting to info for the courier crates.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_core=info,courier_bench=info,e2e_throughput=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the Prometheus exporter and describe broker metrics.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    courier_core::metrics::describe_metrics();

    info!("Metrics server listening on {}", addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [broker]
            inbound_capacity = 256

            [workload]
            producers = 2
            broadcast_every = 0

            [metrics]
            enabled = true
        "#;

        let config: BenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.broker.inbound_capacity, 256);
        assert_eq!(config.broker.endpoint_capacity, 64);
        assert_eq!(config.workload.producers, 2);
        assert_eq!(config.workload.broadcast_every, 0);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn test_default_metrics_disabled() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(BenchConfig::from_file("/nonexistent/courier.toml").is_err());
    }
}
