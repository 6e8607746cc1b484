//! Configuration resolution: CLI arguments, overridden by an optional TOML file.

use std::path::Path;

use anyhow::{Context, Result, bail};
use broker::BrokerConfig;
use serde::Deserialize;
use xrender_core::{WorkerConfig, channels};

/// CLI arguments that can be overridden by the TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub redis_host: String,
    pub redis_port: u16,
    pub private_key: Option<String>,
    pub max_jobs: u64,
    pub pop_timeout_secs: u64,
    pub operation_timeout_secs: Option<u64>,
}

/// `[broker]` table of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db: Option<i64>,
    pub password: Option<String>,
}

/// `[worker]` table of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerFileConfig {
    pub max_jobs_per_process: Option<u64>,
    pub pop_timeout_secs: Option<u64>,
    pub recovery_delay_ms: Option<u64>,
    pub operation_timeout_secs: Option<u64>,
    pub publish_attempts: Option<u32>,
}

/// Contents of the TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub private_key: Option<String>,
    pub broker: Option<BrokerFileConfig>,
    pub worker: Option<WorkerFileConfig>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("Invalid config file {:?}", path))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub private_key: String,
    pub broker: BrokerConfig,
    pub worker: WorkerConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let private_key = file
            .private_key
            .or_else(|| cli.private_key.clone())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "private_key must be specified via --private-key, XRENDER_PRIVATE_KEY or in config file"
                )
            })?;

        let broker_file = file.broker.unwrap_or_default();
        let mut broker = BrokerConfig::default()
            .with_host(broker_file.host.unwrap_or_else(|| cli.redis_host.clone()))
            .with_port(broker_file.port.unwrap_or(cli.redis_port))
            .with_db(broker_file.db.unwrap_or(0));
        if let Some(password) = broker_file.password {
            broker = broker.with_password(password);
        }
        if broker.host.is_empty() {
            bail!("Broker host must not be empty");
        }

        let worker_file = file.worker.unwrap_or_default();
        let defaults = WorkerConfig::default();
        let worker = WorkerConfig {
            max_jobs_per_process: worker_file.max_jobs_per_process.unwrap_or(cli.max_jobs),
            pop_timeout_secs: worker_file.pop_timeout_secs.unwrap_or(cli.pop_timeout_secs),
            recovery_delay_ms: worker_file
                .recovery_delay_ms
                .unwrap_or(defaults.recovery_delay_ms),
            operation_timeout_secs: worker_file
                .operation_timeout_secs
                .or(cli.operation_timeout_secs),
            publish_attempts: worker_file
                .publish_attempts
                .unwrap_or(defaults.publish_attempts),
        };

        Ok(Self {
            private_key,
            broker,
            worker,
        })
    }

    /// List this deployment's jobs are popped from.
    pub fn input_list(&self) -> String {
        channels::input_list(&self.private_key)
    }
}
