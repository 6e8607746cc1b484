//! Redis connection management.

use std::time::Duration;

use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Broker, BrokerFuture};

/// Broker connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Redis host.
    pub host: String,
    /// Redis port.
    pub port: u16,
    /// Logical database index.
    pub db: i64,
    /// Optional password; must be URL-safe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

impl BrokerConfig {
    /// Set the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database index.
    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// Set the password used to authenticate.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Connection URL, including the password if one is set.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Host, port and database, safe to log.
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Connection error: {0}")]
    Connection(#[source] redis::RedisError),
    #[error("Command error: {0}")]
    Command(#[source] redis::RedisError),
    /// Scripted failure raised by [`MemoryBroker`](crate::MemoryBroker).
    #[cfg(feature = "memory")]
    #[error("Injected failure: {0}")]
    Injected(String),
}

impl BrokerError {
    fn from_redis(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            BrokerError::Connection(err)
        } else {
            BrokerError::Command(err)
        }
    }

    /// True when the failure came from the transport rather than the command.
    pub fn is_connection(&self) -> bool {
        matches!(self, BrokerError::Connection(_))
    }
}

/// Broker backed by Redis lists.
///
/// Commands go through a [`ConnectionManager`], which re-establishes the
/// connection after it drops, so a restarted Redis is picked up on a later
/// call.
pub struct RedisBroker {
    connection: ConnectionManager,
}

impl RedisBroker {
    /// Connect to the configured Redis server.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        tracing::info!("Connecting to broker: {}", config.endpoint());

        let client = redis::Client::open(config.url()).map_err(BrokerError::from_redis)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(BrokerError::from_redis)?;

        tracing::info!("Connected to broker: {}", config.endpoint());

        Ok(Self { connection })
    }
}

/// BLPOP takes whole seconds and treats 0 as "forever".
fn blpop_timeout(timeout: Duration) -> u64 {
    if timeout.is_zero() {
        0
    } else {
        timeout.as_secs_f64().ceil() as u64
    }
}

impl Broker for RedisBroker {
    fn pop<'a>(&'a self, list: &'a str, timeout: Duration) -> BrokerFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let popped: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
                .arg(list)
                .arg(blpop_timeout(timeout))
                .query_async(&mut connection)
                .await
                .map_err(BrokerError::from_redis)?;

            Ok(popped.map(|(_, payload)| payload))
        })
    }

    fn push<'a>(&'a self, list: &'a str, payload: &'a [u8]) -> BrokerFuture<'a, ()> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let _: i64 = redis::cmd("LPUSH")
                .arg(list)
                .arg(payload)
                .query_async(&mut connection)
                .await
                .map_err(BrokerError::from_redis)?;

            Ok(())
        })
    }
}
