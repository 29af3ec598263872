use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;
use async_trait::async_trait;
use redis::{
    aio::MultiplexedConnection, AsyncCommands, Client, ConnectionAddr, ConnectionInfo,
    RedisConnectionInfo, RedisError, RedisResult,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use crate::{config::QueueSettings, error::WorkerError, utils::pause};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Failed to resolve {hostname}: {source}")]
    Resolve {
        hostname: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No IPv4 address found for {0}")]
    NoIpv4Address(String),
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),
}

/// An open handle on the broker.
#[async_trait]
pub trait VoteQueue: Send {
    async fn is_connected(&mut self) -> bool;
    /// Non-blocking pop from the head of `key`. Payloads are returned as
    /// raw bytes; decoding is left to the caller.
    async fn pop(&mut self, key: &str) -> Result<Option<Vec<u8>>, QueueError>;
}

/// Opens broker handles, blocking until the broker accepts a connection.
#[async_trait]
pub trait QueueConnector: Send + Sync {
    type Queue: VoteQueue;

    async fn open(&self, shutdown: &CancellationToken) -> Result<Self::Queue, WorkerError>;
}

/// Resolves `hostname` and keeps the first IPv4 address.
///
/// Not finding one is fatal: the caller is not expected to retry.
pub async fn resolve_ipv4(hostname: &str, port: u16) -> Result<SocketAddrV4, QueueError> {
    let addrs = tokio::net::lookup_host((hostname, port))
        .await
        .map_err(|source| QueueError::Resolve {
            hostname: hostname.to_string(),
            source,
        })?;

    addrs
        .filter_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| QueueError::NoIpv4Address(hostname.to_string()))
}

pub struct RedisQueue {
    conn: MultiplexedConnection,
}

#[async_trait]
impl VoteQueue for RedisQueue {
    async fn is_connected(&mut self) -> bool {
        let pong: RedisResult<String> = redis::cmd("PING").query_async(&mut self.conn).await;
        pong.is_ok()
    }

    async fn pop(&mut self, key: &str) -> Result<Option<Vec<u8>>, QueueError> {
        let payload: Option<Vec<u8>> = self.conn.lpop(key, None).await?;
        Ok(payload)
    }
}

pub struct RedisQueueConnector {
    settings: QueueSettings,
    backoff: Duration,
}

impl RedisQueueConnector {
    pub fn new(settings: QueueSettings, backoff: Duration) -> Self {
        Self { settings, backoff }
    }

    fn connection_info(&self, addr: SocketAddrV4) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(addr.ip().to_string(), addr.port()),
            redis: RedisConnectionInfo {
                db: self.settings.database,
                password: self.settings.password.clone(),
                ..Default::default()
            },
        }
    }

    fn is_connection_failure(e: &RedisError) -> bool {
        e.is_io_error() || e.is_connection_refusal() || e.is_timeout() || e.is_connection_dropped()
    }
}

#[async_trait]
impl QueueConnector for RedisQueueConnector {
    type Queue = RedisQueue;

    async fn open(&self, shutdown: &CancellationToken) -> Result<RedisQueue, WorkerError> {
        // Connect by address; the hostname is resolved once per open.
        let addr = resolve_ipv4(&self.settings.hostname, self.settings.port).await?;
        info!("Found redis at {}", addr.ip());

        let client = Client::open(self.connection_info(addr)).map_err(QueueError::from)?;
        let timeout = self.settings.timeout;

        loop {
            info!("Connecting to redis");
            match client
                .get_multiplexed_async_connection_with_timeouts(timeout, timeout)
                .await
            {
                Ok(conn) => {
                    info!("Connected to redis");
                    return Ok(RedisQueue { conn });
                }
                Err(e) if Self::is_connection_failure(&e) => {
                    error!("Waiting for redis: {}", e);
                    if !pause(self.backoff, shutdown).await {
                        return Err(WorkerError::ShuttingDown);
                    }
                }
                Err(e) => return Err(QueueError::from(e).into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn settings(hostname: &str, port: u16) -> QueueSettings {
        QueueSettings {
            hostname: hostname.into(),
            port,
            timeout: Duration::from_millis(100),
            ..QueueSettings::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_ipv4_literal() {
        let addr = resolve_ipv4("127.0.0.1", 6379).await.unwrap();
        assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 6379));
    }

    #[tokio::test]
    async fn test_resolve_without_ipv4_is_fatal() {
        let err = resolve_ipv4("::1", 6379).await.unwrap_err();
        assert!(matches!(err, QueueError::NoIpv4Address(ref host) if host == "::1"));
    }

    #[tokio::test]
    async fn test_open_without_ipv4_does_not_retry() {
        let connector = RedisQueueConnector::new(settings("::1", 6379), Duration::from_secs(3600));
        let started = std::time::Instant::now();
        let result = connector.open(&CancellationToken::new()).await;

        assert!(matches!(result, Err(WorkerError::Queue(QueueError::NoIpv4Address(_)))));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_refused_connection_waits_until_shutdown() {
        let connector = RedisQueueConnector::new(settings("127.0.0.1", 1), Duration::from_millis(20));
        let shutdown = CancellationToken::new();
        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let result = connector.open(&shutdown).await;
        assert!(matches!(result, Err(WorkerError::ShuttingDown)));
    }

    #[test]
    fn test_connection_info_carries_credentials() {
        let connector = RedisQueueConnector::new(
            QueueSettings {
                password: Some("secret".into()),
                database: 2,
                ..QueueSettings::default()
            },
            Duration::from_secs(1),
        );
        let info = connector.connection_info(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 7), 6379));

        assert_eq!(info.addr, ConnectionAddr::Tcp("10.0.0.7".into(), 6379));
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
    }
}
