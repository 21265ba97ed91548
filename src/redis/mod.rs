pub mod policy;
#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::time::Instant;

use redis::aio::MultiplexedConnection;
use redis::{
    Client, ClientTlsConfig, ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisError,
    TlsCertificates,
};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::{RedisConfig, RedisTls};
use policy::{FailureKind, FatalReason, ReconnectDecision, ReconnectPolicy, RetryState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Connected,
    Reconnecting,
    /// Attempts exhausted; no further reconnects.
    Disconnected,
    /// A fatal error ended reconnection.
    Failed,
}

enum Link {
    Up(MultiplexedConnection),
    Reconnecting,
    Disconnected,
    Failed,
}

/// Why the connect loop gave up.
enum GiveUp {
    Fatal {
        reason: FatalReason,
        source: RedisError,
    },
    Exhausted {
        attempts: u32,
    },
}

struct Inner {
    client: Client,
    policy: ReconnectPolicy,
    link: RwLock<Link>,
}

/// Process-wide Redis handle, built once at startup and shared via Axum State.
#[derive(Clone)]
pub struct RedisState {
    inner: Arc<Inner>,
}

impl RedisState {
    pub async fn connect(config: &RedisConfig) -> Result<Self, RedisConnectError> {
        Self::connect_with_policy(config, ReconnectPolicy::default()).await
    }

    /// Only an unusable config is an error. If the server cannot be reached
    /// the handle is still returned, with the link disconnected or failed.
    pub async fn connect_with_policy(
        config: &RedisConfig,
        policy: ReconnectPolicy,
    ) -> Result<Self, RedisConnectError> {
        let client = build_client(config)?;
        let link = settle(establish(&client, &policy).await);
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                policy,
                link: RwLock::new(link),
            }),
        })
    }

    /// Clone of the live connection. Fails while reconnecting or after giving up.
    pub async fn connection(&self) -> Result<MultiplexedConnection, RedisUnavailable> {
        match &*self.inner.link.read().await {
            Link::Up(conn) => Ok(conn.clone()),
            _ => Err(RedisUnavailable),
        }
    }

    pub async fn link_status(&self) -> LinkStatus {
        match &*self.inner.link.read().await {
            Link::Up(_) => LinkStatus::Connected,
            Link::Reconnecting => LinkStatus::Reconnecting,
            Link::Disconnected => LinkStatus::Disconnected,
            Link::Failed => LinkStatus::Failed,
        }
    }

    /// Hand a command error to the reconnect loop. Only connection-level
    /// errors on a live link start a reconnect; at most one runs at a time.
    pub async fn report_failure(&self, err: &RedisError) {
        if !(err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal()) {
            return;
        }
        {
            let mut link = self.inner.link.write().await;
            if !matches!(*link, Link::Up(_)) {
                return;
            }
            *link = Link::Reconnecting;
        }

        tracing::warn!(error = %err, "redis link lost, reconnecting");
        let state = self.clone();
        tokio::spawn(async move { state.reconnect().await });
    }

    async fn reconnect(&self) {
        let next = settle(establish(&self.inner.client, &self.inner.policy).await);
        if matches!(next, Link::Up(_)) {
            tracing::info!("redis link restored");
        }
        *self.inner.link.write().await = next;
    }

    /// PING the server. Returns false when the link is down or the command fails.
    pub async fn ping(&self) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "redis ping failed");
                self.report_failure(&e).await;
                false
            }
        }
    }
}

/// Map the outcome of the connect loop onto the link, logging the way out.
fn settle(outcome: Result<MultiplexedConnection, GiveUp>) -> Link {
    match outcome {
        Ok(conn) => Link::Up(conn),
        Err(GiveUp::Exhausted { attempts }) => {
            tracing::debug!(attempts, "redis connect attempts exhausted");
            Link::Disconnected
        }
        Err(GiveUp::Fatal { reason, source }) => {
            tracing::error!(error = %source, "redis connection aborted: {}", reason);
            Link::Failed
        }
    }
}

fn build_client(config: &RedisConfig) -> Result<Client, RedisConnectError> {
    let mut info = config
        .url
        .as_str()
        .into_connection_info()
        .map_err(RedisConnectError::InvalidConfig)?;
    if let Some(password) = &config.password {
        info.redis.password = Some(password.clone());
    }

    let client = match &config.tls {
        Some(tls) => {
            if !uses_tls(&info) {
                tracing::warn!("redis TLS materials are set but the URL is not rediss://, ignoring them");
            }
            Client::build_with_tls(info, tls_certificates(tls))
        }
        None => Client::open(info),
    };
    client.map_err(RedisConnectError::InvalidConfig)
}

fn uses_tls(info: &ConnectionInfo) -> bool {
    matches!(info.addr, ConnectionAddr::TcpTls { .. })
}

fn tls_certificates(tls: &RedisTls) -> TlsCertificates {
    let client_tls = match (&tls.cert, &tls.key) {
        (Some(cert), Some(key)) => Some(ClientTlsConfig {
            client_cert: cert.as_bytes().to_vec(),
            client_key: key.as_bytes().to_vec(),
        }),
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!("REDIS_TLS_CERT and REDIS_TLS_KEY must be set together, ignoring client certificate");
            None
        }
        (None, None) => None,
    };
    TlsCertificates {
        client_tls,
        root_cert: tls.ca.as_ref().map(|ca| ca.as_bytes().to_vec()),
    }
}

/// Connect, consulting the policy after every failure. Each attempt is
/// bounded by the policy's attempt timeout.
async fn establish(
    client: &Client,
    policy: &ReconnectPolicy,
) -> Result<MultiplexedConnection, GiveUp> {
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        let timeout = policy.attempt_timeout(started.elapsed());
        let err = match tokio::time::timeout(timeout, client.get_multiplexed_async_connection()).await
        {
            Ok(Ok(conn)) => return Ok(conn),
            Ok(Err(e)) => e,
            Err(_) => RedisError::from(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "redis connect attempt timed out",
            )),
        };
        attempt += 1;

        let state = RetryState {
            attempt,
            total_retry_time: started.elapsed(),
            failure: FailureKind::of(&err),
        };
        match policy.decide(&state) {
            ReconnectDecision::Retry(delay) => {
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "redis connect failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            ReconnectDecision::Fatal(reason) => {
                return Err(GiveUp::Fatal {
                    reason,
                    source: err,
                });
            }
            ReconnectDecision::Stop => {
                return Err(GiveUp::Exhausted { attempts: attempt });
            }
        }
    }
}

#[derive(Debug)]
pub enum RedisConnectError {
    InvalidConfig(RedisError),
}

impl std::error::Error for RedisConnectError {}

impl std::fmt::Display for RedisConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedisConnectError::InvalidConfig(e) => write!(f, "invalid redis config: {}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedisUnavailable;

impl std::error::Error for RedisUnavailable {}

impl std::fmt::Display for RedisUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "redis link is not connected")
    }
}
