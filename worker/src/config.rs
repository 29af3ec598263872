use std::str::FromStr;
use std::time::Duration;
use sqlx::postgres::PgConnectOptions;
use shared::VOTES_QUEUE;
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_REDIS_PORT: u16 = 6379;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// What happens to the vote that was being processed when the store
/// connection had to be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InFlightPolicy {
    /// Discard it. At-most-once delivery.
    #[default]
    Drop,
    /// Apply it on the freshly opened connection.
    Retry,
}

impl FromStr for InFlightPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "retry" => Ok(Self::Retry),
            other => Err(format!("expected `drop` or `retry`, got `{other}`")),
        }
    }
}

/// Which insert failures are answered with an UPDATE of the existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertFallback {
    /// Any database-level error on insert takes the update path.
    #[default]
    AnyDatabaseError,
    /// Only a unique constraint violation does; other database errors
    /// propagate.
    UniqueViolationOnly,
}

impl FromStr for UpsertFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any-database-error" => Ok(Self::AnyDatabaseError),
            "unique-violation" => Ok(Self::UniqueViolationOnly),
            other => Err(format!("expected `any-database-error` or `unique-violation`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub hostname: String,
    pub port: u16,
    pub password: Option<String>,
    pub database: i64,
    pub timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            hostname: "redis".into(),
            port: DEFAULT_REDIS_PORT,
            password: None,
            database: 0,
            timeout: DEFAULT_SOCKET_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    pub queue_key: String,
    pub poll_interval: Duration,
    pub in_flight: InFlightPolicy,
    pub upsert_fallback: UpsertFallback,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            queue_key: VOTES_QUEUE.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            in_flight: InFlightPolicy::default(),
            upsert_fallback: UpsertFallback::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub store: PgConnectOptions,
    pub queue: QueueSettings,
    pub reconnect_backoff: Duration,
    pub loop_settings: LoopSettings,
}

impl WorkerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// `DATABASE_URL` wins over the individual `POSTGRES_*` variables when
    /// both are present.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let store = match var("DATABASE_URL") {
            Some(url) => PgConnectOptions::from_str(&url).map_err(|e| ConfigError::Invalid {
                name: "DATABASE_URL",
                value: redact_url(&url),
                reason: e.to_string(),
            })?,
            None => PgConnectOptions::new()
                .host(&var("POSTGRES_HOST").unwrap_or_else(|| "db".into()))
                .username(&var("POSTGRES_USER").unwrap_or_else(|| "postgres".into()))
                .password(&var("POSTGRES_PASSWORD").unwrap_or_else(|| "postgres".into()))
                .database(&var("POSTGRES_DB").unwrap_or_else(|| "postgres".into())),
        };

        let queue = QueueSettings {
            hostname: var("REDIS_HOST").unwrap_or_else(|| "redis".into()),
            port: parse_var(&var, "REDIS_PORT")?.unwrap_or(DEFAULT_REDIS_PORT),
            password: var("REDIS_PASSWORD"),
            database: parse_var(&var, "REDIS_DB")?.unwrap_or(0),
            timeout: parse_var(&var, "REDIS_SOCKET_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SOCKET_TIMEOUT),
        };

        let loop_settings = LoopSettings {
            queue_key: var("VOTES_QUEUE").unwrap_or_else(|| VOTES_QUEUE.into()),
            poll_interval: parse_var(&var, "POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            in_flight: parse_var(&var, "IN_FLIGHT_ON_RECONNECT")?.unwrap_or_default(),
            upsert_fallback: parse_var(&var, "UPSERT_FALLBACK")?.unwrap_or_default(),
        };

        Ok(Self {
            store,
            queue,
            reconnect_backoff: parse_var(&var, "RECONNECT_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RECONNECT_BACKOFF),
            loop_settings,
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
