//! Environment-driven configuration, loaded with `dotenvy` + `clap`'s `env`
//! feature the same way the teacher wires up its settings layer.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Args;
use secrecy::{ExposeSecret, SecretString};

/// Connection settings for the shared store.
#[derive(Args, Debug, Clone)]
pub struct StoreConfig {
    /// Redis host.
    #[arg(long, env = "REDIS_HOST", default_value = "localhost")]
    pub host: String,

    /// Redis port.
    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    pub port: u16,

    /// Redis logical database index.
    #[arg(long, env = "REDIS_DB", default_value_t = 0)]
    pub db: i64,

    /// Redis password. Only applied to the connection URL when non-empty.
    #[arg(long, env = "REDIS_PASSWORD", default_value = "")]
    pub password: SecretString,

    /// Whether to connect over TLS.
    #[arg(long, env = "REDIS_USE_SSL", default_value_t = false)]
    pub use_ssl: bool,
}

impl StoreConfig {
    /// Build a `redis://` (or `rediss://`) connection URL, applying
    /// credentials only when a password was actually configured.
    pub fn connection_url(&self) -> String {
        let scheme = if self.use_ssl { "rediss" } else { "redis" };
        let password = self.password.expose_secret();
        if password.is_empty() {
            format!("{scheme}://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "{scheme}://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            )
        }
    }
}

/// Settings specific to the gateway process.
#[derive(Args, Debug, Clone)]
pub struct GatewayConfig {
    #[command(flatten)]
    pub store: StoreConfig,

    /// Address the gateway's HTTP server binds to.
    #[arg(long, env = "GATEWAY_BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind_addr: SocketAddr,

    /// Default per-route timeout (seconds) used when a route doesn't specify one.
    #[arg(long, env = "GATEWAY_DEFAULT_TIMEOUT_SECS", default_value_t = 5)]
    pub default_timeout_secs: u64,

    /// TTL (seconds) applied to saved job records.
    #[arg(long, env = "GATEWAY_JOB_TTL_SECS", default_value_t = 60)]
    pub job_ttl_secs: u64,

    /// How often the gateway reaps inactive nodes (seconds).
    #[arg(long, env = "GATEWAY_REAP_INTERVAL_SECS", default_value_t = 30)]
    pub reap_interval_secs: u64,

    /// Maximum heartbeat age before a node is considered inactive (seconds).
    #[arg(long, env = "NODE_MAX_HEARTBEAT_AGE_SECS", default_value_t = 60)]
    pub max_heartbeat_age_secs: u64,
}

impl GatewayConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    pub fn max_heartbeat_age(&self) -> Duration {
        Duration::from_secs(self.max_heartbeat_age_secs)
    }
}

/// Settings specific to a worker process.
#[derive(Args, Debug, Clone)]
pub struct WorkerConfig {
    #[command(flatten)]
    pub store: StoreConfig,

    /// Stable version tag for this worker. Generated (`worker-<8 hex>`) if omitted.
    #[arg(long, env = "WORKER_VERSION")]
    pub version: Option<String>,

    /// How often this worker sends a heartbeat (seconds).
    #[arg(long, env = "WORKER_HEARTBEAT_INTERVAL_SECS", default_value_t = 15)]
    pub heartbeat_interval_secs: u64,
}

impl WorkerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Load a `.env` file if present; never fatal if it's missing.
pub fn load_dotenv() {
    if let Err(err) = dotenvy::dotenv() {
        tracing::debug!("no .env file loaded: {err}");
    }
}

/// Initialize `tracing` using `RUST_LOG` (or `info` by default), matching
/// the teacher's `tracing-subscriber` setup.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_url_without_password() {
        let cfg = StoreConfig {
            host: "localhost".into(),
            port: 6379,
            db: 0,
            password: SecretString::from(String::new()),
            use_ssl: false,
        };
        assert_eq!(cfg.connection_url(), "redis://localhost:6379/0");
    }

    #[test]
    fn connection_url_with_password_and_tls() {
        let cfg = StoreConfig {
            host: "example.com".into(),
            port: 6380,
            db: 2,
            password: SecretString::from("hunter2".to_string()),
            use_ssl: true,
        };
        assert_eq!(
            cfg.connection_url(),
            "rediss://:hunter2@example.com:6380/2"
        );
    }
}
