//! Broker connection configuration.

use std::str::FromStr;

/// Default AMQP port.
const DEFAULT_AMQP_PORT: u16 = 5672;

/// Which [`Broker`](crate::broker::Broker) implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerBackend {
    /// RabbitMQ over AMQP 0-9-1.
    Amqp,
    /// In-process simulation; nothing leaves the process.
    Memory,
}

impl FromStr for BrokerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amqp" | "rabbitmq" => Ok(Self::Amqp),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("unknown broker backend '{other}'")),
        }
    }
}

/// Configuration for the message broker connection.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub backend: BrokerBackend,
    /// Full AMQP URI; when set it overrides the individual fields below.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::Amqp,
            url: None,
            host: "localhost".to_string(),
            port: DEFAULT_AMQP_PORT,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable         | Default     |
    /// |------------------|-------------|
    /// | `BROKER_BACKEND` | `amqp`      |
    /// | `AMQP_URL`       | (unset)     |
    /// | `AMQP_HOST`      | `localhost` |
    /// | `AMQP_PORT`      | `5672`      |
    /// | `AMQP_USERNAME`  | `guest`     |
    /// | `AMQP_PASSWORD`  | `guest`     |
    /// | `AMQP_VHOST`     | `/`         |
    ///
    /// Panics on an unrecognised `BROKER_BACKEND`; misconfiguration should
    /// fail at startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let backend = std::env::var("BROKER_BACKEND")
            .ok()
            .map(|v| {
                v.parse()
                    .unwrap_or_else(|e| panic!("Invalid BROKER_BACKEND: {e}"))
            })
            .unwrap_or(defaults.backend);

        Self {
            backend,
            url: std::env::var("AMQP_URL").ok().filter(|u| !u.trim().is_empty()),
            host: std::env::var("AMQP_HOST").unwrap_or(defaults.host),
            port: std::env::var("AMQP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            username: std::env::var("AMQP_USERNAME").unwrap_or(defaults.username),
            password: std::env::var("AMQP_PASSWORD").unwrap_or(defaults.password),
            vhost: std::env::var("AMQP_VHOST").unwrap_or(defaults.vhost),
        }
    }

    /// The AMQP URI to connect to.
    ///
    /// Credentials and vhost are percent-encoded, so `/` in the default vhost
    /// becomes `%2F` and reserved characters in a password stay inside the
    /// userinfo.
    pub fn uri(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "amqp://{}:{}@{}:{}/{}",
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            urlencoding::encode(&self.vhost)
        )
    }

    /// The URI with the password masked, for logging.
    pub fn redacted_uri(&self) -> String {
        let uri = self.uri();
        match (uri.find("://"), uri.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                let credentials = &uri[scheme_end + 3..at];
                let user = credentials.split(':').next().unwrap_or_default();
                format!("{}{user}:***{}", &uri[..scheme_end + 3], &uri[at..])
            }
            _ => uri,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
