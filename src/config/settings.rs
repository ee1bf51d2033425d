use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the WebSocket server, per-connection sessions, the
/// relay broker and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the address the server binds to and the only path that accepts
/// WebSocket upgrades.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// Per-connection session settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    pub idle_timeout_secs: u64,
    pub queue_capacity: usize,
}

/// Which distribution medium the broker publishes through.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediumKind {
    Redis,
    Memory,
}

/// Configuration settings for the broker.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub medium: MediumKind,
    pub redis_url: String,
    pub channel_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub session: Option<PartialSessionSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialSessionSettings {
    pub idle_timeout_secs: Option<u64>,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub medium: Option<MediumKind>,
    pub redis_url: Option<String>,
    pub channel_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                path: "/v1/relay".to_string(),
            },
            session: SessionSettings::default(),
            broker: BrokerSettings {
                medium: MediumKind::Redis,
                redis_url: "redis://127.0.0.1:6379".to_string(),
                channel_prefix: "relay:".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            queue_capacity: 32,
        }
    }
}

impl SessionSettings {
    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_timeout_secs)
    }
}

impl PartialSettings {
    /// Fill every missing value from `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();
        let server = self.server;
        let session = self.session;
        let broker = self.broker;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                path: server
                    .as_ref()
                    .and_then(|s| s.path.clone())
                    .unwrap_or(default.server.path),
            },
            session: SessionSettings {
                idle_timeout_secs: session
                    .as_ref()
                    .and_then(|s| s.idle_timeout_secs)
                    .unwrap_or(default.session.idle_timeout_secs),
                queue_capacity: session
                    .as_ref()
                    .and_then(|s| s.queue_capacity)
                    .filter(|c| *c > 0)
                    .unwrap_or(default.session.queue_capacity),
            },
            broker: BrokerSettings {
                medium: broker
                    .as_ref()
                    .and_then(|b| b.medium)
                    .unwrap_or(default.broker.medium),
                redis_url: broker
                    .as_ref()
                    .and_then(|b| b.redis_url.clone())
                    .unwrap_or(default.broker.redis_url),
                channel_prefix: broker
                    .as_ref()
                    .and_then(|b| b.channel_prefix.clone())
                    .unwrap_or(default.broker.channel_prefix),
            },
            log: LogSettings {
                level: log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}
