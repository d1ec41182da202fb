use config::ConfigError;
use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Groups the listener, fan-out, broker bridge, storage and logging sections.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub hub: HubSettings,
    pub bridge: BridgeSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the WebSocket listener will bind to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Fan-out and per-connection limits.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HubSettings {
    /// Outbound messages buffered per viewer before it counts as slow.
    pub queue_capacity: usize,
    /// Events buffered between the broker bridge and the hub.
    pub intake_capacity: usize,
    /// Largest inbound frame accepted from a viewer, in bytes.
    pub max_message_size: usize,
    pub pong_wait_secs: u64,
    pub write_wait_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BridgeSettings {
    pub channel_prefix: String,
    pub retry_backoff_ms: u64,
}

/// Location and retention of the durable event log.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageSettings {
    pub path: String,
    /// Keep at most this many entries per match; `None` keeps everything.
    pub max_events_per_match: Option<usize>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub hub: Option<PartialHubSettings>,
    pub bridge: Option<PartialBridgeSettings>,
    pub storage: Option<PartialStorageSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialHubSettings {
    pub queue_capacity: Option<usize>,
    pub intake_capacity: Option<usize>,
    pub max_message_size: Option<usize>,
    pub pong_wait_secs: Option<u64>,
    pub write_wait_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBridgeSettings {
    pub channel_prefix: Option<String>,
    pub retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStorageSettings {
    pub path: Option<String>,
    pub max_events_per_match: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
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
            },
            hub: HubSettings {
                queue_capacity: 256,
                intake_capacity: 1024,
                max_message_size: 512,
                pong_wait_secs: 60,
                write_wait_secs: 10,
            },
            bridge: BridgeSettings {
                channel_prefix: "match".to_string(),
                retry_backoff_ms: 1000,
            },
            storage: StorageSettings {
                path: "data/livefeed".to_string(),
                max_events_per_match: None,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fill every value missing from `self` with the one in `defaults`.
    pub fn merge_onto(self, defaults: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let hub = self.hub.unwrap_or_default();
        let bridge = self.bridge.unwrap_or_default();
        let storage = self.storage.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(defaults.server.host),
                port: server.port.unwrap_or(defaults.server.port),
            },
            hub: HubSettings {
                queue_capacity: hub.queue_capacity.unwrap_or(defaults.hub.queue_capacity),
                intake_capacity: hub.intake_capacity.unwrap_or(defaults.hub.intake_capacity),
                max_message_size: hub
                    .max_message_size
                    .unwrap_or(defaults.hub.max_message_size),
                pong_wait_secs: hub.pong_wait_secs.unwrap_or(defaults.hub.pong_wait_secs),
                write_wait_secs: hub.write_wait_secs.unwrap_or(defaults.hub.write_wait_secs),
            },
            bridge: BridgeSettings {
                channel_prefix: bridge
                    .channel_prefix
                    .unwrap_or(defaults.bridge.channel_prefix),
                retry_backoff_ms: bridge
                    .retry_backoff_ms
                    .unwrap_or(defaults.bridge.retry_backoff_ms),
            },
            storage: StorageSettings {
                path: storage.path.unwrap_or(defaults.storage.path),
                max_events_per_match: storage
                    .max_events_per_match
                    .or(defaults.storage.max_events_per_match),
            },
            log: LogSettings {
                level: log.level.unwrap_or(defaults.log.level),
            },
        }
    }
}

impl HubSettings {
    /// Rejects limits that would leave a connection without a usable queue,
    /// read deadline or keepalive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("hub.queue_capacity", self.queue_capacity as u64),
            ("hub.intake_capacity", self.intake_capacity as u64),
            ("hub.max_message_size", self.max_message_size as u64),
            ("hub.pong_wait_secs", self.pong_wait_secs),
            ("hub.write_wait_secs", self.write_wait_secs),
        ];
        match limits.iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(ConfigError::Message(format!("{key} must be greater than zero"))),
            None => Ok(()),
        }
    }
}
