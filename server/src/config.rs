use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use coviewer_system::CoordinatorOptions;

use crate::connection::ConnectionSettings;
use crate::document_file::DEFAULT_MAX_BYTES;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one coordinator shard is required")]
    NoShards,
    #[error("connection buffer must hold at least one message")]
    NoConnectionBuffer,
    #[error("heartbeat interval must be positive")]
    NoHeartbeat,
    #[error("client timeout ({timeout}s) must be longer than the heartbeat interval ({heartbeat}s)")]
    TimeoutTooShort { timeout: u64, heartbeat: u64 },
}

#[derive(Debug, Clone, Parser)]
#[command(name = "coviewer-server", about = "Presenter-driven document co-viewing server")]
pub struct ServerConfig {
    /// Address the HTTP and WebSocket listener binds to
    #[arg(long, env = "COVIEWER_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Number of coordinator workers; rooms are hashed across them
    #[arg(long, env = "COVIEWER_SHARDS", default_value_t = default_shard_count())]
    pub shards: usize,

    /// Outbound messages buffered per connection before it is dropped as lagging
    #[arg(long, env = "COVIEWER_CONNECTION_BUFFER", default_value_t = 64)]
    pub connection_buffer: usize,

    #[arg(long, env = "COVIEWER_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "COVIEWER_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_BYTES)]
    pub max_upload_bytes: usize,

    #[arg(long, env = "COVIEWER_HEARTBEAT_INTERVAL_SECS", default_value_t = 5)]
    pub heartbeat_interval_secs: u64,

    #[arg(long, env = "COVIEWER_CLIENT_TIMEOUT_SECS", default_value_t = 10)]
    pub client_timeout_secs: u64,

    /// Broadcast the viewer count as soon as someone joins
    #[arg(long, env = "COVIEWER_ANNOUNCE_JOINS")]
    pub announce_joins: bool,

    /// Tell non-presenters their page change was rejected instead of ignoring it
    #[arg(long, env = "COVIEWER_REJECT_UNAUTHORIZED")]
    pub reject_unauthorized: bool,
}

fn default_shard_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shards == 0 {
            return Err(ConfigError::NoShards);
        }
        if self.connection_buffer == 0 {
            return Err(ConfigError::NoConnectionBuffer);
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::NoHeartbeat);
        }
        if self.client_timeout_secs <= self.heartbeat_interval_secs {
            return Err(ConfigError::TimeoutTooShort {
                timeout: self.client_timeout_secs,
                heartbeat: self.heartbeat_interval_secs,
            });
        }
        Ok(())
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            announce_joins: self.announce_joins,
            reject_unauthorized: self.reject_unauthorized,
        }
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            buffer: self.connection_buffer,
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            client_timeout: Duration::from_secs(self.client_timeout_secs),
        }
    }
}
