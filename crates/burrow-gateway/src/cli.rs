use burrow_storage::BackendKind;
use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "BURROW_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "BURROW_BACKEND";
pub const LOCATION_ENV: &str = "BURROW_LOCATION";
pub const BASE_URL_ENV: &str = "BURROW_BASE_URL";
pub const JSON_LOGS_ENV: &str = "BURROW_JSON_LOGS";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_LOCATION: &str = "/data/burrow.redb";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "redb")]
    Redb,
    #[value(name = "redis")]
    Redis,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::Redb => write!(f, "redb"),
            StorageBackendArg::Redis => write!(f, "redis"),
        }
    }
}

impl From<StorageBackendArg> for BackendKind {
    fn from(value: StorageBackendArg) -> Self {
        match value {
            StorageBackendArg::Redb => BackendKind::Redb,
            StorageBackendArg::Redis => BackendKind::Redis,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "burrow-gateway", about = "Deterministic URL shortener")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Redb
    )]
    pub backend: StorageBackendArg,

    /// Database file for redb, `redis://` URI for redis, or `memory`.
    #[arg(long, env = LOCATION_ENV, default_value = DEFAULT_LOCATION)]
    pub location: String,

    /// Public base of short links. Defaults to `http://{Host}`.
    #[arg(long, env = BASE_URL_ENV)]
    pub base_url: Option<String>,

    #[arg(long, env = JSON_LOGS_ENV)]
    pub json_logs: bool,
}
