use crate::record::ServiceType;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry data error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported registry format version: {0}")]
    UnsupportedVersion(u32),
    #[error("inconsistent registry: {count} records hold {hostname}")]
    Inconsistency { hostname: String, count: usize },
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid host info: {0}")]
    InvalidHostInfo(String),
    #[error("hostname already taken: {0}")]
    HostnameTaken(String),
    #[error("service {service} is {existing}, cannot register it as {requested}")]
    ServiceTypeMismatch {
        service: String,
        existing: ServiceType,
        requested: ServiceType,
    },
    #[error("instance not registered: {0}")]
    NotRegistered(String),
    #[error("concurrent update lost on {0}")]
    Conflict(String),
    #[error("could not bind a hostname after {attempts} attempts (last tried {hostname})")]
    BindConflict { hostname: String, attempts: usize },
    #[error("failed to apply local hostname {hostname}: {source}")]
    LocalApply {
        hostname: String,
        #[source]
        source: std::io::Error,
    },
    #[error("legacy hosts updater {program} failed: {status}")]
    LegacyUpdater {
        program: String,
        status: std::process::ExitStatus,
    },
    #[error("metadata service error: {0}")]
    Metadata(String),
}

pub type Result<T> = std::result::Result<T, Error>;
