use thiserror::Error;

/// Every failure mode the compile-and-deploy pipeline can surface.
///
/// Per-host failures (`Unreachable`, `RemoteCommandFailed`) are never
/// propagated with `?` out of a fan-out task; they are captured into a
/// status map instead. Every other variant aborts the pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FireletError {
    #[error("configuration must be saved before compile or deploy")]
    ConfigurationDirty,

    #[error("endpoint '{0}' is not defined")]
    UnknownEndpoint(String),

    #[error("host group '{0}' contains a cycle")]
    CyclicHostGroup(String),

    #[error("source and destination protocol differ in rule '{0}'")]
    ProtocolMismatch(String),

    #[error("bad field in rule '{rule}': {detail}")]
    BadField { rule: String, detail: String },

    #[error("rule name '{0}' must match [A-Za-z0-9_-]+")]
    BadName(String),

    #[error("host '{0}' is unreachable")]
    Unreachable(String),

    #[error("host '{0}' not available in fetched remote state")]
    HostUnavailable(String),

    #[error("interface '{iface}' missing on host '{host}'")]
    MissingInterface { host: String, iface: String },

    #[error("address mismatch on {host}/{iface}: declared {declared}, actual {actual}")]
    AddressMismatch {
        host: String,
        iface: String,
        declared: String,
        actual: String,
    },

    #[error("command failed on host '{host}': {command}")]
    RemoteCommandFailed { host: String, command: String },

    #[error("step '{0}' exceeded its deadline")]
    DeadlineExceeded(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FireletError>;

impl From<toml::de::Error> for FireletError {
    fn from(err: toml::de::Error) -> Self {
        FireletError::Config(err.to_string())
    }
}

impl From<csv::Error> for FireletError {
    fn from(err: csv::Error) -> Self {
        FireletError::Config(err.to_string())
    }
}

impl From<std::io::Error> for FireletError {
    fn from(err: std::io::Error) -> Self {
        FireletError::Config(err.to_string())
    }
}
