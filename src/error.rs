use thiserror::Error;

/// Error type used throughout the crate.
#[derive(Error, Debug)]
pub enum AlarmError {
    /// Alarm name was empty
    #[error("Invalid alarm name: name must not be empty")]
    InvalidName,

    /// An alarm with this name already exists in either registry
    #[error("Duplicate alarm name: {0}")]
    DuplicateName(String),

    /// Analog thresholds are not ordered or none of them is set
    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),

    /// Storage for a new alarm record could not be reserved
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    /// No alarm with this name exists
    #[error("Alarm not found: {0}")]
    NotFound(String),

    /// I/O related failure
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while parsing YAML configuration files
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The engine could not attach to an async runtime
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Requested signal was not found in the bus
    #[error("Signal not found: {0}")]
    SignalNotFound(String),

    /// Returned value type does not match the expected type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: &'static str, actual: &'static str },
}

/// Convenient alias over [`Result`] using [`AlarmError`]
pub type Result<T> = std::result::Result<T, AlarmError>;
