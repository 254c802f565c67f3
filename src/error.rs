use thiserror::Error;

/// Failures talking to the OS pointer APIs. Never fatal to the loops.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("pointer control is not supported on this platform")]
    Unsupported,

    #[error("failed to connect to the display: {0}")]
    Connect(String),

    #[error("failed to query pointer position: {0}")]
    Query(String),

    #[error("failed to move pointer: {0}")]
    Move(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("frequency must be between {min} and {max} seconds, got {value}")]
    Frequency { value: f64, min: f64, max: f64 },

    #[error("distance must be between {min} and {max} pixels, got {value}")]
    Distance { value: i32, min: i32, max: i32 },

    #[error("idle threshold must be between {min} and {max} seconds, got {value}")]
    IdleThreshold { value: u64, min: u64, max: u64 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not find home directory")]
    NoHomeDir,

    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] SettingsError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Error)]
pub enum AutostartError {
    #[error("login startup registration is not supported on this platform")]
    Unsupported,

    #[error("could not resolve {0}")]
    MissingDir(&'static str),

    #[error("could not resolve the current executable: {0}")]
    Executable(std::io::Error),

    #[error("autostart entry I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry update failed: {0}")]
    Registry(String),
}
