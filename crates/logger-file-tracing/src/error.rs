use thiserror::Error;

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while wiring the file writer into tracing.
#[derive(Debug, Error)]
pub enum Error {
    /// The rotating file writer could not be created.
    #[error(transparent)]
    Writer(#[from] proven_logger_file::Error),

    /// A global subscriber was already installed.
    #[error(transparent)]
    SetTracing(#[from] tracing::dispatcher::SetGlobalDefaultError),

    /// The level filter could not be changed.
    #[error(transparent)]
    Reload(#[from] tracing_subscriber::reload::Error),
}
