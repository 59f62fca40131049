//! Routes `tracing` output into a rotating log file as JSON lines.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use crate::error::{Error, Result};

use std::sync::Arc;

use proven_logger_file::{Clock, RotatingFileConfig, RotatingFileWriter, SystemClock};
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, Registry, filter, fmt, layer::SubscriberExt, reload};

/// Handle returned by [`configure_logging_to_file`].
#[derive(Debug)]
pub struct FileLogging {
    writer: Arc<RotatingFileWriter>,
    level: reload::Handle<filter::LevelFilter, Registry>,
}

impl FileLogging {
    /// The writer every event is sent to.
    #[must_use]
    pub const fn writer(&self) -> &Arc<RotatingFileWriter> {
        &self.writer
    }

    /// Change the maximum level that reaches the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriber holding the filter is gone.
    pub fn set_level(&self, level: filter::LevelFilter) -> Result<()> {
        self.level.modify(|filter| *filter = level)?;
        Ok(())
    }
}

/// Sets up a global tracing subscriber that writes JSON lines to a rotating
/// file.
///
/// # Errors
///
/// This function will return an error if the writer cannot be created or a
/// global default subscriber is already set.
pub fn configure_logging_to_file(
    config: RotatingFileConfig,
    level: filter::LevelFilter,
) -> Result<FileLogging> {
    let writer = Arc::new(RotatingFileWriter::new(config)?);
    let (level_filter, reload_handle) = reload::Layer::new(level);

    let subscriber = tracing_subscriber::registry()
        .with(level_filter)
        .with(json_layer(Arc::clone(&writer)));

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(path = %writer.main_path().display(), "logging to file");

    Ok(FileLogging {
        writer,
        level: reload_handle,
    })
}

/// A JSON formatting layer writing to `writer`, for composing into an
/// existing subscriber.
pub fn json_layer<S, C>(writer: Arc<RotatingFileWriter<C>>) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    C: Clock + 'static,
{
    fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(RotatingMakeWriter::new(writer))
}

/// Hands the shared rotating writer to `tracing-subscriber` for every event.
#[derive(Debug)]
pub struct RotatingMakeWriter<C: Clock = SystemClock> {
    writer: Arc<RotatingFileWriter<C>>,
}

impl<C: Clock> RotatingMakeWriter<C> {
    /// Wrap a shared writer.
    #[must_use]
    pub const fn new(writer: Arc<RotatingFileWriter<C>>) -> Self {
        Self { writer }
    }
}

impl<C: Clock> Clone for RotatingMakeWriter<C> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<'a, C: Clock + 'static> fmt::MakeWriter<'a> for RotatingMakeWriter<C> {
    type Writer = &'a RotatingFileWriter<C>;

    fn make_writer(&'a self) -> Self::Writer {
        &self.writer
    }
}
