//! Configuration for the rotating file writer

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::writer::RotatingFileWriter;

/// Strftime layouts for the supported rotation granularities.
pub mod layout {
    /// One file per year.
    pub const YEARLY: &str = "%Y";
    /// One file per month.
    pub const MONTHLY: &str = "%Y%m";
    /// One file per day.
    pub const DAILY: &str = "%Y%m%d";
    /// One file per hour.
    pub const HOURLY: &str = "%Y%m%d%H";
    /// One file per minute.
    pub const MINUTELY: &str = "%Y%m%d%H%M";
    /// One file per second.
    pub const SECONDLY: &str = "%Y%m%d%H%M%S";
}

/// How often the main file rotates on time alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPeriod {
    /// Time never triggers rotation
    Never,
    /// Rotate when the year changes
    Yearly,
    /// Rotate when the month changes
    Monthly,
    /// Rotate when the day changes
    Daily,
    /// Rotate when the hour changes
    Hourly,
    /// Rotate when the minute changes
    Minutely,
    /// Rotate when the second changes
    Secondly,
}

impl RotationPeriod {
    /// The strftime layout producing this period's bucket label.
    #[must_use]
    pub const fn layout(self) -> &'static str {
        match self {
            Self::Never => "",
            Self::Yearly => layout::YEARLY,
            Self::Monthly => layout::MONTHLY,
            Self::Daily => layout::DAILY,
            Self::Hourly => layout::HOURLY,
            Self::Minutely => layout::MINUTELY,
            Self::Secondly => layout::SECONDLY,
        }
    }
}

/// Configuration for a rotating log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotatingFileConfig {
    /// Directory holding the main file and its rotated siblings. Must exist.
    pub dir: PathBuf,

    /// Name of the always-current file inside `dir`.
    pub file_name: String,

    /// Strftime layout for the time-bucket label. Empty disables time
    /// rotation.
    pub time_layout: String,

    /// Size in bytes at which the main file rotates. Zero disables size
    /// rotation.
    pub rotate_size: u64,

    /// Rotated files older than this are removed after each rotation.
    pub max_age: Option<Duration>,

    /// At most this many rotated files are kept after each rotation.
    pub max_count: Option<usize>,

    /// Gzip each file once it has been rotated.
    pub compress: bool,

    /// Compute bucket labels in the local time zone instead of UTC.
    pub local_time: bool,
}

impl Default for RotatingFileConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_name: "app.log".to_string(),
            time_layout: layout::HOURLY.to_string(),
            rotate_size: 0,
            max_age: None,
            max_count: None,
            compress: false,
            local_time: true,
        }
    }
}

impl RotatingFileConfig {
    /// Start building a configuration from the defaults.
    #[must_use]
    pub fn builder() -> RotatingFileConfigBuilder {
        RotatingFileConfigBuilder::new()
    }

    /// Path of the always-current file.
    #[must_use]
    pub fn main_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Whether the bucket label can ever change.
    #[must_use]
    pub fn rotates_on_time(&self) -> bool {
        !self.time_layout.is_empty()
    }

    /// Whether the file size can trigger rotation.
    #[must_use]
    pub const fn rotates_on_size(&self) -> bool {
        self.rotate_size > 0
    }

    /// Validate the configuration and open a writer on the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or `dir` is not an
    /// existing directory.
    pub fn open(self) -> Result<RotatingFileWriter> {
        RotatingFileWriter::new(self)
    }

    /// Check every field that can be checked without touching the file
    /// itself.
    pub(crate) fn validate(&self) -> Result<()> {
        validate_file_name(&self.file_name)?;
        validate_time_layout(&self.time_layout)?;
        validate_dir(&self.dir)
    }
}

fn validate_file_name(file_name: &str) -> Result<()> {
    let invalid = file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains('/')
        || file_name.contains(std::path::MAIN_SEPARATOR);
    if invalid {
        return Err(Error::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}

fn validate_time_layout(time_layout: &str) -> Result<()> {
    if StrftimeItems::new(time_layout).any(|item| matches!(item, Item::Error)) {
        return Err(Error::InvalidTimeLayout(time_layout.to_string()));
    }
    Ok(())
}

fn validate_dir(dir: &Path) -> Result<()> {
    let metadata = std::fs::metadata(dir).map_err(|source| Error::StatDirectory {
        path: dir.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(Error::NotADirectory(dir.to_path_buf()));
    }
    Ok(())
}

/// Builder for [`RotatingFileConfig`]
#[derive(Debug, Clone, Default)]
pub struct RotatingFileConfigBuilder {
    config: RotatingFileConfig,
}

impl RotatingFileConfigBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RotatingFileConfig::default(),
        }
    }

    /// Set the log directory
    #[must_use]
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.dir = dir.into();
        self
    }

    /// Set the main file name
    #[must_use]
    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.config.file_name = file_name.into();
        self
    }

    /// Set a custom strftime layout for bucket labels
    #[must_use]
    pub fn time_layout(mut self, time_layout: impl Into<String>) -> Self {
        self.config.time_layout = time_layout.into();
        self
    }

    /// Set one of the predefined rotation periods
    #[must_use]
    pub fn period(mut self, period: RotationPeriod) -> Self {
        self.config.time_layout = period.layout().to_string();
        self
    }

    /// Set the size threshold in bytes
    #[must_use]
    pub fn rotate_size(mut self, bytes: u64) -> Self {
        self.config.rotate_size = bytes;
        self
    }

    /// Set the maximum age of rotated files
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.max_age = Some(max_age);
        self
    }

    /// Set the maximum number of rotated files
    #[must_use]
    pub fn max_count(mut self, max_count: usize) -> Self {
        self.config.max_count = Some(max_count);
        self
    }

    /// Set whether rotated files are compressed
    #[must_use]
    pub fn compress(mut self, compress: bool) -> Self {
        self.config.compress = compress;
        self
    }

    /// Set whether bucket labels use local time
    #[must_use]
    pub fn local_time(mut self, local_time: bool) -> Self {
        self.config.local_time = local_time;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> RotatingFileConfig {
        self.config
    }
}
