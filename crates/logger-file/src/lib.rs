//! File-based log sink with time and size rotation
//!
//! This crate provides a log file writer that supports:
//! - Rotation when the time bucket changes (yearly down to every second)
//! - Rotation when the file grows past a byte threshold
//! - Recovery when the current file is removed from under it
//! - Optional gzip compression and retention of rotated files
//!
//! The writer takes plain byte buffers, so any formatter that writes to an
//! [`std::io::Write`] can sit in front of it.
//!
//! ```no_run
//! use proven_logger_file::{RotatingFileConfig, RotationPeriod};
//!
//! # fn main() -> proven_logger_file::Result<()> {
//! let writer = RotatingFileConfig::builder()
//!     .dir("/var/log/myapp")
//!     .file_name("app.log")
//!     .period(RotationPeriod::Daily)
//!     .rotate_size(100 * 1024 * 1024)
//!     .max_count(10)
//!     .build()
//!     .open()?;
//!
//! writer.write(b"{\"msg\":\"hello\"}\n")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod clock;
mod compress;
mod config;
mod error;
mod naming;
mod retention;
mod writer;

#[cfg(any(test, feature = "test-helpers"))]
pub use clock::MockClock;
pub use clock::{Clock, SystemClock};
pub use config::{RotatingFileConfig, RotatingFileConfigBuilder, RotationPeriod, layout};
pub use error::{Error, Result};
pub use retention::RetentionReport;
pub use writer::RotatingFileWriter;
