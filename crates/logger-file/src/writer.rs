//! The rotating file writer

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::compress::compress_file;
use crate::config::RotatingFileConfig;
use crate::error::{Error, Result};
use crate::naming::{rotated_path, time_label, unused_path};
use crate::retention::{self, RetentionReport};

#[cfg(test)]
thread_local! {
    static FAIL_NEXT_REOPEN: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// State swapped under the lock.
#[derive(Debug, Default)]
struct State {
    /// The open handle on the main file, shared with in-flight writes.
    handle: Option<Arc<File>>,
    /// Bucket label in effect when `handle` was opened.
    label: String,
}

/// What resolving the target handle did.
#[derive(Debug)]
enum Resolution {
    Reused,
    Opened { recovered: bool },
    Rotated {
        to: PathBuf,
        by_time: bool,
        by_size: bool,
    },
}

/// A main file renamed out of the way, with the handle that was writing it.
#[derive(Debug)]
struct Retired {
    path: PathBuf,
    handle: Arc<File>,
}

/// A log file that renames itself out of the way when its time bucket changes
/// or it grows past a size threshold.
///
/// Rotation is evaluated lazily on each write; there is no background task.
/// The lock only covers the rotation decision and the handle swap, the bytes
/// themselves are appended outside of it.
#[derive(Debug)]
pub struct RotatingFileWriter<C: Clock = SystemClock> {
    config: RotatingFileConfig,
    main_path: PathBuf,
    clock: C,
    state: Mutex<State>,
}

impl RotatingFileWriter<SystemClock> {
    /// Create a writer driven by the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the directory does
    /// not exist.
    pub fn new(config: RotatingFileConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> RotatingFileWriter<C> {
    /// Create a writer driven by `clock`.
    ///
    /// No file is opened until the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the directory does
    /// not exist.
    pub fn with_clock(config: RotatingFileConfig, clock: C) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            main_path: config.main_path(),
            config,
            clock,
            state: Mutex::new(State::default()),
        })
    }

    /// The configuration this writer was built with.
    pub const fn config(&self) -> &RotatingFileConfig {
        &self.config
    }

    /// Path of the always-current file.
    pub fn main_path(&self) -> &Path {
        &self.main_path
    }

    /// Bucket label of the open file, `None` before the first write.
    pub fn current_label(&self) -> Option<String> {
        let state = self.state.lock();
        state.handle.as_ref().map(|_| state.label.clone())
    }

    /// Append `buf` to the current file, rotating first if needed.
    ///
    /// Either all of `buf` is written and its length returned, or an error is
    /// returned. Nothing is buffered across calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the target file cannot be resolved, rotated,
    /// opened or written.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let (target, retired) = self.resolve(buf.len());

        let written = target.and_then(|(file, resolution)| {
            self.log_resolution(&resolution);
            (&*file).write_all(buf).map_err(Error::Write)
        });

        if let Some(retired) = retired {
            self.housekeeping(retired);
        }
        written.map(|()| buf.len())
    }

    /// Flush the current file to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if syncing the open file fails.
    pub fn sync(&self) -> Result<()> {
        let handle = self.state.lock().handle.clone();
        if let Some(handle) = handle {
            handle.sync_all().map_err(|source| Error::Close {
                path: self.main_path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Release the open file. The next write opens it again.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the file to disk fails.
    pub fn close(&self) -> Result<()> {
        let handle = self.state.lock().handle.take();
        if let Some(handle) = handle {
            release(handle).map_err(|source| Error::Close {
                path: self.main_path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Remove rotated files that fall outside the retention policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or a file cannot be
    /// removed.
    pub fn apply_retention(&self) -> Result<RetentionReport> {
        retention::apply(
            &self.config.dir,
            &self.config.file_name,
            &self.config.time_layout,
            self.config.max_age,
            self.config.max_count,
            self.clock.now(),
        )
    }

    /// Find the handle this write should go to, rotating or reopening the
    /// main file as needed. Runs entirely under the lock and must not log.
    ///
    /// A file renamed out of the way is handed back even when reopening the
    /// main file afterwards fails, so it still gets closed and housekept.
    fn resolve(&self, incoming: usize) -> (Result<(Arc<File>, Resolution)>, Option<Retired>) {
        let mut state = self.state.lock();

        // Read under the lock so labels are seen in the order rotations run.
        let now = self.clock.now();
        let label = time_label(now, &self.config.time_layout, self.config.local_time);

        let live = match state.handle.as_ref() {
            Some(handle) => match self.main_file_exists() {
                Ok(true) => Some(Arc::clone(handle)),
                Ok(false) => None,
                Err(e) => return (Err(e), None),
            },
            None => None,
        };

        let Some(current) = live else {
            let recovered = state.handle.take().is_some();
            let target = self.open_main().map(|file| {
                let file = Arc::new(file);
                state.handle = Some(Arc::clone(&file));
                state.label = label;
                (file, Resolution::Opened { recovered })
            });
            return (target, None);
        };

        let by_time = label != state.label;
        let by_size = match self.size_exceeded(&current, incoming) {
            Ok(by_size) => by_size,
            Err(e) => return (Err(e), None),
        };
        if !by_time && !by_size {
            return (Ok((current, Resolution::Reused)), None);
        }
        drop(current);

        let size_stamp = by_size.then(|| now.timestamp());
        let path = unused_path(rotated_path(&self.main_path, &state.label, size_stamp));
        if let Err(source) = fs::rename(&self.main_path, &path) {
            let error = Error::Rename {
                from: self.main_path.clone(),
                to: path,
                source,
            };
            return (Err(error), None);
        }

        let to = path.clone();
        let retired = state
            .handle
            .take()
            .map(|handle| Retired { path, handle });

        let target = self.reopen_main().map(|file| {
            let file = Arc::new(file);
            state.handle = Some(Arc::clone(&file));
            state.label = label;
            (
                file,
                Resolution::Rotated {
                    to,
                    by_time,
                    by_size,
                },
            )
        });

        (target, retired)
    }

    /// Logging that must happen outside the lock.
    fn log_resolution(&self, resolution: &Resolution) {
        match resolution {
            Resolution::Reused => {}
            Resolution::Opened { recovered } => {
                debug!(path = %self.main_path.display(), recovered, "opened log file");
            }
            Resolution::Rotated {
                to,
                by_time,
                by_size,
            } => {
                debug!(
                    from = %self.main_path.display(),
                    to = %to.display(),
                    by_time,
                    by_size,
                    "rotated log file"
                );
            }
        }
    }

    /// Close the retired handle, then compress and apply retention. Runs
    /// after the lock is released; failures are logged.
    fn housekeeping(&self, Retired { path, handle }: Retired) {
        let closed = match release(handle) {
            Ok(()) => true,
            Err(source) => {
                warn!("{}", Error::Close { path: path.clone(), source });
                false
            }
        };

        // Only a cleanly closed file is compressed.
        if self.config.compress && closed {
            match compress_file(&path) {
                Ok(archive) => debug!(path = %archive.display(), "compressed rotated log file"),
                Err(e) => warn!("{e}"),
            }
        }

        match self.apply_retention() {
            Ok(report) if report.total_removed() > 0 => debug!(
                removed_by_age = report.removed_by_age,
                removed_by_count = report.removed_by_count,
                "removed rotated log files"
            ),
            Ok(_) => {}
            Err(e) => warn!("{e}"),
        }
    }

    fn main_file_exists(&self) -> Result<bool> {
        match fs::metadata(&self.main_path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(Error::Environment {
                path: self.main_path.clone(),
                source,
            }),
        }
    }

    fn size_exceeded(&self, file: &File, incoming: usize) -> Result<bool> {
        if !self.config.rotates_on_size() {
            return Ok(false);
        }

        let size = file
            .metadata()
            .map_err(|source| Error::Stat {
                path: self.main_path.clone(),
                source,
            })?
            .len();
        let threshold = self.config.rotate_size;
        let incoming = u64::try_from(incoming).unwrap_or(u64::MAX);

        Ok(size >= threshold || (size > 0 && size.saturating_add(incoming) > threshold))
    }

    /// Open a fresh main file right after the old one was renamed away.
    fn reopen_main(&self) -> Result<File> {
        #[cfg(test)]
        if FAIL_NEXT_REOPEN.take() {
            return Err(Error::Open {
                path: self.main_path.clone(),
                source: io::Error::other("reopen failure requested by test"),
            });
        }

        self.open_main()
    }

    fn open_main(&self) -> Result<File> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }

        options.open(&self.main_path).map_err(|source| Error::Open {
            path: self.main_path.clone(),
            source,
        })
    }
}

/// Wait for in-flight writes on `handle` to finish, then flush and close it.
///
/// Only the caller that retired or closed the handle waits here, never
/// while holding the writer lock. Writes that resolved the handle earlier are
/// each a single append, so the wait is bounded by the slowest of them.
fn release(mut handle: Arc<File>) -> io::Result<()> {
    let file = loop {
        match Arc::try_unwrap(handle) {
            Ok(file) => break file,
            Err(shared) => {
                handle = shared;
                thread::yield_now();
            }
        }
    };
    file.sync_all()
}

impl<C: Clock> Write for &RotatingFileWriter<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingFileWriter::write(*self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: Clock> Write for RotatingFileWriter<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingFileWriter::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
