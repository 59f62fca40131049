//! On-disk naming of rotated files

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::format::{Parsed, StrftimeItems, parse};
use chrono::{DateTime, Local, Utc};

/// Numeric segments a rotated name can carry after its label: the size
/// stamp, the collision suffix and the archive collision suffix.
const MAX_NUMERIC_SUFFIXES: usize = 3;

/// Bucket label for `now`, empty when time rotation is disabled.
pub(crate) fn time_label(now: DateTime<Utc>, time_layout: &str, local_time: bool) -> String {
    if time_layout.is_empty() {
        return String::new();
    }
    if local_time {
        now.with_timezone(&Local).format(time_layout).to_string()
    } else {
        now.format(time_layout).to_string()
    }
}

/// Name a retired main file: `<main>.<label>[.<unix>]`.
pub(crate) fn rotated_path(main: &Path, label: &str, size_stamp: Option<i64>) -> PathBuf {
    let mut name = OsString::from(main.as_os_str());
    if !label.is_empty() {
        name.push(".");
        name.push(label);
    }
    if let Some(stamp) = size_stamp {
        name.push(format!(".{stamp}"));
    }
    PathBuf::from(name)
}

/// First of `path`, `path.1`, `path.2`, ... that does not exist yet.
pub(crate) fn unused_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }
    (1u32..)
        .map(|n| with_extra_suffix(&path, &n.to_string()))
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}

/// `path` with `.suffix` appended to the full file name.
pub(crate) fn with_extra_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Whether `candidate` names a file this writer rotated out of `file_name`:
/// `<file_name>[.<label>][.<digits>]...[.gz]` where `<label>` matches
/// `time_layout`.
pub(crate) fn is_rotated_name(candidate: &str, file_name: &str, time_layout: &str) -> bool {
    let Some(rest) = candidate
        .strip_prefix(file_name)
        .and_then(|rest| rest.strip_prefix('.'))
    else {
        return false;
    };
    let rest = rest.strip_suffix(".gz").unwrap_or(rest);

    let mut label = rest;
    for peeled in 0..=MAX_NUMERIC_SUFFIXES {
        if (peeled > 0 || !label.is_empty()) && matches_layout(label, time_layout) {
            return true;
        }
        let (head, tail) = label.rsplit_once('.').unwrap_or(("", label));
        if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        label = head;
    }
    false
}

fn matches_layout(label: &str, time_layout: &str) -> bool {
    if time_layout.is_empty() {
        return label.is_empty();
    }
    parse(&mut Parsed::default(), label, StrftimeItems::new(time_layout)).is_ok()
}
