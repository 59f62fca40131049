//! Gzip compression of rotated files

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::{Error, Result};
use crate::naming::with_extra_suffix;

/// Compress `path` into `<path>.gz` and remove the original.
///
/// On failure the original is left untouched and any partial output is
/// removed.
pub(crate) fn compress_file(path: &Path) -> Result<PathBuf> {
    let target = archive_path(path);

    gzip_into(path, &target).map_err(|source| Error::Compress {
        path: path.to_path_buf(),
        source,
    })?;

    fs::remove_file(path).map_err(|source| Error::Compress {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(target)
}

/// First of `<path>.gz`, `<path>.1.gz`, `<path>.2.gz`, ... that is free.
fn archive_path(path: &Path) -> PathBuf {
    let first = with_extra_suffix(path, "gz");
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| with_extra_suffix(&with_extra_suffix(path, &n.to_string()), "gz"))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

fn gzip_into(source: &Path, target: &Path) -> io::Result<()> {
    let mut input = BufReader::new(File::open(source)?);
    let output = File::create_new(target)?;

    let encoded = encode(&mut input, output);
    if encoded.is_err() {
        let _ = fs::remove_file(target);
    }
    encoded
}

fn encode(input: &mut impl Read, output: File) -> io::Result<()> {
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(input, &mut encoder)?;
    let mut output = encoder.finish()?;
    output.flush()?;
    output.get_ref().sync_all()
}
