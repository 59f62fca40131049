//! End-to-end rotation behaviour on a real directory

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use flate2::read::GzDecoder;
use proven_logger_file::{
    Clock, Error, MockClock, RotatingFileConfig, RotatingFileWriter, RotationPeriod,
};
use tempfile::tempdir;

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

/// File name -> contents for everything in `dir`.
fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            (
                entry.file_name().to_string_lossy().into_owned(),
                fs::read(entry.path()).unwrap(),
            )
        })
        .collect()
}

fn open(config: RotatingFileConfig, clock: &MockClock) -> RotatingFileWriter<MockClock> {
    let config = RotatingFileConfig {
        local_time: false,
        ..config
    };
    RotatingFileWriter::with_clock(config, clock.clone()).unwrap()
}

#[test]
fn test_hourly_rotation_names_retired_file_after_its_bucket() {
    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let writer = open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Hourly)
            .build(),
        &clock,
    );

    writer.write(b"A").unwrap();
    assert_eq!(fs::read(dir.path().join("app.log")).unwrap(), b"A");

    clock.set(at(11, 0, 1));
    writer.write(b"B").unwrap();

    let files = snapshot(dir.path());
    assert_eq!(files.len(), 2);
    assert_eq!(files["app.log.2024010110"], b"A");
    assert_eq!(files["app.log"], b"B");
}

#[test]
fn test_writes_within_bucket_accumulate_in_order() {
    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let writer = open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Hourly)
            .rotate_size(1024)
            .build(),
        &clock,
    );

    let mut expected = Vec::new();
    for i in 0..50 {
        let line = format!("line {i}\n");
        writer.write(line.as_bytes()).unwrap();
        expected.extend_from_slice(line.as_bytes());
        clock.advance(Duration::seconds(60));
    }

    let files = snapshot(dir.path());
    assert_eq!(files.len(), 1);
    assert_eq!(files["app.log"], expected);
}

#[test]
fn test_size_rotation_without_time_layout() {
    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let writer = open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Never)
            .rotate_size(100)
            .build(),
        &clock,
    );

    let first = [b'a'; 60];
    let second = [b'b'; 60];
    writer.write(&first).unwrap();
    writer.write(&second).unwrap();

    let files = snapshot(dir.path());
    let rotated = format!("app.log.{}", clock.now().timestamp());
    assert_eq!(files.len(), 2);
    assert_eq!(files[&rotated], first);
    assert_eq!(files["app.log"], second);
}

#[test]
fn test_size_rotation_within_bucket_keeps_bucket_label() {
    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 15, 0));
    let writer = open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Hourly)
            .rotate_size(10)
            .build(),
        &clock,
    );

    writer.write(b"12345678").unwrap();
    writer.write(b"abcdefgh").unwrap();

    let files = snapshot(dir.path());
    let rotated = format!("app.log.2024010110.{}", clock.now().timestamp());
    assert_eq!(files[&rotated], b"12345678");
    assert_eq!(files["app.log"], b"abcdefgh");
}

#[test]
fn test_size_rotations_in_same_second_never_overwrite() {
    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let writer = open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Never)
            .rotate_size(8)
            .build(),
        &clock,
    );

    for chunk in [b"11111111", b"22222222", b"33333333", b"44444444"] {
        writer.write(chunk).unwrap();
    }

    let ts = clock.now().timestamp();
    let files = snapshot(dir.path());
    assert_eq!(files.len(), 4);
    assert_eq!(files[&format!("app.log.{ts}")], b"11111111");
    assert_eq!(files[&format!("app.log.{ts}.1")], b"22222222");
    assert_eq!(files[&format!("app.log.{ts}.2")], b"33333333");
    assert_eq!(files["app.log"], b"44444444");
}

#[test]
fn test_externally_deleted_main_file_is_recreated() {
    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let writer = open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Hourly)
            .build(),
        &clock,
    );

    writer.write(b"before").unwrap();
    fs::remove_file(dir.path().join("app.log")).unwrap();

    // Even across a bucket change there is nothing to rename.
    clock.set(at(11, 30, 0));
    writer.write(b"after").unwrap();

    let files = snapshot(dir.path());
    assert_eq!(files.len(), 1);
    assert_eq!(files["app.log"], b"after");
    assert_eq!(writer.current_label().as_deref(), Some("2024010111"));
}

#[test]
fn test_externally_moved_main_file_is_not_renamed_again() {
    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let writer = open(
        RotatingFileConfig::builder().dir(dir.path()).build(),
        &clock,
    );

    writer.write(b"one").unwrap();
    fs::rename(dir.path().join("app.log"), dir.path().join("moved.log")).unwrap();
    writer.write(b"two").unwrap();

    let files = snapshot(dir.path());
    assert_eq!(files["moved.log"], b"one");
    assert_eq!(files["app.log"], b"two");
}

#[test]
fn test_existing_main_file_is_appended_on_cold_start() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("app.log"), b"previous run\n").unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let writer = open(
        RotatingFileConfig::builder().dir(dir.path()).build(),
        &clock,
    );

    writer.write(b"this run\n").unwrap();

    assert_eq!(
        fs::read(dir.path().join("app.log")).unwrap(),
        b"previous run\nthis run\n"
    );
}

#[test]
fn test_construction_requires_existing_directory() {
    let dir = tempdir().unwrap();

    let missing = RotatingFileConfig::builder()
        .dir(dir.path().join("nope"))
        .build()
        .open();
    assert!(matches!(missing, Err(Error::StatDirectory { .. })));

    let file = dir.path().join("file");
    fs::write(&file, b"").unwrap();
    let not_dir = RotatingFileConfig::builder().dir(&file).build().open();
    assert!(matches!(not_dir, Err(Error::NotADirectory(_))));
}

#[test]
fn test_compressed_rotation() {
    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let writer = open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Hourly)
            .compress(true)
            .build(),
        &clock,
    );

    writer.write(b"first hour\n").unwrap();
    clock.set(at(11, 0, 0));
    writer.write(b"second hour\n").unwrap();

    let files = snapshot(dir.path());
    assert_eq!(files.len(), 2);
    assert!(!files.contains_key("app.log.2024010110"));
    assert_eq!(files["app.log"], b"second hour\n");

    let mut decoded = Vec::new();
    GzDecoder::new(File::open(dir.path().join("app.log.2024010110.gz")).unwrap())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, b"first hour\n");
}

#[test]
fn test_max_count_applied_on_rotation() {
    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let writer = open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Hourly)
            .max_count(2)
            .build(),
        &clock,
    );

    for hour in 10..15 {
        clock.set(at(hour, 0, 0));
        writer.write(format!("hour {hour}\n").as_bytes()).unwrap();
    }

    let names: Vec<String> = snapshot(dir.path()).into_keys().collect();
    assert_eq!(
        names,
        vec!["app.log", "app.log.2024010112", "app.log.2024010113"]
    );
}

#[test]
fn test_retention_leaves_writer_with_longer_name_alone() {
    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let app = open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Hourly)
            .max_count(1)
            .build(),
        &clock,
    );
    let audit = open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .file_name("app.log.audit")
            .period(RotationPeriod::Hourly)
            .build(),
        &clock,
    );

    audit.write(b"audit 10\n").unwrap();
    app.write(b"app 10\n").unwrap();
    clock.set(at(11, 0, 0));
    audit.write(b"audit 11\n").unwrap();
    app.write(b"app 11\n").unwrap();
    clock.set(at(12, 0, 0));
    app.write(b"app 12\n").unwrap();

    let files = snapshot(dir.path());
    let names: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec![
            "app.log",
            "app.log.2024010111",
            "app.log.audit",
            "app.log.audit.2024010110",
        ]
    );
    assert_eq!(files["app.log.audit"], b"audit 11\n");
}

#[test]
fn test_max_age_applied_on_rotation() {
    let dir = tempdir().unwrap();
    let stale = dir.path().join("app.log.2020010100");
    fs::write(&stale, b"old").unwrap();
    filetime::set_file_mtime(&stale, filetime::FileTime::from_unix_time(1_577_836_800, 0)).unwrap();

    let clock = MockClock::new(Utc::now());
    let writer = RotatingFileWriter::with_clock(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Never)
            .rotate_size(4)
            .max_age(std::time::Duration::from_secs(30 * 86_400))
            .build(),
        clock.clone(),
    )
    .unwrap();

    writer.write(b"abcd").unwrap();
    writer.write(b"efgh").unwrap();

    let files = snapshot(dir.path());
    assert!(!files.contains_key("app.log.2020010100"));
    assert_eq!(files[&format!("app.log.{}", clock.now().timestamp())], b"abcd");
    assert_eq!(files["app.log"], b"efgh");
}

#[test]
fn test_concurrent_writers_lose_nothing_across_rotations() {
    const THREADS: usize = 8;
    const LINES: usize = 250;

    let dir = tempdir().unwrap();
    let clock = MockClock::new(at(10, 0, 0));
    let writer = Arc::new(open(
        RotatingFileConfig::builder()
            .dir(dir.path())
            .period(RotationPeriod::Secondly)
            .rotate_size(2048)
            .build(),
        &clock,
    ));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let writer = Arc::clone(&writer);
            let clock = clock.clone();
            thread::spawn(move || {
                for i in 0..LINES {
                    if t == 0 && i % 50 == 0 {
                        clock.advance(Duration::seconds(1));
                    }
                    let line = format!("thread={t:02} line={i:04}\n");
                    writer.write(line.as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let files = snapshot(dir.path());
    assert!(files.len() > 1, "expected rotations, got {files:?}");

    let mut seen: Vec<String> = files
        .values()
        .flat_map(|content| {
            String::from_utf8(content.clone())
                .unwrap()
                .lines()
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .collect();
    seen.sort();

    let mut expected: Vec<String> = (0..THREADS)
        .flat_map(|t| (0..LINES).map(move |i| format!("thread={t:02} line={i:04}")))
        .collect();
    expected.sort();

    assert_eq!(seen, expected);
}
