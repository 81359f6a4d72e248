//! Stress tests for indras-filelog
//!
//! These tests hammer a single logger from many producer threads and check
//! that every line reaches disk, in order per producer, and unbroken.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use chrono::{Local, TimeZone};
use flate2::read::GzDecoder;
use indras_filelog::{Logger, LoggerBuilder, LoggerConfig, ManualClock};
use tempfile::TempDir;

const MAX_SIZE: u64 = 16 * 1024;

fn fixed_clock() -> Arc<ManualClock> {
    let start = Local
        .with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
        .earliest()
        .unwrap();
    Arc::new(ManualClock::new(start))
}

fn build_logger(root: &Path, compress: bool, queue_capacity: usize) -> Arc<Logger> {
    let config = LoggerConfig::default()
        .with_level("debug")
        .with_frequency("hourly")
        .with_max_size("16KB")
        .with_compress(compress)
        .with_queue_capacity(queue_capacity);
    let logger = LoggerBuilder::new("stress", "burst", root)
        .with_config(config)
        .with_clock(fixed_clock())
        .build()
        .unwrap();
    Arc::new(logger)
}

/// Files of a bucket sorted by index, with their decompressed contents
fn read_bucket(dir: &Path) -> Vec<(PathBuf, String)> {
    let mut files: Vec<(u32, PathBuf)> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .map(|p| {
            let name = p.file_name().unwrap().to_str().unwrap().to_string();
            let index = name.split('.').next().unwrap().parse().unwrap();
            (index, p)
        })
        .collect();
    files.sort();

    files
        .into_iter()
        .map(|(_, path)| {
            let contents = if path.extension().is_some_and(|e| e == "gz") {
                let mut out = String::new();
                GzDecoder::new(File::open(&path).unwrap())
                    .read_to_string(&mut out)
                    .unwrap();
                out
            } else {
                fs::read_to_string(&path).unwrap()
            };
            (path, contents)
        })
        .collect()
}

/// Spawn producers that each log `per_thread` numbered messages
fn run_producers(logger: &Arc<Logger>, threads: usize, per_thread: usize) {
    let barrier = Arc::new(Barrier::new(threads));
    let mut handles = vec![];

    for producer in 0..threads {
        let logger = Arc::clone(logger);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for seq in 0..per_thread {
                logger.info(format!("producer-{producer} seq-{seq}"));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

/// Check every line is intact and each producer's sequence is in order
fn assert_lines_ordered(all: &str, threads: usize, per_thread: usize) {
    let mut next = vec![0usize; threads];
    let mut total = 0;

    for line in all.lines() {
        total += 1;
        assert!(line.contains(" [INFO]    producer-"), "mangled line: {line}");
        let tail = line.rsplit(" [INFO]    ").next().unwrap();
        let (producer, seq) = tail
            .strip_prefix("producer-")
            .and_then(|rest| rest.split_once(" seq-"))
            .unwrap_or_else(|| panic!("mangled line: {line}"));
        let producer: usize = producer.parse().unwrap();
        let seq: usize = seq.parse().unwrap();
        assert_eq!(seq, next[producer], "out of order for producer {producer}");
        next[producer] += 1;
    }

    assert_eq!(total, threads * per_thread);
    assert!(next.iter().all(|&n| n == per_thread));
}

/// 2,000 events from 4 producers, hourly rotation at 16KB
#[test]
fn test_burst_from_concurrent_producers() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 500;

    let temp = TempDir::new().unwrap();
    let logger = build_logger(temp.path(), false, 1024);

    let start = Instant::now();
    run_producers(&logger, THREADS, PER_THREAD);
    logger.flush().unwrap();
    println!("Wrote {} events in {:?}", THREADS * PER_THREAD, start.elapsed());

    let category = temp.path().join("burst");
    let buckets: Vec<_> = fs::read_dir(&category).unwrap().collect();
    assert_eq!(buckets.len(), 1, "expected a single bucket");

    let files = read_bucket(&category.join("2024-01-15-10"));
    assert!(files.len() > 1, "16KB threshold should force rotation");

    let longest_line = files
        .iter()
        .flat_map(|(_, c)| c.lines())
        .map(|l| l.len() as u64 + 1)
        .max()
        .unwrap();
    for (i, (path, contents)) in files.iter().enumerate() {
        assert!(path.to_str().unwrap().ends_with(&format!("{}.log", i + 1)));
        let size = contents.len() as u64;
        assert!(size < MAX_SIZE + longest_line, "{} is {size} bytes", path.display());
        if i + 1 < files.len() {
            assert!(size >= MAX_SIZE, "{} rotated early", path.display());
        }
    }

    let all: String = files.into_iter().map(|(_, c)| c).collect();
    assert_lines_ordered(&all, THREADS, PER_THREAD);
}

/// A tiny queue forces producers to block on the writer
#[test]
fn test_backpressure_with_small_queue() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let temp = TempDir::new().unwrap();
    let logger = build_logger(temp.path(), false, 2);

    run_producers(&logger, THREADS, PER_THREAD);
    logger.flush().unwrap();

    let files = read_bucket(&temp.path().join("burst/2024-01-15-10"));
    let all: String = files.into_iter().map(|(_, c)| c).collect();
    assert_lines_ordered(&all, THREADS, PER_THREAD);
}

/// With compression on, retired indexes are gzipped and nothing is lost
#[test]
fn test_burst_with_compression() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 500;

    let temp = TempDir::new().unwrap();
    let logger = build_logger(temp.path(), true, 1024);

    run_producers(&logger, THREADS, PER_THREAD);
    logger.flush().unwrap();

    let files = read_bucket(&temp.path().join("burst/2024-01-15-10"));
    let (last, retired) = files.split_last().unwrap();
    assert!(!retired.is_empty());
    assert!(last.0.to_str().unwrap().ends_with(".log"));
    for (path, _) in retired {
        assert!(path.to_str().unwrap().ends_with(".log.gz"), "{}", path.display());
    }

    let all: String = files.into_iter().map(|(_, c)| c).collect();
    assert_lines_ordered(&all, THREADS, PER_THREAD);
}
