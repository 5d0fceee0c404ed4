//! Integration tests for timedex
//!
//! These tests verify end-to-end functionality by laying out temporary
//! file trees and exercising the complete discovery, join and map
//! workflows against them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use tempfile::TempDir;
use timedex::{
    Bundle, Dataset, DatasetError, FileHandler, FindOptions, HandlerError, MapOptions, MapResult,
    TimeCoverage,
};

fn ts(s: &str) -> NaiveDateTime {
    timedex::resolution::parse_timestamp(s).unwrap()
}

/// Helper to create an empty file, including its parent directories
fn touch(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::File::create(&path).unwrap();
    path
}

/// Plain-text handler used by the read/write and map tests
struct TextHandler;

impl FileHandler for TextHandler {
    type Content = String;

    fn read(&self, path: &Path) -> Result<String, HandlerError> {
        Ok(fs::read_to_string(path)?)
    }

    fn write(&self, path: &Path, content: &String) -> Result<(), HandlerError> {
        fs::write(path, content)?;
        Ok(())
    }
}

fn hourly_dataset(root: &Path) -> Dataset {
    Dataset::builder(format!(
        "{}/{{year}}/{{month}}/{{day}}/{{hour}}{{minute}}{{second}}.dat",
        root.display()
    ))
    .name("hourly")
    .build()
    .unwrap()
}

#[test]
fn test_find_files_filters_by_semi_open_window() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "2017/01/01/120000.dat");
    touch(root, "2017/01/02/000000.dat");

    let dataset = hourly_dataset(root);
    let records = dataset
        .find_files(ts("2017-01-01"), ts("2017-01-02"), FindOptions::new())
        .unwrap()
        .records()
        .unwrap();

    // The file starting exactly at the window end is not part of it.
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].start, ts("2017-01-01 12:00"));
    assert_eq!(records[0].end, ts("2017-01-01 12:00"));
}

#[test]
fn test_find_files_sorted_and_bundled_by_count() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    for hour in ["04", "00", "02", "03", "01"] {
        touch(root, &format!("2017/01/01/{hour}0000.dat"));
    }

    let dataset = hourly_dataset(root);
    let options = FindOptions::new().bundle(Some(Bundle::Count(2)));
    let bundles: Vec<_> = dataset
        .find_files(ts("2017-01-01"), ts("2017-01-02"), options)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let sizes: Vec<_> = bundles.iter().map(|b| b.records().len()).collect();
    assert_eq!(sizes, [2, 2, 1]);
    // Bundling by count implies sorting by start time.
    assert_eq!(bundles[0].records()[0].start, ts("2017-01-01 00:00"));
    assert_eq!(bundles[2].records()[0].start, ts("2017-01-01 04:00"));
}

#[test]
fn test_per_file_coverage_extends_end_times() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "2017/01/01/230000.dat");

    let mut dataset = hourly_dataset(root);
    dataset
        .set_time_coverage(TimeCoverage::PerFile(Duration::hours(1)))
        .unwrap();

    // With one hour of coverage the 23:00 file reaches into the next day.
    let records = dataset
        .find_files(ts("2017-01-02"), ts("2017-01-03"), FindOptions::new().strict(false))
        .unwrap()
        .records()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].end, ts("2017-01-02 00:00"));
    assert!(dataset.contains(ts("2017-01-01 23:30")).unwrap());
}

#[test]
fn test_strict_mode_reports_empty_windows() {
    let tmp = TempDir::new().unwrap();
    let dataset = hourly_dataset(tmp.path());

    let err = dataset
        .find_files(ts("2017-01-01"), ts("2017-01-02"), FindOptions::new())
        .err()
        .unwrap();
    assert!(matches!(err, DatasetError::NoFiles { .. }));

    let records = dataset
        .find_files(
            ts("2017-01-01"),
            ts("2017-01-02"),
            FindOptions::new().strict(false),
        )
        .unwrap()
        .records()
        .unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_excluded_periods_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "2017/01/01/060000.dat");
    touch(root, "2017/01/01/180000.dat");

    let dataset = Dataset::builder(format!(
        "{}/{{year}}/{{month}}/{{day}}/{{hour}}{{minute}}{{second}}.dat",
        root.display()
    ))
    .exclude([(ts("2017-01-01 05:00"), ts("2017-01-01 07:00"))])
    .build()
    .unwrap();

    let records = dataset
        .find_files(ts("2017-01-01"), ts("2017-01-02"), FindOptions::new())
        .unwrap()
        .records()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].start, ts("2017-01-01 18:00"));
}

#[test]
fn test_find_file_prefers_containing_then_nearest() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "2017/01/01/060000.dat");
    touch(root, "2017/01/01/180000.dat");

    let dataset = hourly_dataset(root);
    let fill = BTreeMap::new();

    let nearest = dataset
        .find_file(ts("2017-01-01 10:00"), &fill)
        .unwrap()
        .unwrap();
    assert_eq!(nearest.start, ts("2017-01-01 06:00"));

    let nearest = dataset
        .find_file(ts("2017-01-01 16:00"), &fill)
        .unwrap()
        .unwrap();
    assert_eq!(nearest.start, ts("2017-01-01 18:00"));

    // Equidistant candidates resolve to the earliest discovered one.
    let nearest = dataset
        .find_file(ts("2017-01-01 12:00"), &fill)
        .unwrap()
        .unwrap();
    assert_eq!(nearest.start, ts("2017-01-01 06:00"));
}

#[test]
fn test_single_file_dataset_covers_everything() {
    let tmp = TempDir::new().unwrap();
    let path = touch(tmp.path(), "station/measurements.dat");

    let dataset = Dataset::builder(path.to_string_lossy())
        .name("station")
        .build()
        .unwrap();
    assert!(dataset.is_single_file());

    let records = dataset
        .find_files(ts("1999-01-01"), ts("2030-01-01"), FindOptions::new())
        .unwrap()
        .records()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, path);

    let missing = Dataset::builder(format!("{}/nope.dat", tmp.path().display()))
        .build()
        .unwrap();
    let err = missing
        .find_files(ts("2017-01-01"), ts("2017-01-02"), FindOptions::new())
        .err()
        .unwrap();
    assert!(matches!(err, DatasetError::SingleFileMissing { .. }));
}

#[test]
fn test_map_runs_worker_initializer() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "2017/01/01/000000.dat");
    touch(root, "2017/01/01/010000.dat");

    let initialized = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&initialized);
    let dataset = hourly_dataset(root);
    let results = dataset
        .map(
            ts("2017-01-01"),
            ts("2017-01-02"),
            |_, _| Ok(()),
            None,
            &MapOptions::new().pool_size(2).worker_init(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

    assert_eq!(results.len(), 2);
    // Every worker that picked up a task ran the initializer first.
    assert!(initialized.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_find_overlapping_files_with_gap() {
    let tmp = TempDir::new().unwrap();
    let primary_root = tmp.path().join("a");
    let secondary_root = tmp.path().join("b");
    touch(&primary_root, "2017/01/01/060000.dat");
    touch(&secondary_root, "2017/01/01/063000.dat");
    touch(&secondary_root, "2017/01/01/120000.dat");

    let mut primary = hourly_dataset(&primary_root);
    primary
        .set_time_coverage(TimeCoverage::PerFile(Duration::hours(1)))
        .unwrap();
    let mut secondary = hourly_dataset(&secondary_root);
    secondary
        .set_time_coverage(TimeCoverage::PerFile(Duration::hours(1)))
        .unwrap();

    let pairs = primary
        .find_overlapping_files(ts("2017-01-01"), ts("2017-01-02"), &secondary, None)
        .unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].1.len(), 1);
    assert_eq!(pairs[0].1[0].start, ts("2017-01-01 06:30"));

    // A six hour gap additionally pulls in the noon file.
    let pairs = primary
        .find_overlapping_files(
            ts("2017-01-01"),
            ts("2017-01-02"),
            &secondary,
            Some(Duration::hours(6)),
        )
        .unwrap();
    assert_eq!(pairs[0].1.len(), 2);
}

#[test]
fn test_info_cache_round_trip() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "2017/01/01/120000.dat");
    let cache_path = root.join("info_cache.json");

    let template = format!(
        "{}/{{year}}/{{month}}/{{day}}/{{hour}}{{minute}}{{second}}.dat",
        root.display()
    );
    let dataset = Dataset::builder(&template)
        .cache_path(&cache_path)
        .build()
        .unwrap();
    dataset
        .find_files(ts("2017-01-01"), ts("2017-01-02"), FindOptions::new())
        .unwrap()
        .records()
        .unwrap();
    assert_eq!(dataset.cache().len(), 1);
    dataset.flush_cache().unwrap();
    assert!(cache_path.is_file());

    // A fresh dataset picks the metadata up from disk.
    let reloaded = Dataset::builder(&template)
        .cache_path(&cache_path)
        .build()
        .unwrap();
    assert_eq!(reloaded.cache().len(), 1);
}

#[test]
fn test_read_and_write_through_handler() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    let dataset = Dataset::builder(format!(
        "{}/{{year}}/{{month}}/{{day}}.txt",
        root.display()
    ))
    .handler(TextHandler)
    .build()
    .unwrap();

    let path = dataset
        .generate_filename(ts("2017-01-01"), ts("2017-01-01"), &BTreeMap::new())
        .unwrap();
    dataset.write(&path, &"hello".to_string()).unwrap();
    assert_eq!(dataset.read(&path).unwrap(), "hello");

    let contents = dataset
        .read_period(ts("2017-01-01"), ts("2017-01-02"))
        .unwrap();
    assert_eq!(contents, ["hello"]);
}

#[test]
fn test_map_writes_results_to_output_dataset() {
    let tmp = TempDir::new().unwrap();
    let input_root = tmp.path().join("in");
    let output_root = tmp.path().join("out");
    for hour in 0..10 {
        let path = input_root.join(format!("2017/01/01/{hour:02}0000.dat"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("raw {hour}")).unwrap();
    }

    let input = Dataset::builder(format!(
        "{}/{{year}}/{{month}}/{{day}}/{{hour}}{{minute}}{{second}}.dat",
        input_root.display()
    ))
    .handler(TextHandler)
    .build()
    .unwrap();
    let output = Dataset::builder(format!(
        "{}/{{year}}/{{month}}/{{day}}/{{hour}}.txt",
        output_root.display()
    ))
    .handler(TextHandler)
    .build()
    .unwrap();

    let results = input
        .map_content(
            ts("2017-01-01"),
            ts("2017-01-02"),
            |_, _, content| match content {
                timedex::dataset::BundleContent::Single(text) => Ok(text.to_uppercase()),
                timedex::dataset::BundleContent::Group(_) => unreachable!(),
            },
            Some(&output),
            &MapOptions::new().pool_size(4),
        )
        .unwrap();

    assert_eq!(results.len(), 10);
    assert!(results
        .iter()
        .all(|r| matches!(r, MapResult::Written(_))));
    for hour in 0..10 {
        let written = output_root.join(format!("2017/01/01/{hour:02}.txt"));
        assert_eq!(fs::read_to_string(written).unwrap(), format!("RAW {hour}"));
    }
}

#[test]
fn test_map_collects_values_in_order() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    for hour in ["00", "01", "02"] {
        touch(root, &format!("2017/01/01/{hour}0000.dat"));
    }

    let dataset = hourly_dataset(root);
    let results = dataset
        .map(
            ts("2017-01-01"),
            ts("2017-01-02"),
            |_, bundle| Ok(bundle.span().0.format("%H").to_string()),
            None,
            &MapOptions::new().pool_size(2),
        )
        .unwrap();

    let hours: Vec<_> = results
        .into_iter()
        .map(|r| match r {
            MapResult::Value(v) => v,
            other => panic!("unexpected result {other:?}"),
        })
        .collect();
    assert_eq!(hours, ["00", "01", "02"]);
}

#[test]
fn test_map_is_fail_fast() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "2017/01/01/000000.dat");
    touch(root, "2017/01/01/010000.dat");

    let dataset = hourly_dataset(root);
    let err = dataset
        .map::<(), _>(
            ts("2017-01-01"),
            ts("2017-01-02"),
            |_, bundle| {
                if bundle.span().0 == ts("2017-01-01 01:00") {
                    Err(DatasetError::NoStartTime {
                        path: bundle.records()[0].path.clone(),
                    })
                } else {
                    Ok(())
                }
            },
            None,
            &MapOptions::new(),
        )
        .err()
        .unwrap();
    assert!(matches!(err, DatasetError::NoStartTime { .. }));
}

#[test]
fn test_user_placeholders_survive_into_output_paths() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "2017/01/01/ch3-000000.dat");

    let dataset = Dataset::builder(format!(
        "{}/{{year}}/{{month}}/{{day}}/ch{{channel}}-{{hour}}{{minute}}{{second}}.dat",
        root.display()
    ))
    .placeholder("channel", r"(\d+)")
    .build()
    .unwrap();

    let records = dataset
        .find_files(ts("2017-01-01"), ts("2017-01-02"), FindOptions::new())
        .unwrap()
        .records()
        .unwrap();
    assert_eq!(records[0].attributes["channel"], "3");

    let generated = dataset
        .generate_filename(
            ts("2017-01-01"),
            ts("2017-01-01"),
            &BTreeMap::from([("channel".to_string(), "7".to_string())]),
        )
        .unwrap();
    assert!(generated.to_string_lossy().ends_with("2017/01/01/ch7-000000.dat"));
}
