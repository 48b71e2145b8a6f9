//! Generate, dump, and reload a dataset through the public registry.

mod common;

use std::fs;

use benchdata_core::{
    CodecError, Dataset, Handle, HostDevice, ProvisionError, Shape, load_dataset,
};
use common::args;
use rstest::rstest;
use tempfile::TempDir;

#[rstest]
fn dumped_blobs_reload_through_the_load_generator() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("out.txt");
    let path_arg = path.to_str().expect("utf-8 temp path");
    let device = HostDevice::new();
    let handle = Handle::new(&device);

    let mut generated = Dataset::new();
    load_dataset(
        &mut generated,
        &handle,
        &args(&[
            "blobs",
            "-nrows",
            "100",
            "-ncols",
            "4",
            "-nclusters",
            "3",
            "-seed",
            "42",
            "-dump",
            path_arg,
        ]),
    )
    .expect("generation succeeds");

    let text = fs::read_to_string(&path).expect("dump exists");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("100 4 3"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 100);
    for row in &rows {
        let fields: Vec<&str> = row.split_whitespace().collect();
        assert_eq!(fields.len(), 5, "row `{row}` must hold 4 features and a label");
        for feature in &fields[..4] {
            let decimals = feature.split_once('.').map(|(_, fraction)| fraction.len());
            assert_eq!(decimals, Some(6), "feature `{feature}` must have 6 decimals");
        }
        assert!(matches!(fields[4], "0" | "1" | "2"));
    }

    let mut loaded = Dataset::new();
    load_dataset(&mut loaded, &handle, &args(&["load", "-file", path_arg]))
        .expect("load succeeds");
    assert_eq!(loaded.shape(), Shape::new(100, 4, 3));
    assert_eq!(
        loaded.labels_to_host().expect("read back"),
        generated.labels_to_host().expect("read back")
    );
    let original = generated.features_to_host().expect("read back");
    let restored = loaded.features_to_host().expect("read back");
    for (left, right) in original.iter().zip(&restored) {
        assert!((left - right).abs() < 1e-5, "{left} vs {right}");
    }
}

#[rstest]
fn truncated_dump_is_rejected_by_the_loader() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("short.txt");
    fs::write(&path, "5 2 2\n0.1 0.2 0\n0.3 0.4 1\n0.5 0.6 0\n").expect("write input");
    let device = HostDevice::new();
    let handle = Handle::new(&device);

    let mut out = Dataset::new();
    let err = load_dataset(
        &mut out,
        &handle,
        &args(&["load", "-file", path.to_str().expect("utf-8 temp path")]),
    )
    .expect_err("truncated file must fail");
    assert!(matches!(
        err,
        ProvisionError::Codec(CodecError::Truncated {
            row: 3,
            expected_rows: 5
        })
    ));
    assert!(!out.is_allocated());
    assert_eq!(device.stats().expect("stats").live_allocations, 0);
}
