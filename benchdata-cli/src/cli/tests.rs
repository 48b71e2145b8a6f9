//! Unit tests for CLI parsing, execution, and rendering.

use super::commands::count_labels;
use super::{Cli, CliError, DatasetSummary, ExecutionSummary, render_summary, run_cli};

use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use benchdata_core::{GeneratorKind, ProvisionErrorCode, Shape};
use benchdata_test_support::recording::with_recording;
use clap::{Parser, error::ErrorKind};
use rstest::rstest;
use tempfile::TempDir;
use tracing::Level;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn cli_with(args: &[&str]) -> Cli {
    Cli {
        args: args.iter().map(|token| (*token).to_owned()).collect(),
        ..Cli::default()
    }
}

fn generated(summary: ExecutionSummary) -> DatasetSummary {
    match summary {
        ExecutionSummary::Generated(dataset) => dataset,
        other => panic!("expected a generated dataset, got {other:?}"),
    }
}

#[rstest]
fn trailing_arguments_are_forwarded_verbatim() {
    let cli = Cli::try_parse_from(["benchdata", "blobs", "-nrows", "5", "-shuffle", "--list"])
        .expect("arguments must parse");
    assert!(!cli.list);
    assert_eq!(cli.args, ["blobs", "-nrows", "5", "-shuffle", "--list"]);
}

#[rstest]
fn leading_hyphenated_tokens_are_forwarded() {
    let cli = Cli::try_parse_from(["benchdata", "-nrows", "5", "-h"]).expect("arguments must parse");
    assert_eq!(cli.args, ["-nrows", "5", "-h"]);
}

#[rstest]
fn list_flag_is_recognised() {
    let cli = Cli::try_parse_from(["benchdata", "--list"]).expect("arguments must parse");
    assert!(cli.list);
    assert!(cli.args.is_empty());
}

#[rstest]
fn long_help_is_handled_by_clap() {
    let err = Cli::try_parse_from(["benchdata", "--help"]).expect_err("help short-circuits");
    assert_eq!(err.kind(), ErrorKind::DisplayHelp);
}

#[rstest]
fn list_reports_every_generator() -> TestResult {
    let summary = run_cli(Cli {
        list: true,
        ..Cli::default()
    })?;
    assert_eq!(
        summary,
        ExecutionSummary::Listed {
            names: vec!["blobs", "load"]
        }
    );
    Ok(())
}

#[rstest]
fn blobs_summary_counts_labels() -> TestResult {
    let summary = generated(run_cli(cli_with(&[
        "blobs",
        "-nrows",
        "12",
        "-ncols",
        "2",
        "-nclusters",
        "3",
    ]))?);
    assert_eq!(summary.generator, GeneratorKind::Blobs);
    assert_eq!(summary.shape, Shape::new(12, 2, 3));
    assert_eq!(summary.label_counts, BTreeMap::from([(0, 4), (1, 4), (2, 4)]));
    Ok(())
}

#[rstest]
fn options_without_a_generator_go_to_the_default() -> TestResult {
    let summary = generated(run_cli(cli_with(&["-nrows", "7", "-ncols", "2"]))?);
    assert_eq!(summary.generator, GeneratorKind::Blobs);
    assert_eq!(summary.shape, Shape::new(7, 2, 2));
    Ok(())
}

#[rstest]
fn tokens_before_the_generator_are_ignored_with_a_warning() -> TestResult {
    let (result, layer) =
        with_recording(|| run_cli(cli_with(&["--verbose", "blobs", "-nrows", "6", "-ncols", "1"])));
    let summary = generated(result?);
    assert_eq!(summary.shape.nrows, 6);
    let warnings = layer.events_with_message("ignoring arguments before the generator name");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, Level::WARN);
    Ok(())
}

#[rstest]
fn generator_help_is_returned_as_usage() -> TestResult {
    let summary = run_cli(cli_with(&["load", "-h"]))?;
    let ExecutionSummary::Help { usage } = summary else {
        panic!("expected usage, got {summary:?}");
    };
    assert!(usage.contains("-file <file>"));
    Ok(())
}

#[rstest]
fn missing_load_file_maps_to_a_code() {
    let err = run_cli(cli_with(&["load"])).expect_err("load requires -file");
    assert!(matches!(err, CliError::Provision(_)));
    assert_eq!(err.code(), Some(ProvisionErrorCode::MissingOption));
}

#[rstest]
fn dumped_dataset_loads_back_through_the_cli() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("blobs.txt");
    let path_arg = path.to_str().ok_or("temp path must be UTF-8")?;
    let written = generated(run_cli(cli_with(&[
        "blobs",
        "-nrows",
        "9",
        "-ncols",
        "3",
        "-nclusters",
        "3",
        "-shuffle",
        "-dump",
        path_arg,
    ]))?);
    assert!(fs::read_to_string(&path)?.starts_with("9 3 3\n"));

    let loaded = generated(run_cli(cli_with(&["load", "-file", path_arg]))?);
    assert_eq!(loaded.generator, GeneratorKind::Load);
    assert_eq!(loaded.shape, written.shape);
    assert_eq!(loaded.label_counts, written.label_counts);
    Ok(())
}

#[rstest]
#[case::empty(&[], &[])]
#[case::mixed(&[2, 0, 2, 1, 2], &[(0, 1), (1, 1), (2, 3)])]
fn labels_are_counted_per_value(#[case] labels: &[i32], #[case] expected: &[(i32, usize)]) {
    let counts = count_labels(labels);
    assert_eq!(counts, expected.iter().copied().collect::<BTreeMap<_, _>>());
}

#[rstest]
fn generated_summary_renders_shape_and_counts() -> TestResult {
    let summary = ExecutionSummary::Generated(DatasetSummary {
        generator: GeneratorKind::Blobs,
        shape: Shape::new(4, 2, 2),
        label_counts: BTreeMap::from([(0, 3), (1, 1)]),
        elapsed: Duration::from_millis(5),
    });
    let mut buffer = Vec::new();
    render_summary(&summary, &mut buffer)?;
    assert_eq!(
        String::from_utf8(buffer)?,
        "generator: blobs\n\
         dataset dimension: 4 x 2 (2 classes)\n\
         dataset generation time: 5ms\n\
         label counts:\n\
         0\t3\n\
         1\t1\n"
    );
    Ok(())
}

#[rstest]
fn listed_summary_renders_one_name_per_line() -> TestResult {
    let summary = ExecutionSummary::Listed {
        names: vec!["blobs", "load"],
    };
    let mut buffer = Vec::new();
    render_summary(&summary, &mut buffer)?;
    assert_eq!(String::from_utf8(buffer)?, "blobs\nload\n");
    Ok(())
}
