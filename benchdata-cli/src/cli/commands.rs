//! Command implementation and argument parsing for the benchdata CLI.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use benchdata_core::{
    DEFAULT_GENERATOR, Dataset, DatasetError, GeneratorKind, Handle, HostDevice, Outcome,
    ProvisionError, ProvisionErrorCode, Shape, dispatch, find_generator_token,
};
use clap::{ArgAction, Parser};
use thiserror::Error;
use tracing::{Span, field, info, instrument, warn};

/// Top-level CLI options parsed by [`clap`].
///
/// Everything after the recognised flags is forwarded untouched, so generator
/// options such as `-nrows 100` and the generator's own `-h` reach the
/// generator.
#[derive(Debug, Parser, Clone, Default)]
#[command(
    name = "benchdata",
    about = "Generate or load a benchmark dataset and summarise it.",
    disable_help_flag = true
)]
pub struct Cli {
    /// List the registered generators and exit.
    #[arg(long)]
    pub list: bool,

    /// Print this help. Use `<generator> -h` for generator options.
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,

    /// Generator name followed by its options, e.g. `blobs -nrows 100`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub args: Vec<String>,
}

/// Errors surfaced while executing the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provisioning the dataset failed.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    /// Reading back or releasing the dataset failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl CliError {
    /// Returns the provisioning error code, when one applies.
    #[must_use]
    pub const fn code(&self) -> Option<ProvisionErrorCode> {
        match self {
            Self::Provision(err) => Some(err.code()),
            Self::Dataset(_) => None,
        }
    }
}

/// Description of a provisioned dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    /// Generator that produced the dataset.
    pub generator: GeneratorKind,
    /// Shape of the dataset.
    pub shape: Shape,
    /// Number of rows carrying each label value.
    pub label_counts: BTreeMap<i32, usize>,
    /// Wall-clock time spent provisioning.
    pub elapsed: Duration,
}

/// Summarises the outcome of executing the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionSummary {
    /// `--list` was given.
    Listed {
        /// Registered generator names.
        names: Vec<&'static str>,
    },
    /// The generator printed its usage instead of running.
    Help {
        /// Generator usage text.
        usage: &'static str,
    },
    /// A dataset was provisioned and released again.
    Generated(DatasetSummary),
}

/// Executes the CLI invocation represented by `cli`.
///
/// The generator is the first forwarded token naming a registered generator;
/// tokens before it are ignored with a warning. Without a generator name every
/// token is an option of the default generator.
///
/// # Errors
/// Returns [`CliError`] when provisioning or reading back the dataset fails.
///
/// # Examples
/// ```
/// use benchdata_cli::cli::{Cli, ExecutionSummary, run_cli};
///
/// let cli = Cli {
///     args: ["blobs", "-nrows", "6", "-ncols", "2", "-nclusters", "3"]
///         .into_iter()
///         .map(String::from)
///         .collect(),
///     ..Cli::default()
/// };
/// let ExecutionSummary::Generated(summary) = run_cli(cli)? else {
///     unreachable!("blobs generates a dataset");
/// };
/// assert_eq!(summary.label_counts.values().sum::<usize>(), 6);
/// # Ok::<(), benchdata_cli::cli::CliError>(())
/// ```
#[instrument(name = "cli.run", err, skip(cli), fields(generator = field::Empty))]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    if cli.list {
        return Ok(ExecutionSummary::Listed {
            names: GeneratorKind::ALL.iter().map(|kind| kind.name()).collect(),
        });
    }

    let start = find_generator_token(&cli.args);
    let (leading, rest) = cli.args.split_at(start);
    let (name, generator_args) = match rest.first() {
        Some(name) => {
            if !leading.is_empty() {
                warn!(tokens = ?leading, "ignoring arguments before the generator name");
            }
            (name.as_str(), rest)
        }
        None => (DEFAULT_GENERATOR, leading),
    };
    Span::current().record("generator", field::display(name));

    let device = HostDevice::new();
    let handle = Handle::new(&device);
    provision(name, &handle, generator_args)
}

fn provision(
    name: &str,
    handle: &Handle<'_>,
    args: &[String],
) -> Result<ExecutionSummary, CliError> {
    let generator: GeneratorKind = name.parse().map_err(ProvisionError::from)?;
    let mut dataset = Dataset::new();
    let started = Instant::now();
    let outcome = dispatch(name, &mut dataset, handle, args)?;
    let elapsed = started.elapsed();
    match outcome {
        Outcome::HelpRequested { usage } => Ok(ExecutionSummary::Help { usage }),
        Outcome::Generated => {
            let label_counts = count_labels(&dataset.labels_to_host()?);
            let shape = dataset.shape();
            dataset.deallocate()?;
            info!(
                generator = generator.name(),
                classes_seen = label_counts.len(),
                "command completed"
            );
            Ok(ExecutionSummary::Generated(DatasetSummary {
                generator,
                shape,
                label_counts,
                elapsed,
            }))
        }
    }
}

pub(super) fn count_labels(labels: &[i32]) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for label in labels {
        counts
            .entry(*label)
            .and_modify(|count: &mut usize| *count = count.saturating_add(1))
            .or_insert(1);
    }
    counts
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
///
/// # Examples
/// ```
/// use std::{collections::BTreeMap, time::Duration};
///
/// use benchdata_cli::cli::{DatasetSummary, ExecutionSummary, render_summary};
/// use benchdata_core::{GeneratorKind, Shape};
///
/// let summary = ExecutionSummary::Generated(DatasetSummary {
///     generator: GeneratorKind::Blobs,
///     shape: Shape::new(4, 2, 2),
///     label_counts: BTreeMap::from([(0, 2), (1, 2)]),
///     elapsed: Duration::from_millis(3),
/// });
/// let mut buffer = Vec::new();
/// render_summary(&summary, &mut buffer)?;
/// assert!(String::from_utf8_lossy(&buffer).starts_with("generator: blobs\n"));
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    match summary {
        ExecutionSummary::Listed { names } => {
            for name in names {
                writeln!(writer, "{name}")?;
            }
        }
        ExecutionSummary::Help { usage } => write!(writer, "{usage}")?,
        ExecutionSummary::Generated(dataset) => {
            writeln!(writer, "generator: {}", dataset.generator)?;
            writeln!(writer, "dataset dimension: {}", dataset.shape)?;
            writeln!(writer, "dataset generation time: {:?}", dataset.elapsed)?;
            writeln!(writer, "label counts:")?;
            for (label, count) in &dataset.label_counts {
                writeln!(writer, "{label}\t{count}")?;
            }
        }
    }
    Ok(())
}
