//! Isotropic Gaussian cluster generation.

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use super::Outcome;
use crate::{
    codec::dump_dataset,
    dataset::{Dataset, Shape},
    error::{ProvisionError, Result},
    handle::Handle,
    kernel::BlobParams,
    options::{OptionArgs, OptionSpec, UsageError},
};

const NAME: &str = "blobs";

const USAGE: &str = "\
USAGE:
benchdata blobs [options]
  Generate a random dataset similar to sklearn's make_blobs.
OPTIONS:
  -center-box-max <max>   max bounding box for the centers of the
                          clusters [10.0].
  -center-box-min <min>   min bounding box for the centers of the
                          clusters [-10.0].
  -cluster-std <std>      cluster std-deviation [1.0].
  -dump <file>            dump the generated dataset.
  -h                      print this help and exit.
  -nclusters <nclusters>  number of clusters to generate [2].
  -ncols <ncols>          number of cols in the dataset [81].
  -nrows <nrows>          number of rows in the dataset [10001].
  -seed <seed>            random seed for reproducibility [1234].
  -shuffle                whether to shuffle the dataset.
";

const OPTIONS: OptionSpec = OptionSpec {
    switches: &["-shuffle"],
    valued: &[
        "-center-box-max",
        "-center-box-min",
        "-cluster-std",
        "-dump",
        "-nclusters",
        "-ncols",
        "-nrows",
        "-seed",
    ],
};

const DEFAULT_CENTER_BOX_MAX: f32 = 10.0;
const DEFAULT_CENTER_BOX_MIN: f32 = -10.0;
const DEFAULT_CLUSTER_STD: f32 = 1.0;
const DEFAULT_NCLUSTERS: usize = 2;
const DEFAULT_NROWS: usize = 10_001;
const DEFAULT_NCOLS: usize = 81;
const DEFAULT_SEED: u64 = 1234;

/// Options accepted by the `blobs` generator.
#[derive(Clone, Debug, PartialEq)]
pub struct BlobsConfig {
    /// Upper bound for centre coordinates.
    pub center_box_max: f32,
    /// Lower bound for centre coordinates.
    pub center_box_min: f32,
    /// Standard deviation of every cluster.
    pub cluster_std: f32,
    /// Number of clusters, which is also the class count.
    pub nclusters: usize,
    /// Number of rows.
    pub nrows: usize,
    /// Number of feature columns.
    pub ncols: usize,
    /// Random seed.
    pub seed: u64,
    /// Whether rows are permuted.
    pub shuffle: bool,
    /// Where to persist the generated dataset, if anywhere.
    pub dump: Option<PathBuf>,
}

impl Default for BlobsConfig {
    fn default() -> Self {
        Self {
            center_box_max: DEFAULT_CENTER_BOX_MAX,
            center_box_min: DEFAULT_CENTER_BOX_MIN,
            cluster_std: DEFAULT_CLUSTER_STD,
            nclusters: DEFAULT_NCLUSTERS,
            nrows: DEFAULT_NROWS,
            ncols: DEFAULT_NCOLS,
            seed: DEFAULT_SEED,
            shuffle: false,
            dump: None,
        }
    }
}

impl BlobsConfig {
    /// Parses the options, falling back to the defaults for absent flags.
    ///
    /// An empty `-dump` value disables dumping.
    ///
    /// # Errors
    /// Returns [`UsageError`] when a value is missing or does not parse.
    pub fn from_args(args: &OptionArgs<'_>) -> Result<Self, UsageError> {
        Ok(Self {
            center_box_max: args.value("-center-box-max", DEFAULT_CENTER_BOX_MAX)?,
            center_box_min: args.value("-center-box-min", DEFAULT_CENTER_BOX_MIN)?,
            cluster_std: args.value("-cluster-std", DEFAULT_CLUSTER_STD)?,
            nclusters: args.value("-nclusters", DEFAULT_NCLUSTERS)?,
            nrows: args.value("-nrows", DEFAULT_NROWS)?,
            ncols: args.value("-ncols", DEFAULT_NCOLS)?,
            seed: args.value("-seed", DEFAULT_SEED)?,
            shuffle: args.flag("-shuffle"),
            dump: args
                .string("-dump")?
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }

    /// Returns the dataset shape this configuration produces.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        Shape::new(self.nrows, self.ncols, self.nclusters)
    }

    /// Returns the kernel parameters for this configuration.
    #[must_use]
    pub const fn kernel_params(&self) -> BlobParams {
        BlobParams {
            nrows: self.nrows,
            ncols: self.ncols,
            n_clusters: self.nclusters,
            centers: None,
            cluster_std_list: None,
            cluster_std: self.cluster_std,
            shuffle: self.shuffle,
            center_box_min: self.center_box_min,
            center_box_max: self.center_box_max,
            seed: self.seed,
        }
    }
}

/// Generates Gaussian blobs into `out` using the handle's kernel.
///
/// Every option is parsed before the device is touched. When `-dump` is given
/// the filled dataset is persisted before returning.
///
/// # Errors
/// Returns [`ProvisionError`] for invalid options, an invalid shape, or a
/// device, kernel, or codec failure. `out` holds no buffers on error.
#[instrument(name = "generator.blobs", err, skip_all)]
pub fn blobs<'ctx>(
    out: &mut Dataset<'ctx>,
    handle: &Handle<'ctx>,
    args: &[String],
) -> Result<Outcome> {
    let options = OptionArgs::new(args);
    if options.wants_help() {
        return Ok(Outcome::HelpRequested { usage: USAGE });
    }
    options.warn_unrecognized(NAME, &OPTIONS);
    let config = BlobsConfig::from_args(&options)?;
    info!(
        nrows = config.nrows,
        ncols = config.ncols,
        center_box_min = config.center_box_min,
        center_box_max = config.center_box_max,
        cluster_std = config.cluster_std,
        nclusters = config.nclusters,
        seed = config.seed,
        shuffle = config.shuffle,
        "generating blobs"
    );

    out.set_shape(config.shape())?;
    out.allocate(handle.device())?;
    if let Err(err) = fill(out, handle, &config) {
        if let Err(release) = out.deallocate() {
            warn!(error = %release, "failed to release blobs after error");
        }
        return Err(err);
    }
    Ok(Outcome::Generated)
}

fn fill(
    out: &mut Dataset<'_>,
    handle: &Handle<'_>,
    config: &BlobsConfig,
) -> Result<()> {
    let stream = handle.stream();
    let (features, labels) = out.buffers_mut()?;
    handle
        .kernel()
        .make_blobs(features, labels, &config.kernel_params(), stream)?;
    if let Some(path) = &config.dump {
        info!(path = %path.display(), "dumping generated dataset");
        dump_dataset(out, path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::CodecError,
        device::HostDevice,
        error::ProvisionErrorCode,
        kernel::KernelError,
    };
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn device() -> HostDevice {
        HostDevice::new()
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|token| (*token).to_owned()).collect()
    }

    #[rstest]
    fn defaults_match_the_documented_values() {
        let tokens = args(&["blobs"]);
        let config = BlobsConfig::from_args(&OptionArgs::new(&tokens)).expect("defaults parse");
        assert_eq!(config, BlobsConfig::default());
        assert_eq!(config.shape(), Shape::new(10_001, 81, 2));
        assert_eq!(config.seed, 1234);
    }

    #[rstest]
    fn every_option_is_parsed() {
        let tokens = args(&[
            "blobs",
            "-center-box-max",
            "3.5",
            "-center-box-min",
            "-3.5",
            "-cluster-std",
            "0.25",
            "-nclusters",
            "4",
            "-nrows",
            "40",
            "-ncols",
            "3",
            "-seed",
            "18446744073709551615",
            "-shuffle",
            "-dump",
            "out.txt",
        ]);
        let config = BlobsConfig::from_args(&OptionArgs::new(&tokens)).expect("options parse");
        assert_eq!(
            config,
            BlobsConfig {
                center_box_max: 3.5,
                center_box_min: -3.5,
                cluster_std: 0.25,
                nclusters: 4,
                nrows: 40,
                ncols: 3,
                seed: u64::MAX,
                shuffle: true,
                dump: Some(PathBuf::from("out.txt")),
            }
        );
    }

    #[rstest]
    fn empty_dump_path_disables_dumping() {
        let tokens = args(&["-dump", ""]);
        let config = BlobsConfig::from_args(&OptionArgs::new(&tokens)).expect("options parse");
        assert_eq!(config.dump, None);
    }

    #[rstest]
    fn help_allocates_nothing(device: HostDevice) {
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let outcome = blobs(&mut out, &handle, &args(&["blobs", "-nrows", "oops", "-h"]))
            .expect("help is not an error");
        assert_eq!(outcome, Outcome::HelpRequested { usage: USAGE });
        assert!(!out.is_allocated());
        assert_eq!(device.stats().expect("stats").total_allocations, 0);
    }

    #[rstest]
    fn generates_requested_shape(device: HostDevice) {
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let outcome = blobs(
            &mut out,
            &handle,
            &args(&["blobs", "-nrows", "30", "-ncols", "5", "-nclusters", "3"]),
        )
        .expect("generation succeeds");
        assert!(outcome.is_generated());
        assert_eq!(out.shape(), Shape::new(30, 5, 3));
        let labels = out.labels_to_host().expect("read back");
        assert!(labels.iter().all(|label| (0..3).contains(label)));
    }

    #[rstest]
    #[case::negative_rows(&["-nrows", "-5"], ProvisionErrorCode::InvalidOption)]
    #[case::dangling_seed(&["-seed"], ProvisionErrorCode::MissingOption)]
    #[case::zero_clusters(&["-nclusters", "0"], ProvisionErrorCode::Dataset)]
    fn rejected_options_allocate_nothing(
        device: HostDevice,
        #[case] raw: &[&str],
        #[case] expected: ProvisionErrorCode,
    ) {
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let err = blobs(&mut out, &handle, &args(raw)).expect_err("options must be rejected");
        assert_eq!(err.code(), expected);
        assert_eq!(device.stats().expect("stats").total_allocations, 0);
    }

    #[rstest]
    fn kernel_failure_releases_the_dataset(device: HostDevice) {
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let err = blobs(
            &mut out,
            &handle,
            &args(&["-nrows", "4", "-ncols", "2", "-center-box-min", "5", "-center-box-max", "1"]),
        )
        .expect_err("inverted centre box must fail");
        assert!(matches!(
            err,
            ProvisionError::Kernel(KernelError::EmptyCenterBox { .. })
        ));
        assert!(!out.is_allocated());
        let stats = device.stats().expect("stats");
        assert_eq!(stats.total_allocations, 2);
        assert_eq!(stats.live_allocations, 0);
    }

    #[rstest]
    #[case::overflowing_box_width(&["-center-box-min", "-3e38", "-center-box-max", "3e38"])]
    #[case::label_overflow(&["-nclusters", "3000000000"])]
    fn unrepresentable_kernel_inputs_fail_cleanly(device: HostDevice, #[case] raw: &[&str]) {
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let mut tokens = args(&["-nrows", "4", "-ncols", "2"]);
        tokens.extend(args(raw));
        let err = blobs(&mut out, &handle, &tokens).expect_err("kernel must reject the inputs");
        assert_eq!(err.code(), ProvisionErrorCode::Kernel);
        assert!(!out.is_allocated());
        assert_eq!(device.stats().expect("stats").live_allocations, 0);
    }

    #[rstest]
    fn dump_writes_the_generated_dataset(device: HostDevice) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("blobs.txt");
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let path_arg = path.to_str().expect("utf-8 temp path");
        blobs(
            &mut out,
            &handle,
            &args(&["-nrows", "6", "-ncols", "2", "-nclusters", "3", "-dump", path_arg]),
        )
        .expect("generation succeeds");
        let text = std::fs::read_to_string(&path).expect("dump exists");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("6 2 3"));
        assert_eq!(lines.count(), 6);
        assert_eq!(device.stats().expect("stats").pending_operations, 0);
    }

    #[rstest]
    fn dump_failure_releases_the_dataset(device: HostDevice) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("missing").join("blobs.txt");
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let path_arg = path.to_str().expect("utf-8 temp path");
        let err = blobs(&mut out, &handle, &args(&["-nrows", "2", "-dump", path_arg]))
            .expect_err("unwritable dump must fail");
        assert!(matches!(
            err,
            ProvisionError::Codec(CodecError::Create { .. })
        ));
        assert_eq!(device.stats().expect("stats").live_allocations, 0);
    }
}
