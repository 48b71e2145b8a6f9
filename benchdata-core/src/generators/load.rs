//! Loading a previously dumped dataset file.

use std::path::PathBuf;

use tracing::{info, instrument};

use super::Outcome;
use crate::{
    codec::read_dataset,
    dataset::Dataset,
    error::{ProvisionError, Result},
    handle::Handle,
    options::{OptionArgs, OptionSpec, UsageError},
};

const NAME: &str = "load";

const FILE_FLAG: &str = "-file";

const USAGE: &str = "\
USAGE:
benchdata load [options]
  Load the dataset from the input text file.
OPTIONS:
  -file <file>   file containing the dataset. Mandatory. File format
                 is the same as generated by the '-dump' option.
  -h             print this help and exit.
";

const OPTIONS: OptionSpec = OptionSpec {
    switches: &[],
    valued: &[FILE_FLAG],
};

/// Options accepted by the `load` generator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoadConfig {
    /// Dataset file to read.
    pub file: PathBuf,
}

impl LoadConfig {
    /// Parses the options.
    ///
    /// # Errors
    /// Returns [`UsageError::MissingOption`] when `-file` is absent or empty.
    pub fn from_args(args: &OptionArgs<'_>) -> Result<Self, UsageError> {
        let file = args
            .string(FILE_FLAG)?
            .filter(|path| !path.is_empty())
            .ok_or(UsageError::MissingOption { flag: FILE_FLAG })?;
        Ok(Self {
            file: PathBuf::from(file),
        })
    }
}

/// Reads the dataset named by `-file` into `out`.
///
/// # Errors
/// Returns [`ProvisionError`] when `-file` is missing or the file cannot be
/// read; `out` holds no buffers on error.
#[instrument(name = "generator.load", err, skip_all)]
pub fn load<'ctx>(
    out: &mut Dataset<'ctx>,
    handle: &Handle<'ctx>,
    args: &[String],
) -> Result<Outcome> {
    let options = OptionArgs::new(args);
    if options.wants_help() {
        return Ok(Outcome::HelpRequested { usage: USAGE });
    }
    options.warn_unrecognized(NAME, &OPTIONS);
    let config = LoadConfig::from_args(&options)?;
    info!(path = %config.file.display(), "loading dataset from file");
    read_dataset(out, handle.device(), &config.file)?;
    Ok(Outcome::Generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dataset::Shape, device::HostDevice, error::ProvisionErrorCode};
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|token| (*token).to_owned()).collect()
    }

    #[rstest]
    #[case::absent(&["load"])]
    #[case::empty(&["load", "-file", ""])]
    fn file_is_mandatory(#[case] raw: &[&str]) {
        let device = HostDevice::new();
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let err = load(&mut out, &handle, &args(raw)).expect_err("missing file must fail");
        assert!(matches!(
            err,
            ProvisionError::Usage(UsageError::MissingOption { flag: "-file" })
        ));
        assert_eq!(device.stats().expect("stats").total_allocations, 0);
    }

    #[rstest]
    fn help_skips_the_mandatory_check() {
        let device = HostDevice::new();
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let outcome = load(&mut out, &handle, &args(&["load", "-h"])).expect("help succeeds");
        assert_eq!(outcome, Outcome::HelpRequested { usage: USAGE });
        assert!(!out.is_allocated());
    }

    #[rstest]
    fn loads_a_dataset_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("input.txt");
        fs::write(&path, "2 1 2\n0.500000 1\n-0.250000 0\n").expect("write input");
        let device = HostDevice::new();
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let path_arg = path.to_str().expect("utf-8 temp path");
        let outcome = load(&mut out, &handle, &args(&["load", "-file", path_arg]))
            .expect("load succeeds");
        assert!(outcome.is_generated());
        assert_eq!(out.shape(), Shape::new(2, 1, 2));
        assert_eq!(out.features_to_host().expect("read back"), vec![0.5, -0.25]);
        assert_eq!(out.labels_to_host().expect("read back"), vec![1, 0]);
    }

    #[rstest]
    fn missing_file_is_an_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("absent.txt");
        let device = HostDevice::new();
        let handle = Handle::new(&device);
        let mut out = Dataset::new();
        let path_arg = path.to_str().expect("utf-8 temp path");
        let err = load(&mut out, &handle, &args(&["load", "-file", path_arg]))
            .expect_err("absent file must fail");
        assert_eq!(err.code(), ProvisionErrorCode::Io);
    }
}
