//! Whitespace-delimited text format for persisting datasets.
//!
//! The first line holds `nrows ncols nclasses`. Each of the following `nrows`
//! lines holds `ncols` features printed with six decimal digits, each followed
//! by a space, and then the integer label. Readers split on any ASCII
//! whitespace, so only field order and count are significant.

use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
    str::SplitAsciiWhitespace,
};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{
    dataset::{Dataset, DatasetError, Shape},
    device::{DeviceContext, DeviceError, copy_to_device, synchronize},
};

/// Errors raised while writing or reading dataset files.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input file could not be opened.
    #[error("failed to open `{path}` for reading: {source}")]
    Open {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The output file could not be created.
    #[error("failed to open `{path}` for writing: {source}")]
    Create {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// Reading or writing the stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The `nrows ncols nclasses` header was missing or invalid.
    #[error("dataset header is malformed: {reason}")]
    MalformedHeader {
        /// Description of the defect.
        reason: String,
    },
    /// A feature token failed to parse.
    #[error("failed to read feature at row {row}, column {col}: `{token}`")]
    InvalidFeature {
        /// Zero-based row index.
        row: usize,
        /// Zero-based column index.
        col: usize,
        /// Offending token.
        token: String,
    },
    /// A label token failed to parse.
    #[error("failed to read label at row {row}: `{token}`")]
    InvalidLabel {
        /// Zero-based row index.
        row: usize,
        /// Offending token.
        token: String,
    },
    /// The file ended before every declared row was read.
    #[error("file ended at row {row} but {expected_rows} rows were declared")]
    Truncated {
        /// Row being read when input ran out.
        row: usize,
        /// Row count declared by the header.
        expected_rows: usize,
    },
    /// The dataset could not be shaped or allocated.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    /// A transfer or synchronisation failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Writes an allocated dataset to `writer` in the text format.
///
/// Pending work on the dataset's stream is drained before the buffers are
/// copied back, and the copies are synchronised before any text is written.
///
/// # Errors
/// Returns [`CodecError`] when the dataset is unallocated, a device operation
/// fails, or the writer fails.
pub fn write_dataset<W: Write>(dataset: &Dataset<'_>, mut writer: W) -> Result<(), CodecError> {
    let features_buffer = dataset.features()?;
    synchronize(features_buffer.device(), features_buffer.stream())?;
    let features = dataset.features_to_host()?;
    let labels = dataset.labels_to_host()?;

    let shape = dataset.shape();
    writeln!(writer, "{} {} {}", shape.nrows, shape.ncols, shape.nclasses)?;
    for (row, label) in features.chunks_exact(shape.ncols).zip(&labels) {
        for value in row {
            write!(writer, "{value:.6} ")?;
        }
        writeln!(writer, "{label}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes an allocated dataset to the file at `path`, replacing it.
///
/// # Errors
/// Returns [`CodecError::Create`] when the file cannot be opened for writing,
/// or any error from [`write_dataset`].
#[instrument(name = "codec.dump", err, skip(dataset), fields(path = %path.display()))]
pub fn dump_dataset(dataset: &Dataset<'_>, path: &Path) -> Result<(), CodecError> {
    let file = File::create(path).map_err(|source| CodecError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    write_dataset(dataset, BufWriter::new(file))?;
    debug!(nrows = dataset.nrows(), "dataset written");
    Ok(())
}

/// Reads a dataset from `reader`, allocating `out` on `device`.
///
/// The whole input is parsed into host staging buffers before anything is
/// allocated, so a malformed or truncated input leaves `out` untouched. The
/// staged data is copied to the device and synchronised before returning.
///
/// # Errors
/// Returns [`CodecError`] for malformed input, if `out` is already allocated,
/// or when a device operation fails. `out` holds no buffers on error.
pub fn read_dataset_from<'ctx, R: Read>(
    out: &mut Dataset<'ctx>,
    device: &'ctx dyn DeviceContext,
    mut reader: R,
) -> Result<(), CodecError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let mut tokens = text.split_ascii_whitespace();

    let shape = read_header(&mut tokens)?;
    let (features, labels) = read_rows(&mut tokens, shape, text.len())?;

    out.set_shape(shape)?;
    out.allocate(device)?;
    if let Err(err) = stage(out, &features, &labels) {
        if let Err(release) = out.deallocate() {
            warn!(error = %release, "failed to release dataset after staging error");
        }
        return Err(err);
    }
    Ok(())
}

/// Reads a dataset from the file at `path`, allocating `out` on `device`.
///
/// # Errors
/// Returns [`CodecError::Open`] when the file cannot be opened, or any error
/// from [`read_dataset_from`].
#[instrument(name = "codec.read", err, skip(out, device), fields(path = %path.display()))]
pub fn read_dataset<'ctx>(
    out: &mut Dataset<'ctx>,
    device: &'ctx dyn DeviceContext,
    path: &Path,
) -> Result<(), CodecError> {
    let file = File::open(path).map_err(|source| CodecError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_dataset_from(out, device, file)?;
    debug!(shape = %out.shape(), "dataset read");
    Ok(())
}

fn read_header(tokens: &mut SplitAsciiWhitespace<'_>) -> Result<Shape, CodecError> {
    let mut field = |name: &str| -> Result<usize, CodecError> {
        let token = tokens.next().ok_or_else(|| CodecError::MalformedHeader {
            reason: format!("missing `{name}`"),
        })?;
        token.parse().map_err(|_| CodecError::MalformedHeader {
            reason: format!("`{name}` is not a non-negative integer: `{token}`"),
        })
    };
    let nrows = field("nrows")?;
    let ncols = field("ncols")?;
    let nclasses = field("nclasses")?;
    let shape = Shape::new(nrows, ncols, nclasses);
    shape.validate().map_err(|err| CodecError::MalformedHeader {
        reason: err.to_string(),
    })?;
    Ok(shape)
}

fn read_rows(
    tokens: &mut SplitAsciiWhitespace<'_>,
    shape: Shape,
    input_len: usize,
) -> Result<(Vec<f32>, Vec<i32>), CodecError> {
    let total = shape.feature_count()?;
    // Every value needs at least two bytes, so the input length bounds what a
    // lying header can make us reserve.
    let mut features = Vec::with_capacity(total.min(input_len));
    let mut labels = Vec::with_capacity(shape.nrows.min(input_len));
    let truncated = |row| CodecError::Truncated {
        row,
        expected_rows: shape.nrows,
    };
    for row in 0..shape.nrows {
        for col in 0..shape.ncols {
            let token = tokens.next().ok_or_else(|| truncated(row))?;
            let value = token.parse().map_err(|_| CodecError::InvalidFeature {
                row,
                col,
                token: token.to_owned(),
            })?;
            features.push(value);
        }
        let token = tokens.next().ok_or_else(|| truncated(row))?;
        let label = token.parse().map_err(|_| CodecError::InvalidLabel {
            row,
            token: token.to_owned(),
        })?;
        labels.push(label);
    }
    Ok((features, labels))
}

fn stage(out: &mut Dataset<'_>, features: &[f32], labels: &[i32]) -> Result<(), CodecError> {
    let (features_buffer, labels_buffer) = out.buffers_mut()?;
    let stream = features_buffer.stream();
    let device = features_buffer.device();
    copy_to_device(features_buffer, features, features.len(), stream)?;
    copy_to_device(labels_buffer, labels, labels.len(), stream)?;
    synchronize(device, stream)?;
    Ok(())
}
