//! Synthetic data generation kernels.
//!
//! The kernel is an external collaborator: it receives shape and statistical
//! parameters plus ownership-free access to the output buffers and fills them
//! on the given stream. [`HostBlobKernel`] is the reference implementation
//! used when no accelerator kernel is supplied.

mod host;
mod sampling;

use thiserror::Error;

use crate::device::{DeviceBuffer, DeviceError, StreamHandle};

pub use host::HostBlobKernel;

/// Parameters for isotropic Gaussian cluster ("blobs") generation.
#[derive(Clone, Debug, PartialEq)]
pub struct BlobParams {
    /// Number of rows to generate.
    pub nrows: usize,
    /// Number of feature columns.
    pub ncols: usize,
    /// Number of clusters; labels fall in `0..n_clusters`.
    pub n_clusters: usize,
    /// Explicit row-major `n_clusters x ncols` centres; drawn from the centre
    /// box when absent.
    pub centers: Option<Vec<f32>>,
    /// Per-cluster standard deviations; `cluster_std` applies when absent.
    pub cluster_std_list: Option<Vec<f32>>,
    /// Standard deviation shared by every cluster.
    pub cluster_std: f32,
    /// Whether rows are permuted after generation.
    pub shuffle: bool,
    /// Lower bound for generated centre coordinates.
    pub center_box_min: f32,
    /// Upper bound for generated centre coordinates.
    pub center_box_max: f32,
    /// Seed for the random generator.
    pub seed: u64,
}

/// Errors raised while generating synthetic data.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum KernelError {
    /// The row count was zero.
    #[error("row count must be greater than zero")]
    ZeroRows,
    /// The column count was zero.
    #[error("column count must be greater than zero")]
    ZeroColumns,
    /// The cluster count was zero.
    #[error("cluster count must be greater than zero")]
    ZeroClusters,
    /// A floating-point parameter was negative or non-finite.
    #[error("invalid floating-point parameter `{parameter}`")]
    InvalidFloatParameter {
        /// Name of the invalid parameter.
        parameter: &'static str,
    },
    /// The centre box was empty or inverted.
    #[error("centre box [{min}, {max}) is empty")]
    EmptyCenterBox {
        /// Configured lower bound.
        min: f32,
        /// Configured upper bound.
        max: f32,
    },
    /// Explicit centres did not match `n_clusters * ncols`.
    #[error("expected {expected} centre coordinates, got {actual}")]
    CentersLengthMismatch {
        /// Expected coordinate count.
        expected: usize,
        /// Supplied coordinate count.
        actual: usize,
    },
    /// The per-cluster deviation list did not match `n_clusters`.
    #[error("expected {expected} cluster deviations, got {actual}")]
    ClusterStdLengthMismatch {
        /// Expected deviation count.
        expected: usize,
        /// Supplied deviation count.
        actual: usize,
    },
    /// A cluster index does not fit in an `i32` label.
    #[error("cluster index {cluster} does not fit in a 32-bit label")]
    LabelOverflow {
        /// Offending cluster index.
        cluster: usize,
    },
    /// An output buffer had the wrong length for the requested shape.
    #[error("{buffer} buffer holds {actual} elements but {expected} are required")]
    BufferSizeMismatch {
        /// Which buffer was mis-sized.
        buffer: &'static str,
        /// Required element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },
    /// `nrows * ncols` overflowed.
    #[error("nrows * ncols overflows usize")]
    Overflow,
    /// Staging the generated data on the device failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Fills device buffers with synthetic clustered data.
pub trait SyntheticKernel {
    /// Generates `params.nrows` rows into `features` (row-major) and their
    /// cluster indices into `labels`, enqueuing the work on `stream`.
    ///
    /// The buffers are not synchronised on return.
    ///
    /// # Errors
    /// Returns [`KernelError`] for invalid parameters, mis-sized buffers, or
    /// device failures.
    fn make_blobs(
        &self,
        features: &mut DeviceBuffer<'_, f32>,
        labels: &mut DeviceBuffer<'_, i32>,
        params: &BlobParams,
        stream: StreamHandle,
    ) -> Result<(), KernelError>;
}
