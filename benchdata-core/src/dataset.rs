//! The dataset record: shape metadata plus device-resident features and labels.

use std::fmt;

use thiserror::Error;

use crate::device::{
    DeviceBuffer, DeviceContext, DeviceError, StreamHandle, copy_to_host, synchronize,
};

/// Row, column, and class counts describing a dataset.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Shape {
    /// Number of rows (samples).
    pub nrows: usize,
    /// Number of feature columns per row.
    pub ncols: usize,
    /// Number of distinct label values.
    pub nclasses: usize,
}

impl Shape {
    /// Creates a shape without validating it.
    #[must_use]
    pub const fn new(nrows: usize, ncols: usize, nclasses: usize) -> Self {
        Self {
            nrows,
            ncols,
            nclasses,
        }
    }

    /// Checks that every dimension is positive and the matrix is addressable.
    ///
    /// # Errors
    /// Returns the [`DatasetError`] naming the first offending dimension.
    pub const fn validate(self) -> Result<(), DatasetError> {
        if self.nrows == 0 {
            return Err(DatasetError::ZeroRows);
        }
        if self.ncols == 0 {
            return Err(DatasetError::ZeroColumns);
        }
        if self.nclasses == 0 {
            return Err(DatasetError::ZeroClasses);
        }
        match self.feature_count() {
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Returns `nrows * ncols`.
    ///
    /// # Errors
    /// Returns [`DatasetError::Overflow`] when the product overflows `usize`.
    pub const fn feature_count(self) -> Result<usize, DatasetError> {
        match self.nrows.checked_mul(self.ncols) {
            Some(count) => Ok(count),
            None => Err(DatasetError::Overflow {
                nrows: self.nrows,
                ncols: self.ncols,
            }),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} ({} classes)", self.nrows, self.ncols, self.nclasses)
    }
}

/// Errors raised by dataset lifecycle operations.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DatasetError {
    /// The row count was zero.
    #[error("dataset must have at least one row")]
    ZeroRows,
    /// The column count was zero.
    #[error("dataset must have at least one column")]
    ZeroColumns,
    /// The class count was zero.
    #[error("dataset must have at least one class")]
    ZeroClasses,
    /// `nrows * ncols` overflowed.
    #[error("a {nrows} x {ncols} feature matrix exceeds addressable memory")]
    Overflow {
        /// Requested row count.
        nrows: usize,
        /// Requested column count.
        ncols: usize,
    },
    /// The dataset already holds device buffers.
    #[error("dataset is already allocated")]
    AlreadyAllocated,
    /// The dataset holds no device buffers.
    #[error("dataset is not allocated")]
    NotAllocated,
    /// A device operation failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[derive(Debug)]
struct Buffers<'ctx> {
    features: DeviceBuffer<'ctx, f32>,
    labels: DeviceBuffer<'ctx, i32>,
}

/// A feature matrix and label vector resident on a device.
///
/// The record starts without buffers. [`Dataset::allocate`] sizes both
/// buffers from the shape and [`Dataset::deallocate`] releases them together.
/// While buffers are held the shape is frozen, so the released sizes always
/// match the allocated ones. Buffers still held when the record is dropped are
/// released by their own handles.
///
/// # Examples
/// ```
/// use benchdata_core::{Dataset, HostDevice, Shape};
///
/// let device = HostDevice::new();
/// let mut dataset = Dataset::new();
/// dataset.set_shape(Shape::new(3, 2, 2))?;
/// dataset.allocate(&device)?;
/// assert_eq!(dataset.features()?.len(), 6);
/// assert_eq!(dataset.labels()?.len(), 3);
/// dataset.deallocate()?;
/// assert!(!dataset.is_allocated());
/// # Ok::<(), benchdata_core::DatasetError>(())
/// ```
#[derive(Debug, Default)]
pub struct Dataset<'ctx> {
    shape: Shape,
    buffers: Option<Buffers<'ctx>>,
}

impl<'ctx> Dataset<'ctx> {
    /// Creates an unallocated dataset with an unset shape.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unallocated dataset with the given shape.
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the shape is invalid.
    pub fn with_shape(shape: Shape) -> Result<Self, DatasetError> {
        let mut dataset = Self::new();
        dataset.set_shape(shape)?;
        Ok(dataset)
    }

    /// Replaces the shape of an unallocated dataset.
    ///
    /// # Errors
    /// Returns [`DatasetError::AlreadyAllocated`] while buffers are held, or
    /// the validation error for an invalid shape.
    pub fn set_shape(&mut self, shape: Shape) -> Result<(), DatasetError> {
        if self.buffers.is_some() {
            return Err(DatasetError::AlreadyAllocated);
        }
        shape.validate()?;
        self.shape = shape;
        Ok(())
    }

    /// Returns the shape.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    /// Returns the row count.
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.shape.nrows
    }

    /// Returns the column count.
    #[must_use]
    pub const fn ncols(&self) -> usize {
        self.shape.ncols
    }

    /// Returns the class count.
    #[must_use]
    pub const fn nclasses(&self) -> usize {
        self.shape.nclasses
    }

    /// Returns whether device buffers are held.
    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    /// Allocates `nrows * ncols` features and `nrows` labels on the device's
    /// stream.
    ///
    /// # Errors
    /// Returns [`DatasetError::AlreadyAllocated`] if buffers are held, a shape
    /// validation error, or the device error from either allocation. Nothing
    /// stays allocated on failure.
    pub fn allocate(&mut self, device: &'ctx dyn DeviceContext) -> Result<(), DatasetError> {
        if self.buffers.is_some() {
            return Err(DatasetError::AlreadyAllocated);
        }
        self.shape.validate()?;
        let stream = device.stream();
        let features = DeviceBuffer::allocate(device, self.shape.feature_count()?, stream)?;
        let labels = DeviceBuffer::allocate(device, self.shape.nrows, stream)?;
        self.buffers = Some(Buffers { features, labels });
        Ok(())
    }

    /// Releases both buffers.
    ///
    /// Both releases are attempted even if the first fails; the first error is
    /// reported.
    ///
    /// # Errors
    /// Returns [`DatasetError::NotAllocated`] if no buffers are held, or the
    /// device error raised while releasing.
    pub fn deallocate(&mut self) -> Result<(), DatasetError> {
        let Buffers { features, labels } = self.buffers.take().ok_or(DatasetError::NotAllocated)?;
        let released_features = features.release();
        let released_labels = labels.release();
        released_features?;
        released_labels?;
        Ok(())
    }

    /// Returns the stream the buffers were allocated on.
    #[must_use]
    pub fn stream(&self) -> Option<StreamHandle> {
        self.buffers.as_ref().map(|buffers| buffers.features.stream())
    }

    /// Returns the feature buffer.
    ///
    /// # Errors
    /// Returns [`DatasetError::NotAllocated`] before allocation.
    pub fn features(&self) -> Result<&DeviceBuffer<'ctx, f32>, DatasetError> {
        self.buffers
            .as_ref()
            .map(|buffers| &buffers.features)
            .ok_or(DatasetError::NotAllocated)
    }

    /// Returns the label buffer.
    ///
    /// # Errors
    /// Returns [`DatasetError::NotAllocated`] before allocation.
    pub fn labels(&self) -> Result<&DeviceBuffer<'ctx, i32>, DatasetError> {
        self.buffers
            .as_ref()
            .map(|buffers| &buffers.labels)
            .ok_or(DatasetError::NotAllocated)
    }

    /// Returns mutable access to the feature and label buffers together.
    ///
    /// # Errors
    /// Returns [`DatasetError::NotAllocated`] before allocation.
    pub fn buffers_mut(
        &mut self,
    ) -> Result<(&mut DeviceBuffer<'ctx, f32>, &mut DeviceBuffer<'ctx, i32>), DatasetError> {
        self.buffers
            .as_mut()
            .map(|buffers| (&mut buffers.features, &mut buffers.labels))
            .ok_or(DatasetError::NotAllocated)
    }

    /// Copies the feature matrix to the host and waits for the copy.
    ///
    /// # Errors
    /// Returns [`DatasetError::NotAllocated`] before allocation or any device
    /// error raised by the copy or synchronisation.
    pub fn features_to_host(&self) -> Result<Vec<f32>, DatasetError> {
        read_back(self.features()?, 0.0)
    }

    /// Copies the label vector to the host and waits for the copy.
    ///
    /// # Errors
    /// Returns [`DatasetError::NotAllocated`] before allocation or any device
    /// error raised by the copy or synchronisation.
    pub fn labels_to_host(&self) -> Result<Vec<i32>, DatasetError> {
        read_back(self.labels()?, 0)
    }
}

fn read_back<T: crate::device::DeviceElement>(
    buffer: &DeviceBuffer<'_, T>,
    fill: T,
) -> Result<Vec<T>, DatasetError> {
    let mut host = vec![fill; buffer.len()];
    copy_to_host(&mut host, buffer, buffer.len(), buffer.stream())?;
    synchronize(buffer.device(), buffer.stream())?;
    Ok(host)
}
