//! Device context contract consumed by the provisioning core.
//!
//! A device context bundles a memory allocator and an execution stream. The
//! core never implements real accelerator backends; it only calls through
//! [`DeviceContext`]. Copies are enqueued asynchronously and become visible
//! only after [`DeviceContext::synchronize`] returns for the same stream.

use thiserror::Error;

/// Opaque address of a device allocation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DeviceAddress(u64);

impl DeviceAddress {
    /// Wraps a raw backend address.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw backend address.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Handle naming an ordered queue of asynchronous device work.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StreamHandle(u64);

impl StreamHandle {
    /// Wraps a raw backend stream identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw backend stream identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Precondition violations and backend failures raised by device operations.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DeviceError {
    /// A zero-byte allocation was requested.
    #[error("cannot allocate a zero-sized device buffer")]
    ZeroSizedAllocation,
    /// The address does not name a live allocation.
    #[error("unknown device address {address:#x}")]
    UnknownAddress {
        /// Raw address supplied by the caller.
        address: u64,
    },
    /// The stream handle does not belong to this context.
    #[error("unknown stream {stream}")]
    UnknownStream {
        /// Raw stream identifier supplied by the caller.
        stream: u64,
    },
    /// Deallocation size disagreed with the original allocation.
    #[error(
        "deallocation of {address:#x} requested {requested} bytes but {allocated} were allocated"
    )]
    SizeMismatch {
        /// Raw address being released.
        address: u64,
        /// Byte count passed to deallocate.
        requested: usize,
        /// Byte count recorded at allocation time.
        allocated: usize,
    },
    /// A copy would read or write past the end of a buffer.
    #[error("copy of {requested} elements exceeds the {available} elements available")]
    CopyOutOfRange {
        /// Number of elements requested.
        requested: usize,
        /// Number of elements addressable on both sides.
        available: usize,
    },
    /// The element count does not fit in the addressable byte range.
    #[error("element count {count} overflows the addressable byte range")]
    Overflow {
        /// Element count that overflowed.
        count: usize,
    },
    /// Internal device state was poisoned by a panicking thread.
    #[error("device state lock was poisoned")]
    Poisoned,
}

/// Allocator plus execution stream for accelerator-resident data.
///
/// Implementations own the memory; callers borrow the context for the
/// duration of a generate or load call.
///
/// # Examples
/// ```
/// use benchdata_core::{DeviceContext, HostDevice};
///
/// let device = HostDevice::new();
/// let stream = device.stream();
/// let address = device.allocate(16, stream)?;
/// device.enqueue_copy_to_device(address, &[7_u8; 16], stream)?;
/// device.synchronize(stream)?;
/// let mut back = [0_u8; 16];
/// device.enqueue_copy_to_host(&mut back, address, stream)?;
/// device.synchronize(stream)?;
/// assert_eq!(back, [7_u8; 16]);
/// device.deallocate(address, 16, stream)?;
/// # Ok::<(), benchdata_core::DeviceError>(())
/// ```
pub trait DeviceContext {
    /// Returns the stream that work should be enqueued on.
    fn stream(&self) -> StreamHandle;

    /// Allocates `bytes` bytes of device memory ordered on `stream`.
    ///
    /// # Errors
    /// Returns [`DeviceError`] for zero-sized requests or unknown streams.
    fn allocate(&self, bytes: usize, stream: StreamHandle) -> Result<DeviceAddress, DeviceError>;

    /// Releases an allocation; `bytes` must equal the allocated size.
    ///
    /// # Errors
    /// Returns [`DeviceError`] for unknown addresses, unknown streams, or a
    /// size that disagrees with the allocation.
    fn deallocate(
        &self,
        address: DeviceAddress,
        bytes: usize,
        stream: StreamHandle,
    ) -> Result<(), DeviceError>;

    /// Enqueues a host-to-device copy of `src` into the start of `dst`.
    ///
    /// # Errors
    /// Returns [`DeviceError`] when `dst` is unknown or too small.
    fn enqueue_copy_to_device(
        &self,
        dst: DeviceAddress,
        src: &[u8],
        stream: StreamHandle,
    ) -> Result<(), DeviceError>;

    /// Enqueues a device-to-host copy filling `dst` from the start of `src`.
    ///
    /// # Errors
    /// Returns [`DeviceError`] when `src` is unknown or too small.
    fn enqueue_copy_to_host(
        &self,
        dst: &mut [u8],
        src: DeviceAddress,
        stream: StreamHandle,
    ) -> Result<(), DeviceError>;

    /// Blocks until every operation enqueued on `stream` has completed.
    ///
    /// # Errors
    /// Returns [`DeviceError::UnknownStream`] for foreign streams.
    fn synchronize(&self, stream: StreamHandle) -> Result<(), DeviceError>;
}
