//! Owning handles for typed device allocations.

use std::{fmt, marker::PhantomData};

use tracing::{debug, warn};

use super::context::{DeviceAddress, DeviceContext, DeviceError, StreamHandle};

/// Element types that may live in device memory.
///
/// Elements cross the host/device boundary as raw bytes, so they must be
/// plain-old-data.
pub trait DeviceElement: bytemuck::Pod + fmt::Debug {}

impl DeviceElement for f32 {}
impl DeviceElement for i32 {}

/// A typed device allocation bound to the context and stream that created it.
///
/// The buffer releases itself on drop when [`DeviceBuffer::release`] was
/// never called, so early returns cannot leak device memory.
pub struct DeviceBuffer<'ctx, T: DeviceElement> {
    device: &'ctx dyn DeviceContext,
    stream: StreamHandle,
    address: DeviceAddress,
    len: usize,
    live: bool,
    marker: PhantomData<T>,
}

impl<'ctx, T: DeviceElement> DeviceBuffer<'ctx, T> {
    /// Allocates room for `len` elements on `stream`.
    ///
    /// # Errors
    /// Returns [`DeviceError::ZeroSizedAllocation`] for `len == 0`,
    /// [`DeviceError::Overflow`] when the byte size overflows, or any error
    /// raised by the backend allocator.
    pub fn allocate(
        device: &'ctx dyn DeviceContext,
        len: usize,
        stream: StreamHandle,
    ) -> Result<Self, DeviceError> {
        let bytes = byte_len::<T>(len)?;
        let address = device.allocate(bytes, stream)?;
        debug!(address = address.get(), bytes, "allocated device buffer");
        Ok(Self {
            device,
            stream,
            address,
            len,
            live: true,
            marker: PhantomData,
        })
    }

    /// Returns the number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the buffer holds no elements. Allocation rejects empty
    /// buffers, so this is always `false` for a live handle.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the size of the allocation in bytes.
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.len.saturating_mul(size_of::<T>())
    }

    /// Returns the device address of the first element.
    #[must_use]
    pub const fn address(&self) -> DeviceAddress {
        self.address
    }

    /// Returns the stream the buffer was allocated on.
    #[must_use]
    pub const fn stream(&self) -> StreamHandle {
        self.stream
    }

    /// Returns the context that owns the allocation.
    #[must_use]
    pub fn device(&self) -> &'ctx dyn DeviceContext {
        self.device
    }

    /// Releases the allocation with the size it was created with.
    ///
    /// # Errors
    /// Returns any [`DeviceError`] raised by the backend deallocator.
    pub fn release(mut self) -> Result<(), DeviceError> {
        self.live = false;
        self.device
            .deallocate(self.address, self.byte_len(), self.stream)
    }
}

impl<T: DeviceElement> Drop for DeviceBuffer<'_, T> {
    fn drop(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        match self
            .device
            .deallocate(self.address, self.byte_len(), self.stream)
        {
            Ok(()) => debug!(
                address = self.address.get(),
                "device buffer released on drop"
            ),
            Err(err) => warn!(
                address = self.address.get(),
                error = %err,
                "failed to release device buffer on drop"
            ),
        }
    }
}

impl<T: DeviceElement> fmt::Debug for DeviceBuffer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("address", &self.address)
            .field("len", &self.len)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

fn byte_len<T>(len: usize) -> Result<usize, DeviceError> {
    if len == 0 {
        return Err(DeviceError::ZeroSizedAllocation);
    }
    len.checked_mul(size_of::<T>())
        .ok_or(DeviceError::Overflow { count: len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HostDevice;
    use rstest::rstest;

    #[rstest]
    fn allocation_records_length_and_bytes() {
        let device = HostDevice::new();
        let buffer = DeviceBuffer::<f32>::allocate(&device, 12, device.stream())
            .expect("allocation must succeed");
        assert_eq!(buffer.len(), 12);
        assert_eq!(buffer.byte_len(), 48);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.stream(), device.stream());
    }

    #[rstest]
    fn zero_length_is_rejected() {
        let device = HostDevice::new();
        let err = DeviceBuffer::<i32>::allocate(&device, 0, device.stream())
            .expect_err("empty buffers must be rejected");
        assert_eq!(err, DeviceError::ZeroSizedAllocation);
    }

    #[rstest]
    fn overflowing_length_is_rejected() {
        let device = HostDevice::new();
        let err = DeviceBuffer::<f32>::allocate(&device, usize::MAX, device.stream())
            .expect_err("overflowing sizes must be rejected");
        assert_eq!(err, DeviceError::Overflow { count: usize::MAX });
    }

    #[rstest]
    fn release_returns_memory() {
        let device = HostDevice::new();
        let buffer = DeviceBuffer::<i32>::allocate(&device, 3, device.stream())
            .expect("allocation must succeed");
        assert_eq!(device.stats().expect("stats").live_allocations, 1);
        buffer.release().expect("release must succeed");
        assert_eq!(device.stats().expect("stats").live_allocations, 0);
    }

    #[rstest]
    fn drop_releases_unreleased_buffers() {
        let device = HostDevice::new();
        {
            let _buffer = DeviceBuffer::<f32>::allocate(&device, 5, device.stream())
                .expect("allocation must succeed");
            assert_eq!(device.stats().expect("stats").live_bytes, 20);
        }
        let stats = device.stats().expect("stats");
        assert_eq!(stats.live_allocations, 0);
        assert_eq!(stats.live_bytes, 0);
    }
}
