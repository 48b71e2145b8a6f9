//! Host/device copy and stream synchronisation primitives.
//!
//! Copies are only enqueued. Host code must call [`synchronize`] on the same
//! stream before reading data copied to the host or treating a host-to-device
//! write as complete. None of these functions synchronise implicitly.

use tracing::trace;

use super::{
    buffer::{DeviceBuffer, DeviceElement},
    context::{DeviceContext, DeviceError, StreamHandle},
};

/// Enqueues a copy of the first `count` elements of `src` into `dst`.
///
/// # Errors
/// Returns [`DeviceError::CopyOutOfRange`] when `count` exceeds either side,
/// or any error raised by the backend.
///
/// # Examples
/// ```
/// use benchdata_core::{DeviceBuffer, DeviceContext, HostDevice, copy_to_device, copy_to_host, synchronize};
///
/// let device = HostDevice::new();
/// let stream = device.stream();
/// let mut buffer = DeviceBuffer::<f32>::allocate(&device, 3, stream)?;
/// copy_to_device(&mut buffer, &[1.0, 2.0, 3.0], 3, stream)?;
/// let mut host = [0.0_f32; 3];
/// copy_to_host(&mut host, &buffer, 3, stream)?;
/// synchronize(&device, stream)?;
/// assert_eq!(host, [1.0, 2.0, 3.0]);
/// # Ok::<(), benchdata_core::DeviceError>(())
/// ```
pub fn copy_to_device<T: DeviceElement>(
    dst: &mut DeviceBuffer<'_, T>,
    src: &[T],
    count: usize,
    stream: StreamHandle,
) -> Result<(), DeviceError> {
    let host = src
        .get(..count)
        .filter(|_| count <= dst.len())
        .ok_or(DeviceError::CopyOutOfRange {
            requested: count,
            available: dst.len().min(src.len()),
        })?;
    dst.device()
        .enqueue_copy_to_device(dst.address(), bytemuck::cast_slice(host), stream)?;
    trace!(
        address = dst.address().get(),
        count,
        stream = stream.get(),
        "enqueued host-to-device copy"
    );
    Ok(())
}

/// Enqueues a copy of the first `count` elements of `src` into `dst`.
///
/// The contents of `dst` are unspecified until [`synchronize`] returns.
///
/// # Errors
/// Returns [`DeviceError::CopyOutOfRange`] when `count` exceeds either side,
/// or any error raised by the backend.
pub fn copy_to_host<T: DeviceElement>(
    dst: &mut [T],
    src: &DeviceBuffer<'_, T>,
    count: usize,
    stream: StreamHandle,
) -> Result<(), DeviceError> {
    let available = dst.len().min(src.len());
    let host = dst
        .get_mut(..count)
        .filter(|_| count <= src.len())
        .ok_or(DeviceError::CopyOutOfRange {
            requested: count,
            available,
        })?;
    src.device()
        .enqueue_copy_to_host(bytemuck::cast_slice_mut(host), src.address(), stream)?;
    trace!(
        address = src.address().get(),
        count,
        stream = stream.get(),
        "enqueued device-to-host copy"
    );
    Ok(())
}

/// Blocks until all work enqueued on `stream` has completed.
///
/// # Errors
/// Returns any error raised by the backend.
pub fn synchronize(device: &dyn DeviceContext, stream: StreamHandle) -> Result<(), DeviceError> {
    device.synchronize(stream)?;
    trace!(stream = stream.get(), "stream synchronised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HostDevice;
    use rstest::rstest;

    #[rstest]
    fn partial_copies_touch_only_the_prefix() {
        let device = HostDevice::new();
        let stream = device.stream();
        let mut buffer =
            DeviceBuffer::<i32>::allocate(&device, 4, stream).expect("allocation must succeed");
        copy_to_device(&mut buffer, &[9, 9, 9, 9], 4, stream).expect("copy must succeed");
        copy_to_device(&mut buffer, &[1, 2], 2, stream).expect("copy must succeed");
        let mut host = [0_i32; 4];
        copy_to_host(&mut host, &buffer, 4, stream).expect("copy must succeed");
        synchronize(&device, stream).expect("sync must succeed");
        assert_eq!(host, [1, 2, 9, 9]);
    }

    #[rstest]
    #[case::longer_than_source(3, 2, 5)]
    #[case::longer_than_buffer(5, 8, 3)]
    fn copy_to_device_rejects_invalid_counts(
        #[case] count: usize,
        #[case] src_len: usize,
        #[case] buffer_len: usize,
    ) {
        let device = HostDevice::new();
        let stream = device.stream();
        let mut buffer = DeviceBuffer::<f32>::allocate(&device, buffer_len, stream)
            .expect("allocation must succeed");
        let src = vec![0.0_f32; src_len];
        let err = copy_to_device(&mut buffer, &src, count, stream)
            .expect_err("invalid count must be rejected");
        assert_eq!(
            err,
            DeviceError::CopyOutOfRange {
                requested: count,
                available: src_len.min(buffer_len),
            }
        );
        assert_eq!(device.stats().expect("stats").pending_operations, 0);
    }

    #[rstest]
    fn copy_to_host_rejects_counts_beyond_device_buffer() {
        let device = HostDevice::new();
        let stream = device.stream();
        let buffer =
            DeviceBuffer::<f32>::allocate(&device, 2, stream).expect("allocation must succeed");
        let mut host = [0.0_f32; 4];
        let err = copy_to_host(&mut host, &buffer, 4, stream)
            .expect_err("invalid count must be rejected");
        assert!(matches!(err, DeviceError::CopyOutOfRange { requested: 4, .. }));
    }
}
