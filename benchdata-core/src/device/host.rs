//! Host-memory implementation of [`DeviceContext`].
//!
//! `HostDevice` stands in for an accelerator when none is present. Copies are
//! performed immediately but are still counted as pending work on the stream
//! until [`DeviceContext::synchronize`] is called, which lets tests observe
//! whether callers honour the synchronisation discipline. Allocations are
//! tracked so leaks and size mismatches surface as errors or in
//! [`HostDeviceStats`].

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use super::context::{DeviceAddress, DeviceContext, DeviceError, StreamHandle};

/// Allocation granularity, matching the alignment most accelerator runtimes
/// guarantee.
const ALLOCATION_ALIGNMENT: u64 = 256;

/// First address handed out, so that zero never names a live buffer.
const BASE_ADDRESS: u64 = 0x1000;

/// Snapshot of the host device's bookkeeping.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HostDeviceStats {
    /// Allocations not yet released.
    pub live_allocations: usize,
    /// Bytes held by live allocations.
    pub live_bytes: usize,
    /// Allocations performed since creation.
    pub total_allocations: u64,
    /// Operations enqueued since the last synchronisation.
    pub pending_operations: usize,
    /// Number of completed synchronisations.
    pub synchronizations: u64,
}

#[derive(Debug)]
struct HostState {
    next_address: u64,
    allocations: HashMap<u64, Vec<u8>>,
    total_allocations: u64,
    pending_operations: usize,
    synchronizations: u64,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            next_address: BASE_ADDRESS,
            allocations: HashMap::new(),
            total_allocations: 0,
            pending_operations: 0,
            synchronizations: 0,
        }
    }
}

/// A [`DeviceContext`] backed by ordinary heap memory and a single stream.
///
/// # Examples
/// ```
/// use benchdata_core::{Dataset, HostDevice, Shape};
///
/// let device = HostDevice::new();
/// let mut dataset = Dataset::with_shape(Shape::new(4, 2, 2))?;
/// dataset.allocate(&device)?;
/// assert_eq!(device.stats()?.live_allocations, 2);
/// dataset.deallocate()?;
/// assert_eq!(device.stats()?.live_allocations, 0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct HostDevice {
    stream: StreamHandle,
    state: Mutex<HostState>,
}

impl HostDevice {
    /// Stream identifier used by every host device.
    pub const DEFAULT_STREAM: StreamHandle = StreamHandle::new(1);

    /// Creates an empty host device.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stream: Self::DEFAULT_STREAM,
            state: Mutex::new(HostState::default()),
        }
    }

    /// Returns a snapshot of allocation and stream bookkeeping.
    ///
    /// # Errors
    /// Returns [`DeviceError::Poisoned`] if a previous holder of the state
    /// lock panicked.
    pub fn stats(&self) -> Result<HostDeviceStats, DeviceError> {
        let state = self.lock()?;
        Ok(HostDeviceStats {
            live_allocations: state.allocations.len(),
            live_bytes: state.allocations.values().map(Vec::len).sum(),
            total_allocations: state.total_allocations,
            pending_operations: state.pending_operations,
            synchronizations: state.synchronizations,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HostState>, DeviceError> {
        self.state.lock().map_err(|_| DeviceError::Poisoned)
    }

    fn check_stream(&self, stream: StreamHandle) -> Result<(), DeviceError> {
        if stream == self.stream {
            Ok(())
        } else {
            Err(DeviceError::UnknownStream {
                stream: stream.get(),
            })
        }
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceContext for HostDevice {
    fn stream(&self) -> StreamHandle {
        self.stream
    }

    fn allocate(&self, bytes: usize, stream: StreamHandle) -> Result<DeviceAddress, DeviceError> {
        self.check_stream(stream)?;
        if bytes == 0 {
            return Err(DeviceError::ZeroSizedAllocation);
        }
        let span = u64::try_from(bytes)
            .ok()
            .and_then(|raw| raw.checked_next_multiple_of(ALLOCATION_ALIGNMENT))
            .ok_or(DeviceError::Overflow { count: bytes })?;
        let mut state = self.lock()?;
        let raw = state.next_address;
        state.next_address = raw
            .checked_add(span)
            .ok_or(DeviceError::Overflow { count: bytes })?;
        state.allocations.insert(raw, vec![0_u8; bytes]);
        state.total_allocations = state.total_allocations.saturating_add(1);
        Ok(DeviceAddress::new(raw))
    }

    fn deallocate(
        &self,
        address: DeviceAddress,
        bytes: usize,
        stream: StreamHandle,
    ) -> Result<(), DeviceError> {
        self.check_stream(stream)?;
        let mut state = self.lock()?;
        let allocated = state
            .allocations
            .get(&address.get())
            .map(Vec::len)
            .ok_or(DeviceError::UnknownAddress {
                address: address.get(),
            })?;
        if allocated != bytes {
            return Err(DeviceError::SizeMismatch {
                address: address.get(),
                requested: bytes,
                allocated,
            });
        }
        state.allocations.remove(&address.get());
        Ok(())
    }

    fn enqueue_copy_to_device(
        &self,
        dst: DeviceAddress,
        src: &[u8],
        stream: StreamHandle,
    ) -> Result<(), DeviceError> {
        self.check_stream(stream)?;
        let mut state = self.lock()?;
        let memory = state
            .allocations
            .get_mut(&dst.get())
            .ok_or(DeviceError::UnknownAddress { address: dst.get() })?;
        let available = memory.len();
        let target = memory
            .get_mut(..src.len())
            .ok_or(DeviceError::CopyOutOfRange {
                requested: src.len(),
                available,
            })?;
        target.copy_from_slice(src);
        state.pending_operations = state.pending_operations.saturating_add(1);
        Ok(())
    }

    fn enqueue_copy_to_host(
        &self,
        dst: &mut [u8],
        src: DeviceAddress,
        stream: StreamHandle,
    ) -> Result<(), DeviceError> {
        self.check_stream(stream)?;
        let mut state = self.lock()?;
        let memory = state
            .allocations
            .get(&src.get())
            .ok_or(DeviceError::UnknownAddress { address: src.get() })?;
        let source = memory
            .get(..dst.len())
            .ok_or(DeviceError::CopyOutOfRange {
                requested: dst.len(),
                available: memory.len(),
            })?;
        dst.copy_from_slice(source);
        state.pending_operations = state.pending_operations.saturating_add(1);
        Ok(())
    }

    fn synchronize(&self, stream: StreamHandle) -> Result<(), DeviceError> {
        self.check_stream(stream)?;
        let mut state = self.lock()?;
        state.pending_operations = 0;
        state.synchronizations = state.synchronizations.saturating_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn device() -> HostDevice {
        HostDevice::new()
    }

    #[rstest]
    fn allocations_are_aligned_and_distinct(device: HostDevice) {
        let stream = device.stream();
        let first = device.allocate(3, stream).expect("allocation must succeed");
        let second = device.allocate(3, stream).expect("allocation must succeed");
        assert_ne!(first, second);
        assert_eq!(first.get() % ALLOCATION_ALIGNMENT, 0);
        assert_eq!(second.get() % ALLOCATION_ALIGNMENT, 0);
    }

    #[rstest]
    fn copies_are_pending_until_synchronised(device: HostDevice) {
        let stream = device.stream();
        let address = device.allocate(4, stream).expect("allocation must succeed");
        device
            .enqueue_copy_to_device(address, &[1, 2, 3, 4], stream)
            .expect("copy must succeed");
        assert_eq!(device.stats().expect("stats").pending_operations, 1);
        device.synchronize(stream).expect("sync must succeed");
        let stats = device.stats().expect("stats");
        assert_eq!(stats.pending_operations, 0);
        assert_eq!(stats.synchronizations, 1);
    }

    #[rstest]
    fn deallocate_rejects_size_mismatch(device: HostDevice) {
        let stream = device.stream();
        let address = device.allocate(8, stream).expect("allocation must succeed");
        let err = device
            .deallocate(address, 4, stream)
            .expect_err("size mismatch must be rejected");
        assert_eq!(
            err,
            DeviceError::SizeMismatch {
                address: address.get(),
                requested: 4,
                allocated: 8,
            }
        );
        assert_eq!(device.stats().expect("stats").live_allocations, 1);
    }

    #[rstest]
    fn double_free_is_rejected(device: HostDevice) {
        let stream = device.stream();
        let address = device.allocate(8, stream).expect("allocation must succeed");
        device
            .deallocate(address, 8, stream)
            .expect("first release must succeed");
        let err = device
            .deallocate(address, 8, stream)
            .expect_err("second release must fail");
        assert!(matches!(err, DeviceError::UnknownAddress { .. }));
    }

    #[rstest]
    fn foreign_streams_are_rejected(device: HostDevice) {
        let err = device
            .allocate(8, StreamHandle::new(99))
            .expect_err("foreign stream must be rejected");
        assert_eq!(err, DeviceError::UnknownStream { stream: 99 });
    }

    #[rstest]
    fn oversized_copies_are_rejected(device: HostDevice) {
        let stream = device.stream();
        let address = device.allocate(2, stream).expect("allocation must succeed");
        let err = device
            .enqueue_copy_to_device(address, &[0; 3], stream)
            .expect_err("oversized copy must fail");
        assert_eq!(
            err,
            DeviceError::CopyOutOfRange {
                requested: 3,
                available: 2,
            }
        );
        let mut host = [0_u8; 4];
        let err = device
            .enqueue_copy_to_host(&mut host, address, stream)
            .expect_err("oversized read must fail");
        assert!(matches!(err, DeviceError::CopyOutOfRange { .. }));
    }
}
