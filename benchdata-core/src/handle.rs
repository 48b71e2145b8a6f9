//! The borrowed execution context handed to generators.

use std::fmt;

use crate::{
    device::{DeviceContext, StreamHandle},
    kernel::{HostBlobKernel, SyntheticKernel},
};

/// Device context and synthetic kernel borrowed for one generator call.
///
/// The caller owns both collaborators; a handle only borrows them, so a
/// dataset produced through it cannot outlive the device that backs it.
#[derive(Clone, Copy)]
pub struct Handle<'ctx> {
    device: &'ctx dyn DeviceContext,
    kernel: &'ctx dyn SyntheticKernel,
}

impl<'ctx> Handle<'ctx> {
    /// Creates a handle using the host reference kernel.
    #[must_use]
    pub const fn new(device: &'ctx dyn DeviceContext) -> Self {
        Self::with_kernel(device, &HostBlobKernel)
    }

    /// Creates a handle with an explicit synthetic kernel.
    #[must_use]
    pub const fn with_kernel(
        device: &'ctx dyn DeviceContext,
        kernel: &'ctx dyn SyntheticKernel,
    ) -> Self {
        Self { device, kernel }
    }

    /// Returns the device context.
    #[must_use]
    pub const fn device(&self) -> &'ctx dyn DeviceContext {
        self.device
    }

    /// Returns the synthetic kernel.
    #[must_use]
    pub const fn kernel(&self) -> &'ctx dyn SyntheticKernel {
        self.kernel
    }

    /// Returns the device's execution stream.
    #[must_use]
    pub fn stream(&self) -> StreamHandle {
        self.device.stream()
    }
}

impl fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("stream", &self.stream())
            .finish_non_exhaustive()
    }
}
