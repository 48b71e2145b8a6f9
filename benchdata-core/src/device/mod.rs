//! Device memory, streams, and the host/device transfer layer.

mod buffer;
mod context;
mod host;
mod transfer;

pub use buffer::{DeviceBuffer, DeviceElement};
pub use context::{DeviceAddress, DeviceContext, DeviceError, StreamHandle};
pub use host::{HostDevice, HostDeviceStats};
pub use transfer::{copy_to_device, copy_to_host, synchronize};
