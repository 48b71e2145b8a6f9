//! Dataset provisioning for benchmark harnesses.
//!
//! Generators produce or load a feature matrix and label vector into
//! device-resident buffers. Callers pick a generator by name through
//! [`dispatch`] or [`load_dataset`], borrowing a [`DeviceContext`] and a
//! [`SyntheticKernel`] through a [`Handle`] for the duration of the call.
//!
//! ```
//! use benchdata_core::{Dataset, Handle, HostDevice, Shape, load_dataset};
//!
//! let device = HostDevice::new();
//! let handle = Handle::new(&device);
//! let args: Vec<String> = ["blobs", "-nrows", "20", "-ncols", "3", "-seed", "7"]
//!     .into_iter()
//!     .map(String::from)
//!     .collect();
//! let mut dataset = Dataset::new();
//! let outcome = load_dataset(&mut dataset, &handle, &args)?;
//! assert!(outcome.is_generated());
//! assert_eq!(dataset.shape(), Shape::new(20, 3, 2));
//! dataset.deallocate()?;
//! # Ok::<(), benchdata_core::ProvisionError>(())
//! ```

mod codec;
mod dataset;
mod device;
mod error;
mod generators;
mod handle;
mod kernel;
mod options;
mod registry;

pub use crate::{
    codec::{CodecError, dump_dataset, read_dataset, read_dataset_from, write_dataset},
    dataset::{Dataset, DatasetError, Shape},
    device::{
        DeviceAddress, DeviceBuffer, DeviceContext, DeviceElement, DeviceError, HostDevice,
        HostDeviceStats, StreamHandle, copy_to_device, copy_to_host, synchronize,
    },
    error::{ProvisionError, ProvisionErrorCode, Result},
    generators::{BlobsConfig, LoadConfig, Outcome, blobs, load},
    handle::Handle,
    kernel::{BlobParams, HostBlobKernel, KernelError, SyntheticKernel},
    options::{HELP_FLAG, OptionArgs, OptionSpec, UsageError},
    registry::{
        DEFAULT_GENERATOR, GeneratorKind, dispatch, find_generator_token, list_names,
        load_dataset,
    },
};
