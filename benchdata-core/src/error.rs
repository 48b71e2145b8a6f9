//! Error types for dataset provisioning.
//!
//! Each layer owns a focused error enum; [`ProvisionError`] aggregates them
//! for callers of the registry and exposes a stable machine-readable code.

use std::fmt;

use thiserror::Error;

use crate::{
    codec::CodecError, dataset::DatasetError, device::DeviceError, kernel::KernelError,
    options::UsageError,
};

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $pattern:pat => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $($pattern => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// Any failure raised while provisioning a dataset.
///
/// Every variant is fatal for a benchmark run: none is transient, and no
/// operation in this crate retries.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The generator was invoked incorrectly.
    #[error(transparent)]
    Usage(#[from] UsageError),
    /// The dataset record rejected a shape or lifecycle transition.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    /// A device allocation, transfer, or synchronisation failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// Persisting or restoring a dataset file failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The synthetic kernel rejected its parameters or failed.
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

define_error_codes! {
    /// Stable codes describing [`ProvisionError`] variants.
    enum ProvisionErrorCode for ProvisionError {
        /// No generator is registered under the requested name.
        UnknownGenerator => Self::Usage(UsageError::UnknownGenerator { .. })
            => "PROVISION_UNKNOWN_GENERATOR",
        /// A mandatory option or an option value was absent.
        MissingOption => Self::Usage(
            UsageError::MissingOption { .. } | UsageError::MissingValue { .. }
        ) => "PROVISION_MISSING_OPTION",
        /// An option value failed to parse.
        InvalidOption => Self::Usage(UsageError::InvalidValue { .. })
            => "PROVISION_INVALID_OPTION",
        /// The dataset shape or lifecycle was invalid.
        Dataset => Self::Dataset(_) | Self::Codec(CodecError::Dataset(_))
            => "PROVISION_DATASET",
        /// A device operation failed.
        Device => Self::Device(_) | Self::Codec(CodecError::Device(_))
            => "PROVISION_DEVICE",
        /// A dataset file could not be opened, read, or written.
        Io => Self::Codec(
            CodecError::Open { .. } | CodecError::Create { .. } | CodecError::Io(_)
        ) => "PROVISION_IO",
        /// A dataset file was malformed or truncated.
        MalformedFile => Self::Codec(
            CodecError::MalformedHeader { .. }
                | CodecError::InvalidFeature { .. }
                | CodecError::InvalidLabel { .. }
                | CodecError::Truncated { .. }
        ) => "PROVISION_MALFORMED_FILE",
        /// The synthetic kernel failed.
        Kernel => Self::Kernel(_) => "PROVISION_KERNEL",
    }
}

/// Convenient result alias for provisioning operations.
pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;
