//! Concrete dataset producers.
//!
//! Every generator parses its own option slice, honours `-h` without touching
//! the device, and on success leaves the output dataset allocated and filled.
//! On failure the output dataset holds no buffers.

mod blobs;
mod load;

pub use blobs::{BlobsConfig, blobs};
pub use load::{LoadConfig, load};

/// Result of a generator invocation that did not fail.
#[must_use]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The dataset was produced and is allocated.
    Generated,
    /// `-h` was given; nothing was allocated.
    HelpRequested {
        /// Usage text for the generator.
        usage: &'static str,
    },
}

impl Outcome {
    /// Returns whether a dataset was produced.
    #[must_use]
    pub const fn is_generated(self) -> bool {
        matches!(self, Self::Generated)
    }
}
