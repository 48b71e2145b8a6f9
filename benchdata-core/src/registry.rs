//! Name-based lookup and dispatch of generators.
//!
//! The set of generators is closed: each one is a [`GeneratorKind`] variant,
//! so the registry is fully enumerable and cannot change at run time. Adding
//! a generator means adding a variant, its name, and its dispatch arm.

use std::{fmt, str::FromStr, time::Instant};

use tracing::{info, instrument};

use crate::{
    dataset::Dataset,
    error::{ProvisionError, Result},
    generators::{Outcome, blobs, load},
    handle::Handle,
    options::UsageError,
};

/// Generator selected when no name is supplied.
pub const DEFAULT_GENERATOR: &str = "blobs";

/// The registered generators.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum GeneratorKind {
    /// Synthetic Gaussian clusters.
    Blobs,
    /// A dataset file written by `-dump`.
    Load,
}

impl GeneratorKind {
    /// Every registered generator, in display order.
    pub const ALL: [Self; 2] = [Self::Blobs, Self::Load];

    /// Returns the registered, case-sensitive name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Blobs => "blobs",
            Self::Load => "load",
        }
    }

    /// Looks up a generator by exact name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Runs the generator against `out`.
    ///
    /// # Errors
    /// Propagates the generator's [`ProvisionError`].
    pub fn run<'ctx>(
        self,
        out: &mut Dataset<'ctx>,
        handle: &Handle<'ctx>,
        args: &[String],
    ) -> Result<Outcome> {
        match self {
            Self::Blobs => blobs(out, handle, args),
            Self::Load => load(out, handle, args),
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeneratorKind {
    type Err = UsageError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::from_name(name).ok_or_else(|| UsageError::UnknownGenerator {
            name: name.to_owned(),
            available: list_names(),
        })
    }
}

/// Returns every registered name joined with `|`.
///
/// # Examples
/// ```
/// assert_eq!(benchdata_core::list_names(), "blobs|load");
/// ```
#[must_use]
pub fn list_names() -> String {
    GeneratorKind::ALL
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join("|")
}

/// Returns the index of the first token naming a registered generator, or
/// `args.len()` when none does.
///
/// # Examples
/// ```
/// use benchdata_core::find_generator_token;
///
/// assert_eq!(find_generator_token(&["--verbose", "load", "-file", "x"]), 1);
/// assert_eq!(find_generator_token(&["-nrows", "10"]), 2);
/// ```
#[must_use]
pub fn find_generator_token<S: AsRef<str>>(args: &[S]) -> usize {
    args.iter()
        .position(|token| GeneratorKind::from_name(token.as_ref()).is_some())
        .unwrap_or(args.len())
}

/// Runs the generator registered as `name`.
///
/// When a dataset is produced, an `info` event reports its shape and the
/// wall-clock time spent in the generator.
///
/// # Errors
/// Returns [`UsageError::UnknownGenerator`] (nothing allocated) for an
/// unregistered name, or the generator's own error.
#[instrument(name = "registry.dispatch", err, skip(out, handle, args))]
pub fn dispatch<'ctx>(
    name: &str,
    out: &mut Dataset<'ctx>,
    handle: &Handle<'ctx>,
    args: &[String],
) -> Result<Outcome> {
    let kind: GeneratorKind = name.parse()?;
    let started = Instant::now();
    let outcome = kind.run(out, handle, args)?;
    if outcome.is_generated() {
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        info!(
            generator = kind.name(),
            nrows = out.nrows(),
            ncols = out.ncols(),
            nclasses = out.nclasses(),
            elapsed_us,
            "dataset generated"
        );
    }
    Ok(outcome)
}

/// Dispatches on the first token of `args`, defaulting to
/// [`DEFAULT_GENERATOR`] when `args` is empty.
///
/// `args` is the option slice starting at the generator name, as located by
/// [`find_generator_token`].
///
/// # Errors
/// Returns the [`ProvisionError`] raised by [`dispatch`].
pub fn load_dataset<'ctx>(
    out: &mut Dataset<'ctx>,
    handle: &Handle<'ctx>,
    args: &[String],
) -> Result<Outcome> {
    let name = args.first().map_or(DEFAULT_GENERATOR, String::as_str);
    dispatch(name, out, handle, args)
}
