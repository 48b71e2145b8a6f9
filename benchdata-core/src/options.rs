//! Flag-value option parsing shared by the generators.
//!
//! Generators receive a slice of `argv`-like tokens and look up their own
//! options with the `-flagname value` convention; switches are present or
//! absent. Tokens that no generator option claims are tolerated but reported
//! at `warn` level so that mistyped flags do not pass unnoticed.

use std::{fmt, str::FromStr};

use thiserror::Error;
use tracing::warn;

/// Flag that asks a generator to return its usage text.
pub const HELP_FLAG: &str = "-h";

/// Invocation mistakes made by the caller of a generator.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum UsageError {
    /// No generator is registered under the requested name.
    #[error("invalid generator name `{name}`; expected one of {available}")]
    UnknownGenerator {
        /// Requested generator name.
        name: String,
        /// Registered names joined for display.
        available: String,
    },
    /// A mandatory option was absent or empty.
    #[error("`{flag}` is a mandatory option")]
    MissingOption {
        /// The missing flag.
        flag: &'static str,
    },
    /// A valued option was the last token.
    #[error("`{flag}` expects a value")]
    MissingValue {
        /// The flag lacking a value.
        flag: &'static str,
    },
    /// An option value failed to parse.
    #[error("invalid value `{value}` for `{flag}`: {reason}")]
    InvalidValue {
        /// The flag whose value was rejected.
        flag: &'static str,
        /// The raw value supplied.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// The options a generator understands, used to report stray tokens.
#[derive(Clone, Copy, Debug)]
pub struct OptionSpec {
    /// Flags that take no value.
    pub switches: &'static [&'static str],
    /// Flags followed by a value token.
    pub valued: &'static [&'static str],
}

/// A borrowed view over a generator's option tokens.
///
/// # Examples
/// ```
/// use benchdata_core::OptionArgs;
///
/// let tokens: Vec<String> = ["blobs", "-nrows", "12", "-shuffle"]
///     .into_iter()
///     .map(String::from)
///     .collect();
/// let args = OptionArgs::new(&tokens);
/// assert_eq!(args.value("-nrows", 10_usize)?, 12);
/// assert_eq!(args.value("-ncols", 81_usize)?, 81);
/// assert!(args.flag("-shuffle"));
/// # Ok::<(), benchdata_core::UsageError>(())
/// ```
#[derive(Clone, Copy, Debug)]
pub struct OptionArgs<'a> {
    tokens: &'a [String],
}

impl<'a> OptionArgs<'a> {
    /// Wraps a token slice.
    #[must_use]
    pub const fn new(tokens: &'a [String]) -> Self {
        Self { tokens }
    }

    /// Returns whether the switch `name` is present.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.tokens.iter().any(|token| token == name)
    }

    /// Returns whether the help flag is present.
    #[must_use]
    pub fn wants_help(&self) -> bool {
        self.flag(HELP_FLAG)
    }

    /// Parses the value following `flag`, or returns `default` when the flag
    /// is absent.
    ///
    /// # Errors
    /// Returns [`UsageError::MissingValue`] when the flag is the last token or
    /// [`UsageError::InvalidValue`] when the value does not parse.
    pub fn value<T>(&self, flag: &'static str, default: T) -> Result<T, UsageError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.raw(flag)? {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|err: T::Err| UsageError::InvalidValue {
                flag,
                value: raw.to_owned(),
                reason: err.to_string(),
            }),
        }
    }

    /// Returns the raw value following `flag`, if the flag is present.
    ///
    /// # Errors
    /// Returns [`UsageError::MissingValue`] when the flag is the last token.
    pub fn string(&self, flag: &'static str) -> Result<Option<&'a str>, UsageError> {
        self.raw(flag)
    }

    /// Lists hyphen-prefixed tokens that `spec` does not recognise, skipping
    /// the values consumed by valued flags.
    #[must_use]
    pub fn unrecognized(&self, spec: &OptionSpec) -> Vec<&'a str> {
        let mut stray = Vec::new();
        let mut tokens = self.tokens.iter();
        while let Some(owned) = tokens.next() {
            let token = owned.as_str();
            if spec.valued.contains(&token) {
                tokens.next();
            } else if token != HELP_FLAG
                && !spec.switches.contains(&token)
                && token.starts_with('-')
            {
                stray.push(token);
            }
        }
        stray
    }

    /// Emits a `warn` event for every token reported by
    /// [`OptionArgs::unrecognized`].
    pub fn warn_unrecognized(&self, generator: &str, spec: &OptionSpec) {
        for token in self.unrecognized(spec) {
            warn!(generator, token, "ignoring unrecognised option");
        }
    }

    fn raw(&self, flag: &'static str) -> Result<Option<&'a str>, UsageError> {
        let Some(position) = self.tokens.iter().position(|token| token == flag) else {
            return Ok(None);
        };
        self.tokens
            .get(position.saturating_add(1))
            .map(|value| Some(value.as_str()))
            .ok_or(UsageError::MissingValue { flag })
    }
}
