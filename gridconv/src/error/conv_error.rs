/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{
    fmt::{Debug, Display},
    io,
};

use gridconv_utils::{ReadMatrixError, ShapeError, WriteMatrixError};

/// Convenience alias for a `Result<T, ConvError>`.
pub type ConvResult<T> = Result<T, ConvError>;

/// Common error type shared through gridconv.
///
/// The runtime origin of an error is disambiguated by `kind()`; the concrete
/// source (an I/O error, a matrix shape error, ...) stays retrievable through
/// the downcasting API.
///
/// ```rust
/// use gridconv::{error::ErrorContext, ConvError, ConvErrorKind};
///
/// fn denies() -> Result<(), ConvError> {
///     Err(ConvError::message(
///         ConvErrorKind::InvalidDimension,
///         "kernel height must be at least 1",
///     ))
/// }
///
/// fn propagates() -> Result<(), ConvError> {
///     denies().context("while validating the run configuration")
/// }
///
/// let err = propagates().unwrap_err();
/// assert_eq!(err.kind(), ConvErrorKind::InvalidDimension);
///
/// let message = err.to_string();
/// assert!(message.contains("kernel height must be at least 1"));
/// assert!(message.contains("while validating the run configuration"));
/// ```
///
/// # Backtraces
///
/// A backtrace is captured at first construction when `RUST_BACKTRACE=1` is
/// set in the environment.
///
/// # Properties
///
/// * `std::mem::size_of::<ConvError>() == 16`: the struct is returned in
///   registers rather than on the stack.
/// * `std::mem::size_of::<Option<ConvError>>() == 16`: the struct supports
///   Rust's niche optimization.
#[derive(Debug)]
pub struct ConvError {
    kind: ConvErrorKind,
    error: anyhow::Error,
}

impl ConvError {
    /// Construct a new `ConvError` encapsulating `err`.
    ///
    /// Errors constructed this way can be retrieved using downcasting.
    ///
    /// # Attributes
    ///
    /// - `track_caller`: internally, `err` is embedded inside a `Located`
    ///   struct recording the file and line of creation; the attribute makes
    ///   the recorded location the caller's.
    ///
    /// - `inline(never)`: error construction is outlined to keep the
    ///   happy-path cost minimal.
    #[track_caller]
    #[inline(never)]
    pub fn new<E>(kind: ConvErrorKind, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind,
            error: anyhow::Error::new(Located::new(err)),
        }
    }

    /// Construct a new `ConvError` encapsulating `err` tagged with
    /// `ConvErrorKind::Opaque`.
    #[track_caller]
    #[inline(never)]
    pub fn opaque<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: ConvErrorKind::Opaque,
            error: anyhow::Error::new(Located::new(err)),
        }
    }

    /// Construct a new `ConvError` with the provided error message.
    ///
    /// Errors constructed this way are not necessarily recoverable through
    /// the downcasting API.
    #[track_caller]
    #[inline(never)]
    pub fn message<D>(kind: ConvErrorKind, display: D) -> Self
    where
        D: Display + Debug + Send + Sync + 'static,
    {
        Self {
            kind,
            error: anyhow::Error::msg(Located::new(display)),
        }
    }

    /// A rejected matrix, kernel, or stride dimension.
    #[track_caller]
    #[inline(never)]
    pub fn invalid_dimension<D>(display: D) -> Self
    where
        D: Display + Debug + Send + Sync + 'static,
    {
        Self::message(ConvErrorKind::InvalidDimension, display)
    }

    /// A failure in the rank-to-rank message exchange.
    #[track_caller]
    #[inline(never)]
    pub fn communication<D>(display: D) -> Self
    where
        D: Display + Debug + Send + Sync + 'static,
    {
        Self::message(ConvErrorKind::Communication, display)
    }

    /// No valid work partition exists for the requested rank count.
    #[track_caller]
    #[inline(never)]
    pub fn partition_infeasible<D>(display: D) -> Self
    where
        D: Display + Debug + Send + Sync + 'static,
    {
        Self::message(ConvErrorKind::PartitionInfeasible, display)
    }

    /// Attempt to downcast the error object to a concrete type.
    pub fn downcast<E>(self) -> Result<E, Self>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        match self.error.downcast::<E>() {
            Ok(value) => Ok(value),
            Err(error) => match error.downcast::<Located<E>>() {
                Ok(value) => Ok(value.err),
                Err(error) => Err(Self {
                    kind: self.kind,
                    error,
                }),
            },
        }
    }

    /// Attempt to downcast the error object by reference.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        match self.error.downcast_ref::<E>() {
            Some(err) => Some(err),
            None => self.error.downcast_ref::<Located<E>>().map(|e| &e.err),
        }
    }

    /// Attempt to downcast the error object by mutable reference.
    pub fn downcast_mut<E>(&mut self) -> Option<&mut E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        // We need to do a double-check with `anyhow::Error::is` instead of
        // an early return straight from `downcast_mut` due to
        // NLL: https://github.com/rust-lang/rust/issues/51826
        if self.error.is::<E>() {
            self.error.downcast_mut::<E>()
        } else {
            self.error.downcast_mut::<Located<E>>().map(|e| &mut e.err)
        }
    }

    /// Attach the context to `Self` and return a new error.
    #[track_caller]
    #[inline(never)]
    pub fn context<C>(self, context: C) -> Self
    where
        C: Display + Debug + Send + Sync + 'static,
    {
        Self {
            kind: self.kind,
            error: self.error.context(Located::new(context)),
        }
    }

    /// Return the kind of the originally constructed error.
    pub fn kind(&self) -> ConvErrorKind {
        self.kind
    }
}

impl Display for ConvError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        // Use the debug format `{:?}` for `anyhow::Error` to get the source
        // chain as well as a stack trace.
        write!(formatter, "ConvError: {:?}\n\n{:?}", self.kind, self.error)
    }
}

impl std::error::Error for ConvError {
    // Don't implement `source` because we print the whole source chain in our
    // `Display` implementation.
}

impl From<std::convert::Infallible> for ConvError {
    #[track_caller]
    fn from(_: std::convert::Infallible) -> Self {
        unreachable!("Infallible is an unconstructible type");
    }
}

impl From<io::Error> for ConvError {
    #[track_caller]
    fn from(err: io::Error) -> Self {
        ConvError::new(ConvErrorKind::FileIO, err)
    }
}

impl From<ReadMatrixError> for ConvError {
    #[track_caller]
    fn from(err: ReadMatrixError) -> Self {
        ConvError::new(ConvErrorKind::FileIO, err)
    }
}

impl From<WriteMatrixError> for ConvError {
    #[track_caller]
    fn from(err: WriteMatrixError) -> Self {
        ConvError::new(ConvErrorKind::FileIO, err)
    }
}

impl From<ShapeError> for ConvError {
    #[track_caller]
    fn from(err: ShapeError) -> Self {
        ConvError::new(ConvErrorKind::InvalidDimension, err)
    }
}

impl From<rayon::ThreadPoolBuildError> for ConvError {
    #[track_caller]
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        ConvError::new(ConvErrorKind::ThreadPool, err)
    }
}

/// An internal wrapper for error types that also tracks the file and line
/// information for where the error was first converted and where context was
/// propagated.
#[derive(Debug)]
struct Located<T>
where
    T: Debug,
{
    err: T,
    location: &'static std::panic::Location<'static>,
}

impl<T> Located<T>
where
    T: Debug,
{
    #[track_caller]
    fn new(err: T) -> Self {
        Self {
            err,
            location: std::panic::Location::caller(),
        }
    }
}

impl<T> Display for Located<T>
where
    T: Display + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "{} -- ({}:{})",
            self.err,
            self.location.file(),
            self.location.line()
        )
    }
}

impl<T> std::error::Error for Located<T>
where
    T: std::error::Error + Debug,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.err.source()
    }
}

/// Add context to a returned error that will be included in the source chain.
///
/// ```rust
/// use gridconv::{error::ErrorContext, ConvError, ConvErrorKind};
///
/// fn fn_a() -> Result<(), ConvError> {
///     Err(ConvError::message(
///         ConvErrorKind::Communication,
///         "thrown by function A",
///     ))
/// }
///
/// fn fn_b() -> Result<(), ConvError> {
///     fn_a().context("propagated by function B")
/// }
///
/// fn fn_c() -> Result<(), ConvError> {
///     fn_b().with_context(|| "propagated by function C")
/// }
///
/// let message = fn_c().unwrap_err().to_string();
/// assert!(message.contains("thrown by function A"));
/// assert!(message.contains("propagated by function B"));
/// assert!(message.contains("propagated by function C"));
/// ```
pub trait ErrorContext<T> {
    /// Attach the provided context to the error part of the result.
    fn context<C>(self, context: C) -> Result<T, ConvError>
    where
        C: Display + Debug + Send + Sync + 'static;

    /// Attach the provided context to the error part of the result.
    ///
    /// The function `f` will only be evaluated if `self` is an `Err`.
    fn with_context<F, C>(self, f: F) -> Result<T, ConvError>
    where
        C: Display + Debug + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    ConvError: From<E>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T, ConvError>
    where
        C: Display + Debug + Send + Sync + 'static,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(ConvError::from(error).context(context)),
        }
    }

    #[track_caller]
    fn with_context<F, C>(self, f: F) -> Result<T, ConvError>
    where
        C: Display + Debug + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => Err(ConvError::from(error).context(f())),
        }
    }
}

/// Failure classes of the benchmark, used to tag a returned error.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConvErrorKind {
    /// A matrix, kernel, or stride dimension failed validation.
    InvalidDimension,

    /// Reading or writing a matrix file failed.
    FileIO,

    /// A rank-to-rank message exchange failed or carried the wrong size.
    Communication,

    /// No valid work partition exists for the requested rank count.
    PartitionInfeasible,

    /// Building the rayon pool failed.
    ThreadPool,

    /// An error with no more specific classification.
    Opaque,
}
