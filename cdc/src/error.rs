//! Error types and result definitions for snapshot coordination.
//!
//! Provides an error system with classification and captured callsite metadata for
//! connector operations. [`CdcError`] pairs an [`ErrorKind`] for programmatic handling
//! with a static description and optional dynamic detail, so failures surface both a
//! stable category and the offending values.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for connector operations using [`CdcError`] as the error type.
///
/// This type alias reduces boilerplate when working with fallible connector operations.
pub type CdcResult<T> = Result<T, CdcError>;

/// Specific categories of errors that can occur during snapshot coordination.
///
/// Error kinds are organized by functional area and failure mode to enable appropriate
/// handling strategies at the call site.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A key or queue could not be encoded into its durable offset form.
    SerializationError,
    /// A persisted offset field could not be decoded. Resuming from it would corrupt
    /// the snapshot position, so the restore must abort.
    DeserializationError,
    /// A collection identifier string does not parse into catalog/schema/name parts.
    InvalidCollectionId,
    /// A signal message carried an unknown type or a malformed data payload.
    InvalidSignal,
    /// An operation was attempted in a state that does not allow it.
    InvalidState,
    /// A configuration value is missing or out of range.
    ConfigError,
    /// The offset store failed to load or save the offset record.
    OffsetStoreError,
    /// Uncategorized failure.
    Unknown,
}

/// Detailed payload stored inside a [`CdcError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Main error type for connector operations.
///
/// Construct instances through the [`cdc_error!`] and [`bail!`] macros, which capture
/// the callsite location automatically.
///
/// [`cdc_error!`]: crate::cdc_error
/// [`bail!`]: crate::bail
#[derive(Debug, Clone)]
pub struct CdcError {
    payload: ErrorPayload,
}

impl CdcError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified
    /// instance. The stored source is preserved across clones and exposed via
    /// [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`CdcError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        CdcError {
            payload: ErrorPayload {
                kind,
                description,
                detail,
                source: None,
                location: Location::caller(),
            },
        }
    }
}

/// Equality considers only the error kind, so tests and retry policies can match on
/// the category without fixing the dynamic detail.
impl PartialEq for CdcError {
    fn eq(&self, other: &CdcError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl fmt::Display for CdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let location = self.payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.payload.kind,
            self.payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        if let Some(detail) = self.payload.detail.as_deref() {
            write!(f, "\n  Detail: {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for CdcError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

/// Creates a [`CdcError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for CdcError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> CdcError {
        CdcError::from_components(kind, Cow::Borrowed(description), None)
    }
}

/// Creates a [`CdcError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for CdcError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> CdcError {
        CdcError::from_components(kind, Cow::Borrowed(description), Some(detail.into()))
    }
}
