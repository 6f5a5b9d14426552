//! Error types and result definitions for strata operations.
//!
//! Provides a classified error system with captured diagnostic metadata for
//! pipeline operations. [`StrataError`] supports single errors, errors with
//! additional detail, and multiple aggregated errors for worker failures.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for strata operations using [`StrataError`].
pub type StrataResult<T> = Result<T, StrataError>;

/// Detailed payload stored for single [`StrataError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for strata operations.
///
/// Carries an [`ErrorKind`] classification so callers can decide between
/// retrying (transient kinds like [`ErrorKind::TransactionConflict`]) and
/// surfacing a defect (kinds like [`ErrorKind::ConstraintViolation`]).
#[derive(Debug, Clone)]
pub struct StrataError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors, mainly from worker failures.
    Many {
        errors: Vec<StrataError>,
        location: &'static Location<'static>,
    },
}

/// Specific categories of errors that can occur during pipeline operations.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Landing errors.
    /// A payload does not conform to the entity schema and cannot be landed.
    /// Fatal for the whole batch; no partial landing occurs.
    SchemaViolation,
    /// The source collaborator failed to deliver or enumerate payloads.
    SourceError,
    /// The durable position marker could not be read or advanced.
    CheckpointError,

    // Resolution errors.
    /// Another resolution transaction is already in flight for the target
    /// table. The losing attempt aborts with no partial effect.
    TransactionConflict,
    /// Resolution would leave more than one current-state row for a business
    /// key. A logic defect, never a transient condition.
    ConstraintViolation,

    // Storage errors.
    StorageError,
    TableMissing,

    // Data errors.
    InvalidData,
    DeserializationError,

    // Configuration and workflow errors.
    ConfigError,
    LandingWorkerPanic,
    IoError,

    // Unknown / uncategorized.
    Unknown,
}

impl StrataError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or
    /// [`ErrorKind::Unknown`] if the list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward the first contained
    /// error as their source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    /// Creates a [`StrataError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        StrataError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl fmt::Display for StrataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, "\n  Detail: {detail}")?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = format!("{error}");
                    for (line_index, line) in rendered.lines().enumerate() {
                        if line_index == 0 {
                            write!(f, "\n  {}. {}", index + 1, line)?;
                        } else {
                            write!(f, "\n     {line}")?;
                        }
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for StrataError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            // For aggregated errors, we forward the first contained error.
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Creates a [`StrataError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for StrataError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> StrataError {
        StrataError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`StrataError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for StrataError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> StrataError {
        StrataError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Creates a [`StrataError`] from a vector of errors for aggregation.
///
/// A vector with exactly one error unwraps to that error directly.
impl<E> From<Vec<E>> for StrataError
where
    E: Into<StrataError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> StrataError {
        let location = Location::caller();

        let mut errors: Vec<StrataError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1 {
            return errors.pop().expect("just checked length is 1");
        }

        StrataError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`std::io::Error`] to [`StrataError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for StrataError {
    #[track_caller]
    fn from(err: std::io::Error) -> StrataError {
        let detail = err.to_string();
        StrataError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] to [`StrataError`].
///
/// Maps to [`ErrorKind::IoError`] for I/O failures and
/// [`ErrorKind::DeserializationError`] otherwise.
impl From<serde_json::Error> for StrataError {
    #[track_caller]
    fn from(err: serde_json::Error) -> StrataError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            _ => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        StrataError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_error_exposes_kind_and_detail() {
        let err = StrataError::from((
            ErrorKind::SchemaViolation,
            "Payload does not match schema",
            "field `qty` is not an integer".to_string(),
        ));

        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert_eq!(err.detail(), Some("field `qty` is not an integer"));
    }

    #[test]
    fn aggregation_of_one_error_unwraps() {
        let err: StrataError =
            vec![StrataError::from((ErrorKind::SourceError, "source failed"))].into();
        assert_eq!(err.kinds(), vec![ErrorKind::SourceError]);
    }

    #[test]
    fn aggregation_collects_all_kinds() {
        let err: StrataError = vec![
            StrataError::from((ErrorKind::SourceError, "source failed")),
            StrataError::from((ErrorKind::CheckpointError, "checkpoint failed")),
        ]
        .into();

        assert_eq!(
            err.kinds(),
            vec![ErrorKind::SourceError, ErrorKind::CheckpointError]
        );
    }
}
