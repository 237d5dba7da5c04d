//! Error types and result definitions for sync operations.
//!
//! [`SyncError`] carries a classified [`ErrorKind`], a static description, optional dynamic
//! detail and the originating error. Several errors can be aggregated into one, which is how a
//! table sync reports every failed schema change at once.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for sync operations using [`SyncError`] as the error type.
pub type SyncResult<T> = Result<T, SyncError>;

/// Detailed payload stored for single [`SyncError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for sync operations.
#[derive(Debug, Clone)]
pub struct SyncError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Multiple aggregated errors, e.g. every failed change of one table.
    Many {
        errors: Vec<SyncError>,
        location: &'static Location<'static>,
    },
}

/// Categories of failures, split by the side of the sync they happened on.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source errors
    SourceConnectionFailed,
    SourceQueryFailed,
    SourceTimeout,
    SourceRecordMissing,
    SourceError,

    // Target errors
    TargetConnectionFailed,
    TargetQueryFailed,
    TargetTimeout,
    TargetSchemaError,
    TargetColumnPending,
    IncompatibleColumnType,
    ConstraintViolation,

    // Data errors
    ConversionError,
    InvalidData,
    SerializationError,
    DeserializationError,

    // Configuration & state errors
    ConfigError,
    InvalidState,
    SyncInProgress,
    OrchestratorTaskPanic,

    // IO & security
    IoError,
    AuthenticationError,

    Unknown,
}

impl SyncError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the list is empty.
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

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { .. } => "Multiple errors occurred",
        }
    }

    /// Returns the dynamic detail if available.
    ///
    /// For aggregated errors, returns the detail of the first error that has one.
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

    /// Returns a single-line message suitable for storing in the sync log.
    ///
    /// Unlike [`fmt::Display`] it carries neither the location nor the backtrace.
    pub fn log_message(&self) -> String {
        match &self.repr {
            ErrorRepr::Single(payload) => match payload.detail.as_deref() {
                Some(detail) => format!("{}: {}", payload.description, detail),
                None => payload.description.to_string(),
            },
            ErrorRepr::Many { errors, .. } => errors
                .iter()
                .map(SyncError::log_message)
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// Attaches an originating error to this error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
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

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SyncError {
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
                    write!(f, "\n  Detail:")?;
                    for line in detail.lines() {
                        write!(f, "\n    {line}")?;
                    }
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write!(f, "\n  Backtrace:")?;
                    for line in backtrace.lines() {
                        write!(f, "\n    {line}")?;
                    }
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
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    if let Some(first_line) = lines.next() {
                        write!(f, "\n  {}. {}", index + 1, first_line)?;
                    }
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Creates a [`SyncError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SyncError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned as is.
impl<E> From<Vec<E>> for SyncError
where
    E: Into<SyncError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SyncError {
        let location = Location::caller();

        let mut errors: Vec<SyncError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1 {
            return errors.remove(0);
        }

        SyncError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for SyncError {
    #[track_caller]
    fn from(err: std::io::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] to [`SyncError`] with the appropriate error kind.
impl From<serde_json::Error> for SyncError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SyncError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<chrono::ParseError> for SyncError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Datetime parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<config::shared::ValidationError> for SyncError {
    #[track_caller]
    fn from(err: config::shared::ValidationError) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid sync configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Classifies a Postgres SQLSTATE code.
fn classify_sqlstate(code: &str) -> (ErrorKind, &'static str) {
    match code {
        "57014" => (ErrorKind::TargetTimeout, "Postgres statement timed out"),
        "42P01" | "42703" | "3F000" => (
            ErrorKind::TargetSchemaError,
            "Postgres schema object not found",
        ),
        "42804" | "42846" => (
            ErrorKind::IncompatibleColumnType,
            "Postgres column type is incompatible",
        ),
        _ => match code.get(..2).unwrap_or(code) {
            "08" | "53" | "57" => (
                ErrorKind::TargetConnectionFailed,
                "Postgres connection failed",
            ),
            "23" => (
                ErrorKind::ConstraintViolation,
                "Postgres constraint violation",
            ),
            "22" => (
                ErrorKind::IncompatibleColumnType,
                "Postgres data conversion failed",
            ),
            "28" => (
                ErrorKind::AuthenticationError,
                "Postgres authentication failed",
            ),
            _ => (ErrorKind::TargetQueryFailed, "Postgres query failed"),
        },
    }
}

/// Converts [`sqlx::Error`] to [`SyncError`].
///
/// Database errors are classified by SQLSTATE. Pool and transport errors map to
/// [`ErrorKind::TargetConnectionFailed`].
impl From<sqlx::Error> for SyncError {
    #[track_caller]
    fn from(err: sqlx::Error) -> SyncError {
        let (kind, description) = match &err {
            sqlx::Error::Database(db_error) => match db_error.code() {
                Some(code) => classify_sqlstate(&code),
                None => (ErrorKind::TargetQueryFailed, "Postgres query failed"),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut => (
                ErrorKind::TargetConnectionFailed,
                "Postgres connection failed",
            ),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => (
                ErrorKind::ConversionError,
                "Postgres value decoding failed",
            ),
            sqlx::Error::RowNotFound => (ErrorKind::InvalidState, "Postgres row not found"),
            _ => (ErrorKind::TargetQueryFailed, "Postgres query failed"),
        };

        let detail = err.to_string();
        SyncError::from_components(
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
    use crate::{bail, sync_error};

    #[test]
    fn single_error_keeps_kind_and_detail() {
        let err = sync_error!(ErrorKind::InvalidData, "Bad record", "rec_1");

        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.detail(), Some("rec_1"));
        assert_eq!(err.log_message(), "Bad record: rec_1");
    }

    #[test]
    fn aggregate_of_one_is_unwrapped() {
        let err = SyncError::from(vec![sync_error!(ErrorKind::TargetTimeout, "Timed out")]);

        assert_eq!(err.kinds(), vec![ErrorKind::TargetTimeout]);
        assert_eq!(err.description(), "Timed out");
    }

    #[test]
    fn aggregate_collects_kinds_in_order() {
        let err = SyncError::from(vec![
            sync_error!(ErrorKind::ConstraintViolation, "Duplicate"),
            sync_error!(ErrorKind::IncompatibleColumnType, "Cast failed", "year"),
        ]);

        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(
            err.kinds(),
            vec![
                ErrorKind::ConstraintViolation,
                ErrorKind::IncompatibleColumnType
            ]
        );
        assert_eq!(err.detail(), Some("year"));
        assert_eq!(err.log_message(), "Duplicate; Cast failed: year");
    }

    #[test]
    fn bail_returns_early() {
        fn check(value: u32) -> SyncResult<u32> {
            if value == 0 {
                bail!(ErrorKind::InvalidData, "Value must not be zero");
            }
            Ok(value)
        }

        assert_eq!(check(3), Ok(3));
        assert_eq!(check(0).unwrap_err().kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn sqlstate_classes_map_to_target_kinds() {
        assert_eq!(classify_sqlstate("23505").0, ErrorKind::ConstraintViolation);
        assert_eq!(classify_sqlstate("22P02").0, ErrorKind::IncompatibleColumnType);
        assert_eq!(classify_sqlstate("42703").0, ErrorKind::TargetSchemaError);
        assert_eq!(classify_sqlstate("08006").0, ErrorKind::TargetConnectionFailed);
        assert_eq!(classify_sqlstate("57014").0, ErrorKind::TargetTimeout);
        assert_eq!(classify_sqlstate("42601").0, ErrorKind::TargetQueryFailed);
    }
}
