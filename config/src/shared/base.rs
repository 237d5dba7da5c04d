use thiserror::Error;

/// Errors returned when a configuration value is structurally valid but semantically wrong.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one table must be configured for synchronization")]
    NoTables,

    #[error("table name at position {0} is blank")]
    BlankTableName(usize),

    #[error("table `{0}` is configured more than once")]
    DuplicateTable(String),

    #[error("`{0}` must be greater than zero")]
    ZeroValue(&'static str),

    #[error("field override `{0}` has an empty source field or column name")]
    InvalidFieldOverride(String),

    #[error("the source base url `{0}` is not an http(s) url")]
    InvalidSourceUrl(String),

    #[error("tls is enabled but no trusted root certificates are configured")]
    MissingTrustedRootCerts,
}
