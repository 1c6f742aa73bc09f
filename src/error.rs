use thiserror::Error;

/// Error taxonomy for the Libretto graph core.
///
/// Variants are kinds, not wrapped type names: every fallible operation in
/// `Store`, `GraphWrite`, `CrossProject`, and `Query` returns one of these.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("logical id {logical_id:?} is not present in version {version_id}")]
    NotInVersion { version_id: i64, logical_id: String },

    #[error("relationship endpoint {logical_id:?} is not present in version {version_id}")]
    EndpointNotInVersion { version_id: i64, logical_id: String },

    #[error("logical id {logical_id:?} already exists in version {version_id}")]
    LogicalIdExists { version_id: i64, logical_id: String },

    #[error("relationship ({from}, {to}, {relationship_type:?}) already exists in version {version_id}")]
    RelationshipExists {
        version_id: i64,
        from: i64,
        to: i64,
        relationship_type: String,
    },

    #[error("project {project_id} has entities shared with other projects: {shared:?}")]
    SharedEntityConflict {
        project_id: i64,
        shared: Vec<String>,
    },

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("transient store failure, safe to retry: {0}")]
    Retriable(String),

    #[error("fatal store error: {0}")]
    Fatal(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ffi::ErrorCode;

        if let rusqlite::Error::SqliteFailure(sql_err, ref msg) = e {
            match sql_err.code {
                ErrorCode::ConstraintViolation => {
                    return Error::IntegrityViolation(
                        msg.clone().unwrap_or_else(|| sql_err.to_string()),
                    );
                }
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    return Error::Retriable(
                        msg.clone().unwrap_or_else(|| sql_err.to_string()),
                    );
                }
                _ => {}
            }
        }
        if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            return Error::NotFound(e.to_string());
        }
        Error::Fatal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
