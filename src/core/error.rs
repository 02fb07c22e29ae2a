use crate::record::Record;
use crate::validation::ValidationErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StiError {
    #[error("Hierarchy configuration error: {0}")]
    HierarchyConfig(String),

    #[error("Entity type '{0}' is not registered in the hierarchy")]
    UnknownEntity(String),

    #[error("Discriminator value '{value}' is shared by '{first}' and '{second}'")]
    DiscriminatorCollision {
        value: String,
        first: String,
        second: String,
    },

    #[error("Query kind '{kind}' used by '{entity}' is not STI-aware")]
    UnsupportedQueryType { entity: String, kind: String },

    #[error("Can not become '{to}'. Check STI settings for '{from}'")]
    ConversionTargetInvalid { from: String, to: String },

    #[error("Record does not satisfy validation rules of '{entity}' it becomes: {errors}")]
    ConversionValidationFailed {
        entity: String,
        errors: ValidationErrors,
    },

    #[error("Error during STI column save for '{entity}': {reason}")]
    ConversionPersistenceFailed { entity: String, reason: String },

    #[error("Validation failed for '{entity}': {errors}")]
    ValidationFailed {
        entity: String,
        errors: ValidationErrors,
    },

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Record with key {key} not found in table '{table}'")]
    RecordNotFound { table: String, key: String },

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StiError>;

impl<T> From<std::sync::PoisonError<T>> for StiError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

/// Failure of a `becomes` conversion.
///
/// The source record is handed back untouched in a persisted sense, so the
/// caller keeps ownership of it after a failed conversion.
#[derive(Error, Debug)]
#[error("Record of '{}' could not be converted", .record.entity())]
pub struct BecomeError {
    #[source]
    pub error: StiError,
    pub record: Box<Record>,
}

impl BecomeError {
    pub fn new(error: StiError, record: Record) -> Self {
        Self {
            error,
            record: Box::new(record),
        }
    }

    pub fn into_parts(self) -> (StiError, Record) {
        (self.error, *self.record)
    }
}

impl From<BecomeError> for StiError {
    fn from(err: BecomeError) -> Self {
        err.error
    }
}
