use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// At least one entity must be configured.
    #[error("`entities` cannot be empty")]
    NoEntities,

    /// Entity names double as table name stems and must be unique.
    #[error("entity name `{0}` is configured more than once")]
    DuplicateEntityName(String),

    /// The key column must be part of the declared schema.
    #[error("`key_column` `{key_column}` of entity `{entity}` is not a declared field")]
    KeyColumnNotDeclared { entity: String, key_column: String },

    /// An entity must declare at least one field.
    #[error("entity `{0}` declares no fields")]
    NoFields(String),

    /// Generic invalid field value.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
