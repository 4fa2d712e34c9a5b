//! Typed failure kinds that callers may want to tell apart. The store and the
//! importer still return `anyhow::Result` so every SQL step can carry its own
//! context; these enums travel inside that chain and can be recovered with
//! `anyhow::Error::downcast_ref`.

use std::path::PathBuf;

use thiserror::Error;

/// Precondition violations raised by the template data model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The supplied field names differ from the placeholders in the body. The
    /// keys are the symmetric difference, sorted.
    #[error("{keys:?} not in source and destination")]
    KeyMismatch { keys: Vec<String> },
    /// A field was left empty while filling the template in.
    #[error("Value for key: [{key}] is required")]
    ValueRequired { key: String },
    /// Rendering was requested before every placeholder had a value.
    #[error("Field [{name}] has no value")]
    UnfilledField { name: String },
}

/// Failures specific to the template store handle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Attempted to use a template id without first setting it")]
    MissingIdentifier,
    #[error("Attempted to load schema definition file at {}, file not found", path.display())]
    SchemaSourceMissing { path: PathBuf },
    #[error("The template store has been closed")]
    Closed,
    #[error("Template not found")]
    NotFound,
}

/// Failures raised while reading a spreadsheet for import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Cannot import from {}: {reason}", path.display())]
    InvalidImportSource { path: PathBuf, reason: String },
}
