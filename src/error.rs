use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a run before any row is touched.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("reference table {0:?} does not exist")]
    ReferenceMissing(PathBuf),
    #[error("reference table {path:?} could not be read: {reason}")]
    ReferenceUnreadable { path: PathBuf, reason: String },
    #[error("reference table {path:?} has {found} column(s); at least {required} are required")]
    ReferenceTooNarrow {
        path: PathBuf,
        found: usize,
        required: usize,
    },
    #[error("no column of the reference table looks like a {role}")]
    ReferenceRoleUndetected { role: &'static str },
    #[error("source table {path:?} could not be read: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },
    #[error(
        "{path:?} is a binary spreadsheet ('.{extension}'); export it as CSV (UTF-8 or Windows-1252) first"
    )]
    UnsupportedFormat { path: PathBuf, extension: String },
}
