use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by map loading, drawing and saving.
#[derive(Debug, Error)]
pub enum TopoError {
    /// A file could not be opened, read or written.
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data or translation row is malformed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A user supplied parameter is missing or out of range.
    #[error("invalid {name} `{value}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A draw was requested before any data was loaded.
    #[error("no data loaded")]
    NoData,

    /// A save was requested before any map was drawn.
    #[error("no map drawn")]
    NoMap,

    #[error("font error: {0}")]
    Font(String),

    #[error("render error: {0}")]
    Render(String),
}

impl TopoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Key of the translated message describing this error class.
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::Io { .. } => "error.io",
            Self::Parse { .. } => "error.parse",
            Self::InvalidParameter { .. } => "error.parameter",
            Self::NoData => "info.no_data",
            Self::NoMap => "info.no_map",
            Self::Font(_) => "error.font",
            Self::Render(_) => "error.render",
        }
    }
}

/// Convenience alias for results using [`TopoError`].
pub type Result<T> = std::result::Result<T, TopoError>;
