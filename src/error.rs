use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

/// Where a declaration or handler was found: unit path plus approximate position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceLocation {
    pub unit: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(unit: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            unit: unit.into(),
            line,
            column,
        }
    }

    /// Location of a whole unit, used when no finer position is known.
    pub fn unit(unit: impl Into<PathBuf>) -> Self {
        Self::new(unit, 0, 0)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.unit.display(), self.line, self.column)
    }
}

/// Error types for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error("{location}: unsupported type: {detail}")]
    UnsupportedType {
        location: SourceLocation,
        detail: String,
    },

    #[error("{location}: unbound type parameter `{name}`")]
    UnboundTypeParameter {
        location: SourceLocation,
        name: String,
    },

    #[error("{location}: unresolved type reference `{name}`")]
    UnresolvedReference {
        location: SourceLocation,
        name: String,
    },

    #[error("{location}: expanding `{base}` exceeds the generic depth limit of {limit}")]
    RecursionLimit {
        location: SourceLocation,
        base: String,
        limit: usize,
    },

    #[error("{location}: invalid route: {detail}")]
    RouteValidation {
        location: SourceLocation,
        detail: String,
    },

    #[error("{location}: schema conflict on `{id}`: {detail}")]
    SchemaConflict {
        location: SourceLocation,
        id: String,
        detail: String,
    },

    #[error("schema registry corrupted: id `{id}` was filled with two different schemas")]
    RegistryCorruption { id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error in {file}: {message}")]
    Parse { file: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub fn route(location: &SourceLocation, detail: impl Into<String>) -> Self {
        Error::RouteValidation {
            location: location.clone(),
            detail: detail.into(),
        }
    }

    pub fn unsupported(location: &SourceLocation, detail: impl Into<String>) -> Self {
        Error::UnsupportedType {
            location: location.clone(),
            detail: detail.into(),
        }
    }

    /// Fatal errors abort the run immediately instead of being collected.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::RegistryCorruption { .. })
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Error::UnsupportedType { location, .. }
            | Error::UnboundTypeParameter { location, .. }
            | Error::UnresolvedReference { location, .. }
            | Error::RecursionLimit { location, .. }
            | Error::RouteValidation { location, .. }
            | Error::SchemaConflict { location, .. } => Some(location),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}

/// Every diagnostic collected during one generation run.
#[derive(Debug, Default)]
pub struct Diagnostics(pub Vec<Error>);

impl Diagnostics {
    pub fn push(&mut self, error: Error) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "generation failed with {} diagnostic(s):", self.0.len())?;
        for error in &self.0 {
            writeln!(f, "  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl From<Error> for Diagnostics {
    fn from(error: Error) -> Self {
        Diagnostics(vec![error])
    }
}
