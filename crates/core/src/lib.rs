//! Core shared types and errors (renderer-agnostic).
//!
//! Loading in this workspace distinguishes two outcomes: fatal errors, which
//! are returned as [`CoreError`], and degraded loads, where the same error
//! values are collected into [`Diagnostics`] and attached to the result.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

pub use glam::{Mat4, Vec3, vec3};

pub mod bounds;

pub use bounds::Aabb;

/// Coarse classification shared by fatal errors and collected warnings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A source file could not be opened or read.
    Io,
    /// Binary or text content is inconsistent with its declared layout.
    Format,
    /// An image decoded to something the GPU path cannot take.
    UnsupportedFormat,
    /// A caller released something it never acquired.
    Misuse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Io => "io",
            ErrorKind::Format => "format",
            ErrorKind::UnsupportedFormat => "unsupported-format",
            ErrorKind::Misuse => "misuse",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Format error: {0}")]
    Format(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Misuse: {0}")]
    Misuse(String),
}

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Io { .. } => ErrorKind::Io,
            CoreError::Format(_) => ErrorKind::Format,
            CoreError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            CoreError::Misuse(_) => ErrorKind::Misuse,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Non-fatal problems collected while loading.
///
/// Every pushed warning is also logged at `warn` level, so callers that only
/// care about logs lose nothing by ignoring the collection.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<CoreError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: CoreError) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Moves all warnings from `other` into `self` without logging them again.
    pub fn append(&mut self, other: &mut Diagnostics) {
        self.warnings.append(&mut other.warnings);
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoreError> {
        self.warnings.iter()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.warnings.iter().filter(|w| w.kind() == kind).count()
    }
}
