use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Path security
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathViolation {
    NullByte,
    AbsolutePath,
    Traversal,
    SymlinkEscape,
}

impl PathViolation {
    pub fn code(self) -> &'static str {
        match self {
            PathViolation::NullByte => "NULL_BYTE",
            PathViolation::AbsolutePath => "ABSOLUTE_PATH_REJECTED",
            PathViolation::Traversal => "TRAVERSAL_ATTEMPT",
            PathViolation::SymlinkEscape => "SYMLINK_ESCAPE",
        }
    }
}

impl fmt::Display for PathViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{violation}: '{candidate}' is not contained in {}", .base.display())]
pub struct PathSecurityError {
    pub violation: PathViolation,
    pub base: PathBuf,
    /// Candidate as supplied, with NUL bytes rendered as `\0`.
    pub candidate: String,
}

impl PathSecurityError {
    pub fn new(violation: PathViolation, base: impl Into<PathBuf>, candidate: &str) -> Self {
        Self {
            violation,
            base: base.into(),
            candidate: candidate.replace('\0', "\\0"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command argument security
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Branch,
    CommitMessage,
    Tag,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Branch => "branch",
            FieldKind::CommitMessage => "commit message",
            FieldKind::Tag => "tag",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What made a value unacceptable for the git command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offense {
    /// A character outside the allow-list (or inside the block-list).
    Char { ch: char, offset: usize },
    /// A forbidden sequence such as `..` or a leading `-`.
    Pattern(&'static str),
    Empty,
    TooLong { len: usize, max: usize },
}

impl fmt::Display for Offense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offense::Char { ch, offset } => {
                write!(f, "disallowed character {:?} at offset {offset}", ch)
            }
            Offense::Pattern(p) => write!(f, "disallowed pattern {p}"),
            Offense::Empty => f.write_str("value is empty"),
            Offense::TooLong { len, max } => write!(f, "length {len} exceeds {max}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("COMMAND_INJECTION: {kind} rejected, {offense}")]
pub struct GitSecurityError {
    pub kind: FieldKind,
    pub offense: Offense,
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    SecurityViolation,
    ResourceContention,
    /// Repaired in place; reported through `Allocation::Repaired`, never as an error.
    DataCorruption,
    Other,
}

// ---------------------------------------------------------------------------
// SpecflowError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SpecflowError {
    #[error("not initialized: run 'specflow init'")]
    NotInitialized,

    #[error(transparent)]
    PathSecurity(#[from] PathSecurityError),

    #[error(transparent)]
    CommandInjection(#[from] GitSecurityError),

    #[error("timed out after {waited:?} waiting for lock on {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("counter at {} cannot be incremented past {value}", .path.display())]
    CounterOverflow { path: PathBuf, value: u64 },

    #[error("feature not found: {0}")]
    FeatureNotFound(String),

    #[error("feature already exists: {0}")]
    FeatureExists(String),

    #[error("artifact already exists: {}", .0.display())]
    ArtifactExists(PathBuf),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("unknown artifact kind: {0}")]
    UnknownArtifact(String),

    #[error("git executable not found on PATH")]
    GitNotFound,

    #[error("git {command} failed ({status}): {stderr}")]
    GitFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SpecflowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SpecflowError::PathSecurity(_) | SpecflowError::CommandInjection(_) => {
                ErrorCategory::SecurityViolation
            }
            SpecflowError::LockTimeout { .. } => ErrorCategory::ResourceContention,
            _ => ErrorCategory::Other,
        }
    }

    /// Stable reason code for security and contention errors.
    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            SpecflowError::PathSecurity(e) => Some(e.violation.code()),
            SpecflowError::CommandInjection(_) => Some("COMMAND_INJECTION"),
            SpecflowError::LockTimeout { .. } => Some("LOCK_TIMEOUT"),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::ResourceContention
    }
}

pub type Result<T> = std::result::Result<T, SpecflowError>;
