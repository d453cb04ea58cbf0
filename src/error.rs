use std::path::{Path, PathBuf};

use crate::types::TransferTask;

fn display_path(p: &Path) -> String {
    let s = p.to_string_lossy().to_string();
    if s.contains('\\') { s.replace('\\', "/") } else { s }
}

/// Structured errors raised by the directory-creation coordinator.
#[derive(Debug, Clone)]
pub enum MkdirError {
    /// Target already exists and is a regular file, not a directory.
    ExistsAsFile(PathBuf),
    /// The SFTP layer rejected the mkdir; path and raw message are kept.
    SftpError(PathBuf, String),
}

impl std::fmt::Display for MkdirError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MkdirError::ExistsAsFile(p) => {
                write!(f, "remote path exists as a file, expected a directory: {}", display_path(p))
            }
            MkdirError::SftpError(p, msg) => {
                write!(f, "failed to create remote directory {}: {}", display_path(p), msg)
            }
        }
    }
}

impl std::error::Error for MkdirError {}

/// Errors surfaced by the transfer engine and its components. Variants name a
/// kind from the error taxonomy, not an HTTP-style status; each carries
/// enough context (path, operation) to be reported without further lookups.
#[derive(Debug, Clone)]
pub enum EngineError {
    /// Path does not exist, is the wrong type, or is inaccessible.
    Resolution { path: String, detail: String },
    /// SSH/SFTP layer failure, wrapped with the operation that triggered it.
    Transport { op: String, detail: String },
    /// Local filesystem failure, wrapped with the operation that triggered it.
    LocalIo { op: String, detail: String },
    /// Malformed glob pattern.
    Pattern { pattern: String, detail: String },
    /// A worker thread panicked; the panic payload (or a stand-in message)
    /// plus a captured backtrace are preserved.
    Panic { task: String, payload: String, backtrace: String },
    /// Directory-creation coordinator failure, wrapping an `MkdirError`.
    Mkdir(MkdirError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Resolution { path, detail } => write!(f, "{}: {}", path, detail),
            EngineError::Transport { op, detail } => write!(f, "{}: {}", op, detail),
            EngineError::LocalIo { op, detail } => write!(f, "{}: {}", op, detail),
            EngineError::Pattern { pattern, detail } => {
                write!(f, "invalid glob pattern {:?}: {}", pattern, detail)
            }
            EngineError::Panic { task, payload, backtrace } => {
                write!(f, "worker panicked on {}: {}\n{}", task, payload, backtrace)
            }
            EngineError::Mkdir(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<MkdirError> for EngineError {
    fn from(e: MkdirError) -> Self {
        EngineError::Mkdir(e)
    }
}

impl EngineError {
    pub fn transport(op: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        EngineError::Transport { op: op.into(), detail: detail.to_string() }
    }

    pub fn local_io(op: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        EngineError::LocalIo { op: op.into(), detail: detail.to_string() }
    }

    pub fn resolution(path: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        EngineError::Resolution { path: path.into(), detail: detail.to_string() }
    }

    /// Whether retrying the surrounding operation is plausibly useful.
    /// Conservative: only transport-layer failures are considered transient.
    pub fn is_retriable(&self) -> bool {
        matches!(self, EngineError::Transport { .. })
    }
}

/// The error returned by a batch operation (§4.G/§7) when one or more tasks
/// failed. Preserves every failing task alongside its error and remains
/// introspectable rather than collapsing into one flattened string.
#[derive(Debug)]
pub struct BatchError {
    failures: Vec<(TransferTask, EngineError)>,
}

impl BatchError {
    pub fn new(failures: Vec<(TransferTask, EngineError)>) -> Option<Self> {
        if failures.is_empty() { None } else { Some(BatchError { failures }) }
    }

    pub fn errors(&self) -> &[(TransferTask, EngineError)] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} task(s) failed:", self.failures.len())?;
        for (task, err) in &self.failures {
            writeln!(f, "  {}: {}", task, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}
