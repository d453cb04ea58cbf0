//! Shared data model (§3): the value types that flow between the collector,
//! the engine, and the copy primitive.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

/// A single file transfer, already fully resolved. Immutable after creation.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub local_path: std::path::PathBuf,
    pub remote_path: String,
    pub direction: Direction,
    pub size_bytes: Option<u64>,
}

impl fmt::Display for TransferTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Upload => write!(f, "{} -> {}", self.local_path.display(), self.remote_path),
            Direction::Download => write!(f, "{} -> {}", self.remote_path, self.local_path.display()),
        }
    }
}

/// Configuration for a single batch (§3). Defaults match the spec's stated
/// defaults, not the donor's CLI defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub recursive: bool,
    pub show_progress: bool,
    pub concurrency: usize,
    pub max_depth: i64,
}

impl Default for TransferOptions {
    fn default() -> Self {
        TransferOptions { recursive: true, show_progress: true, concurrency: 4, max_depth: -1 }
    }
}

/// The outcome of a task collection walk: the flat task list plus the set of
/// remote directories that must exist before uploads in it can run (§4.F).
#[derive(Debug, Default)]
pub struct CollectedBatch {
    pub tasks: Vec<TransferTask>,
    pub remote_dirs_needed: Vec<String>,
}
