//! Task collector (component F): two symmetric recursive walks, one per
//! direction, sharing a depth contract. Grounded on the donor's
//! `transfer/enumeration.rs` (`enumerate_local_sources` /
//! `enumerate_remote_and_push`), generalized to the `maxDepth` contract and
//! rewritten against `SftpClient` instead of `ssh2::Sftp` directly.

use std::path::{Path, PathBuf};

use crate::dircoord::collect_remote_dirs;
use crate::error::EngineError;
use crate::session::Session;
use crate::types::{CollectedBatch, Direction, TransferTask};

fn descend(current_depth: i64, max_depth: i64) -> bool {
    max_depth < 0 || current_depth < max_depth
}

/// Walk `local_root` and emit one `TransferTask` per regular file found
/// underneath it, destined for the mirrored path under `remote_root`.
/// Remote directory materialization is deferred (§4.F) — the caller runs
/// the returned `remote_dirs_needed` through the directory coordinator.
pub fn collect_upload(
    local_root: &Path,
    remote_root: &str,
    max_depth: i64,
) -> Result<CollectedBatch, EngineError> {
    let mut tasks = Vec::new();
    walk_local(local_root, remote_root, 0, max_depth, &mut tasks)?;
    let mut dir_seeds: Vec<String> = tasks
        .iter()
        .filter_map(|t| parent_remote(&t.remote_path))
        .collect();
    dir_seeds.push(remote_root.to_string());
    let remote_dirs_needed = collect_remote_dirs(dir_seeds);
    Ok(CollectedBatch { tasks, remote_dirs_needed })
}

fn parent_remote(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    if idx == 0 { Some("/".to_string()) } else { Some(trimmed[..idx].to_string()) }
}

fn walk_local(
    local_dir: &Path,
    remote_dir: &str,
    current_depth: i64,
    max_depth: i64,
    out: &mut Vec<TransferTask>,
) -> Result<(), EngineError> {
    let read = std::fs::read_dir(local_dir)
        .map_err(|e| EngineError::local_io(format!("read_dir {}", local_dir.display()), e))?;
    for entry in read {
        let entry = entry.map_err(|e| EngineError::local_io("read_dir entry", e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let remote_child = format!("{}/{}", remote_dir.trim_end_matches('/'), name);
        let file_type = entry
            .file_type()
            .map_err(|e| EngineError::local_io(format!("file_type {}", path.display()), e))?;
        if file_type.is_dir() {
            if descend(current_depth, max_depth) {
                walk_local(&path, &remote_child, current_depth + 1, max_depth, out)?;
            }
        } else if file_type.is_file() {
            let size = std::fs::metadata(&path).ok().map(|m| m.len());
            out.push(TransferTask {
                local_path: path,
                remote_path: remote_child,
                direction: Direction::Upload,
                size_bytes: size,
            });
        }
    }
    Ok(())
}

/// Walk `remote_root` and emit one `TransferTask` per regular file found
/// underneath it, destined for the mirrored path under `local_root`. Local
/// directories are created eagerly during the walk (§4.F) so the
/// destination tree exists before any worker starts writing.
pub fn collect_download(
    session: &Session,
    remote_root: &str,
    local_root: &Path,
    max_depth: i64,
) -> Result<CollectedBatch, EngineError> {
    std::fs::create_dir_all(local_root)
        .map_err(|e| EngineError::local_io(format!("create_dir_all {}", local_root.display()), e))?;
    let mut tasks = Vec::new();
    walk_remote(session, remote_root, local_root, 0, max_depth, &mut tasks)?;
    Ok(CollectedBatch { tasks, remote_dirs_needed: Vec::new() })
}

fn walk_remote(
    session: &Session,
    remote_dir: &str,
    local_dir: &Path,
    current_depth: i64,
    max_depth: i64,
    out: &mut Vec<TransferTask>,
) -> Result<(), EngineError> {
    let entries = session.sftp.read_dir(remote_dir)?;
    for entry in entries {
        let remote_child = format!("{}/{}", remote_dir.trim_end_matches('/'), entry.name);
        let local_child = local_dir.join(&entry.name);
        if entry.metadata.is_dir {
            if descend(current_depth, max_depth) {
                std::fs::create_dir_all(&local_child).map_err(|e| {
                    EngineError::local_io(format!("create_dir_all {}", local_child.display()), e)
                })?;
                walk_remote(session, &remote_child, &local_child, current_depth + 1, max_depth, out)?;
            }
        } else if entry.metadata.is_file {
            out.push(TransferTask {
                local_path: local_child,
                remote_path: remote_child,
                direction: Direction::Download,
                size_bytes: Some(entry.metadata.size),
            });
        }
    }
    Ok(())
}
