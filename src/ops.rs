//! Public operations (component I): the surface exposed to the command
//! dispatcher. Grounded on the donor's `src/transfer.rs::handle_ts` dispatch
//! shape (glob vs. plain vs. directory argument classification) and
//! `transfer/enumeration.rs`'s BFS descent for `Remove`. Everything here
//! resolves its arguments through §4.A before touching the session.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::buffer_pool::BufferPool;
use crate::collector;
use crate::copy;
use crate::dircoord::{self, DirCreationRegistry};
use crate::engine;
use crate::error::{BatchError, EngineError};
use crate::glob;
use crate::session::Session;
use crate::sftp_client::RemoteEntry;
use crate::types::{TransferOptions, TransferTask};

/// Local directory-listing entry, the local-filesystem analogue of
/// `RemoteEntry`.
#[derive(Debug, Clone)]
pub struct LocalEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_file: bool,
    pub size: u64,
}

/// Optional collaborator capability for `ExecuteRemote` (§6). Establishing
/// the underlying SSH session is out of scope (§1); this trait only models
/// the shape the dispatcher needs once one exists.
pub trait RemoteExec: Send + Sync {
    fn exec(
        &self,
        cmd: &str,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<i32, EngineError>;
}

fn parent_of(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
        None => "/".to_string(),
    }
}

fn base_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// The component-I facade: one session, one buffer pool, one directory
/// coordinator. Batch operations return `(successCount, error)` per §6;
/// singleton operations return `error`/`(info, error)`.
pub struct Ops {
    pub session: Session,
    pool: BufferPool,
    dirs: DirCreationRegistry,
    exec: Option<Arc<dyn RemoteExec>>,
}

impl Ops {
    pub fn new(session: Session) -> Self {
        Ops { session, pool: BufferPool::new(), dirs: DirCreationRegistry::new(), exec: None }
    }

    /// Overrides the copy-loop buffer size (§10.3 `buffer_size`).
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.pool = BufferPool::with_size(buffer_size);
        self
    }

    pub fn with_remote_exec(mut self, exec: Arc<dyn RemoteExec>) -> Self {
        self.exec = Some(exec);
        self
    }

    pub fn getwd(&self) -> &str {
        self.session.remote_cwd()
    }

    pub fn get_local_wd(&self) -> &Path {
        self.session.local_cwd()
    }

    pub fn chdir(&mut self, dir: &str) -> Result<(), EngineError> {
        self.session.chdir(dir)
    }

    pub fn local_chdir(&mut self, dir: &str) -> Result<(), EngineError> {
        self.session.local_chdir(dir)
    }

    /// `List(d)` — cache-backed remote directory listing (§4.B).
    pub fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>, EngineError> {
        let resolved = self.session.resolve_remote(dir);
        if let Some(hit) = self.session.cache.get(&resolved) {
            return Ok(hit);
        }
        let entries = self.session.sftp.read_dir(&resolved)?;
        self.session.cache.insert(&resolved, entries.clone());
        Ok(entries)
    }

    /// `LocalList(d)` — no cache; the local filesystem is already fast.
    pub fn local_list(&self, dir: &str) -> Result<Vec<LocalEntry>, EngineError> {
        let resolved = self.session.resolve_local(dir);
        let read = std::fs::read_dir(&resolved)
            .map_err(|e| EngineError::local_io(format!("read_dir {}", resolved.display()), e))?;
        let mut out = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| EngineError::local_io("read_dir entry", e))?;
            let meta = entry.metadata().map_err(|e| EngineError::local_io("stat entry", e))?;
            out.push(LocalEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: meta.is_dir(),
                is_file: meta.is_file(),
                size: meta.len(),
            });
        }
        Ok(out)
    }

    pub fn stat(&self, path: &str) -> Result<crate::sftp_client::RemoteMetadata, EngineError> {
        let resolved = self.session.resolve_remote(path);
        self.session.sftp.stat(&resolved)
    }

    /// `Mkdir(d)` — routed through the directory-creation coordinator so a
    /// concurrent in-flight creation of the same path is shared (§4.D).
    pub fn mkdir(&self, dir: &str) -> Result<(), EngineError> {
        let resolved = self.session.resolve_remote(dir);
        self.dirs.ensure_remote_dir(&self.session, &resolved)
    }

    pub fn local_mkdir(&self, dir: &str) -> Result<(), EngineError> {
        let resolved = self.session.resolve_local(dir);
        std::fs::create_dir_all(&resolved)
            .map_err(|e| EngineError::local_io(format!("mkdir {}", resolved.display()), e))
    }

    /// `Remove(p)` — depth-first descent for directories; aborts on the
    /// first error (§4.I).
    pub fn remove(&self, path: &str) -> Result<(), EngineError> {
        let resolved = self.session.resolve_remote(path);
        self.remove_recursive(&resolved)?;
        self.session.cache.invalidate(&parent_of(&resolved));
        Ok(())
    }

    fn remove_recursive(&self, path: &str) -> Result<(), EngineError> {
        let meta = self.session.sftp.stat(path)?;
        if !meta.is_dir {
            return self.session.sftp.remove(path);
        }
        for entry in self.session.sftp.read_dir(path)? {
            let child = format!("{}/{}", path.trim_end_matches('/'), entry.name);
            if entry.metadata.is_dir {
                self.remove_recursive(&child)?;
            } else {
                self.session.sftp.remove(&child)?;
            }
        }
        self.session.sftp.rmdir(path)?;
        self.session.cache.invalidate(path);
        Ok(())
    }

    /// `Rename(old, new)`.
    pub fn rename(&self, old: &str, new: &str) -> Result<(), EngineError> {
        let old_r = self.session.resolve_remote(old);
        let new_r = self.session.resolve_remote(new);
        self.session.sftp.rename(&old_r, &new_r)?;
        self.session.cache.invalidate(&parent_of(&old_r));
        self.session.cache.invalidate(&parent_of(&new_r));
        Ok(())
    }

    /// `Upload(local, remote)` — single-file copy with progress enabled.
    pub fn upload(&self, local: &str, remote: &str) -> Result<(), EngineError> {
        let local_r = self.session.resolve_local(local);
        let remote_r = self.session.resolve_remote(remote);
        copy::upload_one(&self.session, &self.pool, &local_r, &remote_r, true)?;
        self.session.cache.invalidate(&parent_of(&remote_r));
        Ok(())
    }

    /// `Download(remote, local)` — single-file copy with progress enabled.
    pub fn download(&self, remote: &str, local: &str) -> Result<(), EngineError> {
        let remote_r = self.session.resolve_remote(remote);
        let local_r = self.session.resolve_local(local);
        copy::download_one(&self.session, &self.pool, &remote_r, &local_r, true)?;
        Ok(())
    }

    /// `UploadGlob(pattern, remoteDest, opts)`.
    pub fn upload_glob(
        &self,
        pattern: &str,
        remote_dest: &str,
        opts: &TransferOptions,
    ) -> Result<(usize, Option<BatchError>), EngineError> {
        let matches = glob::local_glob(pattern, self.session.local_cwd(), self.session.local_home())?;
        let remote_dest_r = self.session.resolve_remote(remote_dest);
        let mut tasks: Vec<TransferTask> = Vec::new();
        let mut dir_seeds = vec![remote_dest_r.clone()];

        for m in matches {
            let meta = std::fs::metadata(&m)
                .map_err(|e| EngineError::local_io(format!("stat {}", m.display()), e))?;
            let name = m.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            if meta.is_file() {
                let remote_path = format!("{}/{}", remote_dest_r.trim_end_matches('/'), name);
                tasks.push(TransferTask {
                    local_path: m,
                    remote_path,
                    direction: crate::types::Direction::Upload,
                    size_bytes: Some(meta.len()),
                });
            } else if meta.is_dir() && opts.recursive {
                let sub_remote = format!("{}/{}", remote_dest_r.trim_end_matches('/'), name);
                let batch = collector::collect_upload(&m, &sub_remote, opts.max_depth)?;
                dir_seeds.extend(batch.remote_dirs_needed);
                tasks.extend(batch.tasks);
            }
            // directory match with `!opts.recursive` is skipped (§4.I).
        }

        let dirs_needed = dircoord::collect_remote_dirs(dir_seeds);
        self.dirs.ensure_all(&self.session, &dirs_needed)?;
        for d in &dirs_needed {
            self.session.cache.invalidate(&parent_of(d));
        }
        let (success, err) = engine::execute_tasks(&self.session, &self.pool, tasks, opts);
        Ok((success, err))
    }

    /// `UploadDir(localDir, remoteDir, opts)`.
    pub fn upload_dir(
        &self,
        local_dir: &str,
        remote_dir: &str,
        opts: &TransferOptions,
    ) -> Result<(usize, Option<BatchError>), EngineError> {
        let local_r = self.session.resolve_local(local_dir);
        let remote_r = self.session.resolve_remote(remote_dir);
        let mut batch = collector::collect_upload(&local_r, &remote_r, opts.max_depth)?;
        batch.remote_dirs_needed.push(remote_r.clone());
        let dirs_needed = dircoord::collect_remote_dirs(batch.remote_dirs_needed);
        self.dirs.ensure_all(&self.session, &dirs_needed)?;
        for d in &dirs_needed {
            self.session.cache.invalidate(&parent_of(d));
        }
        let (success, err) = engine::execute_tasks(&self.session, &self.pool, batch.tasks, opts);
        Ok((success, err))
    }

    /// `DownloadDir(remoteDir, localDir, opts)`.
    pub fn download_dir(
        &self,
        remote_dir: &str,
        local_dir: &str,
        opts: &TransferOptions,
    ) -> Result<(usize, Option<BatchError>), EngineError> {
        let remote_r = self.session.resolve_remote(remote_dir);
        let local_r = self.session.resolve_local(local_dir);
        let batch = collector::collect_download(&self.session, &remote_r, &local_r, opts.max_depth)?;
        let (success, err) = engine::execute_tasks(&self.session, &self.pool, batch.tasks, opts);
        Ok((success, err))
    }

    /// `DownloadGlob(pattern, localDest, opts)`.
    pub fn download_glob(
        &self,
        pattern: &str,
        local_dest: &str,
        opts: &TransferOptions,
    ) -> Result<(usize, Option<BatchError>), EngineError> {
        let matches = glob::remote_glob(&*self.session.sftp, self.session.remote_cwd(), pattern)?;
        let local_dest_r = self.session.resolve_local(local_dest);
        std::fs::create_dir_all(&local_dest_r)
            .map_err(|e| EngineError::local_io(format!("create_dir_all {}", local_dest_r.display()), e))?;

        let mut tasks: Vec<TransferTask> = Vec::new();
        for remote_path in matches {
            let meta = self.session.sftp.stat(&remote_path)?;
            let name = base_name(&remote_path).to_string();
            if meta.is_file {
                tasks.push(TransferTask {
                    local_path: local_dest_r.join(&name),
                    remote_path,
                    direction: crate::types::Direction::Download,
                    size_bytes: Some(meta.size),
                });
            } else if meta.is_dir && opts.recursive {
                let sub_local = local_dest_r.join(&name);
                std::fs::create_dir_all(&sub_local)
                    .map_err(|e| EngineError::local_io(format!("create_dir_all {}", sub_local.display()), e))?;
                let batch = collector::collect_download(&self.session, &remote_path, &sub_local, opts.max_depth)?;
                tasks.extend(batch.tasks);
            }
            // directory match with `!opts.recursive` is skipped (§4.I).
        }
        let (success, err) = engine::execute_tasks(&self.session, &self.pool, tasks, opts);
        Ok((success, err))
    }

    /// `ListCompletion(prefix)` — candidate path strings for tab completion.
    /// Rendering/interaction is a collaborator concern (§1); this only
    /// resolves and filters.
    pub fn list_completion(&self, prefix: &str) -> Result<Vec<String>, EngineError> {
        let (dir_part, name_part) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..=idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };
        let dir = if dir_part.is_empty() { self.session.remote_cwd().to_string() } else { self.session.resolve_remote(dir_part) };
        let entries = self.list(&dir)?;
        Ok(entries
            .into_iter()
            .filter(|e| e.name.starts_with(name_part))
            .map(|e| {
                let path = format!("{dir_part}{}", e.name);
                if e.metadata.is_dir { format!("{path}/") } else { path }
            })
            .collect())
    }

    /// `ExecuteRemote(cmd, stdin, stdout, stderr)`.
    pub fn execute_remote(
        &self,
        cmd: &str,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<i32, EngineError> {
        match &self.exec {
            Some(exec) => exec.exec(cmd, stdin, stdout, stderr),
            None => Err(EngineError::transport("exec", "no remote command executor configured")),
        }
    }

    /// `ClearDirCache()`.
    pub fn clear_dir_cache(&self) {
        self.session.cache.clear();
    }
}

/// Appends one JSON line per failure to `path`, each carrying a run
/// timestamp, the failing task's direction/local/remote path, and the
/// error message. Grounded on the donor's
/// `util::write_failures_structured` JSONL idiom; non-fatal (best-effort,
/// errors are swallowed the way the donor's writer does).
pub fn write_failures_jsonl(path: &Path, err: &BatchError) {
    use std::fs::OpenOptions;
    use std::io::Write as _;

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let timestamp = chrono::Utc::now().to_rfc3339();
    for (task, e) in err.errors() {
        let obj = serde_json::json!({
            "timestamp": timestamp,
            "direction": task.direction.to_string(),
            "local_path": task.local_path.to_string_lossy(),
            "remote_path": task.remote_path,
            "message": e.to_string(),
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(f, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp_client::{RemoteMetadata, SftpClient};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TreeSftp {
        files: Mutex<HashMap<String, Vec<u8>>>,
        dirs: Mutex<HashMap<String, Vec<RemoteEntry>>>,
    }

    impl SftpClient for TreeSftp {
        fn stat(&self, path: &str) -> Result<RemoteMetadata, EngineError> {
            if let Some(data) = self.files.lock().unwrap().get(path) {
                return Ok(RemoteMetadata { is_dir: false, is_file: true, size: data.len() as u64 });
            }
            if self.dirs.lock().unwrap().contains_key(path) || path == "/" {
                return Ok(RemoteMetadata { is_dir: true, is_file: false, size: 0 });
            }
            Err(EngineError::resolution(path, "not found"))
        }
        fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, EngineError> {
            Ok(self.dirs.lock().unwrap().get(path).cloned().unwrap_or_default())
        }
        fn mkdir(&self, path: &str) -> Result<(), EngineError> {
            self.dirs.lock().unwrap().entry(path.to_string()).or_default();
            Ok(())
        }
        fn rmdir(&self, path: &str) -> Result<(), EngineError> {
            self.dirs.lock().unwrap().remove(path);
            Ok(())
        }
        fn remove(&self, path: &str) -> Result<(), EngineError> {
            self.files.lock().unwrap().remove(path);
            Ok(())
        }
        fn rename(&self, _old: &str, _new: &str) -> Result<(), EngineError> {
            Ok(())
        }
        fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, EngineError> {
            let data = self.files.lock().unwrap().get(path).cloned().ok_or_else(|| EngineError::resolution(path, "not found"))?;
            Ok(Box::new(Cursor::new(data)))
        }
        fn create_write(&self, _path: &str) -> Result<Box<dyn Write + Send>, EngineError> {
            Ok(Box::new(Vec::new()))
        }
        fn getwd(&self) -> Result<String, EngineError> {
            Ok("/".to_string())
        }
    }

    fn entry(name: &str, is_dir: bool) -> RemoteEntry {
        RemoteEntry { name: name.to_string(), metadata: RemoteMetadata { is_dir, is_file: !is_dir, size: 0 } }
    }

    #[test]
    fn remove_recursive_deletes_depth_first() {
        let sftp = Arc::new(TreeSftp::default());
        sftp.dirs.lock().unwrap().insert("/a".to_string(), vec![entry("b", true), entry("f.txt", false)]);
        sftp.dirs.lock().unwrap().insert("/a/b".to_string(), Vec::new());
        sftp.files.lock().unwrap().insert("/a/f.txt".to_string(), b"x".to_vec());

        let session = Session::new(sftp.clone(), Some("/".to_string()), Some(PathBuf::from("/")));
        let ops = Ops::new(session);
        ops.remove("/a").unwrap();

        assert!(!sftp.dirs.lock().unwrap().contains_key("/a"));
        assert!(!sftp.dirs.lock().unwrap().contains_key("/a/b"));
        assert!(!sftp.files.lock().unwrap().contains_key("/a/f.txt"));
    }

    #[test]
    fn list_completion_filters_by_prefix() {
        let sftp = Arc::new(TreeSftp::default());
        sftp.dirs.lock().unwrap().insert("/".to_string(), vec![entry("app.log", false), entry("archive", true), entry("other.txt", false)]);
        let session = Session::new(sftp, Some("/".to_string()), Some(PathBuf::from("/")));
        let ops = Ops::new(session);

        let mut candidates = ops.list_completion("ap").unwrap();
        candidates.sort();
        assert_eq!(candidates, vec!["app.log".to_string(), "archive/".to_string()]);
    }
}
