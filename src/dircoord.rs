//! Directory-creation coordinator (component D): idempotent `mkdir -p` over
//! the remote tree, collapsing concurrent duplicate requests via a
//! singleflight-style registry (§9 "map of path → future/promise").
//! Grounded on the donor's `ensure_remote_dir_all_generic` (mkdir-p over
//! path components, re-stat-on-mkdir-failure race handling).

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::EngineError;
use crate::sftp_client::SftpClient;
use crate::session::Session;

enum Slot {
    Pending,
    Done(Result<(), EngineError>),
}

/// Deduplicates in-flight creation calls keyed by resolved remote path. The
/// first caller for a given path becomes the executor; concurrent callers
/// with the same key block on the executor's `Condvar` and share its result.
#[derive(Default)]
pub struct DirCreationRegistry {
    inflight: Mutex<HashMap<String, Arc<(Mutex<Slot>, Condvar)>>>,
}

impl DirCreationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ensureRemoteDir(p)`: guarantees that after returning `Ok`, `p` exists
    /// and is a directory. `p` must already be resolved/cleaned.
    pub fn ensure_remote_dir(&self, session: &Session, p: &str) -> Result<(), EngineError> {
        // Fast path.
        if let Ok(meta) = session.sftp.stat(p) {
            if meta.is_dir {
                return Ok(());
            }
        }

        let (slot_arc, is_executor) = {
            let mut map = self.inflight.lock().unwrap();
            if let Some(existing) = map.get(p) {
                (existing.clone(), false)
            } else {
                let fresh = Arc::new((Mutex::new(Slot::Pending), Condvar::new()));
                map.insert(p.to_string(), fresh.clone());
                (fresh, true)
            }
        };

        if !is_executor {
            tracing::debug!(path = p, "following in-flight directory creation");
            let (lock, cvar) = &*slot_arc;
            let mut guard = lock.lock().unwrap();
            while matches!(*guard, Slot::Pending) {
                guard = cvar.wait(guard).unwrap();
            }
            return match &*guard {
                Slot::Done(r) => r.clone(),
                Slot::Pending => unreachable!(),
            };
        }

        tracing::info!(path = p, "creating remote directory");
        let result = self.slow_path(session, p);

        {
            let mut guard = slot_arc.0.lock().unwrap();
            *guard = Slot::Done(result.clone());
        }
        slot_arc.1.notify_all();
        self.inflight.lock().unwrap().remove(p);

        if result.is_ok() {
            if let Some(parent) = parent_of(p) {
                session.cache.invalidate(&parent);
            }
        }
        result
    }

    fn slow_path(&self, session: &Session, p: &str) -> Result<(), EngineError> {
        // Re-check: another caller (or the server) may have created it while
        // we waited to become the executor.
        if let Ok(meta) = session.sftp.stat(p) {
            if meta.is_dir {
                return Ok(());
            }
            return Err(crate::error::MkdirError::ExistsAsFile(p.into()).into());
        }

        if let Some(parent) = parent_of(p) {
            self.ensure_remote_dir(session, &parent)?;
        }

        match session.sftp.mkdir(p) {
            Ok(()) => Ok(()),
            Err(e) => match session.sftp.stat(p) {
                Ok(meta) if meta.is_dir => Ok(()),
                _ => Err(crate::error::MkdirError::SftpError(p.into(), e.to_string()).into()),
            },
        }
    }

    /// `ensureRemoteDirsExist(list)`: the caller passes a parent-first list.
    pub fn ensure_all(&self, session: &Session, paths: &[String]) -> Result<(), EngineError> {
        for p in paths {
            self.ensure_remote_dir(session, p)?;
        }
        Ok(())
    }
}

fn parent_of(p: &str) -> Option<String> {
    let trimmed = p.trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "/" {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(trimmed[..idx].to_string()),
        None => None,
    }
}

/// `collectRemoteDirsForUpload(tasks)`: derive the creation set from a list
/// of remote target paths, sorted parents-first (ascending depth, then
/// lexicographically) so callers can feed the result straight to
/// `ensure_all`.
pub fn collect_remote_dirs(remote_paths: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut set: HashSet<String> = HashSet::new();
    for path in remote_paths {
        let mut cur = parent_of(&path);
        while let Some(dir) = cur {
            if dir == "/" || dir == "." {
                set.insert(dir.clone());
                break;
            }
            if !set.insert(dir.clone()) {
                break;
            }
            cur = parent_of(&dir);
        }
    }
    let mut out: Vec<String> = set.into_iter().collect();
    out.sort_by(|a, b| {
        let da = a.matches('/').count();
        let db = b.matches('/').count();
        da.cmp(&db).then_with(|| a.cmp(b))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp_client::{RemoteEntry, RemoteMetadata};
    use std::collections::HashMap as StdHashMap;
    use std::io::{Read, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    struct MockSftp {
        dirs: Mutex<StdHashMap<String, bool>>,
        mkdir_calls: AtomicUsize,
        fail_mkdir_once: Mutex<HashSet<String>>,
    }

    impl MockSftp {
        fn new() -> Self {
            MockSftp {
                dirs: Mutex::new(StdHashMap::new()),
                mkdir_calls: AtomicUsize::new(0),
                fail_mkdir_once: Mutex::new(HashSet::new()),
            }
        }
    }

    impl SftpClient for MockSftp {
        fn stat(&self, path: &str) -> Result<RemoteMetadata, EngineError> {
            let dirs = self.dirs.lock().unwrap();
            if dirs.contains_key(path) {
                Ok(RemoteMetadata { is_dir: true, is_file: false, size: 0 })
            } else {
                Err(EngineError::resolution(path, "not found"))
            }
        }
        fn read_dir(&self, _path: &str) -> Result<Vec<RemoteEntry>, EngineError> {
            Ok(Vec::new())
        }
        fn mkdir(&self, path: &str) -> Result<(), EngineError> {
            self.mkdir_calls.fetch_add(1, Ordering::SeqCst);
            let should_fail = self.fail_mkdir_once.lock().unwrap().remove(path);
            if should_fail {
                return Err(EngineError::transport(format!("mkdir {}", path), "simulated race"));
            }
            self.dirs.lock().unwrap().insert(path.to_string(), true);
            Ok(())
        }
        fn rmdir(&self, _path: &str) -> Result<(), EngineError> {
            Ok(())
        }
        fn remove(&self, _path: &str) -> Result<(), EngineError> {
            Ok(())
        }
        fn rename(&self, _old: &str, _new: &str) -> Result<(), EngineError> {
            Ok(())
        }
        fn open_read(&self, _path: &str) -> Result<Box<dyn Read + Send>, EngineError> {
            Ok(Box::new(std::io::Cursor::new(Vec::new())))
        }
        fn create_write(&self, _path: &str) -> Result<Box<dyn Write + Send>, EngineError> {
            Ok(Box::new(Vec::new()))
        }
        fn getwd(&self) -> Result<String, EngineError> {
            Ok("/".to_string())
        }
    }

    fn session_with(mock: StdArc<MockSftp>) -> Session {
        mock.dirs.lock().unwrap().insert("/".to_string(), true);
        Session::new(mock, Some("/".to_string()), Some(std::path::PathBuf::from("/")))
    }

    #[test]
    fn creates_missing_parent_chain() {
        let mock = StdArc::new(MockSftp::new());
        let session = session_with(mock.clone());
        let reg = DirCreationRegistry::new();
        reg.ensure_remote_dir(&session, "/a/b/c").unwrap();
        assert!(mock.dirs.lock().unwrap().contains_key("/a"));
        assert!(mock.dirs.lock().unwrap().contains_key("/a/b"));
        assert!(mock.dirs.lock().unwrap().contains_key("/a/b/c"));
    }

    #[test]
    fn mkdir_race_then_stat_success_is_ok() {
        // mkdir("/a") always fails, but the second stat("/a") (the re-check
        // inside the mkdir-failure branch) reports success, simulating the
        // directory having been created by a racing server-side actor.
        struct RacedMkdir {
            stat_a_calls: AtomicUsize,
        }
        impl SftpClient for RacedMkdir {
            fn stat(&self, path: &str) -> Result<RemoteMetadata, EngineError> {
                if path == "/" {
                    return Ok(RemoteMetadata { is_dir: true, is_file: false, size: 0 });
                }
                if path == "/a" {
                    // Calls in order: fast path (n=0), slow-path re-check
                    // (n=1) both report "not found"; the post-mkdir-failure
                    // re-stat (n=2) reports success.
                    let n = self.stat_a_calls.fetch_add(1, Ordering::SeqCst);
                    return if n < 2 {
                        Err(EngineError::resolution(path, "not found"))
                    } else {
                        Ok(RemoteMetadata { is_dir: true, is_file: false, size: 0 })
                    };
                }
                Err(EngineError::resolution(path, "not found"))
            }
            fn read_dir(&self, _path: &str) -> Result<Vec<RemoteEntry>, EngineError> {
                Ok(Vec::new())
            }
            fn mkdir(&self, path: &str) -> Result<(), EngineError> {
                Err(EngineError::transport(format!("mkdir {}", path), "lost the race"))
            }
            fn rmdir(&self, _path: &str) -> Result<(), EngineError> {
                Ok(())
            }
            fn remove(&self, _path: &str) -> Result<(), EngineError> {
                Ok(())
            }
            fn rename(&self, _old: &str, _new: &str) -> Result<(), EngineError> {
                Ok(())
            }
            fn open_read(&self, _path: &str) -> Result<Box<dyn Read + Send>, EngineError> {
                Ok(Box::new(std::io::Cursor::new(Vec::new())))
            }
            fn create_write(&self, _path: &str) -> Result<Box<dyn Write + Send>, EngineError> {
                Ok(Box::new(Vec::new()))
            }
            fn getwd(&self) -> Result<String, EngineError> {
                Ok("/".to_string())
            }
        }
        let session = Session::new(
            StdArc::new(RacedMkdir { stat_a_calls: AtomicUsize::new(0) }),
            Some("/".to_string()),
            Some(std::path::PathBuf::from("/")),
        );
        let reg = DirCreationRegistry::new();
        reg.ensure_remote_dir(&session, "/a").unwrap();
    }

    #[test]
    fn existing_file_conflicts() {
        // stat reports is_dir=false for a path that already exists as a file.
        struct FileConflict;
        impl SftpClient for FileConflict {
            fn stat(&self, path: &str) -> Result<RemoteMetadata, EngineError> {
                if path == "/" {
                    Ok(RemoteMetadata { is_dir: true, is_file: false, size: 0 })
                } else {
                    Ok(RemoteMetadata { is_dir: false, is_file: true, size: 1 })
                }
            }
            fn read_dir(&self, _path: &str) -> Result<Vec<RemoteEntry>, EngineError> {
                Ok(Vec::new())
            }
            fn mkdir(&self, _path: &str) -> Result<(), EngineError> {
                panic!("mkdir should not be called when path already exists as a file");
            }
            fn rmdir(&self, _path: &str) -> Result<(), EngineError> {
                Ok(())
            }
            fn remove(&self, _path: &str) -> Result<(), EngineError> {
                Ok(())
            }
            fn rename(&self, _old: &str, _new: &str) -> Result<(), EngineError> {
                Ok(())
            }
            fn open_read(&self, _path: &str) -> Result<Box<dyn Read + Send>, EngineError> {
                Ok(Box::new(std::io::Cursor::new(Vec::new())))
            }
            fn create_write(&self, _path: &str) -> Result<Box<dyn Write + Send>, EngineError> {
                Ok(Box::new(Vec::new()))
            }
            fn getwd(&self) -> Result<String, EngineError> {
                Ok("/".to_string())
            }
        }
        let session = Session::new(
            StdArc::new(FileConflict),
            Some("/".to_string()),
            Some(std::path::PathBuf::from("/")),
        );
        let reg = DirCreationRegistry::new();
        let err = reg.ensure_remote_dir(&session, "/somefile").unwrap_err();
        assert!(err.to_string().contains("expected a directory"));
    }

    #[test]
    fn concurrent_creation_is_deduped() {
        let mock = StdArc::new(MockSftp::new());
        let session = StdArc::new(session_with(mock.clone()));
        let reg = StdArc::new(DirCreationRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = reg.clone();
            let session = session.clone();
            handles.push(std::thread::spawn(move || {
                reg.ensure_remote_dir(&session, "/deep/a/b/c").unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        // one mkdir per distinct directory in the chain: /deep,a,b,c = 4
        assert_eq!(mock.mkdir_calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn collect_remote_dirs_orders_parents_first() {
        let dirs = collect_remote_dirs(vec![
            "/deep/a/b/c/f1".to_string(),
            "/deep/a/b/c/f2".to_string(),
            "/deep/a/other/f3".to_string(),
        ]);
        assert_eq!(
            dirs,
            vec![
                "/deep".to_string(),
                "/deep/a".to_string(),
                "/deep/a/b".to_string(),
                "/deep/a/other".to_string(),
                "/deep/a/b/c".to_string(),
            ]
        );
    }
}
