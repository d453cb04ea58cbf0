//! Session (§3): one authenticated connection pair plus the two working
//! directories. Establishing the underlying SSH/SFTP connection is an
//! out-of-scope collaborator concern (§1) — callers hand in an already
//! connected `SftpClient`; this module only owns what the engine is
//! responsible for afterward.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::ListingCache;
use crate::error::EngineError;
use crate::sftp_client::SftpClient;

pub struct Session {
    pub sftp: Arc<dyn SftpClient>,
    remote_cwd: String,
    remote_home: String,
    local_cwd: PathBuf,
    local_home: PathBuf,
    pub cache: ListingCache,
}

impl Session {
    /// Build a session from an already-connected SFTP client. `remote_home`
    /// should be the server-reported CWD at connect time (§3); falls back to
    /// `/` if the caller could not determine it.
    pub fn new(sftp: Arc<dyn SftpClient>, remote_home: Option<String>, local_home: Option<PathBuf>) -> Self {
        let remote_home = remote_home.unwrap_or_else(|| "/".to_string());
        let local_cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let local_home = local_home.or_else(dirs::home_dir).unwrap_or_else(|| local_cwd.clone());
        Session {
            remote_cwd: remote_home.clone(),
            remote_home,
            local_cwd,
            local_home,
            cache: ListingCache::new(),
            sftp,
        }
    }

    /// Overrides the listing cache's freshness window (§10.3 `cache_ttl_secs`).
    pub fn with_cache_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.cache = ListingCache::with_ttl(ttl);
        self
    }

    pub fn remote_cwd(&self) -> &str {
        &self.remote_cwd
    }

    pub fn remote_home(&self) -> &str {
        &self.remote_home
    }

    pub fn local_cwd(&self) -> &std::path::Path {
        &self.local_cwd
    }

    pub fn local_home(&self) -> &std::path::Path {
        &self.local_home
    }

    pub fn resolve_remote(&self, input: &str) -> String {
        crate::path::resolve_remote(input, &self.remote_cwd, &self.remote_home)
    }

    pub fn resolve_local(&self, input: &str) -> PathBuf {
        crate::path::resolve_local(input, &self.local_cwd, &self.local_home)
    }

    /// `Chdir`: verifies the target resolves to an existing directory before
    /// committing (§3 invariant), then clears the listing cache (§4.B).
    pub fn chdir(&mut self, dir: &str) -> Result<(), EngineError> {
        let resolved = self.resolve_remote(dir);
        let meta = self.sftp.stat(&resolved)?;
        if !meta.is_dir {
            return Err(EngineError::resolution(&resolved, "not a directory"));
        }
        self.remote_cwd = resolved;
        self.cache.clear();
        Ok(())
    }

    /// `LocalChdir`: same contract, local filesystem.
    pub fn local_chdir(&mut self, dir: &str) -> Result<(), EngineError> {
        let resolved = self.resolve_local(dir);
        let meta = std::fs::metadata(&resolved)
            .map_err(|e| EngineError::local_io(format!("stat {}", resolved.display()), e))?;
        if !meta.is_dir() {
            return Err(EngineError::resolution(resolved.display().to_string(), "not a directory"));
        }
        self.local_cwd = resolved;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp_client::{RemoteEntry, RemoteMetadata};
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockSftp {
        pub dirs: Mutex<HashMap<String, RemoteMetadata>>,
    }

    impl MockSftp {
        pub fn with_dir(path: &str) -> Self {
            let m = MockSftp::default();
            m.dirs.lock().unwrap().insert(
                path.to_string(),
                RemoteMetadata { is_dir: true, is_file: false, size: 0 },
            );
            m
        }
    }

    impl SftpClient for MockSftp {
        fn stat(&self, path: &str) -> Result<RemoteMetadata, EngineError> {
            self.dirs
                .lock()
                .unwrap()
                .get(path)
                .copied()
                .ok_or_else(|| EngineError::resolution(path, "not found"))
        }
        fn read_dir(&self, _path: &str) -> Result<Vec<RemoteEntry>, EngineError> {
            Ok(Vec::new())
        }
        fn mkdir(&self, _path: &str) -> Result<(), EngineError> {
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
            Ok("/home/u".to_string())
        }
    }

    #[test]
    fn chdir_rejects_non_directory() {
        let mock = Arc::new(MockSftp::with_dir("/home/u/ok"));
        let mut sess = Session::new(mock, Some("/home/u".to_string()), Some(PathBuf::from("/home/u")));
        assert!(sess.chdir("ok").is_ok());
        assert_eq!(sess.remote_cwd(), "/home/u/ok");
        assert!(sess.chdir("missing").is_err());
        // failed chdir must not mutate remote_cwd
        assert_eq!(sess.remote_cwd(), "/home/u/ok");
    }
}
