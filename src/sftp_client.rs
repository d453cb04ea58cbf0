//! Abstraction over the SFTP channel (§5, §10.5). Generalizes the donor's
//! `SftpLike`/`Ssh2Adapter` pair to the full operation set the engine needs,
//! and makes the spec's "assumed safe for concurrent use" contract concrete
//! for the real `ssh2` binding by serializing every call through a mutex.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteMetadata {
    pub is_dir: bool,
    pub is_file: bool,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub name: String,
    pub metadata: RemoteMetadata,
}

/// Everything the directory coordinator (D), task collector (F), single-file
/// copy (H), and public operations (I) need from an SFTP session. `Send +
/// Sync` because the transfer engine hands `Arc<dyn SftpClient>` to every
/// worker thread.
pub trait SftpClient: Send + Sync {
    fn stat(&self, path: &str) -> Result<RemoteMetadata, EngineError>;
    fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, EngineError>;
    fn mkdir(&self, path: &str) -> Result<(), EngineError>;
    fn rmdir(&self, path: &str) -> Result<(), EngineError>;
    fn remove(&self, path: &str) -> Result<(), EngineError>;
    fn rename(&self, old: &str, new: &str) -> Result<(), EngineError>;
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, EngineError>;
    fn create_write(&self, path: &str) -> Result<Box<dyn Write + Send>, EngineError>;
    fn getwd(&self) -> Result<String, EngineError>;
}

/// Concrete adapter over `ssh2::Sftp`. `Sftp`'s filesystem methods take
/// `&self` but neither `Session` nor `Sftp` is `Sync`-safe for genuinely
/// concurrent multiplexed access from this crate's perspective, so every
/// call — including reads and writes against an already-open file handle —
/// is serialized through one mutex.
pub struct Ssh2SftpClient {
    inner: Arc<Mutex<ssh2::Sftp>>,
}

impl Ssh2SftpClient {
    pub fn new(sftp: ssh2::Sftp) -> Self {
        Ssh2SftpClient { inner: Arc::new(Mutex::new(sftp)) }
    }
}

fn metadata_from_stat(st: &ssh2::FileStat) -> RemoteMetadata {
    RemoteMetadata { is_dir: st.is_dir(), is_file: st.is_file(), size: st.size.unwrap_or(0) }
}

impl SftpClient for Ssh2SftpClient {
    fn stat(&self, path: &str) -> Result<RemoteMetadata, EngineError> {
        let sftp = self.inner.lock().unwrap();
        let st = sftp
            .stat(Path::new(path))
            .map_err(|e| EngineError::transport(format!("stat {}", path), e))?;
        Ok(metadata_from_stat(&st))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, EngineError> {
        let sftp = self.inner.lock().unwrap();
        let entries = sftp
            .readdir(Path::new(path))
            .map_err(|e| EngineError::transport(format!("readdir {}", path), e))?;
        Ok(entries
            .into_iter()
            .map(|(p, st)| RemoteEntry {
                name: p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
                metadata: metadata_from_stat(&st),
            })
            .collect())
    }

    fn mkdir(&self, path: &str) -> Result<(), EngineError> {
        let sftp = self.inner.lock().unwrap();
        sftp.mkdir(Path::new(path), 0o755)
            .map_err(|e| EngineError::transport(format!("mkdir {}", path), e))
    }

    fn rmdir(&self, path: &str) -> Result<(), EngineError> {
        let sftp = self.inner.lock().unwrap();
        sftp.rmdir(Path::new(path)).map_err(|e| EngineError::transport(format!("rmdir {}", path), e))
    }

    fn remove(&self, path: &str) -> Result<(), EngineError> {
        let sftp = self.inner.lock().unwrap();
        sftp.unlink(Path::new(path))
            .map_err(|e| EngineError::transport(format!("remove {}", path), e))
    }

    fn rename(&self, old: &str, new: &str) -> Result<(), EngineError> {
        let sftp = self.inner.lock().unwrap();
        sftp.rename(Path::new(old), Path::new(new), None)
            .map_err(|e| EngineError::transport(format!("rename {} -> {}", old, new), e))
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, EngineError> {
        let file = {
            let sftp = self.inner.lock().unwrap();
            sftp.open(Path::new(path)).map_err(|e| EngineError::transport(format!("open {}", path), e))?
        };
        Ok(Box::new(LockedFile { guard: self.inner.clone(), file }))
    }

    fn create_write(&self, path: &str) -> Result<Box<dyn Write + Send>, EngineError> {
        let file = {
            let sftp = self.inner.lock().unwrap();
            sftp.create(Path::new(path))
                .map_err(|e| EngineError::transport(format!("create {}", path), e))?
        };
        Ok(Box::new(LockedFile { guard: self.inner.clone(), file }))
    }

    fn getwd(&self) -> Result<String, EngineError> {
        let sftp = self.inner.lock().unwrap();
        let p = sftp
            .realpath(Path::new("."))
            .map_err(|e| EngineError::transport("getwd", e))?;
        Ok(p.to_string_lossy().into_owned())
    }
}

/// An open remote file handle. Every `Read`/`Write` call re-acquires the
/// shared session lock so concurrent transfers never touch libssh2 at the
/// same instant, even though each worker owns a distinct file handle.
struct LockedFile {
    guard: Arc<Mutex<ssh2::Sftp>>,
    file: ssh2::File,
}

impl Read for LockedFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let _lock = self.guard.lock().unwrap();
        self.file.read(buf)
    }
}

impl Write for LockedFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _lock = self.guard.lock().unwrap();
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _lock = self.guard.lock().unwrap();
        self.file.flush()
    }
}
