//! Single-file copy (component H). One function per direction, sharing the
//! same eight-step structure (§4.H). Grounded on the donor's
//! `transfer/workers/upload.rs`/`download.rs` copy loops, stripped of their
//! session-rebuild/retry machinery (out of scope — §5 assumes a single
//! stable channel, no reconnection modeled) and rebuilt against
//! `SftpClient` + `BufferPool`.

use std::io::{Read, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};

use crate::buffer_pool::BufferPool;
use crate::error::EngineError;
use crate::session::Session;
use crate::types::TransferTask;

fn file_progress_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Append the source's base name to a destination that turned out to be an
/// existing directory (step 4, §4.H).
fn final_remote_dest(session: &Session, dest: &str, src_basename: &str) -> Result<String, EngineError> {
    match session.sftp.stat(dest) {
        Ok(meta) if meta.is_dir => Ok(format!("{}/{}", dest.trim_end_matches('/'), src_basename)),
        _ => Ok(dest.to_string()),
    }
}

fn final_local_dest(dest: &Path, src_basename: &str) -> std::path::PathBuf {
    match std::fs::metadata(dest) {
        Ok(meta) if meta.is_dir() => dest.join(src_basename),
        _ => dest.to_path_buf(),
    }
}

/// Copy one local file to the remote host.
pub fn upload_one(
    session: &Session,
    pool: &BufferPool,
    local_src: &Path,
    remote_dest: &str,
    show_progress: bool,
) -> Result<u64, EngineError> {
    let size = std::fs::metadata(local_src)
        .map_err(|e| EngineError::local_io(format!("stat {}", local_src.display()), e))?
        .len();
    let mut src = std::fs::File::open(local_src)
        .map_err(|e| EngineError::local_io(format!("open {}", local_src.display()), e))?;

    let base = local_src.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let final_dest = final_remote_dest(session, remote_dest, &base)?;
    let mut dst = session.sftp.create_write(&final_dest)?;

    let pb = show_progress.then(|| {
        let bar = ProgressBar::new(size);
        bar.set_style(file_progress_style());
        bar.set_message(base.clone());
        bar
    });

    let mut buf = pool.checkout();
    let result = copy_loop(&mut src, &mut dst, &mut buf, pb.as_ref());
    pool.checkin(buf);
    let written = result.map_err(|e| EngineError::transport(format!("upload {}", final_dest), e))?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    session.cache.invalidate(&parent_of(&final_dest));
    Ok(written)
}

/// Copy one remote file to the local filesystem.
pub fn download_one(
    session: &Session,
    pool: &BufferPool,
    remote_src: &str,
    local_dest: &Path,
    show_progress: bool,
) -> Result<u64, EngineError> {
    let meta = session.sftp.stat(remote_src)?;
    let mut src = session.sftp.open_read(remote_src)?;

    let base = basename(remote_src).to_string();
    let final_dest = final_local_dest(local_dest, &base);
    let mut dst = std::fs::File::create(&final_dest)
        .map_err(|e| EngineError::local_io(format!("create {}", final_dest.display()), e))?;

    let pb = show_progress.then(|| {
        let bar = ProgressBar::new(meta.size);
        bar.set_style(file_progress_style());
        bar.set_message(base.clone());
        bar
    });

    let mut buf = pool.checkout();
    let result = copy_loop(&mut src, &mut dst, &mut buf, pb.as_ref());
    pool.checkin(buf);
    let written = result.map_err(|e| EngineError::local_io(format!("download {}", remote_src), e))?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    Ok(written)
}

fn copy_loop(
    src: &mut dyn Read,
    dst: &mut dyn Write,
    buf: &mut [u8],
    pb: Option<&ProgressBar>,
) -> std::io::Result<u64> {
    let mut total = 0u64;
    loop {
        let n = src.read(buf)?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])?;
        total += n as u64;
        if let Some(pb) = pb {
            pb.inc(n as u64);
        }
    }
    dst.flush()?;
    Ok(total)
}

fn parent_of(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
        None => "/".to_string(),
    }
}

/// Dispatches a single task (§4.H) to the upload or download path.
pub fn copy_task(session: &Session, pool: &BufferPool, task: &TransferTask, show_progress: bool) -> Result<u64, EngineError> {
    match task.direction {
        crate::types::Direction::Upload => upload_one(session, pool, &task.local_path, &task.remote_path, show_progress),
        crate::types::Direction::Download => download_one(session, pool, &task.remote_path, &task.local_path, show_progress),
    }
}
