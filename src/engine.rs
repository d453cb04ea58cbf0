//! Transfer engine (component G): the single concurrency choke point.
//! Grounded on the donor's `transfer/workers/mod.rs` worker-runtime shape
//! (channel-bound task distribution, `indicatif` progress, mutex-protected
//! failure collection) but rebuilt around `catch_unwind` panic isolation,
//! which the donor does not have, and stripped of session-rebuild/retry
//! logic that depends on the donor's multi-channel reconnection story
//! (out of scope — §5 assumes one stable shared channel).

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use crate::buffer_pool::BufferPool;
use crate::copy;
use crate::error::{BatchError, EngineError};
use crate::session::Session;
use crate::types::{TransferOptions, TransferTask};

fn batch_progress_style() -> ProgressStyle {
    ProgressStyle::with_template("[{bar:40}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked with a non-string payload".to_string()
    }
}

/// Executes every task in `tasks` with concurrency bounded by
/// `options.concurrency`, returning the number of tasks that succeeded and,
/// if any failed, an aggregated error (§4.G).
pub fn execute_tasks(
    session: &Session,
    pool: &BufferPool,
    tasks: Vec<TransferTask>,
    options: &TransferOptions,
) -> (usize, Option<BatchError>) {
    if tasks.is_empty() {
        return (0, None);
    }

    let started = std::time::Instant::now();
    let task_count = tasks.len();
    let worker_count = options.concurrency.max(1).min(tasks.len());
    tracing::info!(task_count, concurrency = worker_count, "batch transfer starting");
    let per_file_progress = worker_count == 1 && options.show_progress;
    let batch_progress = worker_count > 1 && options.show_progress;

    let batch_bar = batch_progress.then(|| {
        let bar = ProgressBar::new(tasks.len() as u64);
        bar.set_style(batch_progress_style());
        bar
    });

    let (task_tx, task_rx) = crossbeam_channel::unbounded::<TransferTask>();
    for task in tasks {
        let _ = task_tx.send(task);
    }
    drop(task_tx);

    let success_count = AtomicUsize::new(0);
    let failures: Mutex<Vec<(TransferTask, EngineError)>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let task_rx = task_rx.clone();
            let batch_bar = batch_bar.as_ref();
            let success_count = &success_count;
            let failures = &failures;
            scope.spawn(move || {
                while let Ok(task) = task_rx.recv() {
                    let label = task.to_string();
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        copy::copy_task(session, pool, &task, per_file_progress)
                    }));
                    match outcome {
                        Ok(Ok(_bytes)) => {
                            success_count.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(task = %label, error = %e, "task transport error");
                            failures.lock().unwrap().push((task, e));
                        }
                        Err(payload) => {
                            let backtrace = std::backtrace::Backtrace::force_capture();
                            let message = panic_message(payload);
                            tracing::warn!(task = %label, panic = %message, "worker panicked");
                            let err = EngineError::Panic {
                                task: label,
                                payload: message,
                                backtrace: backtrace.to_string(),
                            };
                            failures.lock().unwrap().push((task, err));
                        }
                    }
                    if let Some(bar) = batch_bar {
                        bar.inc(1);
                    }
                }
            });
        }
    });

    if let Some(bar) = batch_bar {
        bar.finish_and_clear();
    }

    let success = success_count.load(Ordering::SeqCst);
    let failures = failures.into_inner().unwrap();
    tracing::info!(
        task_count,
        success,
        failed = failures.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch transfer finished"
    );
    (success, BatchError::new(failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp_client::{RemoteEntry, RemoteMetadata, SftpClient};
    use crate::types::Direction;
    use std::collections::HashMap;
    use std::io::{Cursor, Read, Write};
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Default)]
    struct FlakySftp {
        files: StdMutex<HashMap<String, Vec<u8>>>,
        fail_on: Vec<String>,
    }

    impl SftpClient for FlakySftp {
        fn stat(&self, path: &str) -> Result<RemoteMetadata, EngineError> {
            let files = self.files.lock().unwrap();
            if let Some(data) = files.get(path) {
                Ok(RemoteMetadata { is_dir: false, is_file: true, size: data.len() as u64 })
            } else {
                Err(EngineError::resolution(path, "not found"))
            }
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
            Ok(Box::new(Cursor::new(Vec::new())))
        }
        fn create_write(&self, path: &str) -> Result<Box<dyn Write + Send>, EngineError> {
            if self.fail_on.iter().any(|p| p == path) {
                return Err(EngineError::transport("create", "permission denied"));
            }
            // Sink: this test only checks success count and error content,
            // not the bytes actually transferred.
            Ok(Box::new(Vec::new()))
        }
        fn getwd(&self) -> Result<String, EngineError> {
            Ok("/".to_string())
        }
    }

    #[test]
    fn partial_failure_reports_success_count_and_error() {
        let tmp = std::env::temp_dir().join(format!("engine-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();

        let mut tasks = Vec::new();
        for i in 0..4 {
            let local = tmp.join(format!("file{i}.txt"));
            std::fs::write(&local, b"data").unwrap();
            tasks.push(TransferTask {
                local_path: local,
                remote_path: format!("/r/file{i}.txt"),
                direction: Direction::Upload,
                size_bytes: Some(4),
            });
        }

        let sftp =
            Arc::new(FlakySftp { files: StdMutex::new(HashMap::new()), fail_on: vec!["/r/file1.txt".to_string()] });
        let session = Session::new(sftp, Some("/".to_string()), Some(tmp.clone()));
        let pool = BufferPool::new();
        let options = TransferOptions { recursive: true, show_progress: false, concurrency: 2, max_depth: -1 };

        let (success, err) = execute_tasks(&session, &pool, tasks, &options);
        assert_eq!(success, 3);
        let err = err.expect("one failure expected");
        assert_eq!(err.len(), 1);
        assert!(err.errors()[0].1.to_string().contains("permission denied"));

        std::fs::remove_dir_all(&tmp).ok();
    }
}
