//! Transfer engine library: path resolution, listing cache, buffer pool,
//! directory-creation coordination, glob expansion, task collection, the
//! concurrent transfer engine, single-file copy, and the public operations
//! facade (`ops::Ops`) that ties them together. Connection establishment,
//! command parsing, and the interactive shell are collaborator concerns
//! left to the binary built on top of this crate (see `main.rs`).

pub mod buffer_pool;
pub mod cache;
pub mod collector;
pub mod config;
pub mod copy;
pub mod dircoord;
pub mod engine;
pub mod error;
pub mod glob;
pub mod logging;
pub mod ops;
pub mod path;
pub mod session;
pub mod sftp_client;
pub mod types;

pub use error::{EngineError, MkdirError};
