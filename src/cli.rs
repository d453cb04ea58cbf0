//! Command-line surface. Grounded on the donor's `cli.rs` (`clap` derive,
//! subcommand dispatch), trimmed to the transfer-only operations this crate
//! exposes: no host-alias CRUD, no TUI fallback. Destination parsing
//! (`user@host[:port]`), the interactive shell, and auth are collaborator
//! concerns (§1) handled by `main.rs`'s thin connect step, not here.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version, about = "Concurrent SFTP transfer client", long_about = None)]
pub struct Cli {
    #[clap(long, help = "Remote host to connect to", display_order = 1)]
    pub host: String,
    #[clap(long, default_value_t = 22, help = "Remote SSH port", display_order = 2)]
    pub port: u16,
    #[clap(long, help = "SSH username", display_order = 3)]
    pub user: String,
    #[clap(long, help = "Private key path (defaults to ~/.ssh/id_ed25519, id_rsa, id_ecdsa)")]
    pub key: Option<std::path::PathBuf>,
    #[clap(long, default_value_t = 4, help = "Max concurrent transfers for batch operations")]
    pub concurrency: usize,
    #[clap(long, default_value_t = -1, help = "Max recursion depth, -1 for unbounded")]
    pub max_depth: i64,
    #[clap(long, help = "Enable debug-level file logging")]
    pub debug: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[clap(name = "ls", about = "List a remote directory")]
    List { path: Option<String> },
    #[clap(name = "lls", about = "List a local directory")]
    LocalList { path: Option<String> },
    #[clap(name = "cd", about = "Change the remote working directory")]
    Chdir { path: String },
    #[clap(name = "lcd", about = "Change the local working directory")]
    LocalChdir { path: String },
    #[clap(name = "pwd", about = "Print the remote working directory")]
    Pwd,
    #[clap(name = "lpwd", about = "Print the local working directory")]
    LocalPwd,
    #[clap(name = "stat", about = "Stat a remote path")]
    Stat { path: String },
    #[clap(name = "mkdir", about = "Create a remote directory")]
    Mkdir { path: String },
    #[clap(name = "lmkdir", about = "Create a local directory")]
    LocalMkdir { path: String },
    #[clap(name = "rm", about = "Remove a remote file or directory tree")]
    Remove { path: String },
    #[clap(name = "mv", about = "Rename a remote path")]
    Rename { old: String, new: String },
    #[clap(name = "put", about = "Upload a local file, directory, or glob pattern")]
    Put {
        local: String,
        remote: String,
        #[clap(short, long, help = "Descend into directories")]
        recursive: bool,
    },
    #[clap(name = "get", about = "Download a remote file, directory, or glob pattern")]
    Get {
        remote: String,
        local: String,
        #[clap(short, long, help = "Descend into directories")]
        recursive: bool,
    },
}
