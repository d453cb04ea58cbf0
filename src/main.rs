use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use sftpcp::sftp_client::SftpClient;
use sftpcp::{config, error, glob, logging, ops, session, sftp_client, types};

mod cli;
mod connect;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = config::Config::load().unwrap_or_default();

    let _guard = logging::init(config::Config::storage_dir().map(|d| d.join("logs")), cli.debug);

    let sess = connect::connect(&cli.host, cli.port, &cli.user, cli.key.as_deref())
        .with_context(|| format!("connecting to {}@{}:{}", cli.user, cli.host, cli.port))?;
    let sftp = sess.sftp().context("opening sftp channel")?;
    let client = Arc::new(sftp_client::Ssh2SftpClient::new(sftp));
    let remote_home = client.getwd().ok();
    let session = session::Session::new(client, remote_home, None)
        .with_cache_ttl(std::time::Duration::from_secs(config.cache_ttl_secs));
    let mut ops = ops::Ops::new(session).with_buffer_size(config.buffer_size);

    let opts = types::TransferOptions {
        recursive: config.recursive,
        show_progress: config.show_progress,
        concurrency: cli.concurrency,
        max_depth: cli.max_depth,
    };

    run(&mut ops, cli.command, &opts)
}

fn run(ops: &mut ops::Ops, command: cli::Commands, opts: &types::TransferOptions) -> Result<()> {
    use cli::Commands;
    match command {
        Commands::List { path } => {
            // explicit `ls` always shows fresh server state (§4.B).
            ops.clear_dir_cache();
            let dir = path.unwrap_or_else(|| ops.getwd().to_string());
            for entry in ops.list(&dir)? {
                println!("{}{}", entry.name, if entry.metadata.is_dir { "/" } else { "" });
            }
        }
        Commands::LocalList { path } => {
            let dir = path.unwrap_or_else(|| ops.get_local_wd().display().to_string());
            for entry in ops.local_list(&dir)? {
                println!("{}{}", entry.name, if entry.is_dir { "/" } else { "" });
            }
        }
        Commands::Chdir { path } => ops.chdir(&path)?,
        Commands::LocalChdir { path } => ops.local_chdir(&path)?,
        Commands::Pwd => println!("{}", ops.getwd()),
        Commands::LocalPwd => println!("{}", ops.get_local_wd().display()),
        Commands::Stat { path } => {
            let meta = ops.stat(&path)?;
            let kind = if meta.is_dir { "directory" } else { "file" };
            println!("{path}: {kind}, {} bytes", meta.size);
        }
        Commands::Mkdir { path } => ops.mkdir(&path)?,
        Commands::LocalMkdir { path } => ops.local_mkdir(&path)?,
        Commands::Remove { path } => ops.remove(&path)?,
        Commands::Rename { old, new } => ops.rename(&old, &new)?,
        Commands::Put { local, remote, recursive } => {
            let mut opts = *opts;
            opts.recursive = recursive;
            put(ops, &local, &remote, &opts)?;
        }
        Commands::Get { remote, local, recursive } => {
            let mut opts = *opts;
            opts.recursive = recursive;
            get(ops, &remote, &local, &opts)?;
        }
    }
    Ok(())
}

fn put(ops: &ops::Ops, local: &str, remote: &str, opts: &types::TransferOptions) -> Result<()> {
    if glob::is_glob_pattern(local) {
        let (success, err) = ops.upload_glob(local, remote, opts)?;
        report_batch(success, err);
    } else {
        let local_path = ops.session.resolve_local(local);
        let is_dir = std::fs::metadata(&local_path).map(|m| m.is_dir()).unwrap_or(false);
        if is_dir {
            let (success, err) = ops.upload_dir(local, remote, opts)?;
            report_batch(success, err);
        } else {
            ops.upload(local, remote)?;
        }
    }
    Ok(())
}

fn get(ops: &ops::Ops, remote: &str, local: &str, opts: &types::TransferOptions) -> Result<()> {
    if glob::is_glob_pattern(remote) {
        let (success, err) = ops.download_glob(remote, local, opts)?;
        report_batch(success, err);
    } else {
        let remote_path = ops.session.resolve_remote(remote);
        let is_dir = ops.session.sftp.stat(&remote_path).map(|m| m.is_dir).unwrap_or(false);
        if is_dir {
            let (success, err) = ops.download_dir(remote, local, opts)?;
            report_batch(success, err);
        } else {
            ops.download(remote, local)?;
        }
    }
    Ok(())
}

fn report_batch(success: usize, err: Option<error::BatchError>) {
    match err {
        Some(e) => {
            eprintln!("{success} transferred, {e}");
            if let Some(dir) = config::Config::storage_dir() {
                ops::write_failures_jsonl(&dir.join("logs").join("failures.jsonl"), &e);
            }
        }
        None => println!("{success} transferred"),
    }
}
