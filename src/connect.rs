//! Thin SSH/SFTP connection bootstrap for the CLI binary. Establishing the
//! connection is explicitly out of scope for the engine itself; this module
//! is the collaborator the spec assumes exists, grounded on the donor's
//! `transfer/session.rs::connect_session` (TCP dial, handshake, key auth)
//! with the host-alias lookup stripped since this crate has no alias store.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

fn try_key_authentication(sess: &mut ssh2::Session, username: &str, key: Option<&std::path::Path>) -> bool {
    if let Some(key) = key {
        let _ = sess.userauth_pubkey_file(username, None, key, None);
        if sess.authenticated() {
            return true;
        }
    }
    if let Some(home) = dirs::home_dir() {
        for name in ["id_ed25519", "id_rsa", "id_ecdsa"] {
            let p = home.join(".ssh").join(name);
            if p.exists() {
                let _ = sess.userauth_pubkey_file(username, None, &p, None);
                if sess.authenticated() {
                    return true;
                }
            }
        }
    }
    false
}

/// Connects, handshakes, and authenticates against `host:port` as `user`,
/// returning the ready-to-use `ssh2::Session`. Callers derive an
/// `ssh2::Sftp` channel and a `SftpClient` adapter from the result.
pub fn connect(host: &str, port: u16, user: &str, key: Option<&std::path::Path>) -> Result<ssh2::Session> {
    let addr = format!("{host}:{port}");
    let mut addrs = addr.to_socket_addrs().with_context(|| format!("resolving {addr}"))?;
    let sock = addrs.next().ok_or_else(|| anyhow!("no address found for {addr}"))?;
    let tcp = TcpStream::connect_timeout(&sock, Duration::from_secs(10)).with_context(|| format!("connecting to {addr}"))?;
    let _ = tcp.set_read_timeout(Some(Duration::from_secs(30)));
    let _ = tcp.set_write_timeout(Some(Duration::from_secs(30)));

    let mut sess = ssh2::Session::new().context("creating ssh session")?;
    sess.set_tcp_stream(tcp);
    sess.handshake().with_context(|| format!("ssh handshake with {addr}"))?;

    if try_key_authentication(&mut sess, user, key) {
        Ok(sess)
    } else {
        Err(anyhow!("key authentication failed for {user}@{addr}"))
    }
}
