//! Remote command execution on the management controller
//!
//! libssh2 is blocking, so every call runs on the blocking pool. The session
//! is moved into the blocking task and handed back afterwards.

use std::io::Read;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

const SSH_PORT: u16 = 22;

/// Opens authenticated sessions
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        user: &str,
        password: &str,
    ) -> Result<Box<dyn RemoteSession>>;
}

/// An open session able to run commands
#[async_trait]
pub trait RemoteSession: Send {
    /// Run a command and return its output, stderr merged into stdout
    async fn exec(&mut self, command: &str) -> Result<Vec<u8>>;

    /// Release the session; later calls are no-ops
    async fn close(&mut self);
}

/// Append the SSH port unless the address already carries one
pub fn with_default_port(host: &str) -> String {
    if host.parse::<SocketAddr>().is_ok() {
        return host.to_string();
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return SocketAddr::new(ip, SSH_PORT).to_string();
    }
    match host.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => host.to_string(),
        _ => format!("{}:{}", host, SSH_PORT),
    }
}

/// ssh2-backed shell
pub struct SshShell {
    timeout: Duration,
}

impl SshShell {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn open_session(
    addr: &str,
    user: &str,
    password: &str,
    timeout: Duration,
) -> std::result::Result<ssh2::Session, String> {
    let sock = addr
        .to_socket_addrs()
        .map_err(|e| format!("resolve failed: {}", e))?
        .next()
        .ok_or_else(|| "no addresses".to_string())?;
    let tcp = TcpStream::connect_timeout(&sock, timeout).map_err(|e| e.to_string())?;

    let mut session = ssh2::Session::new().map_err(|e| e.to_string())?;
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| format!("handshake: {}", e))?;
    session
        .userauth_password(user, password)
        .map_err(|e| format!("authentication: {}", e))?;
    if !session.authenticated() {
        return Err(format!("authentication rejected for {}", user));
    }
    Ok(session)
}

/// Keep at most this many bytes of output in a failure reason
const FAILURE_TAIL: usize = 512;

/// Map an exit status and the combined output to the command result
fn exit_result(status: i32, output: Vec<u8>) -> std::result::Result<Vec<u8>, String> {
    if status == 0 {
        return Ok(output);
    }
    let text = String::from_utf8_lossy(&output);
    let text = text.trim();
    let mut start = text.len().saturating_sub(FAILURE_TAIL);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    Err(format!("exit status {}: {}", status, &text[start..]))
}

fn run_command(session: &ssh2::Session, command: &str) -> std::result::Result<Vec<u8>, String> {
    let mut channel = session.channel_session().map_err(|e| e.to_string())?;
    // Single stream, so a full stderr window cannot stall the stdout read
    channel
        .handle_extended_data(ssh2::ExtendedData::Merge)
        .map_err(|e| e.to_string())?;
    channel.exec(command).map_err(|e| e.to_string())?;

    let mut output = Vec::new();
    channel.read_to_end(&mut output).map_err(|e| e.to_string())?;

    channel.wait_close().map_err(|e| e.to_string())?;
    let status = channel.exit_status().map_err(|e| e.to_string())?;
    exit_result(status, output)
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn connect(
        &self,
        host: &str,
        user: &str,
        password: &str,
    ) -> Result<Box<dyn RemoteSession>> {
        let addr = with_default_port(host);
        let user_owned = user.to_string();
        let password_owned = password.to_string();
        let timeout = self.timeout;

        debug!("Opening SSH session to {} as {}", addr, user);
        let target = addr.clone();
        let session = tokio::task::spawn_blocking(move || {
            open_session(&target, &user_owned, &password_owned, timeout)
        })
        .await
        .map_err(|e| AppError::Internal(format!("SSH connect task failed: {}", e)))?
        .map_err(|reason| AppError::RemoteConnect {
            host: host.to_string(),
            reason,
        })?;

        Ok(Box::new(SshSession {
            session: Some(session),
            addr,
        }))
    }
}

/// Session backed by libssh2
pub struct SshSession {
    session: Option<ssh2::Session>,
    addr: String,
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&mut self, command: &str) -> Result<Vec<u8>> {
        let session = self.session.take().ok_or_else(|| AppError::RemoteExec {
            command: command.to_string(),
            reason: "session closed".to_string(),
        })?;

        let command_owned = command.to_string();
        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = run_command(&session, &command_owned);
            (session, result)
        })
        .await
        .map_err(|e| AppError::Internal(format!("SSH exec task failed: {}", e)))?;
        self.session = Some(session);

        result.map_err(|reason| AppError::RemoteExec {
            command: command.to_string(),
            reason,
        })
    }

    async fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let addr = self.addr.clone();
        let closed = tokio::task::spawn_blocking(move || {
            session.disconnect(None, "edge-boot done", None)
        })
        .await;
        match closed {
            Ok(Ok(())) => debug!("SSH session to {} closed", addr),
            Ok(Err(e)) => warn!("SSH disconnect from {} failed: {}", addr, e),
            Err(e) => warn!("SSH disconnect task failed: {}", e),
        }
    }
}

/// Run blocking cleanup on the blocking pool when inside a runtime, inline otherwise
fn run_detached<F>(cleanup: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(cleanup);
        }
        Err(_) => cleanup(),
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            run_detached(move || {
                let _ = session.disconnect(None, "edge-boot dropped", None);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_default_port() {
        assert_eq!(with_default_port("10.0.0.20"), "10.0.0.20:22");
        assert_eq!(with_default_port("10.0.0.20:2222"), "10.0.0.20:2222");
        assert_eq!(with_default_port("idrac.lan"), "idrac.lan:22");
        assert_eq!(with_default_port("idrac.lan:2200"), "idrac.lan:2200");
        assert_eq!(with_default_port("fe80::1"), "[fe80::1]:22");
        assert_eq!(with_default_port("[fe80::1]:22"), "[fe80::1]:22");
    }

    #[test]
    fn test_exit_result() {
        let output = exit_result(0, b"Power Status=ON\n".to_vec()).unwrap();
        assert_eq!(output, b"Power Status=ON\n");

        let err = exit_result(1, b"\nERROR: Unable to perform the requested action.\n".to_vec())
            .unwrap_err();
        assert_eq!(
            err,
            "exit status 1: ERROR: Unable to perform the requested action."
        );

        let long = "x".repeat(2000) + "tail";
        let err = exit_result(2, long.into_bytes()).unwrap_err();
        assert!(err.ends_with("tail"));
        assert!(err.len() < 600);
    }

    #[tokio::test]
    async fn test_drop_cleanup_leaves_runtime_thread() {
        let (tx, rx) = std::sync::mpsc::channel();
        run_detached(move || {
            tx.send(std::thread::current().id()).unwrap();
        });
        let ran_on = tokio::task::spawn_blocking(move || rx.recv().unwrap())
            .await
            .unwrap();
        assert_ne!(ran_on, std::thread::current().id());
    }

    #[test]
    fn test_drop_cleanup_inline_without_runtime() {
        let (tx, rx) = std::sync::mpsc::channel();
        run_detached(move || {
            tx.send(std::thread::current().id()).unwrap();
        });
        assert_eq!(rx.try_recv().unwrap(), std::thread::current().id());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let shell = SshShell::new(Duration::from_secs(2));
        let err = shell
            .connect("127.0.0.1:1", "root", "calvin")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::RemoteConnect { .. }));
    }
}
