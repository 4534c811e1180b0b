//! Remote execution of a batch script over one SSH session.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ssh2::{CheckResult, ExtendedData, KnownHostFileKind, Session};
use thiserror::Error;

use crate::config::HostKeyPolicy;

/// Where and as whom a script runs.
#[derive(Clone)]
pub struct RemoteTarget {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTarget")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Interleaved stdout/stderr of the remote shell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub transcript: String,
    /// `None` when the server closed the channel without reporting a status.
    pub exit_status: Option<i32>,
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("cannot resolve {0}")]
    Resolve(String),

    #[error("connection to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ssh handshake failed: {0}")]
    Handshake(#[source] ssh2::Error),

    #[error("host key verification failed: {0}")]
    HostKey(String),

    #[error("authentication failed: {0}")]
    Auth(#[source] ssh2::Error),

    #[error("authentication rejected by server")]
    AuthRejected,

    #[error("ssh session error: {0}")]
    Session(#[source] ssh2::Error),

    #[error("ssh channel i/o error: {0}")]
    Stream(#[source] std::io::Error),

    #[error("remote round trip exceeded {0:?}")]
    Deadline(Duration),

    #[error("ssh worker failed: {0}")]
    Worker(String),
}

/// Runs a whole script in one non-interactive remote shell.
///
/// At most once: implementations never retry and never inspect the
/// transcript for per-line success.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn run_script(&self, target: &RemoteTarget, script: &str) -> Result<RemoteOutput, ExecError>;
}

/// [`RemoteShell`] backed by libssh2 with password authentication.
#[derive(Clone, Debug)]
pub struct SshShell {
    timeout: Duration,
    host_key_policy: HostKeyPolicy,
}

impl SshShell {
    pub fn new(timeout: Duration, host_key_policy: HostKeyPolicy) -> Self {
        SshShell { timeout, host_key_policy }
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn run_script(&self, target: &RemoteTarget, script: &str) -> Result<RemoteOutput, ExecError> {
        let address = target.address.clone();
        let target = target.clone();
        let script = script.to_string();
        let policy = self.host_key_policy.clone();
        let deadline = self.timeout;

        tracing::info!(address = %address, port = target.port, bytes = script.len(), "Running batch script over ssh");
        let mut task = tokio::task::spawn_blocking(move || run_blocking(&target, &script, &policy, deadline));
        match tokio::time::timeout(deadline + CLOSE_GRACE, &mut task).await {
            Ok(Err(join)) => Err(ExecError::Worker(join.to_string())),
            Ok(Ok(result)) => result,
            Err(_) => {
                // The worker thread outlives a dropped handle; hold the caller
                // (and its host lock) until the session is gone.
                tracing::warn!(address = %address, ?deadline, "ssh worker overran its deadline; waiting for it to exit");
                let _ = task.await;
                Err(ExecError::Deadline(deadline))
            }
        }
    }
}

/// Time allowed past the deadline for the worker to tear its session down.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// libssh2 timeout for the close and disconnect calls after a failure.
const CLOSE_TIMEOUT_MS: u32 = 1_000;

/// Absolute time limit for one remote round trip, shared by every blocking step.
struct Budget {
    started: Instant,
    limit: Duration,
}

impl Budget {
    fn new(limit: Duration) -> Self {
        Budget {
            started: Instant::now(),
            limit,
        }
    }

    fn remaining(&self) -> Result<Duration, ExecError> {
        let left = self.limit.saturating_sub(self.started.elapsed());
        if left.is_zero() {
            Err(ExecError::Deadline(self.limit))
        } else {
            Ok(left)
        }
    }

    /// Bound the next libssh2 call by whatever is left.
    fn arm(&self, session: &Session) -> Result<(), ExecError> {
        session.set_timeout(timeout_millis(self.remaining()?));
        Ok(())
    }

    /// Failures after the budget ran out are reported as the deadline.
    fn explain(&self, err: ExecError) -> ExecError {
        match self.remaining() {
            Ok(_) => err,
            Err(deadline) => deadline,
        }
    }
}

// Zero means "no timeout" to libssh2.
fn timeout_millis(d: Duration) -> u32 {
    d.as_millis().clamp(1, u32::MAX as u128) as u32
}

fn run_blocking(
    target: &RemoteTarget,
    script: &str,
    policy: &HostKeyPolicy,
    deadline: Duration,
) -> Result<RemoteOutput, ExecError> {
    let budget = Budget::new(deadline);
    let endpoint = format!("{}:{}", target.address, target.port);
    let addr = (target.address.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|_| ExecError::Resolve(endpoint.clone()))?
        .next()
        .ok_or_else(|| ExecError::Resolve(endpoint.clone()))?;

    let tcp = TcpStream::connect_timeout(&addr, budget.remaining()?).map_err(|e| ExecError::Connect {
        address: endpoint.clone(),
        source: e,
    })?;

    let mut session = Session::new().map_err(ExecError::Session)?;
    session.set_tcp_stream(tcp);
    budget.arm(&session)?;
    session
        .handshake()
        .map_err(|e| budget.explain(ExecError::Handshake(e)))?;

    verify_host_key(&session, target, policy)?;

    budget.arm(&session)?;
    session
        .userauth_password(&target.username, &target.secret)
        .map_err(|e| budget.explain(ExecError::Auth(e)))?;
    if !session.authenticated() {
        return Err(ExecError::AuthRejected);
    }

    let result = run_channel(&session, script, &budget);

    session.set_timeout(CLOSE_TIMEOUT_MS);
    if let Err(e) = session.disconnect(None, "batch complete", None) {
        tracing::debug!(%e, "ssh disconnect failed");
    }
    let (raw, exit_status) = result?;
    tracing::info!(address = %target.address, ?exit_status, "Remote batch finished");

    Ok(RemoteOutput {
        transcript: String::from_utf8_lossy(&raw).into_owned(),
        exit_status,
    })
}

fn run_channel(session: &Session, script: &str, budget: &Budget) -> Result<(Vec<u8>, Option<i32>), ExecError> {
    budget.arm(session)?;
    let mut channel = session
        .channel_session()
        .map_err(|e| budget.explain(ExecError::Session(e)))?;
    channel
        .handle_extended_data(ExtendedData::Merge)
        .map_err(ExecError::Session)?;
    channel
        .exec("sh -s")
        .map_err(|e| budget.explain(ExecError::Session(e)))?;

    budget.arm(session)?;
    channel
        .write_all(script.as_bytes())
        .map_err(|e| budget.explain(ExecError::Stream(e)))?;
    channel
        .send_eof()
        .map_err(|e| budget.explain(ExecError::Session(e)))?;

    let raw = match drain(&mut channel, budget, |left| session.set_timeout(timeout_millis(left))) {
        Ok(raw) => raw,
        Err(e) => {
            session.set_timeout(CLOSE_TIMEOUT_MS);
            if let Err(close) = channel.close() {
                tracing::debug!(%close, "ssh channel close failed");
            }
            return Err(e);
        }
    };

    budget.arm(session)?;
    channel
        .wait_close()
        .map_err(|e| budget.explain(ExecError::Session(e)))?;
    Ok((raw, channel.exit_status().ok()))
}

/// Read until EOF, giving up once the budget is spent. `arm` receives the
/// time left before each read so the transport can bound it.
fn drain<R: Read>(reader: &mut R, budget: &Budget, mut arm: impl FnMut(Duration)) -> Result<Vec<u8>, ExecError> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        arm(budget.remaining()?);
        match reader.read(&mut buf) {
            Ok(0) => return Ok(raw),
            Ok(n) => raw.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::TimedOut => return Err(ExecError::Deadline(budget.limit)),
            Err(e) => return Err(budget.explain(ExecError::Stream(e))),
        }
    }
}

fn verify_host_key(session: &Session, target: &RemoteTarget, policy: &HostKeyPolicy) -> Result<(), ExecError> {
    let path = match policy {
        HostKeyPolicy::Off => return Ok(()),
        HostKeyPolicy::KnownHosts(path) => path,
    };
    let mut known = session.known_hosts().map_err(ExecError::Session)?;
    known
        .read_file(path, KnownHostFileKind::OpenSSH)
        .map_err(|e| ExecError::HostKey(format!("cannot read {}: {}", path.display(), e)))?;
    let (key, _) = session
        .host_key()
        .ok_or_else(|| ExecError::HostKey("server presented no host key".into()))?;
    match known.check_port(&target.address, target.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(ExecError::HostKey(format!(
            "{} is not listed in {}",
            target.address,
            path.display()
        ))),
        CheckResult::Mismatch => Err(ExecError::HostKey(format!(
            "key for {} does not match {}",
            target.address,
            path.display()
        ))),
        CheckResult::Failure => Err(ExecError::HostKey("known_hosts lookup failed".into())),
    }
}
