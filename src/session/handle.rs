//! Connection file shared by the launcher, the interpreter, the monitor and
//! the console.
//!
//! The launcher picks two free ports and a random key, writes them to a JSON
//! file in the temp directory and passes the path to every child through
//! `$KERNWATCH_CONNECTION_FILE`.

use std::fs;
use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{Channel, SessionError};
use super::message::Signer;

/// Delay between readiness probes.
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Contents of a connection file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub transport: String,
    pub ip: String,
    /// Request/terminal-reply endpoint.
    pub control_port: u16,
    /// Broadcast notification endpoint.
    pub notify_port: u16,
    /// Hex signing key. Empty disables signing.
    #[serde(default)]
    pub key: String,

    /// Where this handle was loaded from or will be written to.
    #[serde(skip)]
    pub path: PathBuf,
}

impl SessionHandle {
    /// Reserve two free ports on `ip` and generate a fresh key.
    ///
    /// Both listeners are held at the same time so the ports differ, then
    /// released for the interpreter to bind.
    pub fn allocate(ip: IpAddr) -> Result<Self, SessionError> {
        let control = TcpListener::bind((ip, 0))?;
        let notify = TcpListener::bind((ip, 0))?;
        let control_port = control.local_addr()?.port();
        let notify_port = notify.local_addr()?.port();

        let mut key = Vec::with_capacity(32);
        key.extend_from_slice(Uuid::new_v4().as_bytes());
        key.extend_from_slice(Uuid::new_v4().as_bytes());

        let path = std::env::temp_dir().join(format!(
            "kernwatch-{}-{}.json",
            std::process::id(),
            Uuid::new_v4().simple()
        ));

        Ok(Self {
            transport: "ws".to_owned(),
            ip: ip.to_string(),
            control_port,
            notify_port,
            key: hex::encode(key),
            path,
        })
    }

    /// Read a connection file.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content =
            fs::read_to_string(path).map_err(|e| SessionError::Handle(path.to_path_buf(), e))?;
        let mut handle: Self = serde_json::from_str(&content)
            .map_err(|e| SessionError::HandleFormat(path.to_path_buf(), e))?;
        handle.path = path.to_path_buf();
        Ok(handle)
    }

    /// Write this handle to `self.path`.
    pub fn write(&self) -> Result<(), SessionError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content).map_err(|e| SessionError::Handle(self.path.clone(), e))
    }

    /// Delete the connection file. A file that is already gone is fine.
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    pub const fn port(&self, channel: Channel) -> u16 {
        match channel {
            Channel::Control => self.control_port,
            Channel::Notify => self.notify_port,
        }
    }

    pub fn url(&self, channel: Channel) -> String {
        format!("{}://{}:{}/", self.transport, self.ip, self.port(channel))
    }

    pub fn socket_addr(&self, channel: Channel) -> Result<SocketAddr, SessionError> {
        (self.ip.as_str(), self.port(channel))
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                SessionError::Io(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("cannot resolve {}", self.ip),
                ))
            })
    }

    pub fn signer(&self) -> Result<Signer, SessionError> {
        Signer::from_hex(&self.key)
    }

    /// Block until the interpreter accepts connections on the control port.
    ///
    /// `exited` is polled between probes and reports the interpreter's exit
    /// status once it is gone. Returns `Interrupted` as soon as `shutdown`
    /// fires.
    pub fn wait_ready<F>(
        &self,
        timeout: Duration,
        shutdown: &Receiver<()>,
        mut exited: F,
    ) -> Result<(), SessionError>
    where
        F: FnMut() -> Option<ExitStatus>,
    {
        let addr = self.socket_addr(Channel::Control)?;
        let deadline = Instant::now() + timeout;

        loop {
            if TcpStream::connect_timeout(&addr, PROBE_INTERVAL).is_ok() {
                return Ok(());
            }
            if let Some(status) = exited() {
                return Err(SessionError::Exited(status));
            }
            if Instant::now() >= deadline {
                return Err(SessionError::NotReady(timeout));
            }
            match shutdown.recv_timeout(PROBE_INTERVAL) {
                Ok(()) => return Err(SessionError::Interrupted),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => std::thread::sleep(PROBE_INTERVAL),
            }
        }
    }
}
