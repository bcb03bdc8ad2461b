//! Transport Configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the bridge reaches a socket-hosted backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Backend socket
    pub socket_path: PathBuf,

    /// How long to wait when connecting
    pub connect_timeout_ms: u64,

    /// Deadline the adapter puts on every invoke (0 = none)
    ///
    /// The query timeout itself is advisory and enforced by the backend. This
    /// only guards against a backend that never answers at all.
    pub invoke_deadline_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            connect_timeout_ms: 5000,
            invoke_deadline_ms: 0,
        }
    }
}

impl TransportConfig {
    /// Connection timeout as a `Duration`
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Invoke deadline, if one is configured
    #[must_use]
    pub fn invoke_deadline(&self) -> Option<Duration> {
        (self.invoke_deadline_ms > 0).then(|| Duration::from_millis(self.invoke_deadline_ms))
    }
}

/// Get the default Unix socket path
///
/// Uses `XDG_RUNTIME_DIR` if available, otherwise `/tmp/brain-bridge-$UID/`
#[must_use]
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir)
            .join("brain-bridge")
            .join("brain.sock")
    } else {
        // SAFETY: getuid has no preconditions and cannot fail
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/brain-bridge-{uid}/brain.sock"))
    }
}
