//! Transport Factory
//!
//! Builds a connected transport from configuration, so front-ends do not
//! depend on a concrete transport type.

use std::sync::Arc;

use super::config::TransportConfig;
use super::traits::{BrainTransport, TransportError};
use super::unix_socket::UnixSocketTransport;

/// Connect to the socket-hosted backend described by `config`
///
/// Embedded backends do not go through here; use
/// [`super::InProcessTransport::new_pair`] directly.
///
/// # Errors
///
/// `ConnectionFailed` if the socket cannot be reached in time.
pub async fn connect_transport(
    config: &TransportConfig,
) -> Result<Arc<dyn BrainTransport>, TransportError> {
    let transport =
        UnixSocketTransport::connect(config.socket_path.clone(), config.connect_timeout()).await?;
    Ok(Arc::new(transport))
}
