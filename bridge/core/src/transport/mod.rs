//! Transport Layer for Bridge-Brain IPC
//!
//! Provides abstraction over how the Brain backend is reached:
//! - `InProcess`: Direct channel communication (embedded backend)
//! - `UnixSocket`: Local IPC via Unix domain sockets
//!
//! # Design Philosophy
//!
//! The orchestrator only ever talks to a [`TransportAdapter`]. The adapter
//! only ever talks to a [`BrainTransport`]. Swapping an embedded backend for a
//! daemon changes nothing above this module.

pub mod adapter;
pub mod config;
#[cfg(unix)]
pub mod factory;
pub mod frame;
pub mod in_process;
mod listeners;
pub mod traits;
#[cfg(unix)]
pub mod unix_socket;

pub use adapter::TransportAdapter;
pub use config::TransportConfig;
#[cfg(unix)]
pub use factory::connect_transport;
pub use frame::{FrameDecoder, WireFrame};
pub use in_process::{BackendEndpoint, InProcessTransport, InvokeRequest};
pub use traits::{
    BrainTransport, EventHandler, SettleHook, SubscriptionHandle, TransportError,
};

#[cfg(unix)]
pub use unix_socket::UnixSocketTransport;
