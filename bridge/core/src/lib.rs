//! Bridge Core - Headless Query Orchestration for the Brain
//!
//! This crate sits between a front-end and a Brain backend reached over an
//! IPC transport. It owns no UI. It turns user text into `processQuery`
//! calls, ties the backend's pushed progress and error events back to the
//! query they belong to, and keeps the backend session status at hand.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Front-ends                            │
//! │     console  ·  desktop shell  ·  headless tests             │
//! └──────────────┬───────────────────────────────▲───────────────┘
//!                │ submit / reset / current       │ RenderIntent
//!                │                                │ ProgressNotice
//! ┌──────────────▼────────────────────────────────┴──────────────┐
//! │                        BRIDGE CORE                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌─────────────────────┐ │
//! │  │ Orchestrator │  │   Session    │  │      EventHub       │ │
//! │  │  (TaskSlot)  │  │    Holder    │  │ (listener registry) │ │
//! │  └──────┬───────┘  └──────┬───────┘  └─────────────────────┘ │
//! │         └────────┬────────┘                                  │
//! │          ┌───────▼─────────┐                                 │
//! │          │ TransportAdapter│                                 │
//! │          └───────┬─────────┘                                 │
//! └──────────────────┼───────────────────────────────────────────┘
//!                    │ invoke / listen
//!          in-process channel  ·  Unix socket
//!                    │
//!              Brain backend
//! ```
//!
//! # Key Types
//!
//! - [`BrainClient`]: The entry point front-ends hold
//! - [`QueryOrchestrator`]: Single-flight query state machine
//! - [`SessionHolder`]: Last known session status, refresh and reset
//! - [`EventHub`]: Typed listener registry for renderer notifications
//! - [`RenderIntent`]: What a front-end should display
//!
//! # Quick Start
//!
//! ```ignore
//! use bridge_core::{load_config, BrainClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config()?;
//!     let client = BrainClient::connect(&config).await?;
//!
//!     client.on_progress(|notice| println!("{}", notice.intent.message()))?;
//!
//!     let resolution = client.submit("summarise my inbox").await?;
//!     println!("{}", resolution.intent.message());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`client`]: Front-end facing facade
//! - [`config`]: TOML + environment configuration
//! - [`dispatch`]: Pure outcome-to-intent mapping
//! - [`error`]: Error taxonomy
//! - [`events`]: Listener registry
//! - [`messages`]: Wire shapes exchanged with the backend
//! - [`orchestrator`]: Query lifecycle and event correlation
//! - [`session`]: Session status holder
//! - [`tasks`]: Task records and the single-flight slot
//! - [`transport`]: IPC transports (in-process, Unix socket)
//! - [`validation`]: Query and payload validation
//!
//! # No UI Dependencies
//!
//! Nothing here draws, reads a terminal, or depends on a UI toolkit.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod messages;
pub mod orchestrator;
pub mod session;
pub mod tasks;
pub mod transport;
pub mod validation;

// Re-exports for convenience
pub use client::BrainClient;
pub use dispatch::{
    Completion, ErrorIntent, Outcome, OutcomeOrigin, ProgressIntent, RenderIntent,
};
pub use error::{BridgeError, ErrorClass};
pub use events::{ErrorNotice, EventHub, EventKind, ListenerId, ProgressNotice};
pub use messages::{
    BrainErrorCode, ErrorEvent, ProgressEvent, ProgressKind, QueryConfig, QueryResponse,
    ResponseMetadata, ResponseType, SessionStatus,
};
pub use orchestrator::{QueryOrchestrator, Resolution};
pub use session::SessionHolder;
pub use tasks::{Task, TaskId, TaskSlot, TaskStatus};
pub use validation::QueryValidator;

// Transport exports
pub use transport::{
    BackendEndpoint, BrainTransport, InProcessTransport, InvokeRequest, TransportAdapter,
    TransportConfig, TransportError,
};
#[cfg(unix)]
pub use transport::UnixSocketTransport;

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, BridgeConfig, ConfigError,
    ConfigOverrides, ConfigSource,
};
