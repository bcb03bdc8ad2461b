//! Unix Socket Transport
//!
//! Reaches a Brain backend hosted in another local process.
//!
//! # Socket Location
//!
//! Default: `$XDG_RUNTIME_DIR/brain-bridge/brain.sock`
//! Fallback: `/tmp/brain-bridge-$UID/brain.sock`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                    ┌─────────────────┐
//! │  bridge              │                    │  Brain backend  │
//! │                      │   Invoke{id,..} ─► │                 │
//! │ UnixSocketTransport  ├───────────────────►│                 │
//! │                      │ ◄─ Reply/Failure   │                 │
//! │  listeners ◄──────── │ ◄─ Event{name,..}  │                 │
//! └──────────────────────┘    brain.sock      └─────────────────┘
//! ```
//!
//! Replies are matched to calls by request id, so any number of invokes can
//! be outstanding while events keep flowing.

mod client;

pub use client::UnixSocketTransport;
