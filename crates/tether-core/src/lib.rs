//! Tether transport abstraction core.
//!
//! This crate is the seam between a higher-level networking framework and
//! whatever network technology actually moves the bytes (TCP, UDP,
//! WebSocket, relays...). It defines the contract every concrete transport
//! must satisfy and the plumbing the framework uses to talk to one — and
//! nothing else: no wire protocol, no framing, no congestion control.
//!
//! # Architecture
//!
//! ```text
//!      ┌─────────────────────────────┐
//!      │ higher-level framework      │
//!      │ (replication / RPC / ...)   │
//!      └─────────────┬───────────────┘
//!                    │ routes through
//!      ┌─────────────▼───────────────┐
//!      │ TransportLifecycle          │  validated sends, state machines,
//!      │  + TransportRegistry        │  per-cycle dispatch point
//!      └─────────────┬───────────────┘
//!                    │ capability traits
//!      ┌─────────────▼───────────────┐
//!      │ concrete transports         │  external collaborators
//!      │ (tcp / udp / websocket / …) │  (tether-harness ships a
//!      └─────────────────────────────┘   deterministic in-memory one)
//! ```
//!
//! # Key rules
//!
//! - No public operation blocks: connects, starts, and sends are
//!   fire-and-forget; outcomes surface as queued events or booleans.
//! - Subscriber code is only ever entered at the single per-cycle dispatch
//!   point, never from a transport's background thread.
//! - Every outbound payload passes the centralized validator: empty and
//!   oversized packets are rejected locally with a diagnostic, before any
//!   I/O.
//! - Every established connection gets exactly one terminal
//!   `disconnected` event, enforced by the lifecycle guard.
//!
//! # Modules
//!
//! - [`packet`]: channels, connection ids, borrowed payload view
//! - [`transport`]: the capability contracts (common / client / server)
//! - [`event`]: queued occurrences and ordered subscriber lists
//! - [`validate`]: the outbound packet policy
//! - [`registry`]: set-once active transport lookup
//! - [`lifecycle`]: composition, dispatch ordering, quit hook
//! - [`error`]: fault taxonomy

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod event;
pub mod lifecycle;
pub mod packet;
pub mod registry;
pub mod transport;
pub mod validate;

pub use error::{ConnectionFault, RegistryError, ValidationError};
pub use event::{ClientEvent, ClientEvents, EventSink, ServerEvent, ServerEvents, SubscriberList};
pub use lifecycle::{ClientState, Scheduler, ServerState, TransportLifecycle};
pub use packet::{Channel, ConnectionId, Packet};
pub use registry::TransportRegistry;
pub use transport::{ClientTransport, ServerTransport, Transport};
pub use validate::check_outbound;
