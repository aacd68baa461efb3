//! Error types for the transport abstraction.
//!
//! The taxonomy mirrors how faults actually propagate:
//!
//! - [`ValidationError`]: detected locally before any I/O. Never crosses the
//!   send boundary as an error — send paths log it and return `false`.
//! - [`ConnectionFault`]: an I/O-level problem after (or while) establishing
//!   a connection. Carried inside `error` events; non-fatal to the transport
//!   itself.
//! - [`RegistryError`]: misuse of the set-once active-transport registry.
//!
//! "Unavailable environment" is deliberately not an error value: it is
//! communicated by `Transport::is_available()` returning `false` before any
//! connect/start is attempted.

use thiserror::Error;

use crate::packet::Channel;

/// Outbound packet rejected by the validator before any I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Zero-length payloads are never transmitted.
    #[error("empty payload: zero-byte packets are never transmitted")]
    EmptyPayload,

    /// Payload exceeds the channel's maximum packet size.
    #[error("payload too large: {size} bytes exceeds limit {max} on channel {channel}")]
    PayloadTooLarge {
        /// Actual payload size in bytes.
        size: usize,
        /// The channel's maximum packet size.
        max: usize,
        /// Channel the send was attempted on.
        channel: Channel,
    },
}

/// An I/O-level communication fault, surfaced via `error` events.
///
/// A fault does not by itself imply disconnection; if the connection is
/// gone, a subsequent `disconnected` event is the authoritative signal.
/// Which faults are followed by disconnection is transport-defined but must
/// be deterministic and documented by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFault {
    /// The remote endpoint refused the connection attempt.
    #[error("connection refused by remote endpoint")]
    Refused,

    /// The connection was reset by the peer.
    #[error("connection reset by peer")]
    Reset,

    /// An operation exceeded the transport's deadline.
    #[error("operation timed out")]
    Timeout,

    /// The peer violated the transport's protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Any other underlying I/O failure, stringified for transport neutrality.
    #[error("transport i/o error: {0}")]
    Io(String),
}

/// Misuse of the active transport registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A role slot was written a second time. The registry is set exactly
    /// once during application configuration.
    #[error("{role} transport already registered")]
    AlreadySet {
        /// Which role slot was double-written ("client" or "server").
        role: &'static str,
    },
}
