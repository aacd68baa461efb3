//! Capability contracts every transport must satisfy.
//!
//! A concrete transport (TCP, UDP, WebSocket, relay...) plugs into the
//! framework by implementing whichever capability sets it supports:
//!
//! - [`Transport`]: the common capability every implementation carries
//! - [`ClientTransport`]: the client role (at most one connection out)
//! - [`ServerTransport`]: the server role (many accepted connections in)
//!
//! A client-only transport implements `Transport + ClientTransport`; a
//! transport that serves both roles implements all three. The traits are
//! composed, never inherited from a single abstract base.
//!
//! # Contract rules
//!
//! - No operation blocks. `connect`, `start`, and the send methods are
//!   fire-and-forget; outcomes surface later through the event hubs or
//!   through the boolean accept/reject result.
//! - Completion of asynchronous work is signaled via events drained at the
//!   per-cycle dispatch point (see [`crate::lifecycle`]), never by calling
//!   subscriber code from a transport's own thread.
//! - `max_packet_size` must be answerable at all times — before `start`,
//!   before `connect`, even when `is_available()` is false. Higher layers
//!   (e.g. a multiplexer picking the minimum size across candidate
//!   transports) rely on querying it statelessly.
//! - `shutdown` is idempotent and tears down both roles unconditionally,
//!   releasing background threads and sockets so the same instance can be
//!   restarted clean.

use url::Url;

use crate::{
    event::{ClientEvents, ServerEvents},
    packet::{Channel, ConnectionId, Packet},
};

/// Common capability: the minimal operation set any transport exposes.
pub trait Transport: Send + Sync {
    /// Whether this transport can run on the current host.
    ///
    /// Pure query, no side effects. The framework must check this before
    /// selecting a transport; a `false` here is how an unsupported
    /// platform is communicated (no error value is involved).
    fn is_available(&self) -> bool;

    /// Largest payload the given channel can carry, in bytes.
    ///
    /// Never fails and never depends on the transport having been started.
    /// Absent reconfiguration, the value is stable between calls.
    fn max_packet_size(&self, channel: Channel) -> usize;

    /// Stop both roles unconditionally and release background resources.
    ///
    /// Idempotent: calling it on an already-shut-down transport is a no-op.
    /// Must be safe to call even while operations are in flight; it is the
    /// only cancellation mechanism the contract offers.
    fn shutdown(&self);
}

/// Client capability: zero or one active connection to a server.
pub trait ClientTransport: Transport {
    /// Event hub for this role. The framework subscribes here and drains
    /// it at the dispatch point.
    fn events(&self) -> &ClientEvents;

    /// True iff currently connected to a server.
    fn is_connected(&self) -> bool;

    /// Initiate a connection attempt to a transport-interpreted address.
    ///
    /// Asynchronous: completion is signaled via the `connected` event, not
    /// the return of this call.
    fn connect(&self, address: &str);

    /// Initiate a connection attempt described by a URI.
    ///
    /// The default interpretation extracts the host component and
    /// delegates to [`ClientTransport::connect`]. Transports override this
    /// for scheme-specific behavior (choosing a port or sub-protocol from
    /// the scheme, say).
    fn connect_uri(&self, uri: &Url) {
        match uri.host_str() {
            Some(host) => self.connect(host),
            None => {
                tracing::warn!(%uri, "connect_uri: uri has no host component, ignoring");
            },
        }
    }

    /// Attempt to enqueue/transmit one packet.
    ///
    /// Returns `true` if the packet was *accepted for delivery* — whether
    /// it is actually delivered is governed by the channel's
    /// transport-specific guarantees. Transports may assume the payload
    /// has already passed the centralized validator when called through
    /// [`crate::lifecycle::TransportLifecycle::client_send`].
    fn send(&self, packet: Packet<'_>) -> bool;

    /// Request termination of the active connection.
    ///
    /// Safe to call when no connection is active. An established
    /// connection produces exactly one `disconnected` event.
    fn disconnect(&self);
}

/// Server capability: listen for and manage many accepted connections.
pub trait ServerTransport: Transport {
    /// Event hub for this role.
    fn events(&self) -> &ServerEvents;

    /// True iff currently listening.
    fn is_active(&self) -> bool;

    /// Begin listening. Fire-and-forget; accepted connections surface as
    /// `connected(id)` events.
    fn start(&self);

    /// Stop listening and terminate all live connections.
    ///
    /// Each live connection produces its own `disconnected(id)` event.
    fn stop(&self);

    /// Multicast one packet to a set of connections in a single call, so
    /// transports can batch or optimize.
    ///
    /// Returns `true` only if the packet was accepted for **all** targets.
    /// Partial-failure semantics beyond that are transport-defined and
    /// must be documented by the transport.
    fn send_to(&self, connection_ids: &[ConnectionId], packet: Packet<'_>) -> bool;

    /// Force-close one connection.
    ///
    /// Returns `false` if the id is not currently live.
    fn disconnect(&self, id: ConnectionId) -> bool;

    /// Remote address of one live connection, for logging/inspection.
    fn client_address(&self, id: ConnectionId) -> Option<String>;

    /// The address at which this server can be reached, for discovery.
    ///
    /// `None` while the server is not reachable (e.g. not started).
    fn server_uri(&self) -> Option<Url>;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Minimal client-only transport used to exercise the provided
    /// `connect_uri` host-extraction fallback.
    struct RecordingClient {
        events: ClientEvents,
        connects: parking_lot::Mutex<Vec<String>>,
        shutdowns: AtomicUsize,
    }

    impl RecordingClient {
        fn new() -> Self {
            Self {
                events: ClientEvents::new(),
                connects: parking_lot::Mutex::new(Vec::new()),
                shutdowns: AtomicUsize::new(0),
            }
        }
    }

    impl Transport for RecordingClient {
        fn is_available(&self) -> bool {
            true
        }

        fn max_packet_size(&self, _channel: Channel) -> usize {
            1200
        }

        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ClientTransport for RecordingClient {
        fn events(&self) -> &ClientEvents {
            &self.events
        }

        fn is_connected(&self) -> bool {
            false
        }

        fn connect(&self, address: &str) {
            self.connects.lock().push(address.to_string());
        }

        fn send(&self, _packet: Packet<'_>) -> bool {
            true
        }

        fn disconnect(&self) {}
    }

    #[test]
    fn connect_uri_defaults_to_host_extraction() {
        let client = RecordingClient::new();
        let uri = Url::parse("tcp://game.example.com:7777/lobby").unwrap();
        client.connect_uri(&uri);
        assert_eq!(*client.connects.lock(), vec!["game.example.com"]);
    }

    #[test]
    fn connect_uri_without_host_is_ignored() {
        let client = RecordingClient::new();
        let uri = Url::parse("data:text/plain,hello").unwrap();
        client.connect_uri(&uri);
        assert!(client.connects.lock().is_empty());
    }

    #[test]
    fn max_packet_size_is_queryable_without_start() {
        let client = RecordingClient::new();
        // Never connected, never started: still answerable and stable.
        assert_eq!(client.max_packet_size(Channel::DEFAULT), 1200);
        assert_eq!(client.max_packet_size(Channel(3)), 1200);
        assert_eq!(client.max_packet_size(Channel::DEFAULT), 1200);
    }
}
