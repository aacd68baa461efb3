//! In-memory transport pair: client and server linked through shared state.
//!
//! The pair implements the full capability contracts over a
//! `Arc<Mutex<Shared>>` double, in the spirit of an in-memory test
//! implementation: every operation is synchronous and deterministic, and
//! every network occurrence is queued into the peer's event hub for
//! delivery at the dispatch point — exactly the observable behavior the
//! contract demands of a real transport, minus the I/O.
//!
//! # Documented fault policy
//!
//! Deterministic per the lifecycle contract:
//!
//! - A connect while the server is not listening is fatal to the attempt:
//!   the client observes `error(Refused)` then `disconnected`.
//! - [`MemoryServer::abort`] models a connection-fatal I/O fault: both
//!   sides observe `error` then their terminal `disconnected`.
//! - Send-side rejections are non-fatal: the send returns `false`, no
//!   event is emitted.
//!
//! # Multicast semantics
//!
//! [`MemoryServer`]'s `send_to` is all-accepted: the packet is delivered
//! only if *every* target id is live, and the batch returns `false`
//! without delivering anything otherwise.

use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;
use url::Url;

use tether_core::{
    Channel, ClientEvent, ClientEvents, ClientTransport, ConnectionFault, ConnectionId,
    EventSink, Packet, ServerEvent, ServerEvents, ServerTransport, Transport,
};

/// Configuration for a memory transport pair.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Max packet size applied to channels without an explicit limit.
    pub default_max_packet_size: usize,
    /// Per-channel overrides of the max packet size.
    pub channel_limits: HashMap<Channel, usize>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { default_max_packet_size: 1200, channel_limits: HashMap::new() }
    }
}

impl MemoryConfig {
    /// Limit for one channel. Answerable statelessly, before any start.
    #[must_use]
    pub fn max_packet_size(&self, channel: Channel) -> usize {
        self.channel_limits.get(&channel).copied().unwrap_or(self.default_max_packet_size)
    }
}

/// State shared between the two halves of the pair.
struct Shared {
    config: MemoryConfig,
    listening: bool,
    /// Live connections: id -> remote address string.
    connections: HashMap<ConnectionId, String>,
    /// The single client's current connection, if any.
    client_conn: Option<ConnectionId>,
    next_id: u64,
}

impl Shared {
    fn allocate_id(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Factory for linked in-memory transport pairs.
pub struct MemoryTransport;

impl MemoryTransport {
    /// Create a linked client/server pair with the default configuration.
    #[must_use]
    pub fn pair() -> (Arc<MemoryClient>, Arc<MemoryServer>) {
        Self::pair_with(MemoryConfig::default())
    }

    /// Create a linked client/server pair with explicit channel limits.
    #[must_use]
    pub fn pair_with(config: MemoryConfig) -> (Arc<MemoryClient>, Arc<MemoryServer>) {
        let client_events = ClientEvents::new();
        let server_events = ServerEvents::new();
        let to_client = client_events.sink();
        let to_server = server_events.sink();

        let shared = Arc::new(Mutex::new(Shared {
            config,
            listening: false,
            connections: HashMap::new(),
            client_conn: None,
            next_id: 1,
        }));

        let client = Arc::new(MemoryClient {
            shared: Arc::clone(&shared),
            events: client_events,
            to_server,
        });
        let server = Arc::new(MemoryServer { shared, events: server_events, to_client });
        (client, server)
    }
}

/// Client half of the in-memory pair.
pub struct MemoryClient {
    shared: Arc<Mutex<Shared>>,
    events: ClientEvents,
    to_server: EventSink<ServerEvent>,
}

impl Transport for MemoryClient {
    fn is_available(&self) -> bool {
        true
    }

    fn max_packet_size(&self, channel: Channel) -> usize {
        self.shared.lock().config.max_packet_size(channel)
    }

    fn shutdown(&self) {
        // The client role is the only role this half carries; tearing it
        // down is dropping the active connection. Already-clean state makes
        // a repeat call a no-op.
        self.disconnect();
    }
}

impl ClientTransport for MemoryClient {
    fn events(&self) -> &ClientEvents {
        &self.events
    }

    fn is_connected(&self) -> bool {
        self.shared.lock().client_conn.is_some()
    }

    fn connect(&self, address: &str) {
        let mut shared = self.shared.lock();

        if shared.client_conn.is_some() {
            tracing::debug!(address, "memory client already connected, ignoring connect");
            return;
        }

        if !shared.listening {
            // Fatal to the attempt: fault, then the terminal event.
            let sink = self.events.sink();
            sink.push(ClientEvent::Error(ConnectionFault::Refused));
            sink.push(ClientEvent::Disconnected);
            return;
        }

        let id = shared.allocate_id();
        shared.connections.insert(id, format!("memory://{address}/{}", id.0));
        shared.client_conn = Some(id);

        self.to_server.push(ServerEvent::Connected(id));
        self.events.sink().push(ClientEvent::Connected);
    }

    fn send(&self, packet: Packet<'_>) -> bool {
        let shared = self.shared.lock();
        let Some(id) = shared.client_conn else {
            tracing::debug!("memory client send while not connected");
            return false;
        };

        self.to_server.push(ServerEvent::Data {
            id,
            payload: Bytes::copy_from_slice(packet.payload),
            channel: packet.channel,
        });
        true
    }

    fn disconnect(&self) {
        let mut shared = self.shared.lock();
        let Some(id) = shared.client_conn.take() else {
            return;
        };
        shared.connections.remove(&id);

        self.to_server.push(ServerEvent::Disconnected(id));
        self.events.sink().push(ClientEvent::Disconnected);
    }
}

/// Server half of the in-memory pair.
pub struct MemoryServer {
    shared: Arc<Mutex<Shared>>,
    events: ServerEvents,
    to_client: EventSink<ClientEvent>,
}

impl MemoryServer {
    /// Force-close `id` with a connection-fatal fault.
    ///
    /// Both sides observe `error` followed by their terminal
    /// `disconnected`. Returns `false` if the id is not live.
    pub fn abort(&self, id: ConnectionId, fault: ConnectionFault) -> bool {
        let mut shared = self.shared.lock();
        if shared.connections.remove(&id).is_none() {
            return false;
        }

        let sink = self.events.sink();
        sink.push(ServerEvent::Error { id, fault: fault.clone() });
        sink.push(ServerEvent::Disconnected(id));

        if shared.client_conn.take_if(|conn| *conn == id).is_some() {
            self.to_client.push(ClientEvent::Error(fault));
            self.to_client.push(ClientEvent::Disconnected);
        }
        true
    }

    /// Close one live connection, emitting terminal events on both sides.
    /// Caller must hold the lock.
    fn close_locked(&self, shared: &mut Shared, id: ConnectionId) -> bool {
        if shared.connections.remove(&id).is_none() {
            return false;
        }
        self.events.sink().push(ServerEvent::Disconnected(id));

        if shared.client_conn.take_if(|conn| *conn == id).is_some() {
            self.to_client.push(ClientEvent::Disconnected);
        }
        true
    }
}

impl Transport for MemoryServer {
    fn is_available(&self) -> bool {
        true
    }

    fn max_packet_size(&self, channel: Channel) -> usize {
        self.shared.lock().config.max_packet_size(channel)
    }

    fn shutdown(&self) {
        // Stop covers the whole server role; repeat calls find nothing
        // listening and no live connections.
        self.stop();
    }
}

impl ServerTransport for MemoryServer {
    fn events(&self) -> &ServerEvents {
        &self.events
    }

    fn is_active(&self) -> bool {
        self.shared.lock().listening
    }

    fn start(&self) {
        let mut shared = self.shared.lock();
        if shared.listening {
            tracing::debug!("memory server already listening");
            return;
        }
        shared.listening = true;
    }

    fn stop(&self) {
        let mut shared = self.shared.lock();
        shared.listening = false;

        let live: Vec<ConnectionId> = shared.connections.keys().copied().collect();
        for id in live {
            self.close_locked(&mut shared, id);
        }
    }

    fn send_to(&self, connection_ids: &[ConnectionId], packet: Packet<'_>) -> bool {
        let shared = self.shared.lock();

        // All-accepted: refuse the whole batch if any target is dead,
        // delivering to none of them.
        if let Some(dead) = connection_ids.iter().find(|id| !shared.connections.contains_key(id)) {
            tracing::debug!(%dead, "memory server multicast includes dead connection, rejecting batch");
            return false;
        }

        for id in connection_ids {
            if shared.client_conn == Some(*id) {
                self.to_client.push(ClientEvent::Data {
                    payload: Bytes::copy_from_slice(packet.payload),
                    channel: packet.channel,
                });
            }
        }
        true
    }

    fn disconnect(&self, id: ConnectionId) -> bool {
        let mut shared = self.shared.lock();
        self.close_locked(&mut shared, id)
    }

    fn client_address(&self, id: ConnectionId) -> Option<String> {
        self.shared.lock().connections.get(&id).cloned()
    }

    fn server_uri(&self) -> Option<Url> {
        if !self.is_active() {
            return None;
        }
        Url::parse("memory://localhost").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_before_start_is_refused() {
        let (client, _server) = MemoryTransport::pair();

        client.connect("localhost");
        assert!(!client.is_connected());

        // Fault then terminal, queued for the dispatch point.
        assert_eq!(client.events().pending(), 2);
    }

    #[test]
    fn connect_after_start_links_both_sides() {
        let (client, server) = MemoryTransport::pair();

        server.start();
        client.connect("localhost");

        assert!(client.is_connected());
        assert_eq!(client.events().pending(), 1);
        assert_eq!(server.events().pending(), 1);

        let id = ConnectionId(1);
        let address = server.client_address(id).expect("live connection has an address");
        assert_eq!(address, "memory://localhost/1");
    }

    #[test]
    fn channel_limits_are_stateless_queries() {
        let mut config = MemoryConfig::default();
        config.channel_limits.insert(Channel(1), 64);
        let (client, server) = MemoryTransport::pair_with(config);

        // Before any start/connect (invariant: always answerable).
        assert_eq!(client.max_packet_size(Channel::DEFAULT), 1200);
        assert_eq!(client.max_packet_size(Channel(1)), 64);
        assert_eq!(server.max_packet_size(Channel(1)), 64);
    }

    #[test]
    fn multicast_rejects_batch_with_dead_target() {
        let (client, server) = MemoryTransport::pair();
        server.start();
        client.connect("localhost");

        let live = ConnectionId(1);
        let dead = ConnectionId(99);
        let payload = [7u8; 8];

        assert!(!server.send_to(&[live, dead], Packet::reliable(&payload)));
        // Nothing was delivered to the live target either.
        assert_eq!(client.events().pending(), 1); // Just the earlier Connected

        assert!(server.send_to(&[live], Packet::reliable(&payload)));
        assert_eq!(client.events().pending(), 2);
    }

    #[test]
    fn server_uri_reflects_listening_state() {
        let (_client, server) = MemoryTransport::pair();
        assert!(server.server_uri().is_none());

        server.start();
        let uri = server.server_uri().expect("listening server is discoverable");
        assert_eq!(uri.scheme(), "memory");

        server.stop();
        assert!(server.server_uri().is_none());
    }

    #[test]
    fn abort_emits_fault_then_terminal_on_both_sides() {
        let (client, server) = MemoryTransport::pair();
        server.start();
        client.connect("localhost");

        assert!(server.abort(ConnectionId(1), ConnectionFault::Reset));
        assert!(!client.is_connected());

        // connected + error + disconnected on each side.
        assert_eq!(client.events().pending(), 3);
        assert_eq!(server.events().pending(), 3);

        // Dead id: nothing further to abort.
        assert!(!server.abort(ConnectionId(1), ConnectionFault::Reset));
    }
}
