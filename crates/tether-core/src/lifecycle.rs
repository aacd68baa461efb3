//! Lifecycle composition: validated send paths, role state machines, the
//! per-cycle dispatch point, and the quit hook.
//!
//! [`TransportLifecycle`] is the framework's single entry point onto the
//! registered transports. Routing every call through it buys three
//! cross-cutting guarantees no individual transport can provide:
//!
//! - **Centralized validation**: every send is checked by
//!   [`crate::validate`] before the transport sees it, so diagnostics are
//!   uniform and no implementation can silently skip the policy.
//! - **One terminal event**: while draining queued events the lifecycle
//!   tracks which sessions are live and suppresses duplicate `disconnected`
//!   occurrences, so subscribers observe exactly one terminal event per
//!   connection no matter how it ended.
//! - **Deterministic ordering**: event delivery happens only inside
//!   [`TransportLifecycle::dispatch_events`], which the [`Scheduler`] runs
//!   as a distinct phase *after* every registered per-cycle update.
//!   Network-triggered state changes become visible "for next cycle",
//!   never mid-cycle.
//!
//! # State machines
//!
//! ```text
//! Client:  Disconnected ──connect()──> Connecting ──connected──> Connected
//!               ^                           │                        │
//!               └── disconnect / error-close / remote close ─────────┘
//!
//! Server:  Stopped ──start()──> Active ──stop()──> Stopped
//!          (each accepted connection: Connected ──> Disconnected, terminal)
//! ```

use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;
use url::Url;

use crate::{
    event::{ClientEvent, ServerEvent},
    packet::{ConnectionId, Packet},
    registry::TransportRegistry,
    validate,
};

/// Client-role state as tracked by the lifecycle layer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ClientState {
    /// No connection and no attempt in flight.
    Disconnected,
    /// `connect` was issued; waiting for the `connected` event.
    Connecting,
    /// The `connected` event has been delivered.
    Connected,
}

/// Server-role state as tracked by the lifecycle layer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ServerState {
    /// Not listening.
    Stopped,
    /// Listening for connections.
    Active,
}

/// Composition of the capability contracts into one deployable unit.
///
/// Holds a registry reference (it does not own transport lifecycles beyond
/// the shutdown hook) plus the bookkeeping needed for the terminal-event
/// guard.
pub struct TransportLifecycle {
    registry: Arc<TransportRegistry>,
    client_state: Mutex<ClientState>,
    server_state: Mutex<ServerState>,
    /// Connection ids that have been announced `connected` and not yet
    /// `disconnected`. Drives duplicate-terminal suppression.
    live_connections: Mutex<HashSet<ConnectionId>>,
    /// Set when a disconnect was requested with no session active: the
    /// caller is still owed one acknowledging `disconnected` event, which
    /// the guard admits despite the already-`Disconnected` state.
    disconnect_ack_pending: Mutex<bool>,
}

impl TransportLifecycle {
    /// Create a lifecycle over the given registry.
    pub fn new(registry: Arc<TransportRegistry>) -> Self {
        Self {
            registry,
            client_state: Mutex::new(ClientState::Disconnected),
            server_state: Mutex::new(ServerState::Stopped),
            live_connections: Mutex::new(HashSet::new()),
            disconnect_ack_pending: Mutex::new(false),
        }
    }

    /// The registry this lifecycle routes through.
    #[must_use]
    pub fn registry(&self) -> &TransportRegistry {
        &self.registry
    }

    /// Current client-role state.
    #[must_use]
    pub fn client_state(&self) -> ClientState {
        *self.client_state.lock()
    }

    /// Current server-role state.
    #[must_use]
    pub fn server_state(&self) -> ServerState {
        *self.server_state.lock()
    }

    /// Connection ids currently live on the server role.
    #[must_use]
    pub fn live_connections(&self) -> Vec<ConnectionId> {
        self.live_connections.lock().iter().copied().collect()
    }

    // ---- client role -----------------------------------------------------

    /// True iff the client transport reports an active connection.
    #[must_use]
    pub fn client_connected(&self) -> bool {
        self.registry.client().is_some_and(|t| t.is_connected())
    }

    /// Initiate a client connection attempt to `address`.
    ///
    /// Fire-and-forget: completion surfaces as a `connected` event at the
    /// dispatch point. Ignored with a log if no client transport is
    /// registered, the transport cannot run on this host, or a session or
    /// attempt is already active (the existing session is left untouched).
    pub fn client_connect(&self, address: &str) {
        let Some(transport) = self.registry.client() else {
            tracing::warn!(address, "client_connect: no client transport registered");
            return;
        };
        if !transport.is_available() {
            tracing::error!(address, "client_connect: transport unavailable on this host");
            return;
        }
        if !self.begin_connect_attempt() {
            tracing::warn!(address, "client_connect: session or attempt already active, ignoring");
            return;
        }
        transport.connect(address);
    }

    /// Initiate a client connection attempt described by a URI.
    ///
    /// Delegates to the transport's `connect_uri`, whose default extracts
    /// the host component.
    pub fn client_connect_uri(&self, uri: &Url) {
        let Some(transport) = self.registry.client() else {
            tracing::warn!(%uri, "client_connect_uri: no client transport registered");
            return;
        };
        if !transport.is_available() {
            tracing::error!(%uri, "client_connect_uri: transport unavailable on this host");
            return;
        }
        if !self.begin_connect_attempt() {
            tracing::warn!(%uri, "client_connect_uri: session or attempt already active, ignoring");
            return;
        }
        transport.connect_uri(uri);
    }

    /// Transition `Disconnected -> Connecting`; `false` if a session or
    /// attempt is already active.
    fn begin_connect_attempt(&self) -> bool {
        let mut state = self.client_state.lock();
        if *state != ClientState::Disconnected {
            return false;
        }
        *state = ClientState::Connecting;
        true
    }

    /// Validated client send.
    ///
    /// Returns `false` if validation rejects the packet (with a diagnostic,
    /// no I/O attempted) or the transport refuses it; `true` means accepted
    /// for delivery.
    pub fn client_send(&self, packet: Packet<'_>) -> bool {
        let Some(transport) = self.registry.client() else {
            tracing::warn!("client_send: no client transport registered");
            return false;
        };
        if !validate::accept_outbound(transport.as_ref(), packet) {
            return false;
        }
        transport.send(packet)
    }

    /// Request termination of the active client connection.
    ///
    /// Callable unconditionally: with no connection or attempt active, the
    /// request is still acknowledged with a single `disconnected` event at
    /// the next dispatch point.
    pub fn client_disconnect(&self) {
        let Some(transport) = self.registry.client() else {
            return;
        };
        if *self.client_state.lock() == ClientState::Disconnected {
            tracing::debug!("client_disconnect: no active session, queueing acknowledgement");
            *self.disconnect_ack_pending.lock() = true;
            transport.events().sink().push(ClientEvent::Disconnected);
            return;
        }
        transport.disconnect();
    }

    // ---- server role -----------------------------------------------------

    /// True iff the server transport reports it is listening.
    #[must_use]
    pub fn server_active(&self) -> bool {
        self.registry.server().is_some_and(|t| t.is_active())
    }

    /// Begin listening on the server transport.
    pub fn server_start(&self) {
        let Some(transport) = self.registry.server() else {
            tracing::warn!("server_start: no server transport registered");
            return;
        };
        if !transport.is_available() {
            tracing::error!("server_start: transport unavailable on this host");
            return;
        }

        transport.start();
        *self.server_state.lock() = ServerState::Active;
    }

    /// Stop listening and terminate all live connections.
    ///
    /// Each live connection produces its own `disconnected(id)` event at
    /// the next dispatch point.
    pub fn server_stop(&self) {
        let Some(transport) = self.registry.server() else {
            return;
        };
        transport.stop();
        *self.server_state.lock() = ServerState::Stopped;
    }

    /// Validated server multicast.
    ///
    /// All-accepted semantics: returns `true` only if validation passes
    /// and the transport accepts the packet for every target id. An empty
    /// target set is vacuously accepted.
    pub fn server_send(&self, connection_ids: &[ConnectionId], packet: Packet<'_>) -> bool {
        let Some(transport) = self.registry.server() else {
            tracing::warn!("server_send: no server transport registered");
            return false;
        };
        if !validate::accept_outbound(transport.as_ref(), packet) {
            return false;
        }
        transport.send_to(connection_ids, packet)
    }

    /// Force-close one server-side connection.
    ///
    /// Returns `false` if the id is not currently live.
    pub fn server_disconnect(&self, id: ConnectionId) -> bool {
        let Some(transport) = self.registry.server() else {
            return false;
        };
        transport.disconnect(id)
    }

    /// Remote address of one live connection.
    #[must_use]
    pub fn server_client_address(&self, id: ConnectionId) -> Option<String> {
        self.registry.server().and_then(|t| t.client_address(id))
    }

    /// The address at which the server role can be reached.
    #[must_use]
    pub fn server_uri(&self) -> Option<Url> {
        self.registry.server().and_then(|t| t.server_uri())
    }

    // ---- dispatch point --------------------------------------------------

    /// The single per-cycle dispatch point: drain both roles' queued
    /// events through the terminal-event guard and deliver them to
    /// subscribers. Returns the number of events delivered.
    ///
    /// Run this once per host cycle, after every other participant's
    /// update — the [`Scheduler`] encodes that ordering.
    pub fn dispatch_events(&self) -> usize {
        let mut delivered = 0;

        if let Some(server) = self.registry.server() {
            delivered += server.events().dispatch_filtered(|event| self.admit_server(event));
        }
        if let Some(client) = self.registry.client() {
            delivered += client.events().dispatch_filtered(|event| self.admit_client(event));
        }

        delivered
    }

    /// Quit/shutdown hook: invoke when the host process is terminating or
    /// an edit loop is about to restart the same instance.
    ///
    /// Shuts down both registered roles (idempotent, per the common
    /// capability contract) so background threads and sockets are torn
    /// down before a potential restart. Queued terminal events remain
    /// drainable via [`TransportLifecycle::dispatch_events`].
    pub fn on_process_exit(&self) {
        tracing::debug!("process exit: shutting down registered transports");
        if let Some(server) = self.registry.server() {
            server.shutdown();
            *self.server_state.lock() = ServerState::Stopped;
        }
        if let Some(client) = self.registry.client() {
            client.shutdown();
        }
    }

    /// Guard for client events. Updates the client state machine and
    /// decides delivery.
    fn admit_client(&self, event: &ClientEvent) -> bool {
        let mut state = self.client_state.lock();
        match event {
            ClientEvent::Connected => {
                if *state == ClientState::Connected {
                    tracing::debug!("suppressing duplicate client connected event");
                    return false;
                }
                *state = ClientState::Connected;
                true
            },
            ClientEvent::Data { .. } => {
                if *state != ClientState::Connected {
                    tracing::debug!(?state, "dropping data event outside an open session");
                    return false;
                }
                true
            },
            // Faults do not imply disconnection and are delivered in any
            // state; a following Disconnected is the authoritative signal.
            ClientEvent::Error(_) => true,
            ClientEvent::Disconnected => {
                if *state == ClientState::Disconnected {
                    // One pass per explicit no-session disconnect request,
                    // never a standing exemption for stray terminals.
                    let mut ack = self.disconnect_ack_pending.lock();
                    if *ack {
                        *ack = false;
                        return true;
                    }
                    tracing::debug!("suppressing duplicate client disconnected event");
                    return false;
                }
                *state = ClientState::Disconnected;
                true
            },
        }
    }

    /// Guard for server events. Maintains the live-connection set and
    /// decides delivery.
    fn admit_server(&self, event: &ServerEvent) -> bool {
        let mut live = self.live_connections.lock();
        match event {
            ServerEvent::Connected(id) => {
                if !live.insert(*id) {
                    tracing::debug!(%id, "suppressing duplicate server connected event");
                    return false;
                }
                true
            },
            ServerEvent::Data { id, .. } => {
                if !live.contains(id) {
                    tracing::debug!(%id, "dropping data event for dead connection");
                    return false;
                }
                true
            },
            ServerEvent::Error { .. } => true,
            ServerEvent::Disconnected(id) => {
                if !live.remove(id) {
                    tracing::debug!(%id, "suppressing duplicate server disconnected event");
                    return false;
                }
                true
            },
        }
    }
}

/// Explicit cycle driver with an ordered update phase followed by the
/// network-event-drain phase.
///
/// Participants register per-cycle update callbacks; `run_cycle` runs them
/// in registration order and only then drains transport events through the
/// lifecycle. This replaces implicit execution-order configuration with an
/// explicit phase the implementer controls.
pub struct Scheduler {
    lifecycle: Arc<TransportLifecycle>,
    updates: Vec<Box<dyn FnMut()>>,
}

impl Scheduler {
    /// Create a scheduler driving the given lifecycle.
    pub fn new(lifecycle: Arc<TransportLifecycle>) -> Self {
        Self { lifecycle, updates: Vec::new() }
    }

    /// The lifecycle this scheduler drains.
    #[must_use]
    pub fn lifecycle(&self) -> &Arc<TransportLifecycle> {
        &self.lifecycle
    }

    /// Register a per-cycle update participant. Participants run in
    /// registration order, all of them before any event is delivered.
    pub fn add_update(&mut self, update: impl FnMut() + 'static) {
        self.updates.push(Box::new(update));
    }

    /// Run one host cycle: the update phase, then the network-event-drain
    /// phase. Returns the number of transport events delivered.
    pub fn run_cycle(&mut self) -> usize {
        for update in &mut self.updates {
            update();
        }
        self.lifecycle.dispatch_events()
    }

    /// Invoke the quit hook on the underlying lifecycle.
    pub fn on_process_exit(&self) {
        self.lifecycle.on_process_exit();
    }
}
