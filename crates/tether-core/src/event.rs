//! Event model: queued network occurrences, delivered at a single dispatch
//! point.
//!
//! Transports never call into subscriber code directly. Every asynchronous
//! occurrence (connected, data received, error, disconnected) is pushed into
//! a per-role FIFO queue via an [`EventSink`] — from the transport's own
//! thread or from any background thread it runs — and delivered only when
//! the host drains the queue at the per-cycle dispatch point.
//!
//! # Why a single queue per role?
//!
//! Subscriber lists are per event kind (a subscriber interested only in
//! `dataReceived` registers only there), but ordering is a cross-kind
//! contract: `connected` must be observed before the data that arrived on
//! that connection, and `disconnected` strictly last. One FIFO queue per
//! role preserves that order; dispatch routes each drained occurrence to
//! its kind's subscriber list.
//!
//! # Iteration safety
//!
//! Dispatch delivers to a snapshot of the subscriber list taken per event,
//! so a callback may subscribe or unsubscribe (itself included) without
//! invalidating the pass. Events enqueued *during* a dispatch pass are held
//! for the next cycle — networking effects become visible "for next cycle",
//! never partway through the current one.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::{
    error::ConnectionFault,
    packet::{Channel, ConnectionId},
};

/// Handle returned by [`SubscriberList::subscribe`], used to unsubscribe.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SubscriptionId(u64);

/// Boxed subscriber callback.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered set of callbacks for one event kind.
///
/// Registration order determines dispatch order. Multiple subscribers are
/// permitted; delivery happens against a snapshot so concurrent
/// subscribe/unsubscribe cannot invalidate an in-flight pass.
pub struct SubscriberList<T> {
    entries: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
    next_id: AtomicU64,
}

impl<T> Default for SubscriberList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubscriberList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()), next_id: AtomicU64::new(0) }
    }

    /// Register a callback; it will be invoked after all earlier registrants.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a previously registered callback.
    ///
    /// Returns `false` if the id was not (or no longer) registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if no subscribers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `value` to a snapshot of the current subscribers, in
    /// registration order.
    pub(crate) fn notify(&self, value: &T) {
        let snapshot: Vec<Callback<T>> =
            self.entries.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in snapshot {
            callback(value);
        }
    }
}

/// Asynchronous occurrence on the client role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Connection to the server established. Fires once per successful
    /// connection establishment.
    Connected,

    /// One application-level message arrived.
    Data {
        /// The received payload (owned copy; cheap to clone for fan-out).
        payload: Bytes,
        /// Channel the message arrived on.
        channel: Channel,
    },

    /// A communication fault occurred. Does not by itself imply
    /// disconnection.
    Error(ConnectionFault),

    /// The connection ended, for any reason. Terminal: fires exactly once
    /// per established connection.
    Disconnected,
}

/// Asynchronous occurrence on the server role, scoped to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A remote client's connection was accepted.
    Connected(ConnectionId),

    /// One application-level message arrived from a connection.
    Data {
        /// Connection the message arrived from.
        id: ConnectionId,
        /// The received payload.
        payload: Bytes,
        /// Channel the message arrived on.
        channel: Channel,
    },

    /// A communication fault occurred on one connection.
    Error {
        /// Connection the fault is scoped to.
        id: ConnectionId,
        /// Fault detail.
        fault: ConnectionFault,
    },

    /// One connection ended. Terminal per connection id: fires exactly once.
    Disconnected(ConnectionId),
}

/// Cloneable producer half of an event queue.
///
/// Transports hold a sink and push occurrences into it from wherever they
/// run — including background threads. Pushing never blocks and never
/// invokes subscriber code; delivery happens only at the dispatch point.
pub struct EventSink<E> {
    tx: Sender<E>,
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<E> EventSink<E> {
    /// Enqueue one occurrence for delivery at the next dispatch point.
    pub fn push(&self, event: E) {
        // The receiver lives as long as the events hub; a send can only
        // fail after teardown, at which point dropping the event is correct.
        let _ = self.tx.send(event);
    }
}

/// FIFO of occurrences awaiting the next dispatch pass.
struct EventQueue<E> {
    tx: Sender<E>,
    rx: Receiver<E>,
}

impl<E> EventQueue<E> {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    fn sink(&self) -> EventSink<E> {
        EventSink { tx: self.tx.clone() }
    }

    /// Drain the events queued *before* this call and hand each to `deliver`.
    ///
    /// Bounding the drain to the queue length at entry guarantees progress
    /// even if a callback enqueues further events: those wait for the next
    /// cycle.
    fn drain(&self, mut deliver: impl FnMut(E)) -> usize {
        let pending = self.rx.len();
        let mut delivered = 0;
        for _ in 0..pending {
            match self.rx.try_recv() {
                Ok(event) => {
                    deliver(event);
                    delivered += 1;
                },
                Err(_) => break,
            }
        }
        delivered
    }

    fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Event hub for the client role: one FIFO queue, one subscriber list per
/// event kind.
pub struct ClientEvents {
    queue: EventQueue<ClientEvent>,
    /// Fired once per successful connection establishment.
    pub connected: SubscriberList<()>,
    /// Fired once per received application-level message.
    pub data_received: SubscriberList<(Bytes, Channel)>,
    /// Fired on any communication fault.
    pub error: SubscriberList<ConnectionFault>,
    /// Fired exactly once when the connection ends.
    pub disconnected: SubscriberList<()>,
}

impl Default for ClientEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientEvents {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            queue: EventQueue::new(),
            connected: SubscriberList::new(),
            data_received: SubscriberList::new(),
            error: SubscriberList::new(),
            disconnected: SubscriberList::new(),
        }
    }

    /// Producer handle for the transport (cloneable, thread-safe).
    pub fn sink(&self) -> EventSink<ClientEvent> {
        self.queue.sink()
    }

    /// Number of occurrences waiting for the next dispatch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Drain queued occurrences, routing each to its kind's subscribers.
    ///
    /// `filter` sees every drained event before delivery and may suppress
    /// it by returning `false`; the lifecycle layer uses this to enforce
    /// the one-terminal-event invariant. Returns the number delivered.
    pub fn dispatch_filtered(&self, mut filter: impl FnMut(&ClientEvent) -> bool) -> usize {
        let mut delivered = 0;
        self.queue.drain(|event| {
            if !filter(&event) {
                return;
            }
            delivered += 1;
            match event {
                ClientEvent::Connected => self.connected.notify(&()),
                ClientEvent::Data { payload, channel } => {
                    self.data_received.notify(&(payload, channel));
                },
                ClientEvent::Error(fault) => self.error.notify(&fault),
                ClientEvent::Disconnected => self.disconnected.notify(&()),
            }
        });
        delivered
    }

    /// Drain and deliver everything queued so far.
    pub fn dispatch(&self) -> usize {
        self.dispatch_filtered(|_| true)
    }
}

/// Event hub for the server role: one FIFO queue, one subscriber list per
/// event kind, every occurrence scoped to a [`ConnectionId`].
pub struct ServerEvents {
    queue: EventQueue<ServerEvent>,
    /// Fired once per accepted connection.
    pub connected: SubscriberList<ConnectionId>,
    /// Fired once per received application-level message.
    pub data_received: SubscriberList<(ConnectionId, Bytes, Channel)>,
    /// Fired on any communication fault, scoped to the faulting connection.
    pub error: SubscriberList<(ConnectionId, ConnectionFault)>,
    /// Fired exactly once per connection when it ends.
    pub disconnected: SubscriberList<ConnectionId>,
}

impl Default for ServerEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerEvents {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            queue: EventQueue::new(),
            connected: SubscriberList::new(),
            data_received: SubscriberList::new(),
            error: SubscriberList::new(),
            disconnected: SubscriberList::new(),
        }
    }

    /// Producer handle for the transport (cloneable, thread-safe).
    pub fn sink(&self) -> EventSink<ServerEvent> {
        self.queue.sink()
    }

    /// Number of occurrences waiting for the next dispatch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Drain queued occurrences, routing each to its kind's subscribers.
    ///
    /// Same contract as [`ClientEvents::dispatch_filtered`].
    pub fn dispatch_filtered(&self, mut filter: impl FnMut(&ServerEvent) -> bool) -> usize {
        let mut delivered = 0;
        self.queue.drain(|event| {
            if !filter(&event) {
                return;
            }
            delivered += 1;
            match event {
                ServerEvent::Connected(id) => self.connected.notify(&id),
                ServerEvent::Data { id, payload, channel } => {
                    self.data_received.notify(&(id, payload, channel));
                },
                ServerEvent::Error { id, fault } => self.error.notify(&(id, fault)),
                ServerEvent::Disconnected(id) => self.disconnected.notify(&id),
            }
        });
        delivered
    }

    /// Drain and deliver everything queued so far.
    pub fn dispatch(&self) -> usize {
        self.dispatch_filtered(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn subscribers_fire_in_registration_order() {
        let events = ClientEvents::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            events.connected.subscribe(move |()| order.lock().push(tag));
        }

        events.sink().push(ClientEvent::Connected);
        assert_eq!(events.dispatch(), 1);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_removes_callback() {
        let events = ClientEvents::new();
        let count = Arc::new(Mutex::new(0));
        assert!(events.connected.is_empty());

        let counter = Arc::clone(&count);
        let id = events.connected.subscribe(move |()| *counter.lock() += 1);
        assert_eq!(events.connected.len(), 1);

        events.sink().push(ClientEvent::Connected);
        events.dispatch();
        assert_eq!(*count.lock(), 1);

        assert!(events.connected.unsubscribe(id));
        assert!(!events.connected.unsubscribe(id)); // Already gone
        assert!(events.connected.is_empty());

        events.sink().push(ClientEvent::Connected);
        events.dispatch();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn unsubscribe_from_inside_callback_is_safe() {
        let events = ClientEvents::new();
        let hits = Arc::new(Mutex::new(0));

        // The callback removes a *later* subscriber mid-pass; the snapshot
        // taken at notify time still delivers to it this cycle.
        let victim_slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let events_ref = Arc::new(events);
        let hub = Arc::clone(&events_ref);
        let slot = Arc::clone(&victim_slot);
        events_ref.connected.subscribe(move |()| {
            if let Some(victim) = slot.lock().take() {
                hub.connected.unsubscribe(victim);
            }
        });
        let counter = Arc::clone(&hits);
        let victim = events_ref.connected.subscribe(move |()| *counter.lock() += 1);
        *victim_slot.lock() = Some(victim);

        events_ref.sink().push(ClientEvent::Connected);
        events_ref.dispatch();
        assert_eq!(*hits.lock(), 1); // Snapshot delivery

        events_ref.sink().push(ClientEvent::Connected);
        events_ref.dispatch();
        assert_eq!(*hits.lock(), 1); // Gone for the next cycle
    }

    #[test]
    fn queue_preserves_cross_kind_order() {
        let events = ServerEvents::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        events.connected.subscribe(move |id| l.lock().push(format!("connected {id}")));
        let l = Arc::clone(&log);
        events
            .data_received
            .subscribe(move |(id, payload, _)| l.lock().push(format!("data {id} {:?}", &payload[..])));
        let l = Arc::clone(&log);
        events.disconnected.subscribe(move |id| l.lock().push(format!("disconnected {id}")));

        let sink = events.sink();
        let id = ConnectionId(7);
        sink.push(ServerEvent::Connected(id));
        sink.push(ServerEvent::Data {
            id,
            payload: Bytes::from_static(b"m1"),
            channel: Channel::DEFAULT,
        });
        sink.push(ServerEvent::Disconnected(id));

        assert_eq!(events.dispatch(), 3);
        assert_eq!(
            *log.lock(),
            vec!["connected #7", "data #7 [109, 49]", "disconnected #7"]
        );
    }

    #[test]
    fn events_pushed_during_dispatch_wait_for_next_cycle() {
        let events = Arc::new(ClientEvents::new());
        let sink = events.sink();

        let resender = sink.clone();
        events.connected.subscribe(move |()| resender.push(ClientEvent::Connected));

        sink.push(ClientEvent::Connected);
        assert_eq!(events.dispatch(), 1); // Only the pre-queued event
        assert_eq!(events.pending(), 1); // The re-push waits

        assert_eq!(events.dispatch(), 1);
    }

    #[test]
    fn sink_is_usable_from_background_threads() {
        let events = ClientEvents::new();
        let sink = events.sink();

        let handle = std::thread::spawn(move || {
            for _ in 0..10 {
                sink.push(ClientEvent::Data {
                    payload: Bytes::from_static(b"bg"),
                    channel: Channel::DEFAULT,
                });
            }
        });
        handle.join().expect("producer thread panicked");

        // Nothing delivered before the dispatch point.
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        events.data_received.subscribe(move |_| *counter.lock() += 1);

        assert_eq!(events.dispatch(), 10);
        assert_eq!(*seen.lock(), 10);
    }
}
