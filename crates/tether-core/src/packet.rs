//! Packet primitives: channels, connection ids, and the borrowed payload view.
//!
//! These are the core's only data types. Channels and connection ids are
//! compact newtypes so comparisons and hashing stay cheap; the payload view
//! borrows rather than owns so the hot send path never allocates.

use std::fmt;

/// Integer-keyed delivery mode (e.g. reliable-ordered vs. unreliable).
///
/// Channel ids are transport-defined; the core treats a channel only as an
/// opaque key into "max packet size for this channel". Channel `0` is
/// reserved as the default reliable channel and must always exist.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Channel(pub u16);

impl Channel {
    /// The default reliable channel. Every transport provides it.
    pub const DEFAULT: Channel = Channel(0);
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for one accepted connection on the server role.
///
/// Unique among currently-live connections; a transport may reuse an id
/// after the connection it named has closed and its `disconnected` event
/// has been delivered. The client role has no connection id — it holds at
/// most one connection to a server.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable view over an outbound payload plus the channel it travels on.
///
/// The payload buffer is **borrowed for the duration of the call only**. A
/// transport receiving a `Packet` must either transmit it synchronously or
/// copy the bytes before returning — the caller is free to reuse the buffer
/// the moment the call returns. This constraint exists purely to avoid a
/// per-send allocation on the hot path.
#[derive(Copy, Clone, Debug)]
pub struct Packet<'a> {
    /// The bytes to transmit.
    pub payload: &'a [u8],
    /// The channel selecting the delivery mode.
    pub channel: Channel,
}

impl<'a> Packet<'a> {
    /// Create a packet view over `payload` for `channel`.
    pub fn new(payload: &'a [u8], channel: Channel) -> Self {
        Self { payload, channel }
    }

    /// Packet on the default reliable channel.
    pub fn reliable(payload: &'a [u8]) -> Self {
        Self::new(payload, Channel::DEFAULT)
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True if the payload is empty (and therefore never transmittable).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
