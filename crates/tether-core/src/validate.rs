//! Centralized outbound packet validation.
//!
//! Every send, on every transport, passes through this policy before any
//! I/O is attempted. Centralizing the check keeps the diagnostics uniform
//! across transports and means a transport author cannot silently skip it:
//! the framework send paths in [`crate::lifecycle`] run it unconditionally.
//!
//! Rejection is local and synchronous — no error crosses the send boundary.
//! The caller sees `false` from the send; the detail lands in the log.

use crate::{
    error::ValidationError,
    packet::Packet,
    transport::Transport,
};

/// Check whether `packet` is legal to send on the given transport.
///
/// Pure policy:
/// - empty payloads are rejected (never transmitted)
/// - payloads larger than `transport.max_packet_size(channel)` are
///   rejected, naming the limit
///
/// # Errors
///
/// Returns the specific [`ValidationError`] on rejection. Callers on the
/// send path log it and translate it into a `false` return.
pub fn check_outbound(transport: &dyn Transport, packet: Packet<'_>) -> Result<(), ValidationError> {
    if packet.is_empty() {
        return Err(ValidationError::EmptyPayload);
    }

    let max = transport.max_packet_size(packet.channel);
    if packet.len() > max {
        return Err(ValidationError::PayloadTooLarge {
            size: packet.len(),
            max,
            channel: packet.channel,
        });
    }

    Ok(())
}

/// Run [`check_outbound`] and collapse the result to the boolean send
/// contract, emitting the rejection diagnostic.
pub(crate) fn accept_outbound(transport: &dyn Transport, packet: Packet<'_>) -> bool {
    match check_outbound(transport, packet) {
        Ok(()) => true,
        Err(rejection) => {
            tracing::warn!(channel = %packet.channel, %rejection, "outbound packet rejected");
            false
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::ClientEvents,
        packet::Channel,
        transport::ClientTransport,
    };

    struct FixedSize(usize);

    impl Transport for FixedSize {
        fn is_available(&self) -> bool {
            true
        }

        fn max_packet_size(&self, _channel: Channel) -> usize {
            self.0
        }

        fn shutdown(&self) {}
    }

    #[test]
    fn empty_payload_is_rejected() {
        let transport = FixedSize(1200);
        let result = check_outbound(&transport, Packet::reliable(&[]));
        assert_eq!(result, Err(ValidationError::EmptyPayload));
    }

    #[test]
    fn oversized_payload_is_rejected_naming_the_limit() {
        let transport = FixedSize(1200);
        let payload = vec![0u8; 1201];
        let result = check_outbound(&transport, Packet::reliable(&payload));
        assert_eq!(
            result,
            Err(ValidationError::PayloadTooLarge {
                size: 1201,
                max: 1200,
                channel: Channel::DEFAULT,
            })
        );
    }

    #[test]
    fn boundary_sizes_are_accepted() {
        let transport = FixedSize(1200);

        let one = [0u8; 1];
        assert!(check_outbound(&transport, Packet::reliable(&one)).is_ok());

        let exact = vec![0u8; 1200];
        assert!(check_outbound(&transport, Packet::reliable(&exact)).is_ok());
    }

    #[test]
    fn validation_works_through_trait_objects() {
        struct NullClient {
            events: ClientEvents,
        }

        impl Transport for NullClient {
            fn is_available(&self) -> bool {
                true
            }

            fn max_packet_size(&self, _channel: Channel) -> usize {
                8
            }

            fn shutdown(&self) {}
        }

        impl ClientTransport for NullClient {
            fn events(&self) -> &ClientEvents {
                &self.events
            }

            fn is_connected(&self) -> bool {
                false
            }

            fn connect(&self, _address: &str) {}

            fn send(&self, _packet: Packet<'_>) -> bool {
                true
            }

            fn disconnect(&self) {}
        }

        let client: Box<dyn ClientTransport> = Box::new(NullClient { events: ClientEvents::new() });
        let common: &dyn Transport = client.as_ref();
        let nine = [0u8; 9];
        assert!(check_outbound(common, Packet::reliable(&nine)).is_err());
        let eight = [0u8; 8];
        assert!(check_outbound(common, Packet::reliable(&eight)).is_ok());
    }
}
