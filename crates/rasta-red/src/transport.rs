//! Interface to the transport channels below the redundancy layer.

use bytes::Bytes;

use crate::config::TransportChannelId;

/// The bonded transport channels of an endpoint.
///
/// The actual I/O (UDP sockets or otherwise) lives outside the redundancy
/// layer; implementations adapt it to this interface. Both operations must
/// be non-blocking: `recv` returns `None` when nothing is waiting, and
/// `send` is fire-and-forget. The redundancy layer neither retries nor
/// observes transmission failures; that is the retransmission layer's job.
///
/// Per transport channel, `recv` must hand out messages in arrival order.
pub trait Transport {
    /// Queue one PDU for transmission on the given transport channel.
    fn send(&mut self, transport_channel_id: TransportChannelId, pdu: &[u8]);

    /// Take the next received message from the given transport channel.
    fn recv(&mut self, transport_channel_id: TransportChannelId) -> Option<Bytes>;
}
