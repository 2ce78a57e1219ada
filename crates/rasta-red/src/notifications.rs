//! Callbacks from the redundancy layer to the upper-layer adapter.

use crate::config::{RedChannelId, TransportChannelId};
use crate::diagnostics::TransportDiagnostics;

/// Notifications delivered to the safety and retransmission layer adapter.
///
/// Both callbacks are invoked synchronously from within the redundancy
/// layer's entry points, on the caller's thread.
pub trait Notifications {
    /// A payload is ready to be read on the given redundancy channel.
    fn message_received(&mut self, channel_id: RedChannelId);

    /// A diagnosis window completed for the given transport channel.
    fn diagnostics(
        &mut self,
        channel_id: RedChannelId,
        transport_channel_id: TransportChannelId,
        data: TransportDiagnostics,
    );
}
