//! Per-channel runtime state and the ingress/egress core.
//!
//! One [`RedundancyChannel`] owns everything that resets on an open or
//! close transition: the sequence counters, the one-message input and send
//! buffers, the defer queue, the received buffer and the diagnosis window.
//! The ingress classifier in [`process_received`](RedundancyChannel::process_received)
//! decides for every incoming PDU whether it is delivered, buffered or
//! dropped.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::config::{
    RedChannelId, RedundancyChannelConfig, RedundancyLayerConfig, TransportChannelId,
};
use crate::defer_queue::{DeferQueue, is_sequence_number_older};
use crate::diagnostics::ChannelDiagnostics;
use crate::limits::{MAX_N_SEND_MAX, SEQUENCE_RANGE_CHECK_FACTOR};
use crate::message::MessageCodec;
use crate::notifications::Notifications;
use crate::received_buffer::ReceivedBuffer;
use crate::state_machine::ChannelState;
use crate::transport::Transport;

/// A raw message taken from a transport, waiting for classification.
pub(crate) struct InputMessage {
    pub(crate) transport_channel_id: TransportChannelId,
    pub(crate) bytes: Bytes,
}

/// Runtime state of one redundancy channel.
pub(crate) struct RedundancyChannel {
    pub(crate) state: ChannelState,
    /// Next sequence number to transmit.
    pub(crate) seq_tx: u32,
    /// Next sequence number expected in order.
    pub(crate) seq_rx: u32,
    /// Back-pressure flag per transport index: a message arrived but the
    /// received buffer was too full to drain it.
    pub(crate) pending: Vec<bool>,
    pub(crate) input_buffer: Option<InputMessage>,
    pub(crate) send_buffer: Option<Bytes>,
    pub(crate) defer_queue: DeferQueue,
    pub(crate) received: ReceivedBuffer,
    pub(crate) diagnostics: ChannelDiagnostics,
    /// Round-robin position for received-message polling.
    pub(crate) poll_index: usize,
}

impl RedundancyChannel {
    pub(crate) fn new(
        layer: &RedundancyLayerConfig,
        channel: &RedundancyChannelConfig,
    ) -> Self {
        let num_transports = channel.num_transport_channels();
        Self {
            state: ChannelState::Closed,
            seq_tx: 0,
            seq_rx: 0,
            pending: vec![false; num_transports],
            input_buffer: None,
            send_buffer: None,
            defer_queue: DeferQueue::new(layer.n_defer_queue_size() as usize, layer.t_seq()),
            received: ReceivedBuffer::new(MAX_N_SEND_MAX),
            diagnostics: ChannelDiagnostics::new(
                layer.n_diagnosis(),
                layer.t_seq(),
                num_transports,
            ),
            poll_index: 0,
        }
    }

    /// Reset all runtime state except the channel state itself, which the
    /// state machine owns.
    pub(crate) fn reinit(
        &mut self,
        layer: &RedundancyLayerConfig,
        channel: &RedundancyChannelConfig,
    ) {
        let num_transports = channel.num_transport_channels();
        self.seq_tx = 0;
        self.seq_rx = 0;
        self.pending = vec![false; num_transports];
        self.input_buffer = None;
        self.send_buffer = None;
        self.defer_queue = DeferQueue::new(layer.n_defer_queue_size() as usize, layer.t_seq());
        self.received = ReceivedBuffer::new(MAX_N_SEND_MAX);
        self.diagnostics =
            ChannelDiagnostics::new(layer.n_diagnosis(), layer.t_seq(), num_transports);
    }

    pub(crate) fn any_pending(&self) -> bool {
        self.pending.iter().any(|&pending| pending)
    }

    /// Classify the message in the input buffer.
    ///
    /// Invalid PDUs are dropped without touching the diagnostics. Valid
    /// ones are delivered in sequence, buffered in the defer queue when
    /// they arrive inside the acceptable future window, or dropped as
    /// duplicates or outliers; in all valid cases the diagnosis window is
    /// updated.
    pub(crate) fn process_received<N: Notifications>(
        &mut self,
        channel_id: RedChannelId,
        channel_config: &RedundancyChannelConfig,
        codec: &MessageCodec,
        now: u32,
        notifications: &mut N,
    ) {
        let input = self
            .input_buffer
            .take()
            .expect("no message in input buffer");

        let pdu = match codec.parse(input.bytes) {
            Ok(pdu) => pdu,
            Err(error) => {
                trace!(channel_id, %error, "dropping invalid pdu");
                return;
            }
        };
        let sequence_number = pdu.sequence_number();

        // A channel that has neither sent nor received anything yet accepts
        // only sequence number zero.
        if self.seq_rx == 0 && self.seq_tx == 0 && sequence_number != 0 {
            trace!(channel_id, sequence_number, "dropping pdu in initial state");
            return;
        }

        let transport_index = channel_config
            .transport_index(input.transport_channel_id)
            .expect("input buffer transport id belongs to channel");

        if is_sequence_number_older(sequence_number, self.seq_rx) {
            // Duplicate of an already delivered message.
            trace!(
                channel_id,
                sequence_number,
                seq_rx = self.seq_rx,
                "dropping pdu older than seq_rx"
            );
            self.update_diagnostics(
                channel_id,
                channel_config,
                transport_index,
                sequence_number,
                now,
                notifications,
            );
        } else if sequence_number == self.seq_rx {
            // In sequence: deliver, then drain whatever became contiguous.
            self.received.add(pdu.payload_bytes());
            notifications.message_received(channel_id);
            self.update_diagnostics(
                channel_id,
                channel_config,
                transport_index,
                sequence_number,
                now,
                notifications,
            );
            self.seq_rx = self.seq_rx.wrapping_add(1);
            self.deliver_defer_queue(channel_id, notifications);
        } else {
            let future_limit = self
                .seq_rx
                .wrapping_add(SEQUENCE_RANGE_CHECK_FACTOR * self.defer_queue.capacity() as u32)
                .wrapping_add(1);
            if is_sequence_number_older(sequence_number, future_limit) {
                if self.defer_queue.contains(sequence_number) {
                    trace!(channel_id, sequence_number, "pdu already in defer queue");
                } else {
                    trace!(channel_id, sequence_number, "buffering out-of-sequence pdu");
                    self.defer_queue.add(pdu, now);
                }
                self.update_diagnostics(
                    channel_id,
                    channel_config,
                    transport_index,
                    sequence_number,
                    now,
                    notifications,
                );
            } else {
                trace!(channel_id, sequence_number, "dropping pdu too far ahead");
            }
        }
    }

    /// Handle an expired defer timeout: give up on the gap, resynchronise
    /// on the oldest buffered sequence number and drain from there.
    pub(crate) fn defer_timeout<N: Notifications>(
        &mut self,
        channel_id: RedChannelId,
        notifications: &mut N,
    ) {
        self.seq_rx = self.defer_queue.oldest_sequence_number();
        debug!(channel_id, seq_rx = self.seq_rx, "defer queue timeout");
        self.deliver_defer_queue(channel_id, notifications);
    }

    /// Encode the pending payload and broadcast it on every transport
    /// channel of this redundancy channel.
    pub(crate) fn send_pending<T: Transport>(
        &mut self,
        channel_id: RedChannelId,
        channel_config: &RedundancyChannelConfig,
        codec: &MessageCodec,
        transport: &mut T,
    ) {
        let payload = self.send_buffer.take().expect("no message to send");
        debug!(channel_id, seq_tx = self.seq_tx, "broadcasting pdu");

        let pdu = codec.build(self.seq_tx, &payload);
        for &transport_channel_id in channel_config.transport_channel_ids() {
            transport.send(transport_channel_id, pdu.as_bytes());
        }
        self.seq_tx = self.seq_tx.wrapping_add(1);
    }

    /// Move the contiguous prefix of the defer queue into the received
    /// buffer, advancing `seq_rx` for every delivered message.
    fn deliver_defer_queue<N: Notifications>(
        &mut self,
        channel_id: RedChannelId,
        notifications: &mut N,
    ) {
        while self.defer_queue.contains(self.seq_rx) {
            let pdu = self.defer_queue.get(self.seq_rx);
            trace!(channel_id, seq_rx = self.seq_rx, "delivering from defer queue");
            self.received.add(pdu.payload_bytes());
            notifications.message_received(channel_id);
            self.seq_rx = self.seq_rx.wrapping_add(1);
        }
    }

    fn update_diagnostics<N: Notifications>(
        &mut self,
        channel_id: RedChannelId,
        channel_config: &RedundancyChannelConfig,
        transport_index: usize,
        sequence_number: u32,
        now: u32,
        notifications: &mut N,
    ) {
        if let Some(published) =
            self.diagnostics
                .record(transport_index, sequence_number, now)
        {
            for (index, data) in published.into_iter().enumerate() {
                notifications.diagnostics(
                    channel_id,
                    channel_config.transport_channel_ids()[index],
                    data,
                );
            }
        }
    }
}
