//! The redundancy layer and its public API.
//!
//! A [`RedundancyLayer`] owns the validated configuration, the codec and
//! the runtime state of every redundancy channel, plus the [`Transport`]
//! and [`Notifications`] collaborators handed in at construction. All
//! operations are synchronous and run to completion on the caller's
//! thread; the layer is driven from three entry points:
//!
//! - the upper-layer API (`open`, `close`, `send`, `read`),
//! - the transport's [`message_received`](RedundancyLayer::message_received)
//!   notification,
//! - the periodic [`check_timings`](RedundancyLayer::check_timings) tick.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::channel::{InputMessage, RedundancyChannel};
use crate::clock::{Clock, MonotonicClock};
use crate::config::{RedChannelId, RedundancyLayerConfig, TransportChannelId};
use crate::error::RedError;
use crate::limits::{MAX_PAYLOAD_LEN, MIN_PAYLOAD_LEN};
use crate::message::MessageCodec;
use crate::notifications::Notifications;
use crate::state_machine::{Action, ChannelEvent, ChannelState, transition};
use crate::transport::Transport;

/// One RaSTA redundancy layer endpoint.
pub struct RedundancyLayer<T, N, C = MonotonicClock> {
    config: RedundancyLayerConfig,
    codec: MessageCodec,
    channels: Vec<RedundancyChannel>,
    transport: T,
    notifications: N,
    clock: C,
}

impl<T: Transport, N: Notifications> RedundancyLayer<T, N> {
    /// Create a layer over the given transport and notification sinks,
    /// timed by the default monotonic clock.
    pub fn new(config: RedundancyLayerConfig, transport: T, notifications: N) -> Self {
        Self::with_clock(config, transport, notifications, MonotonicClock::new())
    }
}

impl<T: Transport, N: Notifications, C: Clock> RedundancyLayer<T, N, C> {
    /// Create a layer with an explicit clock.
    pub fn with_clock(
        config: RedundancyLayerConfig,
        transport: T,
        notifications: N,
        clock: C,
    ) -> Self {
        let codec = MessageCodec::new(config.check_code_type());
        let channels = config
            .channels()
            .iter()
            .map(|channel| RedundancyChannel::new(&config, channel))
            .collect();
        Self {
            config,
            codec,
            channels,
            transport,
            notifications,
            clock,
        }
    }

    pub fn config(&self) -> &RedundancyLayerConfig {
        &self.config
    }

    /// Open a redundancy channel. The channel's runtime state is reset and
    /// it transitions to `Up`; opening an already open channel is a no-op.
    pub fn open(&mut self, channel_id: RedChannelId) -> Result<(), RedError> {
        let channel = self.channel_mut(channel_id)?;
        channel.poll_index = 0;
        debug!(channel_id, "opening redundancy channel");
        self.dispatch(channel_id, ChannelEvent::Open);
        Ok(())
    }

    /// Close a redundancy channel, discarding all of its runtime state.
    /// Closing a closed channel is a no-op.
    pub fn close(&mut self, channel_id: RedChannelId) -> Result<(), RedError> {
        self.channel_mut(channel_id)?;
        debug!(channel_id, "closing redundancy channel");
        self.dispatch(channel_id, ChannelEvent::Close);
        Ok(())
    }

    /// Send a payload on a channel: one PDU carrying the next transmit
    /// sequence number is broadcast on every transport channel of the
    /// redundancy channel.
    pub fn send(&mut self, channel_id: RedChannelId, payload: &[u8]) -> Result<(), RedError> {
        let channel = self.channel_mut(channel_id)?;
        if !(MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN).contains(&payload.len()) {
            return Err(RedError::InvalidMessageSize);
        }
        if channel.state != ChannelState::Up {
            return Err(RedError::InvalidOperationInCurrentState);
        }
        channel.send_buffer = Some(Bytes::copy_from_slice(payload));
        self.dispatch(channel_id, ChannelEvent::SendData);
        // In case the state machine decided not to process the message.
        self.channels[channel_id as usize].send_buffer = None;
        Ok(())
    }

    /// Read the next in-order payload into `buf`, returning its length.
    ///
    /// `buf` must be able to hold any permissible payload it is asked for:
    /// its length must lie in `MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN`, and a
    /// pending payload longer than `buf` yields
    /// [`RedError::InvalidBufferSize`] and stays queued.
    pub fn read(&mut self, channel_id: RedChannelId, buf: &mut [u8]) -> Result<usize, RedError> {
        if !(MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN).contains(&buf.len()) {
            return Err(RedError::InvalidParameter);
        }
        self.channel_mut(channel_id)?.received.read(buf)
    }

    /// Periodic timing duty. For every open channel, drain pending
    /// transport reads under the received-buffer back-pressure rule and
    /// fire the defer timeout when due; for every closed channel, read and
    /// discard whatever the transports have queued.
    pub fn check_timings(&mut self) {
        for channel_id in 0..self.config.num_channels() as RedChannelId {
            if self.channels[channel_id as usize].state == ChannelState::Up {
                self.poll_received(channel_id);
                let now = self.clock.now_ms();
                if self.channels[channel_id as usize].defer_queue.is_timeout(now) {
                    debug!(channel_id, "defer queue timed out");
                    self.dispatch(channel_id, ChannelEvent::DeferTimeout);
                }
            } else {
                self.discard_messages(channel_id);
            }
        }
    }

    /// Entry point for the transport's message-received notification.
    ///
    /// If the owning channel is open and the received buffer has headroom,
    /// one message is read and classified immediately; under back-pressure
    /// the transport's pending flag is set instead and `check_timings`
    /// picks the message up later. For a closed channel one message is
    /// read and discarded.
    pub fn message_received(
        &mut self,
        transport_channel_id: TransportChannelId,
    ) -> Result<(), RedError> {
        let channel_id = self
            .config
            .associated_red_channel(transport_channel_id)
            .ok_or(RedError::InvalidParameter)?;
        let index = channel_id as usize;
        let transport_index = self.config.channels()[index]
            .transport_index(transport_channel_id)
            .expect("transport id belongs to its channel");

        if self.channels[index].state == ChannelState::Up {
            let channel = &self.channels[index];
            if channel.received.free_entries() > channel.defer_queue.used_entries() {
                match self.transport.recv(transport_channel_id) {
                    Some(bytes) => self.ingest(channel_id, transport_channel_id, bytes),
                    None => self.channels[index].pending[transport_index] = false,
                }
            } else {
                trace!(
                    transport_channel_id,
                    "received buffer under pressure, deferring read"
                );
                self.channels[index].pending[transport_index] = true;
            }
        } else if self.transport.recv(transport_channel_id).is_none() {
            self.channels[index].pending[transport_index] = false;
        }
        Ok(())
    }

    /// The redundancy channel a transport channel is bonded into.
    pub fn associated_red_channel(
        &self,
        transport_channel_id: TransportChannelId,
    ) -> Result<RedChannelId, RedError> {
        self.config
            .associated_red_channel(transport_channel_id)
            .ok_or(RedError::InvalidParameter)
    }

    pub fn channel_state(&self, channel_id: RedChannelId) -> Result<ChannelState, RedError> {
        Ok(self.channel_ref(channel_id)?.state)
    }

    /// Copy one raw message into the channel's input buffer and run the
    /// state machine over it.
    fn ingest(
        &mut self,
        channel_id: RedChannelId,
        transport_channel_id: TransportChannelId,
        bytes: Bytes,
    ) {
        let channel = &mut self.channels[channel_id as usize];
        assert!(
            channel.input_buffer.is_none(),
            "input buffer already occupied"
        );
        channel.input_buffer = Some(InputMessage {
            transport_channel_id,
            bytes,
        });
        self.dispatch(channel_id, ChannelEvent::ReceiveData);
        // In case the state machine decided not to process the message.
        self.channels[channel_id as usize].input_buffer = None;
    }

    /// Drain pending transport reads for one open channel.
    ///
    /// Reads continue only while the received buffer keeps more entries
    /// free than the defer queue holds, so that a full defer-queue drain
    /// can never overflow the received buffer. Scanning resumes from the
    /// transport after the last one visited, never from transport zero;
    /// restarting at zero could starve the later transports whenever the
    /// buffer fills mid-scan.
    fn poll_received(&mut self, channel_id: RedChannelId) {
        let index = channel_id as usize;
        loop {
            let channel = &self.channels[index];
            if channel.received.free_entries() <= channel.defer_queue.used_entries()
                || !channel.any_pending()
            {
                break;
            }
            let poll_index = channel.poll_index;
            let transport_channel_id =
                self.config.channels()[index].transport_channel_ids()[poll_index];

            if self.channels[index].pending[poll_index] {
                match self.transport.recv(transport_channel_id) {
                    Some(bytes) => self.ingest(channel_id, transport_channel_id, bytes),
                    None => self.channels[index].pending[poll_index] = false,
                }
            }

            let num_transports = self.config.channels()[index].num_transport_channels();
            self.channels[index].poll_index = (poll_index + 1) % num_transports;
        }
    }

    /// Read and throw away everything the transports have queued for a
    /// channel that is not up.
    fn discard_messages(&mut self, channel_id: RedChannelId) {
        let index = channel_id as usize;
        let num_transports = self.config.channels()[index].num_transport_channels();
        let mut transport_index = 0;
        while self.channels[index].any_pending() && transport_index < num_transports {
            let transport_channel_id =
                self.config.channels()[index].transport_channel_ids()[transport_index];
            while self.transport.recv(transport_channel_id).is_some() {
                trace!(transport_channel_id, "discarding message on closed channel");
            }
            self.channels[index].pending[transport_index] = false;
            transport_index += 1;
        }
    }

    /// Feed one event into a channel's state machine and execute the
    /// resulting side effect.
    fn dispatch(&mut self, channel_id: RedChannelId, event: ChannelEvent) {
        let index = channel_id as usize;
        let (next_state, action) = transition(self.channels[index].state, event);
        match action {
            Action::None => {}
            Action::Reinit => {
                let Self {
                    channels, config, ..
                } = self;
                channels[index].reinit(config, &config.channels()[index]);
            }
            Action::ProcessReceived => {
                let now = self.clock.now_ms();
                let Self {
                    channels,
                    config,
                    codec,
                    notifications,
                    ..
                } = self;
                channels[index].process_received(
                    channel_id,
                    &config.channels()[index],
                    codec,
                    now,
                    notifications,
                );
            }
            Action::Send => {
                let Self {
                    channels,
                    config,
                    codec,
                    transport,
                    ..
                } = self;
                channels[index].send_pending(
                    channel_id,
                    &config.channels()[index],
                    codec,
                    transport,
                );
            }
            Action::DeferTimeout => {
                let Self {
                    channels,
                    notifications,
                    ..
                } = self;
                channels[index].defer_timeout(channel_id, notifications);
            }
        }
        self.channels[index].state = next_state;
    }

    fn channel_mut(&mut self, channel_id: RedChannelId) -> Result<&mut RedundancyChannel, RedError> {
        self.channels
            .get_mut(channel_id as usize)
            .ok_or(RedError::InvalidParameter)
    }

    fn channel_ref(&self, channel_id: RedChannelId) -> Result<&RedundancyChannel, RedError> {
        self.channels
            .get(channel_id as usize)
            .ok_or(RedError::InvalidParameter)
    }
}
