//! Test harness for the rasta-red redundancy layer.
//!
//! Provides the collaborators a test needs to drive a redundancy layer
//! without any real I/O: an in-memory [`MemTransport`] with one FIFO per
//! transport channel, a [`ManualClock`] advanced explicitly by the test,
//! and [`RecordingNotifications`] capturing every callback. All three hand
//! out cheap clones sharing the same state, so the test keeps a handle to
//! what the layer owns.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use bytes::Bytes;

use rasta_red::{
    CheckCodeType, Clock, MessageCodec, Notifications, RedChannelId, RedundancyChannelConfig,
    RedundancyLayerConfig, Transport, TransportChannelId, TransportDiagnostics,
};

/// In-memory transport with one receive queue per transport channel and a
/// log of everything sent.
#[derive(Clone, Default)]
pub struct MemTransport {
    inner: Rc<RefCell<MemTransportInner>>,
}

#[derive(Default)]
struct MemTransportInner {
    incoming: HashMap<TransportChannelId, VecDeque<Bytes>>,
    sent: Vec<(TransportChannelId, Bytes)>,
}

impl MemTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw message for the layer to receive on a transport channel.
    pub fn push_incoming(&self, transport_channel_id: TransportChannelId, message: Bytes) {
        self.inner
            .borrow_mut()
            .incoming
            .entry(transport_channel_id)
            .or_default()
            .push_back(message);
    }

    /// Number of messages still queued on a transport channel.
    pub fn incoming_len(&self, transport_channel_id: TransportChannelId) -> usize {
        self.inner
            .borrow()
            .incoming
            .get(&transport_channel_id)
            .map_or(0, VecDeque::len)
    }

    /// Everything the layer sent so far, in order.
    pub fn sent(&self) -> Vec<(TransportChannelId, Bytes)> {
        self.inner.borrow().sent.clone()
    }

    pub fn sent_len(&self) -> usize {
        self.inner.borrow().sent.len()
    }
}

impl Transport for MemTransport {
    fn send(&mut self, transport_channel_id: TransportChannelId, pdu: &[u8]) {
        self.inner
            .borrow_mut()
            .sent
            .push((transport_channel_id, Bytes::copy_from_slice(pdu)));
    }

    fn recv(&mut self, transport_channel_id: TransportChannelId) -> Option<Bytes> {
        self.inner
            .borrow_mut()
            .incoming
            .get_mut(&transport_channel_id)?
            .pop_front()
    }
}

/// Clock under direct test control.
#[derive(Clone)]
pub struct ManualClock {
    now: Rc<Cell<u32>>,
}

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }

    pub fn set(&self, now_ms: u32) {
        self.now.set(now_ms);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

/// One captured upper-layer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    MessageReceived {
        channel_id: RedChannelId,
    },
    Diagnostics {
        channel_id: RedChannelId,
        transport_channel_id: TransportChannelId,
        data: TransportDiagnostics,
    },
}

/// Notification sink recording every callback in order.
#[derive(Clone, Default)]
pub struct RecordingNotifications {
    events: Rc<RefCell<Vec<Notification>>>,
}

impl RecordingNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.borrow().clone()
    }

    pub fn message_received_count(&self, channel_id: RedChannelId) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, Notification::MessageReceived { channel_id: id } if *id == channel_id))
            .count()
    }

    /// Diagnostic events for one transport channel, in publication order.
    pub fn diagnostics_for(
        &self,
        transport_channel_id: TransportChannelId,
    ) -> Vec<TransportDiagnostics> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Notification::Diagnostics {
                    transport_channel_id: id,
                    data,
                    ..
                } if *id == transport_channel_id => Some(*data),
                _ => None,
            })
            .collect()
    }
}

impl Notifications for RecordingNotifications {
    fn message_received(&mut self, channel_id: RedChannelId) {
        self.events
            .borrow_mut()
            .push(Notification::MessageReceived { channel_id });
    }

    fn diagnostics(
        &mut self,
        channel_id: RedChannelId,
        transport_channel_id: TransportChannelId,
        data: TransportDiagnostics,
    ) {
        self.events.borrow_mut().push(Notification::Diagnostics {
            channel_id,
            transport_channel_id,
            data,
        });
    }
}

/// The reference two-channel configuration: two redundancy channels with
/// two transport channels each, check code A, Tseq 50 ms, a diagnosis
/// window of 200 messages and a defer queue of four.
pub fn example_config() -> RedundancyLayerConfig {
    RedundancyLayerConfig::new(
        CheckCodeType::A,
        50,
        200,
        4,
        vec![
            RedundancyChannelConfig::new(0, vec![0, 1]).expect("valid channel config"),
            RedundancyChannelConfig::new(1, vec![2, 3]).expect("valid channel config"),
        ],
    )
    .expect("valid layer config")
}

/// A single-channel configuration sized for scenario tests: check code B,
/// Tseq 50 ms, the minimum diagnosis window of ten and a defer queue of
/// four. The channel bonds `num_transports` transport channels with ids
/// counting from zero.
pub fn scenario_config(num_transports: usize) -> RedundancyLayerConfig {
    let transport_ids = (0..num_transports as TransportChannelId).collect();
    RedundancyLayerConfig::new(
        CheckCodeType::B,
        50,
        10,
        4,
        vec![RedundancyChannelConfig::new(0, transport_ids).expect("valid channel config")],
    )
    .expect("valid layer config")
}

/// Serialize a wire PDU for injection into a [`MemTransport`].
pub fn build_pdu(check_code_type: CheckCodeType, sequence_number: u32, payload: &[u8]) -> Bytes {
    let codec = MessageCodec::new(check_code_type);
    Bytes::copy_from_slice(codec.build(sequence_number, payload).as_bytes())
}

/// Install a fmt subscriber honouring `RUST_LOG`, once per process.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
