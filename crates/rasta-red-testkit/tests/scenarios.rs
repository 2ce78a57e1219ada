//! End-to-end scenarios driving a redundancy layer through its public API
//! and the transport notification entry point, with no real I/O.

use bytes::Bytes;
use rasta_red::{
    ChannelState, CheckCodeType, MessageCodec, RedError, RedundancyLayer, TransportChannelId,
};
use rasta_red_testkit::{
    ManualClock, MemTransport, RecordingNotifications, build_pdu, example_config, init_tracing,
    scenario_config,
};

struct Scenario {
    layer: RedundancyLayer<MemTransport, RecordingNotifications, ManualClock>,
    transport: MemTransport,
    notifications: RecordingNotifications,
    clock: ManualClock,
}

fn scenario(num_transports: usize) -> Scenario {
    init_tracing();
    let transport = MemTransport::new();
    let notifications = RecordingNotifications::new();
    let clock = ManualClock::new(0);
    let layer = RedundancyLayer::with_clock(
        scenario_config(num_transports),
        transport.clone(),
        notifications.clone(),
        clock.clone(),
    );
    Scenario {
        layer,
        transport,
        notifications,
        clock,
    }
}

fn payload(tag: u8) -> Vec<u8> {
    vec![tag; 28]
}

impl Scenario {
    /// Queue one PDU on a transport channel and signal its arrival.
    fn deliver(&mut self, transport_channel_id: TransportChannelId, seq: u32, tag: u8) {
        self.transport.push_incoming(
            transport_channel_id,
            build_pdu(CheckCodeType::B, seq, &payload(tag)),
        );
        self.layer.message_received(transport_channel_id).unwrap();
    }

    fn read_tag(&mut self) -> u8 {
        let mut buf = [0u8; 1055];
        let len = self.layer.read(0, &mut buf).expect("payload available");
        assert_eq!(len, 28);
        buf[0]
    }

    fn read_error(&mut self) -> RedError {
        self.layer.read(0, &mut [0u8; 1055]).unwrap_err()
    }
}

#[test]
fn in_order_delivery() {
    let mut s = scenario(1);
    s.layer.open(0).unwrap();

    for seq in 0..3 {
        s.deliver(0, seq, seq as u8);
    }

    assert_eq!(s.notifications.message_received_count(0), 3);
    assert_eq!(s.read_tag(), 0);
    assert_eq!(s.read_tag(), 1);
    assert_eq!(s.read_tag(), 2);
    assert_eq!(s.read_error(), RedError::NoMessageReceived);

    // seq_rx advanced to 3: the next in-order PDU is delivered directly.
    s.deliver(0, 3, 3);
    assert_eq!(s.read_tag(), 3);
}

#[test]
fn out_of_order_delivery_recovers_through_defer_queue() {
    let mut s = scenario(1);
    s.layer.open(0).unwrap();

    s.deliver(0, 0, 0);
    s.deliver(0, 2, 2);
    s.deliver(0, 3, 3);

    // Only the in-sequence message has been delivered so far.
    assert_eq!(s.notifications.message_received_count(0), 1);

    // The gap closes: 1, 2 and 3 drain in order.
    s.deliver(0, 1, 1);
    assert_eq!(s.notifications.message_received_count(0), 4);
    for expected in 0..4 {
        assert_eq!(s.read_tag(), expected);
    }
    assert_eq!(s.read_error(), RedError::NoMessageReceived);
}

#[test]
fn defer_queue_timeout_resynchronises() {
    let mut s = scenario(1);
    s.layer.open(0).unwrap();

    s.deliver(0, 0, 0);
    s.deliver(0, 2, 2);

    s.clock.advance(51);
    s.layer.check_timings();

    assert_eq!(s.read_tag(), 0);
    assert_eq!(s.read_tag(), 2);
    assert_eq!(s.read_error(), RedError::NoMessageReceived);

    // seq_rx jumped past the lost message: 3 is now in sequence.
    s.deliver(0, 3, 3);
    assert_eq!(s.read_tag(), 3);
}

#[test]
fn duplicate_across_transports_counts_drift_once() {
    let mut s = scenario(2);
    s.layer.open(0).unwrap();
    s.clock.set(100);

    // Transport 0 carries the whole window; sequence number 5 also shows
    // up on transport 1, ten milliseconds late.
    for seq in 0..=5 {
        s.deliver(0, seq, seq as u8);
    }
    s.clock.set(110);
    s.deliver(1, 5, 5);
    for seq in 6..=9 {
        s.deliver(0, seq, seq as u8);
    }

    // Ten distinct sequence numbers so far; the eleventh rolls the
    // diagnosis window over and publishes.
    s.deliver(0, 10, 10);

    let on_transport_1 = s.notifications.diagnostics_for(1);
    assert_eq!(on_transport_1.len(), 1);
    assert_eq!(on_transport_1[0].n_diagnosis, 10);
    assert_eq!(on_transport_1[0].n_missed, 9);
    assert_eq!(on_transport_1[0].t_drift, 10);
    assert_eq!(on_transport_1[0].t_drift2, 100);

    let on_transport_0 = s.notifications.diagnostics_for(0);
    assert_eq!(on_transport_0.len(), 1);
    assert_eq!(on_transport_0[0].n_missed, 0);
    assert_eq!(on_transport_0[0].t_drift, 0);

    // The duplicate was delivered exactly once.
    assert_eq!(s.notifications.message_received_count(0), 11);
    for expected in 0..=10 {
        assert_eq!(s.read_tag(), expected);
    }
}

#[test]
fn newly_opened_channel_drops_nonzero_first_sequence() {
    let mut s = scenario(1);
    s.layer.open(0).unwrap();

    s.deliver(0, 42, 42);

    assert_eq!(s.notifications.message_received_count(0), 0);
    assert_eq!(s.read_error(), RedError::NoMessageReceived);

    // Sequence number zero is still what the channel waits for.
    s.deliver(0, 0, 0);
    assert_eq!(s.read_tag(), 0);
}

#[test]
fn corrupted_check_code_is_dropped_silently() {
    let mut s = scenario(1);
    s.layer.open(0).unwrap();

    let mut bytes = build_pdu(CheckCodeType::B, 0, &payload(7)).to_vec();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    s.transport.push_incoming(0, Bytes::from(bytes));
    s.layer.message_received(0).unwrap();

    assert_eq!(s.notifications.message_received_count(0), 0);
    assert!(s.notifications.diagnostics_for(0).is_empty());

    // seq_rx untouched: a clean PDU with sequence number zero delivers.
    s.deliver(0, 0, 8);
    assert_eq!(s.read_tag(), 8);
}

#[test]
fn undersized_and_mismatched_lengths_are_dropped() {
    let mut s = scenario(1);
    s.layer.open(0).unwrap();

    // 35 bytes total, length field agreeing: below the PDU minimum.
    let mut short = vec![0u8; 35];
    short[0] = 35;
    s.transport.push_incoming(0, Bytes::from(short));
    s.layer.message_received(0).unwrap();

    // A valid PDU truncated by one byte: length field disagrees.
    let built = build_pdu(CheckCodeType::B, 0, &payload(1));
    let truncated = built.slice(..built.len() - 1);
    s.transport.push_incoming(0, truncated);
    s.layer.message_received(0).unwrap();

    assert_eq!(s.notifications.message_received_count(0), 0);
    s.deliver(0, 0, 2);
    assert_eq!(s.read_tag(), 2);
}

#[test]
fn defer_queue_overflow_drops_newest() {
    let mut s = scenario(1);
    s.layer.open(0).unwrap();

    s.deliver(0, 0, 0);
    for seq in 2..=5 {
        s.deliver(0, seq, seq as u8); // fills the four defer slots
    }
    s.deliver(0, 6, 6); // queue full: silently dropped

    s.deliver(0, 1, 1); // closes the gap
    for expected in 0..=5 {
        assert_eq!(s.read_tag(), expected);
    }
    assert_eq!(s.read_error(), RedError::NoMessageReceived);

    // The dropped PDU is simply missing: 6 is still deliverable in order.
    s.deliver(0, 6, 6);
    assert_eq!(s.read_tag(), 6);
}

#[test]
fn payload_size_bounds_roundtrip_through_send() {
    let mut s = scenario(1);
    s.layer.open(0).unwrap();

    let smallest = vec![0x11u8; 28];
    let largest = vec![0x22u8; 1055];
    s.layer.send(0, &smallest).unwrap();
    s.layer.send(0, &largest).unwrap();

    let sent = s.transport.sent();
    assert_eq!(sent.len(), 2);

    let codec = MessageCodec::new(CheckCodeType::B);
    let first = codec.parse(sent[0].1.clone()).unwrap();
    assert_eq!(first.sequence_number(), 0);
    assert_eq!(first.payload(), &smallest[..]);
    assert_eq!(first.len(), 36 + 4); // header + payload + CRC-32

    let second = codec.parse(sent[1].1.clone()).unwrap();
    assert_eq!(second.sequence_number(), 1);
    assert_eq!(second.payload(), &largest[..]);
}

#[test]
fn peer_to_peer_loopback() {
    // Two layers wired back to back: whatever one sends, the other receives.
    init_tracing();
    let wire_a = MemTransport::new();
    let wire_b = MemTransport::new();
    let notif_a = RecordingNotifications::new();
    let notif_b = RecordingNotifications::new();

    let mut alice = RedundancyLayer::with_clock(
        scenario_config(1),
        wire_a.clone(),
        notif_a.clone(),
        ManualClock::new(0),
    );
    let mut bob = RedundancyLayer::with_clock(
        scenario_config(1),
        wire_b.clone(),
        notif_b.clone(),
        ManualClock::new(0),
    );
    alice.open(0).unwrap();
    bob.open(0).unwrap();

    for tag in 0..3u8 {
        alice.send(0, &payload(tag)).unwrap();
    }
    for (transport_channel_id, pdu) in wire_a.sent() {
        wire_b.push_incoming(transport_channel_id, pdu);
        bob.message_received(transport_channel_id).unwrap();
    }

    assert_eq!(notif_b.message_received_count(0), 3);
    let mut buf = [0u8; 1055];
    for tag in 0..3u8 {
        assert_eq!(bob.read(0, &mut buf), Ok(28));
        assert_eq!(buf[0], tag);
    }
}

#[test]
fn channels_are_independent() {
    init_tracing();
    let transport = MemTransport::new();
    let notifications = RecordingNotifications::new();
    let mut layer = RedundancyLayer::with_clock(
        example_config(),
        transport.clone(),
        notifications.clone(),
        ManualClock::new(0),
    );

    assert_eq!(layer.associated_red_channel(3), Ok(1));
    layer.open(0).unwrap();
    layer.open(1).unwrap();
    assert_eq!(layer.channel_state(1), Ok(ChannelState::Up));

    // The example configuration runs check code A.
    transport.push_incoming(2, build_pdu(CheckCodeType::A, 0, &payload(0xC1)));
    layer.message_received(2).unwrap();

    assert_eq!(notifications.message_received_count(1), 1);
    assert_eq!(notifications.message_received_count(0), 0);

    let mut buf = [0u8; 1055];
    assert_eq!(layer.read(1, &mut buf), Ok(28));
    assert_eq!(buf[0], 0xC1);
    assert_eq!(layer.read(0, &mut buf), Err(RedError::NoMessageReceived));

    // Closing channel 1 leaves channel 0 up.
    layer.close(1).unwrap();
    assert_eq!(layer.channel_state(0), Ok(ChannelState::Up));
    assert_eq!(layer.channel_state(1), Ok(ChannelState::Closed));
}

#[test]
fn round_robin_polling_serves_both_transports() {
    let mut s = scenario(2);
    s.layer.open(0).unwrap();

    // Fill the received buffer so that arrivals only set pending flags.
    for seq in 0..20 {
        s.deliver(0, seq, seq as u8);
    }
    s.transport
        .push_incoming(0, build_pdu(CheckCodeType::B, 20, &payload(20)));
    s.transport
        .push_incoming(1, build_pdu(CheckCodeType::B, 21, &payload(21)));
    s.layer.message_received(0).unwrap();
    s.layer.message_received(1).unwrap();
    assert_eq!(s.transport.incoming_len(0), 1);
    assert_eq!(s.transport.incoming_len(1), 1);

    // Drain upward, then let the tick pick both pending messages up.
    let mut buf = [0u8; 1055];
    for _ in 0..20 {
        s.layer.read(0, &mut buf).unwrap();
    }
    s.layer.check_timings();

    assert_eq!(s.transport.incoming_len(0), 0);
    assert_eq!(s.transport.incoming_len(1), 0);
    assert_eq!(s.read_tag(), 20);
    assert_eq!(s.read_tag(), 21);
}
