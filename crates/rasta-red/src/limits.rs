//! Size limits and protocol constants of the redundancy layer.

use static_assertions::const_assert;

/// Maximum number of redundancy channels per endpoint.
pub const MAX_RED_CHANNELS: usize = 2;

/// Maximum number of transport channels bonded into one redundancy channel.
pub const MAX_TRANSPORT_CHANNELS: usize = 2;

/// Number of distinct transport channel ids across the whole endpoint.
pub const TRANSPORT_CHANNEL_ID_SPACE: usize = MAX_RED_CHANNELS * MAX_TRANSPORT_CHANNELS;

/// Byte length of the PDU header (message length, reserved, sequence number).
pub const PDU_HEADER_LEN: usize = 8;

/// Minimum payload length accepted from or delivered to the upper layer.
pub const MIN_PAYLOAD_LEN: usize = 28;

/// Maximum payload length accepted from or delivered to the upper layer.
pub const MAX_PAYLOAD_LEN: usize = 1055;

/// Minimum total PDU length on the wire (header + minimum payload, no check code).
pub const MIN_PDU_LEN: usize = PDU_HEADER_LEN + MIN_PAYLOAD_LEN;

/// Maximum total PDU length on the wire.
pub const MAX_PDU_LEN: usize = 1083;

/// Capacity of the per-channel received buffer, in messages.
pub const MAX_N_SEND_MAX: usize = 20;

/// Bounds of the configurable defer queue capacity, in messages.
pub const MIN_DEFER_QUEUE_SIZE: u32 = 4;
pub const MAX_DEFER_QUEUE_SIZE: u32 = 10;

/// Bounds of the configurable defer timeout Tseq, in milliseconds.
pub const MIN_T_SEQ_MS: u32 = 50;
pub const MAX_T_SEQ_MS: u32 = 500;

/// Bounds of the configurable diagnosis window, in messages.
pub const MIN_N_DIAGNOSIS: u32 = 10;
pub const MAX_N_DIAGNOSIS: u32 = 1000;

/// Factor defining the acceptable future window for defer-queue buffering:
/// a PDU is buffered only while its sequence number lies within
/// `seq_rx + SEQUENCE_RANGE_CHECK_FACTOR * n_defer_queue_size` of `seq_rx`.
pub const SEQUENCE_RANGE_CHECK_FACTOR: u32 = 10;

const_assert!(MIN_PDU_LEN == 36);
const_assert!(MAX_PDU_LEN >= PDU_HEADER_LEN + MAX_PAYLOAD_LEN + 4);
const_assert!(MAX_N_SEND_MAX > MAX_DEFER_QUEUE_SIZE as usize);
