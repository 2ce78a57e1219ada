//! Per-channel bounded buffer for out-of-sequence PDUs.
//!
//! PDUs that arrive ahead of the expected sequence number wait here, keyed
//! by their sequence number, until the gap closes or the Tseq timeout
//! expires. Back-pressure is applied by the core before reading from a
//! transport, so an `add` on a full queue is a silent drop rather than an
//! error.

use tracing::trace;

use crate::message::Pdu;

/// `true` if `to_compare` is older than `reference` under wraparound
/// sequence-number ordering.
///
/// Orders by the half-space window ahead of the reference: the
/// predecessor-by-one counts as older, and the relation is irreflexive and
/// antisymmetric for every pair of distinct values.
pub fn is_sequence_number_older(to_compare: u32, reference: u32) -> bool {
    reference.wrapping_sub(to_compare.wrapping_add(1)) < u32::MAX / 2
}

struct DeferredPdu {
    pdu: Pdu,
    received_ts: u32,
}

/// Bounded store of out-of-order PDUs with age tracking.
pub struct DeferQueue {
    entries: Vec<Option<DeferredPdu>>,
    used: usize,
    t_seq: u32,
}

impl DeferQueue {
    pub fn new(capacity: usize, t_seq: u32) -> Self {
        Self {
            entries: (0..capacity).map(|_| None).collect(),
            used: 0,
            t_seq,
        }
    }

    /// Insert a PDU with its arrival timestamp. Silently dropped when the
    /// queue is full.
    pub fn add(&mut self, pdu: Pdu, now: u32) {
        if self.used == self.entries.len() {
            trace!(
                sequence_number = pdu.sequence_number(),
                "defer queue full, dropping pdu"
            );
            return;
        }
        let slot = self
            .entries
            .iter_mut()
            .find(|entry| entry.is_none())
            .expect("free defer queue slot below capacity");
        *slot = Some(DeferredPdu {
            pdu,
            received_ts: now,
        });
        self.used += 1;
    }

    /// Remove and return the PDU with the given sequence number.
    ///
    /// The caller guards with [`contains`](Self::contains); a miss is a
    /// programming error.
    pub fn get(&mut self, sequence_number: u32) -> Pdu {
        let slot = self
            .entries
            .iter_mut()
            .find(|entry| {
                entry
                    .as_ref()
                    .is_some_and(|e| e.pdu.sequence_number() == sequence_number)
            })
            .unwrap_or_else(|| panic!("sequence number {sequence_number} not in defer queue"));
        self.used -= 1;
        slot.take().expect("occupied defer queue slot").pdu
    }

    pub fn contains(&self, sequence_number: u32) -> bool {
        self.entries.iter().flatten().any(|e| e.pdu.sequence_number() == sequence_number)
    }

    /// The sequence number deemed oldest under wraparound ordering.
    /// The queue must not be empty.
    pub fn oldest_sequence_number(&self) -> u32 {
        let mut occupied = self.entries.iter().flatten();
        let mut oldest = occupied
            .next()
            .expect("oldest_sequence_number on empty defer queue")
            .pdu
            .sequence_number();
        for entry in occupied {
            let seq = entry.pdu.sequence_number();
            if is_sequence_number_older(seq, oldest) {
                oldest = seq;
            }
        }
        oldest
    }

    /// `true` if any entry has waited longer than Tseq.
    pub fn is_timeout(&self, now: u32) -> bool {
        self.entries
            .iter()
            .flatten()
            .any(|e| now.wrapping_sub(e.received_ts) > self.t_seq)
    }

    pub fn used_entries(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}
