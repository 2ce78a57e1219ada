//! Per-transport timing diagnostics over a rolling diagnosis window.
//!
//! For each redundancy channel, a window of up to `n_diagnosis` distinct
//! sequence numbers is kept. The first arrival of a sequence number opens a
//! slot recording its timestamp; later arrivals of the same number on other
//! transports contribute their delay against that first timestamp to the
//! per-transport drift sums. When a new sequence number would exceed the
//! window, the collected data is published for every transport of the
//! channel and the window starts over.

use tracing::trace;

/// Diagnostic counters published per transport channel at window rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportDiagnostics {
    /// Number of distinct sequence numbers in the completed window.
    pub n_diagnosis: u32,
    /// Messages of the window that never arrived on this transport.
    pub n_missed: u32,
    /// Sum of arrival delays against the first arrival, in milliseconds.
    pub t_drift: u32,
    /// Sum of squared arrival delays.
    pub t_drift2: u32,
}

struct DiagnosisSlot {
    sequence_number: u32,
    first_received_ts: u32,
    /// Received flag per transport index of this channel.
    received: Vec<bool>,
}

/// Rolling diagnosis window of one redundancy channel.
pub struct ChannelDiagnostics {
    window: Vec<DiagnosisSlot>,
    per_transport: Vec<TransportDiagnostics>,
    n_diagnosis: u32,
    t_seq: u32,
    num_transports: usize,
}

impl ChannelDiagnostics {
    pub fn new(n_diagnosis: u32, t_seq: u32, num_transports: usize) -> Self {
        Self {
            window: Vec::with_capacity(n_diagnosis as usize),
            per_transport: vec![TransportDiagnostics::default(); num_transports],
            n_diagnosis,
            t_seq,
            num_transports,
        }
    }

    /// Record the arrival of `sequence_number` on the transport at
    /// `transport_index`.
    ///
    /// Returns the per-transport-index data to publish when this arrival
    /// rolled the window over, `None` otherwise.
    ///
    /// A duplicate arriving more than Tseq after the first copy is left
    /// out of the drift accounting: at that distance it can no longer be
    /// attributed to the same transmission.
    pub fn record(
        &mut self,
        transport_index: usize,
        sequence_number: u32,
        now: u32,
    ) -> Option<Vec<TransportDiagnostics>> {
        assert!(
            self.window.len() <= self.n_diagnosis as usize,
            "diagnosis window exceeds n_diagnosis"
        );

        // Duplicate search runs newest-first: repeats cluster near the most
        // recent slots.
        if let Some(slot) = self
            .window
            .iter_mut()
            .rev()
            .find(|slot| slot.sequence_number == sequence_number)
        {
            let delta = now.wrapping_sub(slot.first_received_ts);
            trace!(sequence_number, transport_index, delta, "repeated sequence number");
            if delta <= self.t_seq {
                let data = &mut self.per_transport[transport_index];
                data.t_drift = data.t_drift.wrapping_add(delta);
                data.t_drift2 = data.t_drift2.wrapping_add(delta.wrapping_mul(delta));
                slot.received[transport_index] = true;
            }
            return None;
        }

        let published = if self.window.len() == self.n_diagnosis as usize {
            for (index, data) in self.per_transport.iter_mut().enumerate() {
                data.n_missed += self
                    .window
                    .iter()
                    .filter(|slot| !slot.received[index])
                    .count() as u32;
                data.n_diagnosis = self.window.len() as u32;
            }
            let snapshot = self.per_transport.clone();
            self.window.clear();
            self.per_transport.fill(TransportDiagnostics::default());
            Some(snapshot)
        } else {
            None
        };

        let mut received = vec![false; self.num_transports];
        received[transport_index] = true;
        self.window.push(DiagnosisSlot {
            sequence_number,
            first_received_ts: now,
            received,
        });
        published
    }

    /// Number of distinct sequence numbers in the current window.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_arrival_opens_slot_without_drift() {
        let mut diag = ChannelDiagnostics::new(10, 50, 2);
        assert!(diag.record(0, 1, 100).is_none());
        assert_eq!(diag.window_len(), 1);
    }

    #[test]
    fn duplicate_within_t_seq_accumulates_drift() {
        let mut diag = ChannelDiagnostics::new(10, 50, 2);
        diag.record(0, 1, 100);
        diag.record(1, 1, 110);
        diag.record(0, 2, 200);
        diag.record(1, 2, 230);

        // Fill the window and roll it over to observe the counters.
        for seq in 3..=10 {
            diag.record(0, seq, 300);
        }
        let published = diag.record(0, 11, 400).expect("window rollover");

        assert_eq!(published[1].t_drift, 10 + 30);
        assert_eq!(published[1].t_drift2, 100 + 900);
        assert_eq!(published[0].t_drift, 0);
        assert_eq!(published[0].n_missed, 0);
        // Transport 1 saw sequence numbers 1 and 2 out of ten.
        assert_eq!(published[1].n_missed, 8);
        assert_eq!(published[0].n_diagnosis, 10);
    }

    #[test]
    fn duplicate_beyond_t_seq_is_ignored_for_drift() {
        let mut diag = ChannelDiagnostics::new(10, 50, 2);
        diag.record(0, 1, 100);
        diag.record(1, 1, 151); // 51 ms > Tseq

        for seq in 2..=10 {
            diag.record(0, seq, 200);
        }
        let published = diag.record(0, 11, 300).expect("window rollover");

        assert_eq!(published[1].t_drift, 0);
        assert_eq!(published[1].t_drift2, 0);
        // The late duplicate did not set the received flag either.
        assert_eq!(published[1].n_missed, 10);
        // The window did not grow a second slot for the duplicate.
        assert_eq!(published[0].n_diagnosis, 10);
    }

    #[test]
    fn drift_uses_wrapping_timer_arithmetic() {
        let mut diag = ChannelDiagnostics::new(10, 50, 2);
        diag.record(0, 1, u32::MAX - 4);
        diag.record(1, 1, 5); // 10 ms across the timer wrap

        for seq in 2..=10 {
            diag.record(0, seq, 100);
        }
        let published = diag.record(0, 11, 200).expect("window rollover");
        assert_eq!(published[1].t_drift, 10);
        assert_eq!(published[1].t_drift2, 100);
    }

    #[test]
    fn rollover_resets_window_and_counters() {
        let mut diag = ChannelDiagnostics::new(10, 50, 1);
        for seq in 1..=10 {
            diag.record(0, seq, 100);
        }
        assert_eq!(diag.window_len(), 10);

        let published = diag.record(0, 11, 200).expect("window rollover");
        assert_eq!(published[0].n_missed, 0);
        assert_eq!(published[0].n_diagnosis, 10);

        // The triggering arrival opens the new window.
        assert_eq!(diag.window_len(), 1);

        // A second rollover starts from clean counters.
        for seq in 12..=20 {
            diag.record(0, seq, 200);
        }
        let published = diag.record(0, 21, 300).expect("window rollover");
        assert_eq!(published[0].n_missed, 0);
        assert_eq!(published[0].t_drift, 0);
    }

    #[test]
    fn publishes_for_every_transport() {
        let mut diag = ChannelDiagnostics::new(10, 50, 2);
        for seq in 1..=10 {
            diag.record(0, seq, 100);
        }
        let published = diag.record(1, 11, 150).expect("window rollover");
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].n_missed, 0);
        assert_eq!(published[1].n_missed, 10);
    }
}
