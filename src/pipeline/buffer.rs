//! Bounded FIFO buffer for envelopes that could not be delivered.

use std::collections::VecDeque;

use tracing::warn;

use super::envelope::Envelope;

/// Holds undelivered envelopes in arrival order. When full, the
/// oldest entry is dropped to make room; recent telemetry is worth
/// more than stale telemetry.
#[derive(Debug)]
pub struct OfflineBuffer {
    entries: VecDeque<Envelope>,
    max_size: usize,
}

impl OfflineBuffer {
    /// Capacity is clamped to at least one entry.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_size: max_size.max(1),
        }
    }

    pub fn push(&mut self, envelope: Envelope) {
        if self.entries.len() == self.max_size {
            warn!(
                "Offline buffer full ({} entries), dropping oldest entry",
                self.max_size
            );
            self.entries.pop_front();
        }
        self.entries.push_back(envelope);
    }

    pub fn peek_oldest(&self) -> Option<&Envelope> {
        self.entries.front()
    }

    pub fn pop_oldest(&mut self) -> Option<Envelope> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::envelope::{LowFrequencyPayload, Tier, TierPayload};

    fn envelope(device_id: &str) -> Envelope {
        Envelope::new(
            device_id,
            Tier::Low,
            TierPayload::Low(LowFrequencyPayload::default()),
        )
    }

    #[test]
    fn test_push_and_pop_preserve_fifo_order() {
        let mut buffer = OfflineBuffer::new(10);
        buffer.push(envelope("first"));
        buffer.push(envelope("second"));
        buffer.push(envelope("third"));

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.pop_oldest().unwrap().device_id, "first");
        assert_eq!(buffer.pop_oldest().unwrap().device_id, "second");
        assert_eq!(buffer.pop_oldest().unwrap().device_id, "third");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest_entries() {
        let mut buffer = OfflineBuffer::new(3);
        for name in ["e1", "e2", "e3", "e4", "e5"] {
            buffer.push(envelope(name));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.pop_oldest().unwrap().device_id, "e3");
        assert_eq!(buffer.pop_oldest().unwrap().device_id, "e4");
        assert_eq!(buffer.pop_oldest().unwrap().device_id, "e5");
    }

    #[test]
    fn test_peek_does_not_remove() {
        let mut buffer = OfflineBuffer::new(2);
        buffer.push(envelope("only"));

        assert_eq!(buffer.peek_oldest().unwrap().device_id, "only");
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = OfflineBuffer::new(0);
        buffer.push(envelope("kept"));
        assert_eq!(buffer.len(), 1);

        buffer.push(envelope("newer"));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.peek_oldest().unwrap().device_id, "newer");
    }
}
