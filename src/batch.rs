use crate::netdev::InterfaceSample;

/// Accumulates samples of one interface until the upload threshold.
///
/// Pozn.: flush se spouští jen při délce *přesně* `max_size`. Dávka, která
/// už je delší (např. po změně limitu za běhu), se nikdy neodešle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBuffer {
    max_size: usize,
}

impl BatchBuffer {
    /// `max_size == 0` vypíná dávkování i upload.
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_size > 0
    }

    /// Přidá vzorek a vrátí (novou dávku, případně dávku k odeslání).
    ///
    /// Po flushi je vrácená dávka prázdná bez ohledu na to, jak upload dopadne.
    pub fn add_and_maybe_flush(
        &self,
        mut batch: Vec<InterfaceSample>,
        sample: InterfaceSample,
    ) -> (Vec<InterfaceSample>, Option<Vec<InterfaceSample>>) {
        if !self.is_enabled() {
            return (batch, None);
        }

        batch.push(sample);

        if batch.len() == self.max_size {
            return (Vec::with_capacity(self.max_size), Some(batch));
        }

        (batch, None)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use time::OffsetDateTime;

    use super::*;

    fn sample(rx: u64) -> InterfaceSample {
        InterfaceSample {
            interface_name: "eth0".to_string(),
            received: BTreeMap::from([("bytes".to_string(), rx)]),
            transmitted: BTreeMap::new(),
            time_recorded: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn flushes_on_exact_threshold() {
        let buffer = BatchBuffer::new(3);

        let (batch, flushed) = buffer.add_and_maybe_flush(Vec::new(), sample(1));
        assert!(flushed.is_none());
        let (batch, flushed) = buffer.add_and_maybe_flush(batch, sample(2));
        assert!(flushed.is_none());
        assert_eq!(batch.len(), 2);

        let (batch, flushed) = buffer.add_and_maybe_flush(batch, sample(3));
        assert!(batch.is_empty());
        let flushed = flushed.expect("third add flushes");
        let order: Vec<u64> = flushed.iter().map(|s| s.received_bytes()).collect();
        assert_eq!(order, [1, 2, 3]);

        let (batch, flushed) = buffer.add_and_maybe_flush(batch, sample(4));
        assert!(flushed.is_none());
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].received_bytes(), 4);
    }

    #[test]
    fn zero_size_disables_batching() {
        let buffer = BatchBuffer::new(0);
        assert!(!buffer.is_enabled());

        let mut batch = Vec::new();
        for rx in 0..10 {
            let (next, flushed) = buffer.add_and_maybe_flush(batch, sample(rx));
            assert!(flushed.is_none());
            assert!(next.is_empty());
            batch = next;
        }
    }

    #[test]
    fn size_one_flushes_every_sample() {
        let buffer = BatchBuffer::new(1);

        let (batch, flushed) = buffer.add_and_maybe_flush(Vec::new(), sample(7));
        assert!(batch.is_empty());
        assert_eq!(flushed.map(|b| b.len()), Some(1));
    }

    #[test]
    fn overshooting_batch_never_flushes() {
        let buffer = BatchBuffer::new(2);
        let oversized = vec![sample(1), sample(2), sample(3)];

        let (batch, flushed) = buffer.add_and_maybe_flush(oversized, sample(4));
        assert!(flushed.is_none());
        assert_eq!(batch.len(), 4);
    }
}
