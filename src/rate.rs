//! Throughput between two successive samples of one interface.

use crate::netdev::InterfaceSample;

/// Signed byte deltas. Záporná hodnota znamená reset čítače, ne chybu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Throughput {
    pub received: i64,
    pub transmitted: i64,
}

impl Throughput {
    /// Delta normalizovaná na sekundu podle skutečně uběhlého času.
    ///
    /// Vrací `None`, pokud mezi vzorky neuběhl žádný čas.
    pub fn per_second(&self, elapsed_secs: f64) -> Option<(f64, f64)> {
        if elapsed_secs <= 0.0 {
            return None;
        }
        Some((
            self.received as f64 / elapsed_secs,
            self.transmitted as f64 / elapsed_secs,
        ))
    }
}

/// Raw `bytes` delta, `current - previous`, per direction.
///
/// Cadence-agnostic: the caller decides whether to divide by elapsed time.
/// Chybějící čítač `bytes` se bere jako 0.
pub fn rate(previous: &InterfaceSample, current: &InterfaceSample) -> Throughput {
    Throughput {
        received: signed_delta(previous.received_bytes(), current.received_bytes()),
        transmitted: signed_delta(previous.transmitted_bytes(), current.transmitted_bytes()),
    }
}

/// Seconds between the capture times of two samples.
pub fn elapsed_secs(previous: &InterfaceSample, current: &InterfaceSample) -> f64 {
    (current.time_recorded - previous.time_recorded).as_seconds_f64()
}

fn signed_delta(previous: u64, current: u64) -> i64 {
    // wrapping + reinterpretace dá správné znaménko i při resetu
    current.wrapping_sub(previous) as i64
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use time::{Duration, OffsetDateTime, macros::datetime};

    use super::*;

    fn sample(rx: u64, tx: u64, at: OffsetDateTime) -> InterfaceSample {
        InterfaceSample {
            interface_name: "eth0".to_string(),
            received: BTreeMap::from([("bytes".to_string(), rx)]),
            transmitted: BTreeMap::from([("bytes".to_string(), tx)]),
            time_recorded: at,
        }
    }

    #[test]
    fn positive_delta() {
        let t = datetime!(2024-05-01 12:00:00 UTC);
        let t = rate(&sample(100, 200, t), &sample(150, 260, t));
        assert_eq!(
            t,
            Throughput {
                received: 50,
                transmitted: 60
            }
        );
    }

    #[test]
    fn counter_reset_gives_negative_delta() {
        let t = datetime!(2024-05-01 12:00:00 UTC);
        let t = rate(&sample(100, 100, t), &sample(10, 100, t));
        assert_eq!(t.received, -90);
        assert_eq!(t.transmitted, 0);
    }

    #[test]
    fn missing_bytes_counter_counts_as_zero() {
        let t = datetime!(2024-05-01 12:00:00 UTC);
        let mut empty = sample(0, 0, t);
        empty.received.clear();
        empty.transmitted.clear();

        let t = rate(&empty, &sample(40, 30, t));
        assert_eq!(t.received, 40);
        assert_eq!(t.transmitted, 30);
    }

    #[test]
    fn per_second_divides_by_elapsed_time() {
        let start = datetime!(2024-05-01 12:00:00 UTC);
        let prev = sample(0, 0, start);
        let cur = sample(3000, 1500, start + Duration::milliseconds(1500));

        let elapsed = elapsed_secs(&prev, &cur);
        assert_eq!(elapsed, 1.5);
        assert_eq!(rate(&prev, &cur).per_second(elapsed), Some((2000.0, 1000.0)));
    }

    #[test]
    fn per_second_needs_elapsed_time() {
        assert_eq!(Throughput::default().per_second(0.0), None);
    }
}
