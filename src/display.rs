//! Console rendering of interface counters.
//!
//! Vykreslování je jen formátování řetězců; kam se pošlou, řeší volající.

use std::fmt;

use crate::{config::RateMode, netdev::InterfaceSample, rate::Throughput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLines {
    pub interface: String,
    pub received: String,
    pub transmitted: String,
}

impl fmt::Display for DisplayLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.interface)?;
        writeln!(f, "{}", self.received)?;
        writeln!(f, "{}", self.transmitted)
    }
}

/// Propustnost mezi dvěma polly.
///
/// V režimu `PerSecond` se dělí uběhlým časem; když ho nemáme (nulový
/// interval), spadne to na surovou deltu.
pub fn rate_lines(
    interface_name: &str,
    throughput: Throughput,
    elapsed_secs: f64,
    mode: RateMode,
) -> DisplayLines {
    let (received, transmitted) = match mode {
        RateMode::PerSecond => throughput
            .per_second(elapsed_secs)
            .map(|(rx, tx)| (format!("{rx:.0}"), format!("{tx:.0}")))
            .unwrap_or_else(|| raw(throughput)),
        RateMode::Delta => raw(throughput),
    };

    DisplayLines {
        interface: format!("Interface: {interface_name}"),
        received: format!("Receiving: {received} bytes/sec"),
        transmitted: format!("Transmitting: {transmitted} bytes/sec"),
    }
}

/// Kumulativní čítače `bytes` tak, jak je hlásí kernel.
pub fn totals_lines(sample: &InterfaceSample) -> DisplayLines {
    DisplayLines {
        interface: format!("Interface: {}", sample.interface_name),
        received: format!("Received: {}", sample.received_bytes()),
        transmitted: format!("Transmitted: {}", sample.transmitted_bytes()),
    }
}

fn raw(throughput: Throughput) -> (String, String) {
    (
        throughput.received.to_string(),
        throughput.transmitted.to_string(),
    )
}
