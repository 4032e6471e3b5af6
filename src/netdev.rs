//! Per-interface counters parsed from /proc/net/dev.
//!
//! Formát souboru:
//!
//! ```text
//! Inter-|   Receive                            |  Transmit
//!  face |bytes    packets errs drop ...        |bytes    packets errs ...
//!   eth0: 1000      10    0    0 ...             2000      20    0 ...
//! ```
//!
//! Názvy sloupců se berou z hlavičky při každém čtení, nic není natvrdo.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::MonitorError;

/// One reading of one interface.
///
/// Field names on the wire match what the collector expects
/// (`InterfaceName`, `ReceivedData`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSample {
    #[serde(rename = "InterfaceName")]
    pub interface_name: String,
    #[serde(rename = "ReceivedData")]
    pub received: BTreeMap<String, u64>,
    #[serde(rename = "TransmittedData")]
    pub transmitted: BTreeMap<String, u64>,
    #[serde(rename = "TimeRecorded", with = "time::serde::rfc3339")]
    pub time_recorded: OffsetDateTime,
}

impl InterfaceSample {
    pub fn received_bytes(&self) -> u64 {
        self.received.get("bytes").copied().unwrap_or(0)
    }

    pub fn transmitted_bytes(&self) -> u64 {
        self.transmitted.get("bytes").copied().unwrap_or(0)
    }
}

/// Receive/transmit column names declared by the header of one read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnVocabulary {
    pub receive: Vec<String>,
    pub transmit: Vec<String>,
}

impl ColumnVocabulary {
    /// Přepíše slovník podle hlavičkového řádku (`xxx | rx sloupce | tx sloupce`).
    ///
    /// Segment před první `|` je popisek sloupce s názvem rozhraní a zahazuje se.
    pub fn apply_header(&mut self, line: &str) {
        let mut segments = line.split('|').skip(1);
        self.receive = tokenize(segments.next());
        self.transmit = tokenize(segments.next());
    }

    pub fn is_empty(&self) -> bool {
        self.receive.is_empty() && self.transmit.is_empty()
    }

    fn len(&self) -> usize {
        self.receive.len() + self.transmit.len()
    }
}

fn tokenize(segment: Option<&str>) -> Vec<String> {
    segment
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// What to do with a data row whose counters cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedRowPolicy {
    /// Log the row and leave it out of the result.
    #[default]
    Skip,
    /// Abort the whole parse with the row's error.
    Fail,
}

/// Parsuje celý obsah /proc/net/dev.
///
/// První řádek je banner a vždy se zahazuje. Řádky s `|` jsou hlavičky,
/// ostatní neprázdné řádky jsou data jednoho rozhraní. Pořadí výstupu
/// odpovídá pořadí řádků, nic se neřadí ani nededuplikuje.
pub fn parse(
    raw: &str,
    recorded_at: OffsetDateTime,
    policy: MalformedRowPolicy,
) -> Result<Vec<InterfaceSample>, MonitorError> {
    let mut vocabulary = ColumnVocabulary::default();
    let mut samples = Vec::new();

    for line in raw.lines().skip(1) {
        if line.contains('|') {
            vocabulary.apply_header(line);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_row(line, &vocabulary, recorded_at) {
            Ok(Some(sample)) => samples.push(sample),
            Ok(None) => tracing::debug!(line, "row without interface name ignored"),
            Err(e) => match policy {
                MalformedRowPolicy::Skip => {
                    tracing::warn!(error = %e, line, "skipping malformed /proc/net/dev row");
                }
                MalformedRowPolicy::Fail => return Err(e),
            },
        }
    }

    Ok(samples)
}

/// Namapuje jeden datový řádek na sloupce slovníku.
fn parse_row(
    line: &str,
    vocabulary: &ColumnVocabulary,
    recorded_at: OffsetDateTime,
) -> Result<Option<InterfaceSample>, MonitorError> {
    let mut fields = line.split_whitespace();
    let Some(first) = fields.next() else {
        return Ok(None);
    };

    // Nejdřív koncové ':', teprve pak hledáme jméno slepené s prvním
    // čítačem ("enp0s31f6:123 ...").
    let stripped = first.trim_end_matches(':');
    let (name, glued) = match stripped.split_once(':') {
        Some((name, rest)) => (name, Some(rest.trim_start_matches(':'))),
        None => (stripped, None),
    };
    if name.is_empty() {
        return Ok(None);
    }

    let mut sample = InterfaceSample {
        interface_name: name.to_string(),
        received: BTreeMap::new(),
        transmitted: BTreeMap::new(),
        time_recorded: recorded_at,
    };

    // Data před hlavičkou - tolerujeme, čítače zůstanou prázdné.
    if vocabulary.is_empty() {
        return Ok(Some(sample));
    }

    let values: Vec<&str> = glued.into_iter().chain(fields).collect();
    if values.len() > vocabulary.len() {
        return Err(MonitorError::UnexpectedColumnCount {
            line: line.to_string(),
            expected: vocabulary.len(),
            found: values.len(),
        });
    }

    let rx_len = vocabulary.receive.len();
    for (idx, raw_value) in values.into_iter().enumerate() {
        let value = raw_value
            .parse::<u64>()
            .map_err(|source| MonitorError::MalformedCounterField {
                line: line.to_string(),
                value: raw_value.to_string(),
                source,
            })?;

        if idx < rx_len {
            sample
                .received
                .insert(vocabulary.receive[idx].clone(), value);
        } else {
            sample
                .transmitted
                .insert(vocabulary.transmit[idx - rx_len].clone(), value);
        }
    }

    Ok(Some(sample))
}
