use std::{io, num::ParseIntError, path::PathBuf, time::Duration};

use hyper::StatusCode;
use thiserror::Error;

/// Chyby při čtení a parsování statistik rozhraní.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Zdroj statistik nejde otevřít ani přečíst - bez něj nemáme žádná data.
    #[error("cannot read network statistics from {path}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed counter field {value:?} in row {line:?}")]
    MalformedCounterField {
        line: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("row {line:?} has {found} counter fields, header declares {expected}")]
    UnexpectedColumnCount {
        line: String,
        expected: usize,
        found: usize,
    },
}

/// Chyby jednoho upload cyklu. Nikdy neshodí polling task.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("serialize batch")]
    Serialize(#[from] serde_json::Error),

    #[error("upload transport failure")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("collector answered with status {0}")]
    Status(StatusCode),
}
