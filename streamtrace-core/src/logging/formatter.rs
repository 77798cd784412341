//! Layout of a trace line
//!
//! ```text
//! 1718000000.123456 [demo/fe_main        ] [strm #2a 0x00001fff 0x001f0000] message_headers          : channel=REQUEST    - mode=HTTP     (frontend)
//! ```
//!
//! Seconds and microseconds of the event time, the display name padded to 20
//! columns, the stream prefix (id in hex, request and response analyzer
//! masks) for stream events, then the event label padded to 25 columns.

use crate::stream::Stream;
use chrono::{DateTime, Utc};
use std::fmt;

/// One trace line, rendered through `Display`
#[derive(Debug, Clone)]
pub struct TraceLine<'a> {
    pub timestamp: DateTime<Utc>,
    pub filter: &'a str,
    pub stream: Option<&'a Stream>,
    pub event: &'a str,
    pub fields: String,
}

impl<'a> TraceLine<'a> {
    /// Line without the stream prefix, used by lifecycle hooks
    pub fn global(timestamp: DateTime<Utc>, filter: &'a str, message: impl Into<String>) -> Self {
        Self { timestamp, filter, stream: None, event: "", fields: message.into() }
    }

    pub fn stream(
        timestamp: DateTime<Utc>,
        filter: &'a str,
        stream: &'a Stream,
        event: &'a str,
        fields: impl Into<String>,
    ) -> Self {
        Self { timestamp, filter, stream: Some(stream), event, fields: fields.into() }
    }
}

impl fmt::Display for TraceLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06} [{:<20}] ",
            self.timestamp.timestamp(),
            self.timestamp.timestamp_subsec_micros(),
            self.filter
        )?;
        if let Some(strm) = self.stream {
            write!(
                f,
                "[strm #{:x} 0x{:08x} 0x{:08x}] ",
                strm.uniq_id,
                strm.req.analyzers().bits(),
                strm.res.analyzers().bits()
            )?;
        }
        match (self.event.is_empty(), self.fields.is_empty()) {
            (true, _) => f.write_str(&self.fields),
            (false, true) => f.write_str(self.event),
            (false, false) => write!(f, "{:<25}: {}", self.event, self.fields),
        }
    }
}
