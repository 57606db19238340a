//! Trade event sources
//!
//! The harness never reads files or feeds directly; it pulls cleaned
//! `TradeEvent`s from a [`TradeSource`]. Parsing raw market data and
//! filtering market-maker flow happen upstream of this trait.
//!
//! Provided sources:
//! - [`VecSource`]: in-memory events
//! - [`JsonLinesSource`]: one JSON `TradeEvent` per line
//! - [`SyntheticSource`]: seeded generator for runs without a data feed

use crate::models::TradeEvent;
use std::io::BufRead;
use thiserror::Error;

mod synthetic;

pub use synthetic::{PriceDistribution, SyntheticConfig, SyntheticSource};

/// Errors produced while pulling events
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error reading trade events: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed trade event on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid synthetic source config: {0}")]
    InvalidConfig(String),
}

/// Producer of cleaned trade events
pub trait TradeSource {
    /// Next event, `None` when exhausted
    fn next_event(&mut self) -> Option<Result<TradeEvent, SourceError>>;
}

/// Drain a source into a vector, stopping at the first error
pub fn collect_events(source: &mut dyn TradeSource) -> Result<Vec<TradeEvent>, SourceError> {
    let mut events = Vec::new();
    while let Some(event) = source.next_event() {
        events.push(event?);
    }
    Ok(events)
}

/// In-memory source
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    events: std::vec::IntoIter<TradeEvent>,
}

impl VecSource {
    pub fn new(events: Vec<TradeEvent>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }
}

impl TradeSource for VecSource {
    fn next_event(&mut self) -> Option<Result<TradeEvent, SourceError>> {
        self.events.next().map(Ok)
    }
}

/// JSON-lines reader
///
/// Blank lines are skipped; parse errors carry the 1-based line number.
///
/// # Example
/// ```
/// use netting_simulator_core::source::{collect_events, JsonLinesSource};
///
/// let data = r#"{"timestamp":"2024-12-06T15:04:05Z","side":"A","price":17000,"size":3}
///
/// {"order_id":9,"timestamp":"2024-12-06T16:00:00Z","side":"Bid","price":16990,"size":1}
/// "#;
/// let mut source = JsonLinesSource::new(data.as_bytes());
/// let events = collect_events(&mut source).unwrap();
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[1].order_id, 9);
/// ```
pub struct JsonLinesSource<R: BufRead> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> TradeSource for JsonLinesSource<R> {
    fn next_event(&mut self) -> Option<Result<TradeEvent, SourceError>> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let trimmed = self.buf.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(trimmed).map_err(|e| {
                        SourceError::Parse {
                            line: self.line,
                            message: e.to_string(),
                        }
                    }));
                }
                Err(e) => return Some(Err(SourceError::Io(e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_reports_line() {
        let data = "\n{\"timestamp\":\"2024-12-06T15:00:00Z\",\"side\":\"X\",\"price\":1,\"size\":1}\n";
        let mut source = JsonLinesSource::new(data.as_bytes());
        match source.next_event() {
            Some(Err(SourceError::Parse { line, .. })) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other.map(|r| r.is_ok())),
        }
    }

    #[test]
    fn test_vec_source_preserves_order() {
        let mut source = VecSource::new(Vec::new());
        assert!(source.next_event().is_none());
    }
}
