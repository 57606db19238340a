//! Splitting the event table across brokers
//!
//! `N` contiguous chunks of `floor(M / N)` events each. The `M mod N`
//! trailing events are dropped and reported, never redistributed.

use crate::models::TradeEvent;

/// Result of splitting an event table
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// One chunk per broker, in broker order
    pub chunks: Vec<Vec<TradeEvent>>,
    pub chunk_size: usize,
    /// Remainder events not assigned to any broker
    pub dropped: usize,
}

impl Partition {
    /// Events assigned across all chunks (`N × chunk_size`)
    pub fn assigned(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}

/// Split `events` into `num_brokers` equal contiguous chunks
///
/// # Example
/// ```
/// use netting_simulator_core::orchestrator::partition_events;
///
/// let partition = partition_events(Vec::new(), 4);
/// assert_eq!(partition.chunks.len(), 4);
/// assert_eq!(partition.chunk_size, 0);
/// assert_eq!(partition.dropped, 0);
/// ```
pub fn partition_events(events: Vec<TradeEvent>, num_brokers: usize) -> Partition {
    if num_brokers == 0 {
        return Partition {
            chunks: Vec::new(),
            chunk_size: 0,
            dropped: events.len(),
        };
    }

    let chunk_size = events.len() / num_brokers;
    let assigned = chunk_size * num_brokers;
    let dropped = events.len() - assigned;

    let chunks = if chunk_size == 0 {
        vec![Vec::new(); num_brokers]
    } else {
        events[..assigned]
            .chunks_exact(chunk_size)
            .map(<[TradeEvent]>::to_vec)
            .collect()
    };

    Partition {
        chunks,
        chunk_size,
        dropped,
    }
}
