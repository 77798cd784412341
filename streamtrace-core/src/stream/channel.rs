//! One direction of a stream and its offset bookkeeping

use super::analyzer::AnalyzerMask;
use crate::buffer::RingBuffer;
use std::fmt;

/// Direction of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Request => "REQUEST",
            Direction::Response => "RESPONSE",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// A channel buffer with three offsets
///
/// `forwarded` bytes were already released downstream, `next` marks the end
/// of the data this filter has inspected and `total` is the number of bytes
/// present. `0 <= forwarded <= next <= total` holds after every call.
#[derive(Debug, Clone)]
pub struct Channel {
    direction: Direction,
    buffer: RingBuffer,
    forwarded: usize,
    next: usize,
    analyzers: AnalyzerMask,
}

impl Channel {
    pub fn new(direction: Direction, capacity: usize) -> Self {
        Self::with_buffer(direction, RingBuffer::with_capacity(capacity))
    }

    pub fn with_buffer(direction: Direction, buffer: RingBuffer) -> Self {
        Self { direction, buffer, forwarded: 0, next: 0, analyzers: AnalyzerMask::NONE }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_response(&self) -> bool {
        self.direction == Direction::Response
    }

    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }

    pub fn forwarded(&self) -> usize {
        self.forwarded
    }

    pub fn next(&self) -> usize {
        self.next
    }

    pub fn total(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes present past the inspected boundary
    pub fn unparsed(&self) -> usize {
        self.total() - self.next
    }

    /// Bytes inspected but not forwarded yet
    pub fn pending(&self) -> usize {
        self.next - self.forwarded
    }

    pub fn analyzers(&self) -> AnalyzerMask {
        self.analyzers
    }

    pub fn set_analyzers(&mut self, analyzers: AnalyzerMask) {
        self.analyzers = analyzers;
    }

    /// Set both offsets, clamping them into the invariant
    pub fn set_offsets(&mut self, forwarded: usize, next: usize) {
        self.next = next.min(self.total());
        self.forwarded = forwarded.min(self.next);
    }

    /// Append incoming data, returning how many bytes fit
    pub fn receive(&mut self, data: &[u8]) -> usize {
        self.buffer.push(data)
    }

    /// Move the inspected boundary forward by at most `count` bytes
    pub fn advance_next(&mut self, count: usize) -> usize {
        let step = count.min(self.unparsed());
        self.next += step;
        step
    }

    /// Release up to `count` inspected bytes downstream
    pub fn forward(&mut self, count: usize) -> usize {
        let step = count.min(self.pending());
        self.forwarded += step;
        step
    }

    /// Drop forwarded bytes from the buffer and rebase the offsets
    pub fn release_forwarded(&mut self) -> usize {
        let dropped = self.buffer.consume(self.forwarded);
        self.next -= dropped;
        self.forwarded -= dropped;
        dropped
    }
}
