//! Read-only views over a message body
//!
//! A message is carried either as a typed block list ([`StructuredMessage`])
//! or as a contiguous buffer with a header index ([`LegacyMessage`]). Both
//! implement [`MessageView`], so callers slice payload and list headers the
//! same way whatever the representation.
//!
//! Offsets passed to [`MessageView::slice_at`] count payload bytes only:
//! start lines, headers, trailers and boundary markers occupy no room in the
//! body coordinate space.

pub mod block;
pub mod legacy;

pub use block::{Block, StartLine, StructuredMessage};
pub use legacy::{HeaderEntry, HeaderIndex, LegacyMessage, MAX_TRACED_LINE};

use crate::stream::Direction;
use std::slice;

/// Capabilities shared by every message representation
pub trait MessageView {
    /// Payload runs covering `[offset, offset + max_len)` of the body
    fn slice_at(&self, offset: usize, max_len: usize) -> PayloadRuns<'_>;

    /// Start line followed by each header line, rendered for trace output
    fn header_lines(&self) -> Vec<String>;

    /// Total payload bytes in the body
    fn payload_len(&self) -> usize;

    /// Number of payload bytes present in `[offset, offset + len)`
    fn payload_bytes_in(&self, offset: usize, len: usize) -> usize {
        self.slice_at(offset, len).map(<[u8]>::len).sum()
    }
}

/// Lazy sequence of payload byte runs
///
/// Runs borrow from the message. Call `slice_at` again to start over.
#[derive(Debug, Clone)]
pub struct PayloadRuns<'a> {
    inner: RunsInner<'a>,
}

#[derive(Debug, Clone)]
enum RunsInner<'a> {
    Blocks { blocks: slice::Iter<'a, Block>, skip: usize, remaining: usize },
    Contiguous(Option<&'a [u8]>),
}

impl<'a> PayloadRuns<'a> {
    fn blocks(blocks: &'a [Block], offset: usize, max_len: usize) -> Self {
        let inner = RunsInner::Blocks { blocks: blocks.iter(), skip: offset, remaining: max_len };
        Self { inner }
    }

    fn contiguous(body: &'a [u8], offset: usize, max_len: usize) -> Self {
        let run = body
            .get(offset..)
            .map(|rest| &rest[..rest.len().min(max_len)])
            .filter(|run| !run.is_empty());
        Self { inner: RunsInner::Contiguous(run) }
    }
}

impl<'a> Iterator for PayloadRuns<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            RunsInner::Contiguous(run) => run.take(),
            RunsInner::Blocks { blocks, skip, remaining } => loop {
                if *remaining == 0 {
                    return None;
                }
                match blocks.next()? {
                    Block::EndOfMessage => {
                        *remaining = 0;
                        return None;
                    }
                    Block::Data(bytes) => {
                        if *skip >= bytes.len() {
                            *skip -= bytes.len();
                            continue;
                        }
                        let run = &bytes[*skip..];
                        *skip = 0;
                        let run = &run[..run.len().min(*remaining)];
                        *remaining -= run.len();
                        return Some(run);
                    }
                    _ => continue,
                }
            },
        }
    }
}

impl MessageView for StructuredMessage {
    fn slice_at(&self, offset: usize, max_len: usize) -> PayloadRuns<'_> {
        PayloadRuns::blocks(self.blocks(), offset, max_len)
    }

    fn header_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(sl) = self.first_start_line() {
            lines.push(format!(
                "{} {} {}",
                String::from_utf8_lossy(&sl.p1),
                String::from_utf8_lossy(&sl.p2),
                String::from_utf8_lossy(&sl.p3)
            ));
        }
        for blk in self.blocks() {
            match blk {
                Block::EndOfHeaders => break,
                Block::Header { name, value } => lines.push(format!(
                    "{}: {}",
                    String::from_utf8_lossy(name),
                    String::from_utf8_lossy(value)
                )),
                _ => continue,
            }
        }
        lines
    }

    fn payload_len(&self) -> usize {
        self.blocks()
            .iter()
            .take_while(|blk| !matches!(blk, Block::EndOfMessage))
            .filter_map(Block::payload)
            .map(|bytes| bytes.len())
            .sum()
    }
}

impl MessageView for LegacyMessage {
    fn slice_at(&self, offset: usize, max_len: usize) -> PayloadRuns<'_> {
        PayloadRuns::contiguous(self.body(), offset, max_len)
    }

    fn header_lines(&self) -> Vec<String> {
        let start = self.start_line();
        let start = &start[..start.len().min(MAX_TRACED_LINE)];
        std::iter::once(start)
            .chain(self.header_slices())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    fn payload_len(&self) -> usize {
        self.body().len()
    }
}

/// The two message representations; exactly one is active per message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRepresentation {
    Structured(StructuredMessage),
    Legacy(LegacyMessage),
}

impl MessageRepresentation {
    pub fn is_structured(&self) -> bool {
        matches!(self, MessageRepresentation::Structured(_))
    }

    fn view(&self) -> &dyn MessageView {
        match self {
            MessageRepresentation::Structured(msg) => msg,
            MessageRepresentation::Legacy(msg) => msg,
        }
    }
}

impl MessageView for MessageRepresentation {
    fn slice_at(&self, offset: usize, max_len: usize) -> PayloadRuns<'_> {
        self.view().slice_at(offset, max_len)
    }

    fn header_lines(&self) -> Vec<String> {
        self.view().header_lines()
    }

    fn payload_len(&self) -> usize {
        self.view().payload_len()
    }
}

impl From<StructuredMessage> for MessageRepresentation {
    fn from(msg: StructuredMessage) -> Self {
        MessageRepresentation::Structured(msg)
    }
}

impl From<LegacyMessage> for MessageRepresentation {
    fn from(msg: LegacyMessage) -> Self {
        MessageRepresentation::Legacy(msg)
    }
}

/// An HTTP message travelling on one channel of a stream
#[derive(Debug, Clone)]
pub struct HttpMessage {
    pub direction: Direction,
    pub repr: MessageRepresentation,
    /// Announced length of the body chunk being parsed
    pub chunk_len: u64,
    /// Parser position in the channel
    pub parsed: usize,
    /// Payload bytes already forwarded; structured forwarding resumes here
    pub sent: usize,
}

impl HttpMessage {
    pub fn new(direction: Direction, repr: impl Into<MessageRepresentation>) -> Self {
        Self { direction, repr: repr.into(), chunk_len: 0, parsed: 0, sent: 0 }
    }
}
