//! Legacy message representation: a contiguous buffer plus a header index
//!
//! The index is a linked list of entries living in a vector. Each entry
//! records the length of a header line (without its line ending), whether the
//! line ends with CR, and the entry that follows it.

use crate::error::MessageError;
use bytes::Bytes;

/// Header lines longer than this are truncated in trace output
pub const MAX_TRACED_LINE: usize = 74;

/// One header line in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderEntry {
    pub len: usize,
    pub cr: bool,
    pub next: Option<usize>,
}

/// Linked list of header entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderIndex {
    pub entries: Vec<HeaderEntry>,
    /// First entry of the list
    pub first: Option<usize>,
    /// Byte position of the first header line in the message
    pub first_pos: usize,
}

impl HeaderIndex {
    /// Walk the list, yielding `(entry index, line position)` pairs
    pub fn walk(&self) -> HeaderWalk<'_> {
        HeaderWalk { index: self, cur: self.first, pos: self.first_pos, steps: 0 }
    }
}

/// Iterator over the header index, in list order
#[derive(Debug, Clone)]
pub struct HeaderWalk<'a> {
    index: &'a HeaderIndex,
    cur: Option<usize>,
    pos: usize,
    steps: usize,
}

impl<'a> Iterator for HeaderWalk<'a> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        // A well-formed list visits each entry at most once
        if self.steps >= self.index.entries.len() {
            self.cur = None;
            return None;
        }
        let entry = self.index.entries.get(idx)?;
        let item = (idx, self.pos);
        self.pos += entry.len + usize::from(entry.cr) + 1;
        self.cur = entry.next;
        self.steps += 1;
        Some(item)
    }
}

/// A raw HTTP message with its header index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyMessage {
    raw: Bytes,
    start_line_len: usize,
    index: HeaderIndex,
    body_start: usize,
}

impl LegacyMessage {
    /// Build a message from pre-computed parts, checking the index against the buffer
    pub fn from_parts(
        raw: Bytes,
        start_line_len: usize,
        index: HeaderIndex,
        body_start: usize,
    ) -> Result<Self, MessageError> {
        let len = raw.len();
        if start_line_len > len {
            return Err(MessageError::HeaderIndexOutOfRange { index: 0, pos: start_line_len, len });
        }
        if body_start > len {
            return Err(MessageError::HeaderIndexOutOfRange { index: 0, pos: body_start, len });
        }

        let mut visited = vec![false; index.entries.len()];
        let mut cur = index.first;
        let mut pos = index.first_pos;
        while let Some(idx) = cur {
            let entry = index
                .entries
                .get(idx)
                .ok_or(MessageError::HeaderIndexOutOfRange { index: idx, pos, len })?;
            if visited[idx] {
                return Err(MessageError::HeaderIndexCycle(idx));
            }
            visited[idx] = true;
            if pos + entry.len > len {
                return Err(MessageError::HeaderIndexOutOfRange {
                    index: idx,
                    pos: pos + entry.len,
                    len,
                });
            }
            pos += entry.len + usize::from(entry.cr) + 1;
            cur = entry.next;
        }

        Ok(Self { raw, start_line_len, index, body_start })
    }

    /// Index the head of a raw message
    ///
    /// Lines end with LF, optionally preceded by CR. The head ends at the
    /// first empty line; everything after it is body.
    pub fn index(raw: impl Into<Bytes>) -> Result<Self, MessageError> {
        let raw = raw.into();
        let mut lines = Vec::new();
        let mut pos = 0;
        let body_start = loop {
            let rel = raw[pos..].iter().position(|b| *b == b'\n').ok_or(MessageError::Incomplete)?;
            let cr = rel > 0 && raw[pos + rel - 1] == b'\r';
            let len = rel - usize::from(cr);
            if len == 0 {
                if lines.is_empty() {
                    return Err(MessageError::EmptyStartLine);
                }
                break pos + rel + 1;
            }
            lines.push((len, cr));
            pos += rel + 1;
        };

        let (start_len, start_cr) = lines[0];
        let headers = &lines[1..];
        let entries = headers
            .iter()
            .enumerate()
            .map(|(i, (len, cr))| HeaderEntry {
                len: *len,
                cr: *cr,
                next: if i + 1 < headers.len() { Some(i + 1) } else { None },
            })
            .collect::<Vec<_>>();
        let index = HeaderIndex {
            first: if entries.is_empty() { None } else { Some(0) },
            first_pos: start_len + usize::from(start_cr) + 1,
            entries,
        };

        Self::from_parts(raw, start_len, index, body_start)
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn header_index(&self) -> &HeaderIndex {
        &self.index
    }

    pub fn start_line(&self) -> &[u8] {
        &self.raw[..self.start_line_len]
    }

    pub fn body(&self) -> &[u8] {
        &self.raw[self.body_start..]
    }

    pub fn body_start(&self) -> usize {
        self.body_start
    }

    /// Header lines in index order, each truncated to [`MAX_TRACED_LINE`]
    pub fn header_slices(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.index.walk().filter_map(move |(idx, pos)| {
            let entry = self.index.entries.get(idx)?;
            let end = pos + entry.len.min(MAX_TRACED_LINE);
            self.raw.get(pos..end)
        })
    }
}
