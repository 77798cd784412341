//! Structured message representation: an ordered list of typed blocks

use bytes::Bytes;

/// Request or status line, split in its three parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartLine {
    pub p1: Bytes,
    pub p2: Bytes,
    pub p3: Bytes,
}

/// A typed unit of a structured message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    StartLine(StartLine),
    Header { name: Bytes, value: Bytes },
    EndOfHeaders,
    Data(Bytes),
    Trailer { name: Bytes, value: Bytes },
    EndOfMessage,
}

impl Block {
    /// Payload bytes carried by this block, `None` for everything but DATA
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Block::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Size of the block content
    pub fn size(&self) -> usize {
        match self {
            Block::StartLine(sl) => sl.p1.len() + sl.p2.len() + sl.p3.len(),
            Block::Header { name, value } | Block::Trailer { name, value } => {
                name.len() + value.len()
            }
            Block::Data(bytes) => bytes.len(),
            Block::EndOfHeaders | Block::EndOfMessage => 0,
        }
    }
}

/// A message as a block list
///
/// Built with the chained helpers below, which keep the block order sane:
/// an end-of-headers marker is inserted before the first DATA, trailer or
/// end-of-message block when missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredMessage {
    blocks: Vec<Block>,
}

impl StructuredMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing block list as-is
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn start_line(
        mut self,
        p1: impl Into<Bytes>,
        p2: impl Into<Bytes>,
        p3: impl Into<Bytes>,
    ) -> Self {
        let line = StartLine { p1: p1.into(), p2: p2.into(), p3: p3.into() };
        self.blocks.push(Block::StartLine(line));
        self
    }

    pub fn header(mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        self.blocks.push(Block::Header { name: name.into(), value: value.into() });
        self
    }

    pub fn data(mut self, bytes: impl Into<Bytes>) -> Self {
        self.close_headers();
        self.blocks.push(Block::Data(bytes.into()));
        self
    }

    pub fn trailer(mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        self.close_headers();
        self.blocks.push(Block::Trailer { name: name.into(), value: value.into() });
        self
    }

    pub fn end(mut self) -> Self {
        self.close_headers();
        self.blocks.push(Block::EndOfMessage);
        self
    }

    fn close_headers(&mut self) {
        if !self.blocks.iter().any(|blk| matches!(blk, Block::EndOfHeaders)) {
            self.blocks.push(Block::EndOfHeaders);
        }
    }

    pub fn first_start_line(&self) -> Option<&StartLine> {
        self.blocks.iter().find_map(|blk| match blk {
            Block::StartLine(sl) => Some(sl),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_inserts_end_of_headers_once() {
        let msg = StructuredMessage::new()
            .start_line("GET", "/", "HTTP/1.1")
            .header("host", "example.com")
            .data("abc")
            .data("def")
            .end();

        let kinds: Vec<_> = msg.blocks().iter().map(std::mem::discriminant).collect();
        assert_eq!(msg.blocks().len(), 6);
        assert_eq!(kinds[2], std::mem::discriminant(&Block::EndOfHeaders));
        assert_eq!(msg.blocks()[5], Block::EndOfMessage);
    }

    #[test]
    fn test_block_sizes() {
        let hdr = Block::Header { name: Bytes::from_static(b"host"), value: Bytes::from_static(b"a") };
        assert_eq!(hdr.size(), 5);
        assert_eq!(Block::Data(Bytes::from_static(b"xyz")).size(), 3);
        assert_eq!(Block::EndOfMessage.size(), 0);
        assert!(hdr.payload().is_none());
    }
}
