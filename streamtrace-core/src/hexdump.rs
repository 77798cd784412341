//! Canonical hex+ASCII rendering of byte windows
//!
//! Rows look like:
//!
//! ```text
//! \t0x000000: 47 45 54 20 2f 20 48 54   54 50 2f 31 2e 31 0d 0a   |GET / HTTP/1.1..|
//! ```
//!
//! Sixteen bytes per row, an extra gap after the eighth byte, blank cells to
//! pad a short last row, and an ASCII column listing only the bytes present.

use crate::buffer::RingBuffer;
use crate::message::MessageView;
use std::fmt::Write;

const ROW: usize = 16;

fn printable(byte: u8) -> char {
    if byte == b' ' || byte.is_ascii_graphic() {
        byte as char
    } else {
        '.'
    }
}

/// Render `bytes` as dump rows, without line terminators
pub fn hexdump(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(ROW)
        .enumerate()
        .map(|(row, chunk)| {
            let mut line = String::with_capacity(80);
            let _ = write!(line, "\t0x{:06x}: ", row * ROW);
            for i in 0..ROW {
                if i == ROW / 2 {
                    line.push_str("  ");
                }
                match chunk.get(i) {
                    Some(byte) => {
                        let _ = write!(line, "{:02x} ", byte);
                    }
                    None => line.push_str("   "),
                }
            }
            line.push_str("  |");
            line.extend(chunk.iter().copied().map(printable));
            line.push('|');
            line
        })
        .collect()
}

/// Render `bytes` as a newline-terminated block of rows
pub fn hexdump_string(bytes: &[u8]) -> String {
    hexdump(bytes).into_iter().fold(String::new(), |mut out, row| {
        out.push_str(&row);
        out.push('\n');
        out
    })
}

/// Dump `len` bytes of a ring buffer starting at logical offset `from`
///
/// The window is reassembled from its two physical spans first, so the
/// output never shows where the buffer wraps.
pub fn ring_hexdump(ring: &RingBuffer, from: usize, len: usize) -> Vec<String> {
    let (first, second) = ring.window(from, len);
    let mut window = Vec::with_capacity(first.len() + second.len());
    window.extend_from_slice(first);
    window.extend_from_slice(second);
    hexdump(&window)
}

/// Dump the payload window `[offset, offset + len)` of a message, run by run
///
/// Each run starts its own rows; row boundaries are not aligned across runs.
pub fn payload_hexdump<V>(view: &V, offset: usize, len: usize) -> Vec<String>
where
    V: MessageView + ?Sized,
{
    view.slice_at(offset, len).flat_map(hexdump).collect()
}
