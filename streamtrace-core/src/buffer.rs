//! Fixed-capacity ring buffer backing a channel
//!
//! Logical byte `i` lives at physical index `(head + i) % capacity`, so a
//! logical window may be split into two physically contiguous spans.

/// Ring buffer with a physical head and a logical length
#[derive(Debug, Clone)]
pub struct RingBuffer {
    storage: Box<[u8]>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Create an empty buffer able to hold `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self { storage: vec![0; capacity].into_boxed_slice(), head: 0, len: 0 }
    }

    /// Build a buffer from an explicit physical layout
    ///
    /// `head` and `len` are clamped to the storage size, which makes it easy to
    /// reproduce a wrapped layout in tests.
    pub fn from_layout(storage: Vec<u8>, head: usize, len: usize) -> Self {
        let capacity = storage.len();
        let head = if capacity == 0 { 0 } else { head % capacity };
        Self { storage: storage.into_boxed_slice(), head, len: len.min(capacity) }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free room left before the buffer is full
    pub fn room(&self) -> usize {
        self.capacity() - self.len
    }

    /// Physical index of the first logical byte
    pub fn head(&self) -> usize {
        self.head
    }

    /// Append as much of `data` as fits, returning the number of bytes written
    pub fn push(&mut self, data: &[u8]) -> usize {
        let written = data.len().min(self.room());
        let capacity = self.capacity();
        for (i, byte) in data[..written].iter().enumerate() {
            let pos = (self.head + self.len + i) % capacity;
            self.storage[pos] = *byte;
        }
        self.len += written;
        written
    }

    /// Drop up to `count` bytes from the front, returning how many were dropped
    pub fn consume(&mut self, count: usize) -> usize {
        let dropped = count.min(self.len);
        if dropped > 0 {
            self.head = (self.head + dropped) % self.capacity();
            self.len -= dropped;
        }
        dropped
    }

    /// Number of bytes readable from logical offset `from` before the physical end
    pub fn contig_data(&self, from: usize) -> usize {
        if from >= self.len {
            return 0;
        }
        let start = (self.head + from) % self.capacity();
        (self.capacity() - start).min(self.len - from)
    }

    /// The logical window `[from, from + len)` as two physical spans
    ///
    /// The second span is empty unless the window wraps past the physical end.
    /// Out-of-range requests are clamped to the bytes present.
    pub fn window(&self, from: usize, len: usize) -> (&[u8], &[u8]) {
        if from >= self.len || len == 0 {
            return (&[], &[]);
        }
        let len = len.min(self.len - from);
        let start = (self.head + from) % self.capacity();
        let first = len.min(self.capacity() - start);
        (&self.storage[start..start + first], &self.storage[..len - first])
    }

    /// Copy the logical content out, unwrapped
    pub fn to_vec(&self) -> Vec<u8> {
        let (first, second) = self.window(0, self.len);
        let mut out = Vec::with_capacity(self.len);
        out.extend_from_slice(first);
        out.extend_from_slice(second);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_wraps_around() {
        let mut ring = RingBuffer::with_capacity(8);
        assert_eq!(ring.push(b"abcdef"), 6);
        assert_eq!(ring.consume(4), 4);
        assert_eq!(ring.push(b"ghijkl"), 6);
        assert_eq!(ring.len(), 8);
        assert_eq!(ring.to_vec(), b"efghijkl");

        // Full buffer refuses extra data
        assert_eq!(ring.push(b"x"), 0);
    }

    #[test]
    fn test_window_split() {
        let ring = RingBuffer::from_layout(b"WXYZabcdef".to_vec(), 6, 8);
        assert_eq!(ring.to_vec(), b"cdefWXYZ");
        assert_eq!(ring.contig_data(0), 4);
        assert_eq!(ring.contig_data(5), 3);

        let (first, second) = ring.window(2, 4);
        assert_eq!(first, b"ef");
        assert_eq!(second, b"WX");

        let (first, second) = ring.window(5, 10);
        assert_eq!(first, b"XYZ");
        assert!(second.is_empty());
    }

    #[test]
    fn test_window_out_of_range() {
        let ring = RingBuffer::from_layout(b"abcd".to_vec(), 0, 2);
        assert_eq!(ring.window(2, 1), (&b""[..], &b""[..]));
        assert_eq!(ring.window(0, 0), (&b""[..], &b""[..]));
        assert_eq!(ring.contig_data(3), 0);
    }

    #[test]
    fn test_zero_capacity() {
        let mut ring = RingBuffer::with_capacity(0);
        assert_eq!(ring.push(b"abc"), 0);
        assert_eq!(ring.consume(1), 0);
        assert!(ring.to_vec().is_empty());
    }
}
