//! Sequential field cursors for fixed-layout frames.
//!
//! Encode and decode walk a frame with the same field order, through the
//! same cursor type, so every offset exists in exactly one place (a payload
//! struct's `put`/`get` pair) and the two directions cannot drift apart.
//!
//! The peer is a little-endian x86 server that copies packed C structs
//! straight onto the wire. All multi-byte integers pass through the helpers
//! below and nowhere else; targeting a big-endian peer would mean flipping
//! these conversions here, never per field.

/// Writes fields into a zeroed buffer at strictly increasing offsets.
pub(crate) struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    /// `buf` must be zero-initialized; string and padding tails rely on it.
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub(crate) fn written(&self) -> usize {
        self.pos
    }

    /// Writes a C string field of `cap` bytes: UTF-8 text, NUL terminator,
    /// zero tail. Over-long input truncates to `cap - 1` bytes so the
    /// terminator always fits — truncation is silent, matching the peer.
    pub(crate) fn put_cstr(&mut self, s: &str, cap: usize) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(cap - 1);
        self.buf[self.pos..self.pos + len].copy_from_slice(&bytes[..len]);
        self.pos += cap;
    }

    pub(crate) fn put_u32(&mut self, v: u32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&v.to_le_bytes());
        self.pos += 4;
    }

    pub(crate) fn put_i32(&mut self, v: i32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&v.to_le_bytes());
        self.pos += 4;
    }

    pub(crate) fn put_i64(&mut self, v: i64) {
        self.buf[self.pos..self.pos + 8].copy_from_slice(&v.to_le_bytes());
        self.pos += 8;
    }

    /// Single-byte boolean, 0 or 1.
    pub(crate) fn put_flag(&mut self, v: bool) {
        self.buf[self.pos] = v as u8;
        self.pos += 1;
    }

    /// Raw fixed-size byte field. Shorter input leaves a zero tail.
    pub(crate) fn put_bytes(&mut self, b: &[u8], cap: usize) {
        let len = b.len().min(cap);
        self.buf[self.pos..self.pos + len].copy_from_slice(&b[..len]);
        self.pos += cap;
    }

    /// Explicit struct padding; the bytes stay zero.
    pub(crate) fn pad(&mut self, n: usize) {
        self.pos += n;
    }
}

/// Reads fields from a frame at strictly increasing offsets.
pub(crate) struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Reads a C string field of `cap` bytes: text up to the first NUL,
    /// remaining bytes ignored. Invalid UTF-8 is replaced rather than
    /// rejected — the bytes came off the network, not from this process.
    pub(crate) fn get_cstr(&mut self, cap: usize) -> String {
        let field = &self.buf[self.pos..self.pos + cap];
        self.pos += cap;
        let end = field.iter().position(|&b| b == 0).unwrap_or(cap);
        String::from_utf8_lossy(&field[..end]).into_owned()
    }

    pub(crate) fn get_u32(&mut self) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        u32::from_le_bytes(raw)
    }

    pub(crate) fn get_i32(&mut self) -> i32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        i32::from_le_bytes(raw)
    }

    pub(crate) fn get_i64(&mut self) -> i64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        i64::from_le_bytes(raw)
    }

    /// Single-byte boolean: true only for exactly 1, as the peer writes it.
    pub(crate) fn get_flag(&mut self) -> bool {
        let b = self.buf[self.pos];
        self.pos += 1;
        b == 1
    }

    /// Raw fixed-size byte field.
    pub(crate) fn get_bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    /// Skips a field without interpreting it.
    pub(crate) fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cstr_writes_nul_terminated_and_reads_back() {
        let mut buf = [0u8; 16];
        let mut w = FieldWriter::new(&mut buf);
        w.put_cstr("hello", 16);
        assert_eq!(&buf[..6], b"hello\0");

        let mut r = FieldReader::new(&buf);
        assert_eq!(r.get_cstr(16), "hello");
    }

    #[test]
    fn test_cstr_truncates_to_cap_minus_one() {
        let mut buf = [0u8; 4];
        let mut w = FieldWriter::new(&mut buf);
        w.put_cstr("abcdef", 4);
        // Three bytes of text, then the terminator slot.
        assert_eq!(&buf, b"abc\0");

        let mut r = FieldReader::new(&buf);
        assert_eq!(r.get_cstr(4), "abc");
    }

    #[test]
    fn test_cstr_full_field_without_nul_reads_whole_capacity() {
        // A peer may legally fill the field completely; decode must not
        // run past the capacity looking for a terminator.
        let buf = *b"abcd";
        let mut r = FieldReader::new(&buf);
        assert_eq!(r.get_cstr(4), "abcd");
    }

    #[test]
    fn test_integers_are_little_endian() {
        let mut buf = [0u8; 12];
        let mut w = FieldWriter::new(&mut buf);
        w.put_u32(0x0102_0304);
        w.put_i64(-2);
        assert_eq!(&buf[..4], &[0x04, 0x03, 0x02, 0x01]);

        let mut r = FieldReader::new(&buf);
        assert_eq!(r.get_u32(), 0x0102_0304);
        assert_eq!(r.get_i64(), -2);
    }

    #[test]
    fn test_flag_is_strict_zero_or_one() {
        let buf = [1u8, 0, 2];
        let mut r = FieldReader::new(&buf);
        assert!(r.get_flag());
        assert!(!r.get_flag());
        // Anything other than 1 is false, same as the original client.
        assert!(!r.get_flag());
    }

    #[test]
    fn test_cursor_advances_by_capacity_not_content() {
        let mut buf = [0u8; 20];
        let mut w = FieldWriter::new(&mut buf);
        w.put_cstr("a", 8);
        w.put_i32(7);
        assert_eq!(w.written(), 12);

        let mut r = FieldReader::new(&buf);
        assert_eq!(r.get_cstr(8), "a");
        assert_eq!(r.get_i32(), 7);
    }
}
