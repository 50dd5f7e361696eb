// src/lexer/buffer.rs
//! Character sources and the growable scan buffer.
//!
//! The buffer holds `[0, end_read)` valid characters. Everything before `start_read`
//! belongs to finished matches and is dropped on the next refill.

use std::{collections::VecDeque, io};

use log::{debug, trace, warn};

/// Where the scanner pulls characters from.
pub trait CharSource {
    /// Fills a prefix of `buf` and returns its length. `Ok(0)` means end of stream;
    /// `buf` is never empty.
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize>;

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: CharSource + ?Sized> CharSource for Box<T> {
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// In-memory text.
#[derive(Debug, Clone, Default)]
pub struct StrSource {
    chars: Vec<char>,
    pos: usize,
}

impl StrSource {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }
}

impl From<&str> for StrSource {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StrSource {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl CharSource for StrSource {
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let n = buf.len().min(self.chars.len() - self.pos);
        buf[..n].copy_from_slice(&self.chars[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Hands out at most `max_per_read` characters per call.
#[derive(Debug, Clone)]
pub struct ChunkedSource<S> {
    inner: S,
    max_per_read: usize,
}

impl<S> ChunkedSource<S> {
    pub fn new(inner: S, max_per_read: usize) -> Self {
        Self {
            inner,
            max_per_read: max_per_read.max(1),
        }
    }
}

impl<S: CharSource> CharSource for ChunkedSource<S> {
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let limit = buf.len().min(self.max_per_read);
        self.inner.read(&mut buf[..limit])
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner.close()
    }
}

const BYTE_CHUNK: usize = 8192;

/// UTF-8 decoding over any [`io::Read`]. Sequences split across reads are reassembled;
/// invalid bytes become U+FFFD.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: Option<R>,
    bytes: Vec<u8>,
    pos: usize,
    decoded: VecDeque<char>,
    eof: bool,
}

impl<R: io::Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            bytes: Vec::with_capacity(BYTE_CHUNK),
            pos: 0,
            decoded: VecDeque::new(),
            eof: false,
        }
    }

    // Pulls more bytes; sets `eof` when the reader is exhausted.
    fn fill(&mut self) -> io::Result<()> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "reader closed"));
        };
        self.bytes.drain(..self.pos);
        self.pos = 0;
        let mut tmp = [0u8; BYTE_CHUNK];
        loop {
            match reader.read(&mut tmp) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.bytes.extend_from_slice(&tmp[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    // Decodes what is available into `decoded`, leaving an incomplete tail in `bytes`.
    fn decode(&mut self) {
        let rest = &self.bytes[self.pos..];
        let (valid, bad) = match std::str::from_utf8(rest) {
            Ok(s) => (s, None),
            Err(e) => (
                std::str::from_utf8(&rest[..e.valid_up_to()]).unwrap_or_default(),
                Some(e.error_len()),
            ),
        };
        self.decoded.extend(valid.chars());
        self.pos += valid.len();
        if let Some(Some(len)) = bad {
            warn!("invalid UTF-8 ({len} byte(s)) replaced with U+FFFD");
            self.decoded.push_back(char::REPLACEMENT_CHARACTER);
            self.pos += len;
        }
    }
}

impl<R: io::Read> CharSource for ReaderSource<R> {
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize> {
        while self.decoded.is_empty() {
            if self.pos < self.bytes.len() {
                let before = self.pos;
                self.decode();
                if self.pos != before || !self.decoded.is_empty() {
                    continue;
                }
            }
            if self.eof {
                if self.pos < self.bytes.len() {
                    warn!("input ends inside a UTF-8 sequence; replaced with U+FFFD");
                    self.pos = self.bytes.len();
                    self.decoded.push_back(char::REPLACEMENT_CHARACTER);
                    continue;
                }
                return Ok(0);
            }
            self.fill()?;
        }
        let n = buf.len().min(self.decoded.len());
        for (slot, c) in buf.iter_mut().zip(self.decoded.drain(..n)) {
            *slot = c;
        }
        Ok(n)
    }

    fn close(&mut self) -> io::Result<()> {
        self.reader = None;
        Ok(())
    }
}

/// Cursors into the scan buffer. Always `start_read <= marked_pos <= end_read` and
/// `start_read <= current_pos <= end_read`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursors {
    pub start_read: usize,
    pub marked_pos: usize,
    pub current_pos: usize,
    pub end_read: usize,
}

pub struct ScanBuffer {
    source: Option<Box<dyn CharSource>>,
    chars: Vec<char>,
    pub(crate) cur: Cursors,
    at_eof: bool,
    initial_capacity: usize,
}

impl std::fmt::Debug for ScanBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanBuffer")
            .field("capacity", &self.chars.len())
            .field("cur", &self.cur)
            .field("at_eof", &self.at_eof)
            .field("closed", &self.source.is_none())
            .finish()
    }
}

impl ScanBuffer {
    pub fn new(source: Box<dyn CharSource>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            source: Some(source),
            chars: vec!['\0'; capacity],
            cur: Cursors::default(),
            at_eof: false,
            initial_capacity: capacity,
        }
    }

    pub fn cursors(&self) -> Cursors {
        self.cur
    }

    pub fn capacity(&self) -> usize {
        self.chars.len()
    }

    /// The source reported end of stream.
    pub fn at_eof(&self) -> bool {
        self.at_eof
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Whole backing store, valid up to `end_read`.
    pub(crate) fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn span(&self, start: usize, end: usize) -> &[char] {
        &self.chars[start..end]
    }

    pub fn get(&self, i: usize) -> Option<char> {
        if i < self.cur.end_read { Some(self.chars[i]) } else { None }
    }

    /// Drops `[0, start_read)`, grows ×2 when full, reads into the free region.
    /// Returns `true` at end of stream. Cursors are remapped in place.
    pub fn refill(&mut self) -> io::Result<bool> {
        if self.at_eof {
            return Ok(true);
        }
        let Some(source) = self.source.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "input source closed"));
        };

        let c = &mut self.cur;
        if c.start_read > 0 {
            let shift = c.start_read;
            self.chars.copy_within(shift..c.end_read, 0);
            c.end_read -= shift;
            c.current_pos -= shift;
            c.marked_pos -= shift;
            c.start_read = 0;
        }
        if c.end_read >= self.chars.len() {
            let grown = self.chars.len() * 2;
            debug!("scan buffer grows {} -> {} chars", self.chars.len(), grown);
            self.chars.resize(grown, '\0');
        }

        let n = source.read(&mut self.chars[c.end_read..])?;
        if n == 0 {
            debug!("input exhausted after {} buffered chars", c.end_read);
            self.at_eof = true;
            return Ok(true);
        }
        c.end_read += n;
        trace!("refill: +{n} chars, {} buffered", c.end_read);
        Ok(false)
    }

    /// Character at `current_pos`, advancing it; refills on demand. `None` at end of stream.
    pub(crate) fn next_char(&mut self) -> io::Result<Option<char>> {
        loop {
            if self.cur.current_pos < self.cur.end_read {
                let ch = self.chars[self.cur.current_pos];
                self.cur.current_pos += 1;
                return Ok(Some(ch));
            }
            if self.refill()? {
                return Ok(None);
            }
        }
    }

    /// Character at `marked_pos` without consuming it.
    pub(crate) fn peek_marked(&mut self) -> io::Result<Option<char>> {
        loop {
            if self.cur.marked_pos < self.cur.end_read {
                return Ok(Some(self.chars[self.cur.marked_pos]));
            }
            if self.refill()? {
                return Ok(None);
            }
        }
    }

    pub fn close(&mut self) -> io::Result<()> {
        self.at_eof = true;
        self.cur.end_read = self.cur.start_read;
        self.cur.marked_pos = self.cur.start_read;
        self.cur.current_pos = self.cur.start_read;
        match self.source.take() {
            Some(mut s) => s.close(),
            None => Ok(()),
        }
    }

    /// Fresh state over `source`; an oversized buffer shrinks back.
    pub fn reset(&mut self, source: Box<dyn CharSource>) {
        if self.chars.len() > self.initial_capacity {
            self.chars = vec!['\0'; self.initial_capacity];
        }
        self.source = Some(source);
        self.cur = Cursors::default();
        self.at_eof = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;
    impl CharSource for Failing {
        fn read(&mut self, _buf: &mut [char]) -> io::Result<usize> {
            Err(io::Error::other("boom"))
        }
    }

    fn drain(src: &mut dyn CharSource, per_read: usize) -> String {
        let mut out = String::new();
        let mut buf = vec!['\0'; per_read];
        loop {
            let n = src.read(&mut buf).expect("read");
            if n == 0 {
                return out;
            }
            out.extend(&buf[..n]);
        }
    }

    #[test]
    fn refill_compacts_and_remaps_cursors() {
        let mut b = ScanBuffer::new(Box::new(StrSource::new("abcdef")), 4);
        assert!(!b.refill().expect("refill"));
        assert_eq!(b.cursors().end_read, 4);
        b.cur = Cursors {
            start_read: 2,
            marked_pos: 3,
            current_pos: 4,
            end_read: 4,
        };
        assert!(!b.refill().expect("refill"));
        assert_eq!(
            b.cursors(),
            Cursors {
                start_read: 0,
                marked_pos: 1,
                current_pos: 2,
                end_read: 4
            }
        );
        assert_eq!(b.span(0, 4), &['c', 'd', 'e', 'f']);
        assert!(b.refill().expect("eof"));
        assert!(b.at_eof());
    }

    #[test]
    fn full_buffer_doubles() {
        let mut b = ScanBuffer::new(Box::new(StrSource::new("abcdef")), 2);
        b.refill().expect("refill");
        b.cur.current_pos = 2;
        b.refill().expect("refill");
        assert_eq!(b.capacity(), 4);
        assert_eq!(b.cursors().end_read, 4);
    }

    #[test]
    fn source_errors_propagate() {
        let mut b = ScanBuffer::new(Box::new(Failing), 4);
        assert!(b.refill().is_err());
    }

    #[test]
    fn closed_buffer_reports_eof() {
        let mut b = ScanBuffer::new(Box::new(StrSource::new("abc")), 4);
        b.close().expect("close");
        assert!(b.is_closed());
        assert_eq!(b.next_char().expect("next"), None);
    }

    #[test]
    fn chunked_source_caps_reads() {
        let mut s = ChunkedSource::new(StrSource::new("hello"), 2);
        let mut buf = ['\0'; 8];
        assert_eq!(s.read(&mut buf).expect("read"), 2);
        assert_eq!(&buf[..2], &['h', 'e']);
    }

    #[test]
    fn reader_source_reassembles_split_sequences() {
        // one byte at a time splits every multi-byte sequence
        struct OneByte<'a>(&'a [u8]);
        impl io::Read for OneByte<'_> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.is_empty() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }
        let text = "héllo ✓ 𝄞";
        let mut s = ReaderSource::new(OneByte(text.as_bytes()));
        assert_eq!(drain(&mut s, 3), text);
    }

    #[test]
    fn reader_source_replaces_invalid_bytes() {
        let bytes: &[u8] = &[b'a', 0xFF, b'b', 0xE2, 0x9C];
        let mut s = ReaderSource::new(bytes);
        assert_eq!(drain(&mut s, 16), "a\u{FFFD}b\u{FFFD}");
    }
}
