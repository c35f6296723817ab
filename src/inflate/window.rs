//! The circular output window and the sink it drains into.

use log::debug;

use super::{InflateError, SinkError};

/// Receives decoded output, one window flush at a time.
///
/// Returning an error aborts the decode; nothing further is delivered.
pub trait Sink {
    fn accept(&mut self, bytes: &[u8]) -> Result<(), SinkError>;
}

/// Unbounded in-memory sink.
impl Sink for Vec<u8> {
    fn accept(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn accept(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        (**self).accept(bytes)
    }
}

/// Sink backed by a fixed caller-owned buffer.
///
/// Rejects output that would overflow the buffer, which surfaces as
/// [`InflateError::Sink`] from the decode.
pub struct LimitSink<'a> {
    buf: &'a mut [u8],
    filled: usize,
}

impl<'a> LimitSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> LimitSink<'a> {
        LimitSink { buf, filled: 0 }
    }

    /// Bytes delivered so far.
    pub fn written(&self) -> usize {
        self.filled
    }
}

impl Sink for LimitSink<'_> {
    fn accept(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let Some(room) = self.buf.get_mut(self.filled..self.filled + bytes.len()) else {
            return Err(SinkError);
        };
        room.copy_from_slice(bytes);
        self.filled += bytes.len();
        Ok(())
    }
}

/// Circular output buffer holding the most recent window of decoded bytes.
///
/// Back-references resolve against it; whenever it fills, the whole window
/// is pushed to the sink and folded into the running CRC32, and writing
/// wraps to the start while the history stays readable.
pub(crate) struct SlidingWindow {
    buf: Box<[u8]>,
    /// Next write position; always < `buf.len()`.
    pos: usize,
    /// Total bytes decoded so far, flushed or not.
    produced: u64,
    hasher: crc32fast::Hasher,
}

impl SlidingWindow {
    /// `size` must be a power of two of at least 32 KiB, enough to resolve
    /// any RFC 1951 distance.
    pub(crate) fn new(size: usize) -> SlidingWindow {
        assert!(
            size.is_power_of_two() && size >= 32 * 1024,
            "window size must be a power of two of at least 32 KiB"
        );
        SlidingWindow {
            buf: vec![0u8; size].into_boxed_slice(),
            pos: 0,
            produced: 0,
            hasher: crc32fast::Hasher::new(),
        }
    }

    /// Append one literal byte.
    #[inline]
    pub(crate) fn push_byte<S: Sink>(&mut self, byte: u8, sink: &mut S) -> Result<(), InflateError> {
        self.buf[self.pos] = byte;
        self.pos += 1;
        self.produced += 1;
        if self.pos == self.buf.len() {
            self.flush(sink)?;
        }
        Ok(())
    }

    /// Append a run of raw bytes (stored-block payload).
    pub(crate) fn write_all<S: Sink>(
        &mut self,
        mut data: &[u8],
        sink: &mut S,
    ) -> Result<(), InflateError> {
        while !data.is_empty() {
            let span = data.len().min(self.buf.len() - self.pos);
            self.buf[self.pos..self.pos + span].copy_from_slice(&data[..span]);
            self.pos += span;
            self.produced += span as u64;
            data = &data[span..];
            if self.pos == self.buf.len() {
                self.flush(sink)?;
            }
        }
        Ok(())
    }

    /// Replay `len` bytes starting `dist` bytes back in the output.
    ///
    /// A distance reaching past the start of the stream (or past what the
    /// window can still hold) is malformed input, not a read of stale
    /// window memory.
    pub(crate) fn copy_match<S: Sink>(
        &mut self,
        dist: usize,
        len: usize,
        sink: &mut S,
    ) -> Result<(), InflateError> {
        let wsize = self.buf.len();
        if dist > wsize || dist as u64 > self.produced {
            debug!("match distance {} exceeds produced output", dist);
            return Err(InflateError::BadInput);
        }

        let mask = wsize - 1;
        let mut from = self.pos.wrapping_sub(dist) & mask;
        let mut n = len;
        while n > 0 {
            // Largest span contiguous in both the source and the
            // destination arm of the circle.
            let span = n.min(wsize - self.pos.max(from));
            if self.pos.wrapping_sub(from) >= span {
                // Regions cannot overlap in replication order.
                self.buf.copy_within(from..from + span, self.pos);
            } else {
                // Source overlaps destination: replicate byte by byte.
                for i in 0..span {
                    self.buf[self.pos + i] = self.buf[from + i];
                }
            }
            self.pos += span;
            from = (from + span) & mask;
            self.produced += span as u64;
            n -= span;
            if self.pos == wsize {
                self.flush(sink)?;
            }
        }
        Ok(())
    }

    /// Push everything up to the write position to the sink, fold it into
    /// the CRC, and wrap.
    fn flush<S: Sink>(&mut self, sink: &mut S) -> Result<(), InflateError> {
        let chunk = &self.buf[..self.pos];
        self.hasher.update(chunk);
        sink.accept(chunk)?;
        self.pos = 0;
        Ok(())
    }

    /// Flush the residue at end of stream and yield the final CRC32.
    pub(crate) fn finish<S: Sink>(mut self, sink: &mut S) -> Result<(u64, u32), InflateError> {
        if self.pos > 0 {
            self.flush(sink)?;
        }
        Ok((self.produced, self.hasher.finalize()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn limit_sink_caps_output() {
        let mut buf = [0u8; 4];
        let mut sink = LimitSink::new(&mut buf);
        assert!(sink.accept(&[1, 2, 3]).is_ok());
        assert_eq!(sink.accept(&[4, 5]), Err(SinkError));
        assert_eq!(sink.written(), 3);
        assert!(sink.accept(&[4]).is_ok());
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn overlapping_match_replicates() {
        let mut out = Vec::new();
        let mut w = SlidingWindow::new(32 * 1024);
        w.push_byte(b'a', &mut out).unwrap();
        w.push_byte(b'b', &mut out).unwrap();
        w.copy_match(2, 5, &mut out).unwrap();
        let (total, _) = w.finish(&mut out).unwrap();
        assert_eq!(total, 7);
        assert_eq!(out, b"abababa");
    }

    #[test]
    fn match_before_stream_start_rejected() {
        let mut out = Vec::new();
        let mut w = SlidingWindow::new(32 * 1024);
        w.push_byte(b'x', &mut out).unwrap();
        assert_eq!(w.copy_match(2, 1, &mut out), Err(InflateError::BadInput));
    }

    #[test]
    fn match_spans_window_wrap() {
        let size = 32 * 1024;
        let mut out = Vec::new();
        let mut w = SlidingWindow::new(size);
        let fill: Vec<u8> = (0..size - 2).map(|i| (i % 251) as u8).collect();
        w.write_all(&fill, &mut out).unwrap();
        // Copy across the flush boundary: 4 bytes from 3 back.
        w.copy_match(3, 4, &mut out).unwrap();
        let (total, _) = w.finish(&mut out).unwrap();
        assert_eq!(total as usize, size + 2);
        let tail = &out[size - 5..];
        assert_eq!(tail[3], tail[0]);
        assert_eq!(tail[4], tail[1]);
        assert_eq!(tail[5], tail[2]);
        assert_eq!(tail[6], tail[3]);
    }

    #[test]
    fn crc_matches_reference() {
        let mut out = Vec::new();
        let mut w = SlidingWindow::new(32 * 1024);
        w.write_all(b"hello world", &mut out).unwrap();
        let (_, crc) = w.finish(&mut out).unwrap();
        assert_eq!(crc, crc32fast::hash(b"hello world"));
    }
}
