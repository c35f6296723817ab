//! Bit-level access to the compressed input range.

use super::InflateError;

/// Reads the input range LSB-first through a bit accumulator.
///
/// The accumulator is refilled lazily one byte at a time and never holds a
/// full word: `num_bits < 32` at all times (in practice it stays below 25,
/// as no caller asks for more than 16 bits at once).
pub(crate) struct BitReader<'a> {
    input: &'a [u8],
    /// Byte cursor into `input`.
    pos: usize,
    bit_buf: u32,
    num_bits: u32,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(input: &'a [u8]) -> BitReader<'a> {
        BitReader {
            input,
            pos: 0,
            bit_buf: 0,
            num_bits: 0,
        }
    }

    /// Pull bytes from the input until at least `n` bits are buffered.
    ///
    /// Fails with `InputUnderrun` if the input range is exhausted first.
    #[inline]
    pub(crate) fn need_bits(&mut self, n: u32) -> Result<(), InflateError> {
        debug_assert!(n <= 16);
        while self.num_bits < n {
            let Some(&byte) = self.input.get(self.pos) else {
                return Err(InflateError::InputUnderrun);
            };
            self.pos += 1;
            self.bit_buf |= u32::from(byte) << self.num_bits;
            self.num_bits += 8;
        }
        Ok(())
    }

    /// The low `n` bits of the accumulator, without consuming them.
    ///
    /// The caller must have secured them with [`need_bits`](Self::need_bits).
    #[inline]
    pub(crate) fn peek_bits(&self, n: u32) -> u32 {
        debug_assert!(n <= self.num_bits);
        self.bit_buf & ((1u32 << n) - 1)
    }

    /// Remove `n` buffered bits.
    #[inline]
    pub(crate) fn consume(&mut self, n: u32) {
        debug_assert!(n <= self.num_bits);
        self.bit_buf >>= n;
        self.num_bits -= n;
    }

    /// Return and remove the low `n` bits.
    #[inline]
    pub(crate) fn take_bits(&mut self, n: u32) -> u32 {
        let bits = self.peek_bits(n);
        self.consume(n);
        bits
    }

    /// Discard the remaining bits of the current byte, so that the next read
    /// starts on a byte boundary. Used before a stored block.
    #[inline]
    pub(crate) fn align_to_byte(&mut self) {
        let n = self.num_bits & 7;
        self.consume(n);
    }

    /// Number of whole input bytes not yet pulled into the accumulator.
    #[inline]
    pub(crate) fn bytes_remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    /// Take the next `len` raw bytes of input, bypassing the accumulator.
    ///
    /// Only valid when the accumulator has been drained to a byte boundary;
    /// stored-block headers are laid out so that this is always the case by
    /// the time the payload starts.
    pub(crate) fn read_slice(&mut self, len: usize) -> Result<&'a [u8], InflateError> {
        debug_assert_eq!(self.num_bits, 0);
        if self.bytes_remaining() < len {
            return Err(InflateError::InputUnderrun);
        }
        let slice = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}
