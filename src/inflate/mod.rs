//! The DEFLATE decoder: entry points, error taxonomy, and the sink surface.

mod bitstream;
mod core;
mod huffman;
mod window;

pub use self::core::{inflate_flags, Inflater, DEFAULT_WINDOW_SIZE};
pub use self::window::{LimitSink, Sink};

use std::error::Error;
use std::fmt;

/// Why a decompression attempt failed.
///
/// A stream either decodes in full or yields exactly one of these; no
/// partial success is reported.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InflateError {
    /// A Huffman code-length set did not cover its code space where a
    /// complete code is required.
    IncompleteCode,
    /// The bitstream is malformed: reserved block type, over-subscribed
    /// code lengths, bad stored-block header, invalid symbol, or a
    /// back-reference into bytes that were never produced.
    BadInput,
    /// The decoding-table arena exceeded its fixed budget.
    OutOfMemory,
    /// The input range ended before the stream did.
    InputUnderrun,
    /// The output sink refused bytes.
    Sink(SinkError),
}

impl fmt::Display for InflateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InflateError::IncompleteCode => f.write_str("incomplete Huffman code"),
            InflateError::BadInput => f.write_str("malformed deflate stream"),
            InflateError::OutOfMemory => f.write_str("decoding table budget exceeded"),
            InflateError::InputUnderrun => f.write_str("unexpected end of input"),
            InflateError::Sink(_) => f.write_str("output sink rejected data"),
        }
    }
}

impl Error for InflateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InflateError::Sink(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SinkError> for InflateError {
    fn from(e: SinkError) -> InflateError {
        InflateError::Sink(e)
    }
}

/// Error returned by a [`Sink`] that cannot take more output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SinkError;

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("sink cannot accept more output")
    }
}

impl Error for SinkError {}

/// What a successful decompression produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamSummary {
    /// Total decoded bytes delivered to the sink.
    pub bytes_out: u64,
    /// CRC32 (IEEE, as in ZIP central directories) of the decoded bytes.
    pub crc32: u32,
}

/// Decompress a whole deflate stream into a new [`Vec<u8>`].
pub fn decompress_to_vec(input: &[u8]) -> Result<Vec<u8>, InflateError> {
    decompress_to_vec_with_flags(input, 0)
}

/// Decompress a whole deflate stream into a new [`Vec<u8>`], with decoder
/// behavior adjusted by [`inflate_flags`] bits.
pub fn decompress_to_vec_with_flags(input: &[u8], flags: u32) -> Result<Vec<u8>, InflateError> {
    let mut out = Vec::new();
    Inflater::with_flags(flags).inflate(input, &mut out)?;
    Ok(out)
}
