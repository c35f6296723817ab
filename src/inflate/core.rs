//! Block decoding and the decompression driver.

use log::{debug, trace, warn};

use super::bitstream::BitReader;
use super::huffman::{
    build_table, max_dist_symbols, max_litlen_symbols, EntryKind, FixedTables, HuffmanTable,
    CODE_LENGTH_ROOT_BITS, CODE_LENGTH_SYMBOLS, DIST_BASE, DIST_EXTRA, DIST_ROOT_BITS,
    HUFFMAN_LENGTH_ORDER, LENGTH_BASE, LENGTH_EXTRA, LITLEN_ROOT_BITS, MAX_SYMBOLS,
};
use super::window::{Sink, SlidingWindow};
use super::{InflateError, StreamSummary};

/// Default size of the sliding window, the minimum required to resolve any
/// RFC 1951 back-reference.
pub const DEFAULT_WINDOW_SIZE: usize = 32 * 1024;

/// Flags that adjust how a deflate stream is decoded.
pub mod inflate_flags {
    /// Accept dynamic blocks whose distance tree does not fill its code
    /// space. PKZIP 1.x emitted such blocks for streams using only a few
    /// distinct distances; strict decoding rejects them.
    pub const INFLATE_FLAG_TOLERATE_INCOMPLETE_DIST_TREE: u32 = 1;

    /// Accept dynamic headers declaring up to 288 literal/length and 32
    /// distance codes instead of 286 and 30. The surplus symbols may appear
    /// in the transmitted code-length lists, but decoding one of them is
    /// still an error.
    pub const INFLATE_FLAG_EXTENDED_DIST_CODES: u32 = 2;
}

/// A single-use decompression context.
///
/// Holds the decoder configuration and the fixed-Huffman table cache; the
/// sliding window, bit reader and CRC live only for the duration of
/// [`inflate`](Inflater::inflate), which consumes the context.
pub struct Inflater {
    flags: u32,
    window_size: usize,
    fixed: Option<FixedTables>,
}

impl Default for Inflater {
    fn default() -> Inflater {
        Inflater::new()
    }
}

impl Inflater {
    pub fn new() -> Inflater {
        Inflater::with_flags(0)
    }

    pub fn with_flags(flags: u32) -> Inflater {
        Inflater {
            flags,
            window_size: DEFAULT_WINDOW_SIZE,
            fixed: None,
        }
    }

    /// Use a window larger than the 32 KiB default. A bigger window changes
    /// only how often the sink is called, not what it receives.
    ///
    /// # Panics
    ///
    /// Panics unless `size` is a power of two of at least 32 KiB.
    pub fn with_window_size(mut self, size: usize) -> Inflater {
        assert!(
            size.is_power_of_two() && size >= DEFAULT_WINDOW_SIZE,
            "window size must be a power of two of at least 32 KiB"
        );
        self.window_size = size;
        self
    }

    /// Decode one whole deflate stream from `input`, pushing output to
    /// `sink` one window flush at a time.
    ///
    /// Decoding runs to the final-block marker or the first error; on
    /// success the residue is flushed and the byte count and CRC32 of
    /// everything delivered are returned.
    pub fn inflate<S: Sink>(
        mut self,
        input: &[u8],
        sink: &mut S,
    ) -> Result<StreamSummary, InflateError> {
        let mut reader = BitReader::new(input);
        let mut window = SlidingWindow::new(self.window_size);
        loop {
            reader.need_bits(3)?;
            let last = reader.take_bits(1) != 0;
            let block_type = reader.take_bits(2);
            trace!("block header: last={} type={}", last, block_type);
            match block_type {
                0 => stored_block(&mut reader, &mut window, sink)?,
                1 => self.fixed_block(&mut reader, &mut window, sink)?,
                2 => dynamic_block(self.flags, &mut reader, &mut window, sink)?,
                _ => {
                    debug!("reserved block type");
                    return Err(InflateError::BadInput);
                }
            }
            if last {
                break;
            }
        }
        let (bytes_out, crc32) = window.finish(sink)?;
        Ok(StreamSummary { bytes_out, crc32 })
    }

    fn fixed_block<S: Sink>(
        &mut self,
        reader: &mut BitReader,
        window: &mut SlidingWindow,
        sink: &mut S,
    ) -> Result<(), InflateError> {
        // Built once per context, reused by every fixed block after it.
        let tables = match self.fixed.take() {
            Some(tables) => tables,
            None => FixedTables::build(self.flags)?,
        };
        let result = inflate_codes(reader, window, sink, &tables.litlen, Some(&tables.dist));
        self.fixed = Some(tables);
        result
    }
}

/// Walk the table levels until a terminal entry resolves.
///
/// Never returns `Link`; at most 15 bits are consumed in total.
fn decode_symbol(reader: &mut BitReader, table: &HuffmanTable) -> Result<EntryKind, InflateError> {
    let mut level = 0;
    let mut bits = u32::from(table.root_bits());
    loop {
        reader.need_bits(bits)?;
        let entry = table.entry(level, reader.peek_bits(bits) as usize);
        reader.consume(u32::from(entry.consume));
        match entry.kind {
            EntryKind::Link { bits: next, table } => {
                level = table as usize;
                bits = u32::from(next);
            }
            kind => return Ok(kind),
        }
    }
}

/// Decode literal/length/distance codes until the end-of-block symbol.
///
/// `dist` is `None` for a dynamic block that declared no distance codes;
/// such a block may only contain literals.
fn inflate_codes<S: Sink>(
    reader: &mut BitReader,
    window: &mut SlidingWindow,
    sink: &mut S,
    litlen: &HuffmanTable,
    dist: Option<&HuffmanTable>,
) -> Result<(), InflateError> {
    loop {
        match decode_symbol(reader, litlen)? {
            EntryKind::Literal(byte) => window.push_byte(byte, sink)?,
            EntryKind::EndOfBlock => return Ok(()),
            EntryKind::Base { base, extra } => {
                reader.need_bits(u32::from(extra))?;
                let length = base as usize + reader.take_bits(u32::from(extra)) as usize;

                let Some(dist_table) = dist else {
                    debug!("length code in a block with no distance tree");
                    return Err(InflateError::BadInput);
                };
                let distance = match decode_symbol(reader, dist_table)? {
                    EntryKind::Base { base, extra } => {
                        reader.need_bits(u32::from(extra))?;
                        base as usize + reader.take_bits(u32::from(extra)) as usize
                    }
                    _ => {
                        debug!("invalid distance code");
                        return Err(InflateError::BadInput);
                    }
                };
                window.copy_match(distance, length, sink)?;
            }
            EntryKind::Invalid | EntryKind::Link { .. } => {
                debug!("invalid literal/length code");
                return Err(InflateError::BadInput);
            }
        }
    }
}

/// Copy a stored block straight from the input to the window.
fn stored_block<S: Sink>(
    reader: &mut BitReader,
    window: &mut SlidingWindow,
    sink: &mut S,
) -> Result<(), InflateError> {
    reader.align_to_byte();
    reader.need_bits(16)?;
    let len = reader.take_bits(16) as usize;
    reader.need_bits(16)?;
    let check = reader.take_bits(16);
    if len != (!check & 0xffff) as usize {
        debug!("stored block length {:#06x} fails its complement check", len);
        return Err(InflateError::BadInput);
    }
    // The aligned 32-bit header always drains the accumulator, so the
    // payload starts at the input cursor.
    let data = reader.read_slice(len)?;
    window.write_all(data, sink)
}

/// Decode a dynamic-Huffman block: code-length tree, then the transmitted
/// literal/length and distance code lengths, then the payload.
fn dynamic_block<S: Sink>(
    flags: u32,
    reader: &mut BitReader,
    window: &mut SlidingWindow,
    sink: &mut S,
) -> Result<(), InflateError> {
    reader.need_bits(5)?;
    let hlit = 257 + reader.take_bits(5) as usize;
    reader.need_bits(5)?;
    let hdist = 1 + reader.take_bits(5) as usize;
    reader.need_bits(4)?;
    let hclen = 4 + reader.take_bits(4) as usize;
    if hlit > max_litlen_symbols(flags) || hdist > max_dist_symbols(flags) {
        debug!(
            "dynamic header declares {} literal/length and {} distance codes",
            hlit, hdist
        );
        return Err(InflateError::BadInput);
    }

    let mut clen_lengths = [0u8; CODE_LENGTH_SYMBOLS];
    for &sym in HUFFMAN_LENGTH_ORDER.iter().take(hclen) {
        reader.need_bits(3)?;
        clen_lengths[sym as usize] = reader.take_bits(3) as u8;
    }
    let clen_table = match build_table(
        &clen_lengths,
        CODE_LENGTH_SYMBOLS,
        &[],
        &[],
        CODE_LENGTH_ROOT_BITS,
    )? {
        Some(table) if table.is_complete() => table,
        _ => {
            debug!("code-length tree missing or incomplete");
            return Err(InflateError::IncompleteCode);
        }
    };

    // Read hlit + hdist code lengths, expanding the three repeat codes.
    let total = hlit + hdist;
    let mut lengths = [0u8; MAX_SYMBOLS + 32];
    let mut filled = 0;
    let mut prev: Option<u8> = None;
    while filled < total {
        let (value, run) = match decode_symbol(reader, &clen_table)? {
            EntryKind::Literal(len @ 0..=15) => {
                prev = Some(len);
                (len, 1)
            }
            EntryKind::Literal(16) => {
                reader.need_bits(2)?;
                let run = 3 + reader.take_bits(2) as usize;
                let Some(len) = prev else {
                    debug!("length repeat with nothing to repeat");
                    return Err(InflateError::BadInput);
                };
                (len, run)
            }
            EntryKind::Literal(17) => {
                reader.need_bits(3)?;
                let run = 3 + reader.take_bits(3) as usize;
                prev = Some(0);
                (0, run)
            }
            EntryKind::Literal(18) => {
                reader.need_bits(7)?;
                let run = 11 + reader.take_bits(7) as usize;
                prev = Some(0);
                (0, run)
            }
            _ => {
                debug!("invalid code-length symbol");
                return Err(InflateError::BadInput);
            }
        };
        if filled + run > total {
            debug!("code-length run overflows the declared counts");
            return Err(InflateError::BadInput);
        }
        lengths[filled..filled + run].fill(value);
        filled += run;
    }

    let litlen = match build_table(
        &lengths[..hlit],
        257,
        &LENGTH_BASE,
        &LENGTH_EXTRA,
        LITLEN_ROOT_BITS,
    )? {
        Some(table) if table.is_complete() => table,
        _ => {
            debug!("literal/length tree missing or incomplete");
            return Err(InflateError::IncompleteCode);
        }
    };

    let dist = match build_table(
        &lengths[hlit..total],
        0,
        &DIST_BASE,
        &DIST_EXTRA,
        DIST_ROOT_BITS,
    )? {
        Some(table) => {
            if !table.is_complete() {
                if flags & inflate_flags::INFLATE_FLAG_TOLERATE_INCOMPLETE_DIST_TREE == 0 {
                    debug!("incomplete distance tree");
                    return Err(InflateError::IncompleteCode);
                }
                warn!("incomplete distance tree tolerated");
            }
            Some(table)
        }
        None => {
            // Length codes with no distance tree to resolve them.
            if hlit > 257 {
                debug!("length codes declared but no distance tree");
                return Err(InflateError::IncompleteCode);
            }
            None
        }
    };

    inflate_codes(reader, window, sink, &litlen, dist.as_ref())
}
