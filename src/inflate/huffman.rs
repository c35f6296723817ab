//! Canonical Huffman decoding tables.
//!
//! Tables are built with the classic multi-level scheme used by the infozip
//! family of decoders: a root table sized for the common short codes, with
//! chained subtables for the longer ones. Short codes are replicated across
//! every slot whose low bits match, so a decode is a direct fixed-width
//! index at each level rather than a bit-by-bit tree walk.

use log::debug;

use super::inflate_flags::INFLATE_FLAG_EXTENDED_DIST_CODES;
use super::InflateError;

/// Maximum bit length of any DEFLATE code.
pub(crate) const MAX_BITS: usize = 15;
/// Maximum number of symbols in any alphabet (literal/length).
pub(crate) const MAX_SYMBOLS: usize = 288;
/// Number of symbols in the code-length alphabet of a dynamic block.
pub(crate) const CODE_LENGTH_SYMBOLS: usize = 19;

/// Root table width for the literal/length table.
pub(crate) const LITLEN_ROOT_BITS: u8 = 9;
/// Root table width for the distance table.
pub(crate) const DIST_ROOT_BITS: u8 = 6;
/// Root table width for the code-length table of a dynamic block header.
pub(crate) const CODE_LENGTH_ROOT_BITS: u8 = 7;

/// Marker in the extra-bits tables for symbols that may appear in a table
/// but are not valid in a conforming stream (litlen 286/287, dist 30/31).
const INVALID_EXTRA: u8 = 99;

/// Upper bound on total table entries per alphabet. Any code-length set
/// that passes the over-subscription check fits (degenerate sets of only
/// near-maximum lengths grow a single level up to 1 << 16); exceeding the
/// budget is reported as `OutOfMemory`, the arena equivalent of the
/// original allocator failing mid-build.
const MAX_TABLE_ENTRIES: usize = 1 << 16;

/// Base match lengths for literal/length symbols 257..=287.
///
/// Symbols 286 and 287 exist in the fixed code assignment but carry
/// `INVALID_EXTRA` so that decoding them fails.
#[rustfmt::skip]
pub(crate) const LENGTH_BASE: [u16; 31] = [
    3,  4,  5,  6,  7,  8,  9,  10,  11,  13,  15,  17,  19,  23,  27,  31,
    35, 43, 51, 59, 67, 83, 99, 115, 131, 163, 195, 227, 258, 0, 0,
];

/// Extra bits for literal/length symbols 257..=287.
#[rustfmt::skip]
pub(crate) const LENGTH_EXTRA: [u8; 31] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2,
    3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0, INVALID_EXTRA, INVALID_EXTRA,
];

/// Base distances for distance symbols 0..=31.
///
/// Symbols 30 and 31 only come into play with
/// [`INFLATE_FLAG_EXTENDED_DIST_CODES`]; their bases follow the Deflate64
/// assignment but their extra-bit slots are invalid, so streams that
/// actually emit them are still rejected.
#[rustfmt::skip]
pub(crate) const DIST_BASE: [u16; 32] = [
    1,    2,    3,    4,    5,    7,    9,    13,    17,    25,    33,   49,
    65,   97,   129,  193,  257,  385,  513,  769,   1025,  1537,  2049, 3073,
    4097, 6145, 8193, 12_289, 16_385, 24_577, 32_769, 49_153,
];

/// Extra bits for distance symbols 0..=31.
#[rustfmt::skip]
pub(crate) const DIST_EXTRA: [u8; 32] = [
    0, 0, 0, 0, 1, 1, 2,  2,  3,  3,  4,  4,  5,  5,  6,  6,
    7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13, 13, INVALID_EXTRA, INVALID_EXTRA,
];

/// Order in which the code-length code lengths of a dynamic block are stored.
pub(crate) const HUFFMAN_LENGTH_ORDER: [u8; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Number of literal/length symbols a dynamic header may declare.
pub(crate) fn max_litlen_symbols(flags: u32) -> usize {
    if flags & INFLATE_FLAG_EXTENDED_DIST_CODES != 0 {
        288
    } else {
        286
    }
}

/// Number of distance symbols a dynamic header may declare.
pub(crate) fn max_dist_symbols(flags: u32) -> usize {
    if flags & INFLATE_FLAG_EXTENDED_DIST_CODES != 0 {
        32
    } else {
        30
    }
}

/// What a decoded table entry resolves to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum EntryKind {
    /// Code space not covered by any symbol (incomplete codes, or symbols
    /// marked `INVALID_EXTRA`).
    Invalid,
    /// A plain symbol value below 256: an output byte for the
    /// literal/length table, a code length for the code-length table.
    Literal(u8),
    /// The end-of-block symbol (value 256).
    EndOfBlock,
    /// A length or distance code: `base` plus the value of `extra` more bits.
    Base { base: u16, extra: u8 },
    /// Longer code: index the table at `table` with `bits` more bits.
    Link { bits: u8, table: u16 },
}

/// One slot of a lookup level. `consume` is the number of bits the decoder
/// drops when it lands here: the remaining code length for terminal entries,
/// the full level width for links.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Entry {
    pub consume: u8,
    pub kind: EntryKind,
}

/// A built multi-level lookup table. Level 0 is the root; `Link` entries
/// index deeper levels by arena position.
pub(crate) struct HuffmanTable {
    levels: Vec<Box<[Entry]>>,
    root_bits: u8,
    complete: bool,
}

impl HuffmanTable {
    /// Width of the root level in bits.
    #[inline]
    pub(crate) fn root_bits(&self) -> u8 {
        self.root_bits
    }

    /// Whether the code-length set filled the code space exactly.
    #[inline]
    pub(crate) fn is_complete(&self) -> bool {
        self.complete
    }

    #[inline]
    pub(crate) fn entry(&self, level: usize, slot: usize) -> Entry {
        self.levels[level][slot]
    }
}

/// Build the decoding table for a canonical Huffman code given per-symbol
/// code lengths.
///
/// `lengths[sym]` is the code length of `sym` (0 = unused). Symbols below
/// `simple_count` decode to themselves ([`EntryKind::Literal`], or
/// [`EntryKind::EndOfBlock`] for 256); higher symbols are looked up in the
/// `bases`/`extras` tables, indexed by `sym - simple_count`. `max_root_bits`
/// caps the width of the root level; the actual width is clamped to the
/// range of code lengths in use.
///
/// Returns `Ok(None)` when every length is zero: an empty table is a valid
/// result, not an error (a dynamic block may legitimately declare no
/// distance codes). Over-subscribed length sets fail with `BadInput`;
/// under-subscribed sets build a usable table with
/// [`is_complete`](HuffmanTable::is_complete) returning `false`, which the
/// caller accepts or rejects depending on the alphabet.
pub(crate) fn build_table(
    lengths: &[u8],
    simple_count: usize,
    bases: &[u16],
    extras: &[u8],
    max_root_bits: u8,
) -> Result<Option<HuffmanTable>, InflateError> {
    let n = lengths.len();
    debug_assert!(n <= MAX_SYMBOLS);
    debug_assert!(lengths.iter().all(|&len| len as usize <= MAX_BITS));

    // Histogram of code lengths.
    let mut count = [0u32; MAX_BITS + 1];
    for &len in lengths {
        count[len as usize] += 1;
    }
    if count[0] as usize == n {
        return Ok(None);
    }

    // Shortest and longest code in use bound the root width.
    let min_len = (1..=MAX_BITS).find(|&j| count[j] != 0).unwrap_or(MAX_BITS);
    let max_len = (1..=MAX_BITS)
        .rev()
        .find(|&j| count[j] != 0)
        .unwrap_or(MAX_BITS);
    let root_cap = (max_root_bits as usize).clamp(min_len, max_len);

    // Walk the code space: going negative means more codes than bits can
    // hold; what is left over at the longest length marks the set
    // incomplete, and is padded out so the tables cover the space exactly.
    let mut leftover: i32 = 1 << min_len;
    for len in min_len..max_len {
        leftover -= count[len] as i32;
        if leftover < 0 {
            debug!("build_table: over-subscribed code length set");
            return Err(InflateError::BadInput);
        }
        leftover <<= 1;
    }
    leftover -= count[max_len] as i32;
    if leftover < 0 {
        debug!("build_table: over-subscribed code length set");
        return Err(InflateError::BadInput);
    }
    count[max_len] += leftover as u32;

    // Offset of each length's first symbol in the sorted value table.
    let mut offset = [0u32; MAX_BITS + 2];
    let mut sum = 0u32;
    for len in 1..max_len {
        sum += count[len];
        offset[len + 1] = sum;
    }

    // Symbols in order of code length.
    let mut values = [0u16; MAX_SYMBOLS];
    for (sym, &len) in lengths.iter().enumerate() {
        if len != 0 {
            values[offset[len as usize] as usize] = sym as u16;
            offset[len as usize] += 1;
        }
    }
    let num_codes = offset[max_len] as usize;

    // The end-of-block code must be fully decodable at its own level, so no
    // level may straddle its length. With no symbol 256 there is no bound.
    let eob_len = if n > 256 {
        lengths[256] as usize
    } else {
        MAX_BITS
    };

    let mut levels: Vec<Box<[Entry]>> = Vec::new();
    let mut total_entries = 0usize;

    // Per-level state while descending: arena index, width, and the code
    // pattern at which the level was entered (for backing out).
    let mut level_at = [0usize; MAX_BITS];
    let mut width = [0usize; MAX_BITS + 1]; // width[h + 1] is level h's width
    let mut entered_at = [0u32; MAX_BITS + 1];

    let mut depth: i32 = -1; // current level, -1 before the root exists
    let mut bits_done = 0usize; // bits decoded by the levels above
    let mut code = 0u32; // current code, bit-reversed for direct indexing
    let mut next_value = 0usize; // cursor into `values`
    let mut level_size = 0usize;

    for len in min_len..=max_len {
        for remaining in (0..count[len] as usize).rev() {
            // Open levels until this code's length fits.
            while len > bits_done + width[(depth + 1) as usize] {
                bits_done += width[(depth + 1) as usize];
                depth += 1;

                // Size the new level: enough for the longest remaining code,
                // capped at the root width, and shrunk when the codes at
                // hand cannot fill a level that wide anyway.
                let cap = (max_len - bits_done).min(root_cap);
                let mut level_bits = len - bits_done;
                let mut slack = 1u32 << level_bits;
                if slack as usize > remaining + 1 {
                    slack -= remaining as u32 + 1;
                    let mut c_idx = len;
                    loop {
                        level_bits += 1;
                        if level_bits >= cap {
                            break;
                        }
                        c_idx += 1;
                        slack <<= 1;
                        if slack <= count[c_idx] {
                            break;
                        }
                        slack -= count[c_idx];
                    }
                }
                if bits_done + level_bits > eob_len && bits_done < eob_len {
                    level_bits = eob_len - bits_done;
                }
                level_size = 1 << level_bits;
                width[(depth + 1) as usize] = level_bits;

                total_entries += level_size;
                if total_entries > MAX_TABLE_ENTRIES {
                    debug!("build_table: table arena budget exceeded");
                    return Err(InflateError::OutOfMemory);
                }
                levels.push(
                    vec![
                        Entry {
                            consume: level_bits as u8,
                            kind: EntryKind::Invalid,
                        };
                        level_size
                    ]
                    .into_boxed_slice(),
                );
                level_at[depth as usize] = levels.len() - 1;

                // Point the parent at the new level.
                if depth > 0 {
                    entered_at[depth as usize] = code & ((1 << bits_done) - 1);
                    let parent_width = width[depth as usize];
                    let slot =
                        ((code & ((1 << bits_done) - 1)) >> (bits_done - parent_width)) as usize;
                    let parent = level_at[(depth - 1) as usize];
                    levels[parent][slot] = Entry {
                        consume: parent_width as u8,
                        kind: EntryKind::Link {
                            bits: level_bits as u8,
                            table: (levels.len() - 1) as u16,
                        },
                    };
                }
            }

            // Resolve the symbol for this code; codes past the real symbols
            // are the padding that marks an incomplete set.
            let kind = if next_value >= num_codes {
                EntryKind::Invalid
            } else {
                let sym = values[next_value] as usize;
                next_value += 1;
                if sym < simple_count {
                    if sym < 256 {
                        EntryKind::Literal(sym as u8)
                    } else {
                        EntryKind::EndOfBlock
                    }
                } else {
                    let extra = extras[sym - simple_count];
                    if extra == INVALID_EXTRA {
                        EntryKind::Invalid
                    } else {
                        EntryKind::Base {
                            base: bases[sym - simple_count],
                            extra,
                        }
                    }
                }
            };
            let entry = Entry {
                consume: (len - bits_done) as u8,
                kind,
            };

            // Replicate across every slot whose low bits match the code.
            let step = 1usize << (len - bits_done);
            let table = level_at[depth as usize];
            let mut slot = (code >> bits_done) as usize;
            while slot < level_size {
                levels[table][slot] = entry;
                slot += step;
            }

            // Advance to the next code: increment in bit-reversed order.
            let mut bit = 1u32 << (len - 1);
            while code & bit != 0 {
                code ^= bit;
                bit >>= 1;
            }
            code ^= bit;

            // Back out of levels this code no longer shares a prefix with.
            while (code & ((1 << bits_done) - 1)) != entered_at[depth as usize] {
                bits_done -= width[depth as usize];
                depth -= 1;
            }
        }
    }

    Ok(Some(HuffmanTable {
        root_bits: width[1] as u8,
        complete: leftover == 0 || max_len == 1,
        levels,
    }))
}

/// The memoized literal/length and distance tables of fixed-Huffman blocks.
///
/// Built on first use per decompression context and reused for every fixed
/// block in the stream; the context owns the cache, so nothing is shared
/// across streams.
pub(crate) struct FixedTables {
    pub litlen: HuffmanTable,
    pub dist: HuffmanTable,
}

impl FixedTables {
    pub(crate) fn build(flags: u32) -> Result<FixedTables, InflateError> {
        // RFC 1951 3.2.6: the fixed literal/length code assignment. The set
        // is complete; 286/287 only pad the code space.
        let mut lengths = [0u8; MAX_SYMBOLS];
        lengths[0..144].fill(8);
        lengths[144..256].fill(9);
        lengths[256..280].fill(7);
        lengths[280..288].fill(8);
        let litlen = build_table(&lengths, 257, &LENGTH_BASE, &LENGTH_EXTRA, 7)?
            .ok_or(InflateError::BadInput)?;

        // Uniform 5-bit distance codes. With 30 symbols the set is
        // incomplete, which is fine here.
        let num_dists = max_dist_symbols(flags);
        let dist = build_table(
            &[5u8; 32][..num_dists],
            0,
            &DIST_BASE,
            &DIST_EXTRA,
            DIST_ROOT_BITS,
        )?
        .ok_or(InflateError::BadInput)?;

        Ok(FixedTables { litlen, dist })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_zero_lengths_build_empty_table() {
        let table = build_table(&[0u8; 19], 19, &[], &[], 7).unwrap();
        assert!(table.is_none());
    }

    #[test]
    fn over_subscribed_set_rejected() {
        // Three codes of length 1 need more code space than one bit has.
        let res = build_table(&[1, 1, 1], 3, &[], &[], 7);
        assert_eq!(res.err(), Some(InflateError::BadInput));
        // Subtler: fills length 2 and then some.
        let res = build_table(&[2, 2, 2, 2, 1], 5, &[], &[], 7);
        assert_eq!(res.err(), Some(InflateError::BadInput));
    }

    #[test]
    fn kraft_satisfying_sets_accepted() {
        // Complete: lengths 1, 2, 2.
        let table = build_table(&[1, 2, 2], 3, &[], &[], 7).unwrap().unwrap();
        assert!(table.is_complete());

        // Incomplete but valid: a single 2-bit code leaves space unused.
        let table = build_table(&[0, 2, 0], 3, &[], &[], 7).unwrap().unwrap();
        assert!(!table.is_complete());
    }

    #[test]
    fn single_code_not_marked_incomplete() {
        // One 1-bit code is how a lone symbol is coded; infozip treats it
        // as complete even though half the space is unused.
        let table = build_table(&[1, 0, 0], 3, &[], &[], 7).unwrap().unwrap();
        assert!(table.is_complete());
    }

    #[test]
    fn root_width_clamped_to_code_lengths() {
        // All codes are 3 bits, so a 9-bit root request shrinks to 3.
        let lengths = [3u8; 8];
        let table = build_table(&lengths, 8, &[], &[], 9).unwrap().unwrap();
        assert_eq!(table.root_bits(), 3);
    }

    #[test]
    fn fixed_tables_shape() {
        let fixed = FixedTables::build(0).unwrap();
        // Root capped at 7 bits; EOB is a 7-bit code and must not straddle.
        assert_eq!(fixed.litlen.root_bits(), 7);
        assert!(fixed.litlen.is_complete());
        assert_eq!(fixed.dist.root_bits(), 5);
        assert!(!fixed.dist.is_complete());
    }

    #[test]
    fn fixed_litlen_decodes_known_codes() {
        let fixed = FixedTables::build(0).unwrap();
        // EOB (symbol 256) is the all-zero 7-bit code: slot 0 of the root.
        let entry = fixed.litlen.entry(0, 0);
        assert_eq!(entry.kind, EntryKind::EndOfBlock);
        assert_eq!(entry.consume, 7);
    }
}
