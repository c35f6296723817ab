//! A decompressor for raw DEFLATE (RFC 1951, PKZIP "method 8") bitstreams.
//!
//! Unlike buffer-oriented inflate implementations, this crate pushes decoded
//! bytes to a caller-supplied [`Sink`](inflate::Sink) one sliding-window
//! flush at a time, and rolls a CRC32 over everything it produces. It is
//! intended as the decompression core of an archive extractor: the archive
//! layer locates the compressed byte range, hands it over, and receives the
//! plain bytes and their checksum back. There is no compressor, no zlib or
//! gzip framing, and no file I/O here.
//!
//! # Usage
//! ```rust
//! use unflate::inflate::decompress_to_vec;
//!
//! // An empty stored block: final=1, type=00, LEN=0, ~LEN=0xffff.
//! let decoded = decompress_to_vec(&[0x01, 0x00, 0x00, 0xff, 0xff]).unwrap();
//! assert!(decoded.is_empty());
//! ```
//!
//! For streaming output and access to the CRC32, drive an
//! [`Inflater`](inflate::Inflater) directly:
//! ```rust
//! use unflate::inflate::Inflater;
//!
//! let mut out = Vec::new();
//! let summary = Inflater::new()
//!     .inflate(&[0x01, 0x00, 0x00, 0xff, 0xff], &mut out)
//!     .unwrap();
//! assert_eq!(summary.bytes_out, 0);
//! ```

pub mod inflate;

pub use crate::inflate::{InflateError, Sink, SinkError, StreamSummary};
