//! Incremental gzip/deflate decoding of response bodies.

use std::io::Write;

use bytes::Bytes;
use flate2::write::{GzDecoder, ZlibDecoder};
use reqwest::header::{HeaderMap, CONTENT_ENCODING};

use crate::error_handling::FetchError;

/// Decoder for a compressed response body.
///
/// Compressed chunks are written in as they arrive and whatever plaintext is
/// ready is taken out, so the body is never buffered whole.
pub(crate) struct Decoder {
    codec: Codec,
    /// Whether any compressed bytes have arrived
    received: bool,
}

enum Codec {
    Gzip(GzDecoder<Vec<u8>>),
    Deflate(ZlibDecoder<Vec<u8>>),
}

impl Decoder {
    /// Picks a decoder from the `content-encoding` header.
    ///
    /// Returns `None` for absent or unknown encodings, which pass through unchanged.
    pub(crate) fn for_headers(headers: &HeaderMap) -> Option<Self> {
        let encoding = headers.get(CONTENT_ENCODING)?.to_str().ok()?.trim();
        let codec = if encoding.eq_ignore_ascii_case("gzip") {
            Codec::Gzip(GzDecoder::new(Vec::new()))
        } else if encoding.eq_ignore_ascii_case("deflate") {
            Codec::Deflate(ZlibDecoder::new(Vec::new()))
        } else {
            return None;
        };
        Some(Self {
            codec,
            received: false,
        })
    }

    /// Feeds a compressed chunk and returns the plaintext decoded so far.
    pub(crate) fn decode(&mut self, input: &[u8]) -> Result<Bytes, FetchError> {
        if input.is_empty() {
            return Ok(Bytes::new());
        }
        self.received = true;
        let out = match &mut self.codec {
            Codec::Gzip(d) => {
                d.write_all(input).map_err(FetchError::Decode)?;
                std::mem::take(d.get_mut())
            }
            Codec::Deflate(d) => {
                d.write_all(input).map_err(FetchError::Decode)?;
                std::mem::take(d.get_mut())
            }
        };
        Ok(Bytes::from(out))
    }

    /// Flushes the decoder at end of body and returns any remaining plaintext.
    ///
    /// A body that carried no bytes at all (204, 304, empty 200) decodes to nothing.
    pub(crate) fn finish(&mut self) -> Result<Bytes, FetchError> {
        if !self.received {
            return Ok(Bytes::new());
        }
        let out = match &mut self.codec {
            Codec::Gzip(d) => {
                d.try_finish().map_err(FetchError::Decode)?;
                std::mem::take(d.get_mut())
            }
            Codec::Deflate(d) => {
                d.try_finish().map_err(FetchError::Decode)?;
                std::mem::take(d.get_mut())
            }
        };
        Ok(Bytes::from(out))
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.codec {
            Codec::Gzip(_) => f.write_str("Decoder::Gzip"),
            Codec::Deflate(_) => f.write_str("Decoder::Deflate"),
        }
    }
}
