//! GBK encoding utilities for Chinese thermal printers
//!
//! Most Chinese thermal printers use GBK encoding for text.
//! Transcoding here is total: characters outside the GBK repertoire are
//! replaced by a single placeholder byte instead of failing the print.

use encoding_rs::{EncoderResult, GBK};
use thiserror::Error;
use tracing::warn;

/// Byte written in place of characters GBK cannot represent (`?`)
pub const PLACEHOLDER: u8 = b'?';

/// Non-fatal report: some characters were substituted with [`PLACEHOLDER`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} character(s) not representable in GBK: {unmappable:?}", unmappable.len())]
pub struct EncodingDegraded {
    pub unmappable: Vec<char>,
}

/// Convert UTF-8 text to GBK bytes, reporting substituted characters
///
/// Unlike `encoding_rs::GBK.encode`, which emits HTML numeric references for
/// unmappable characters, every unmappable character becomes exactly one
/// [`PLACEHOLDER`] byte.
pub fn transcode(text: &str) -> (Vec<u8>, Option<EncodingDegraded>) {
    let mut encoder = GBK.new_encoder();
    let mut out = Vec::with_capacity(text.len() * 2);
    let mut unmappable = Vec::new();
    let mut buf = [0u8; 256];
    let mut src = text;

    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(src, &mut buf, true);
        out.extend_from_slice(&buf[..written]);
        src = &src[read..];

        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => continue,
            EncoderResult::Unmappable(c) => {
                out.push(PLACEHOLDER);
                unmappable.push(c);
            }
        }
    }

    let degraded = if unmappable.is_empty() {
        None
    } else {
        Some(EncodingDegraded { unmappable })
    };
    (out, degraded)
}

/// Convert UTF-8 text to GBK bytes
///
/// Degradation is logged, never surfaced.
pub fn encode_text(text: &str) -> Vec<u8> {
    let (bytes, degraded) = transcode(text);
    if let Some(report) = degraded {
        warn!(%report, "encoding degraded");
    }
    bytes
}
