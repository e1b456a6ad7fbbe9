//! ESC/POS command encoder
//!
//! Style directives and a frame builder for thermal printers.
//! Every styled line re-sends all four style directives so the printer's
//! state never depends on what was printed before.

use serde::{Deserialize, Serialize};

use crate::encoding::encode_text;

/// ESC (Escape) - command prefix
pub const ESC: u8 = 0x1B;
/// GS (Group Separator) - extended command prefix
pub const GS: u8 = 0x1D;
/// LF (Line Feed) - print buffer and advance one line
pub const LF: u8 = 0x0A;

/// Character scale, sent as the `ESC ! n` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    #[default]
    Normal,
    DoubleHeight,
    DoubleWidth,
    DoubleBoth,
    TripleHeight,
    TripleWidth,
    TripleBoth,
    QuadBoth,
}

impl Scale {
    /// All eight levels, smallest first
    pub const ALL: [Scale; 8] = [
        Scale::Normal,
        Scale::DoubleHeight,
        Scale::DoubleWidth,
        Scale::DoubleBoth,
        Scale::TripleHeight,
        Scale::TripleWidth,
        Scale::TripleBoth,
        Scale::QuadBoth,
    ];

    /// `ESC ! n` parameter byte understood by the MPT firmware
    pub fn code(self) -> u8 {
        match self {
            Scale::Normal => 0,
            Scale::DoubleHeight => 1,
            Scale::DoubleWidth => 16,
            Scale::DoubleBoth => 17,
            Scale::TripleHeight => 32,
            Scale::TripleWidth => 48,
            Scale::TripleBoth => 49,
            Scale::QuadBoth => 64,
        }
    }
}

/// Text style of one receipt line
///
/// Every field is always present; the default is normal, unstyled text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub scale: Scale,
    pub bold: bool,
    pub underline: bool,
    pub reverse: bool,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }
}

// === Directives ===

/// Initialize printer (ESC @)
#[inline]
pub fn init() -> [u8; 2] {
    [ESC, b'@']
}

/// Select character scale (ESC ! n)
#[inline]
pub fn scale(scale: Scale) -> [u8; 3] {
    [ESC, b'!', scale.code()]
}

/// Bold on/off (ESC E n)
#[inline]
pub fn bold(on: bool) -> [u8; 3] {
    [ESC, b'E', on as u8]
}

/// Underline on/off (ESC - n)
#[inline]
pub fn underline(on: bool) -> [u8; 3] {
    [ESC, b'-', on as u8]
}

/// Reverse video on/off (GS B n)
#[inline]
pub fn reverse(on: bool) -> [u8; 3] {
    [GS, b'B', on as u8]
}

/// Encode a style as scale, bold, underline, reverse - always all four
pub fn encode_style(style: &Style) -> Vec<u8> {
    let mut out = Vec::with_capacity(12);
    out.extend_from_slice(&scale(style.scale));
    out.extend_from_slice(&bold(style.bold));
    out.extend_from_slice(&underline(style.underline));
    out.extend_from_slice(&reverse(style.reverse));
    out
}

/// Style directives followed by GBK text
pub fn encode_line(text: &str, style: &Style) -> Vec<u8> {
    let mut out = encode_style(style);
    out.extend(encode_text(text));
    out
}

// ============================================================================
// Frame
// ============================================================================

/// Complete encoded byte stream for one receipt, before chunking
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedFrame(Vec<u8>);

impl EncodedFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// ESC/POS frame builder
///
/// Builds one frame line by line. Text is GBK encoded as it is added.
pub struct FrameBuilder {
    buf: Vec<u8>,
}

impl FrameBuilder {
    /// Create a builder; the frame starts with ESC @
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(1024);
        buf.extend_from_slice(&init());
        Self { buf }
    }

    /// Styled line: directives, text, LF
    pub fn styled_line(&mut self, text: &str, style: &Style) -> &mut Self {
        self.buf.extend(encode_line(text, style));
        self.buf.push(LF);
        self
    }

    /// Unstyled line: text, LF (inherits the printer's current style)
    pub fn plain_line(&mut self, text: &str) -> &mut Self {
        self.buf.extend(encode_text(text));
        self.buf.push(LF);
        self
    }

    pub fn build(self) -> EncodedFrame {
        EncodedFrame(self.buf)
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
