//! Fixed-width column layout for receipt paper
//!
//! Widths are counted in half-width units: characters in the
//! Latin-1 range (`U+0000..=U+00FF`) take one unit, everything else
//! (CJK, full-width punctuation, emoji) takes two.

/// Width of a single character in half-width units
#[inline]
pub fn char_width(c: char) -> usize {
    if (c as u32) <= 0xFF { 1 } else { 2 }
}

/// Width of a string in half-width units
pub fn measure_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Pad with spaces until the text is at least `width` units wide
///
/// Never truncates: text already wider than `width` is returned as is.
pub fn pad_right(text: &str, width: usize) -> String {
    let current = measure_width(text);
    let mut out = String::with_capacity(text.len() + width.saturating_sub(current));
    out.push_str(text);
    for _ in current..width {
        out.push(' ');
    }
    out
}

/// Greedily split text into lines no wider than `max_width` units
///
/// Splits mid-word. Concatenating the result reproduces `text` exactly.
/// A character wider than `max_width` gets a line of its own.
pub fn wrap(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for c in text.chars() {
        let w = char_width(c);
        if current_width + w > max_width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(c);
        current_width += w;
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// One column of a tabular row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub label: String,
    /// Column width in half-width units, including trailing gap
    pub width: usize,
    /// Cells longer than this wrap onto continuation rows
    pub wrap_at: Option<usize>,
}

impl Column {
    pub fn new(label: impl Into<String>, width: usize) -> Self {
        Self {
            label: label.into(),
            width,
            wrap_at: None,
        }
    }

    /// Wrap cell content at `max` units, leaving the rest of the width as gap
    pub fn wrapping(mut self, max: usize) -> Self {
        self.wrap_at = Some(max.min(self.width));
        self
    }

    fn cell_lines(&self, value: &str) -> Vec<String> {
        match self.wrap_at {
            Some(max) if measure_width(value) > max => wrap(value, max),
            _ => vec![value.to_string()],
        }
    }
}

/// Column labels padded to their widths
pub fn layout_header(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| pad_right(&c.label, c.width))
        .collect()
}

/// Lay out one logical row as one or more physical rows
///
/// The first physical row carries the first line of every cell. When a
/// wrapping column overflows, continuation rows carry the overflow and
/// blank-pad every other column to the same width, keeping alignment.
/// Missing trailing values render as empty cells.
pub fn layout_row<S: AsRef<str>>(values: &[S], columns: &[Column]) -> Vec<String> {
    let cells: Vec<Vec<String>> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let value = values.get(i).map(AsRef::as_ref).unwrap_or("");
            col.cell_lines(value)
        })
        .collect();

    let rows = cells.iter().map(Vec::len).max().unwrap_or(1);

    (0..rows)
        .map(|r| {
            columns
                .iter()
                .zip(&cells)
                .map(|(col, lines)| {
                    let text = lines.get(r).map(String::as_str).unwrap_or("");
                    pad_right(text, col.width)
                })
                .collect()
        })
        .collect()
}
