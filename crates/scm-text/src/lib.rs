//! Station Configuration Markup (SCM) text layer.
//!
//! SCM is the line-oriented markup dialect used by station configuration
//! files: one `<name>value</name>` element (or a bare `<name>` / `</name>`
//! pair) per logical line, top-level named sections, an embedded per-section
//! checksum, and exactly five character escapes. This crate provides the
//! pieces that operate on raw text: line splitting, the tag tokenizer, the
//! rolling checksum, and the section driver that locates and walks one
//! section at a time.

pub mod crc;
pub mod escape;
pub mod scan;
pub mod section;

pub use crc::Crc32;
pub use scan::{scan_line, ScanError, Tag};
pub use section::{Parser, SectionContext};

/// Maximum number of logical lines considered per document. Input beyond
/// the cap is ignored, which bounds every parse by input size.
pub const MAX_LINES: usize = 20_000;

/// Split raw document text into logical lines on CR, LF, or CRLF
/// boundaries, keeping at most [`MAX_LINES`] lines. Terminators are
/// stripped; empty lines are preserved so line numbers stay meaningful.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0usize;
    let mut pos = 0usize;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\n' => {
                lines.push(text[start..pos].to_string());
                pos += 1;
                start = pos;
            }
            b'\r' => {
                lines.push(text[start..pos].to_string());
                pos += 1;
                if pos < bytes.len() && bytes[pos] == b'\n' {
                    pos += 1;
                }
                start = pos;
            }
            _ => pos += 1,
        }
        if lines.len() == MAX_LINES {
            return lines;
        }
    }
    if start < bytes.len() {
        lines.push(text[start..].to_string());
    }
    lines
}
