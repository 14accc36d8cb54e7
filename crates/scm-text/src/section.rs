//! Section driver: locate a named top-level section and walk its tags.

use tracing::{debug, warn};

use crate::crc::Crc32;
use crate::scan::{scan_line, Tag};

/// Per-parse state of the section currently being read.
///
/// A fresh context is created by every [`Parser::find_section`] call and
/// discarded when the caller moves on to the next section.
#[derive(Debug, Clone)]
pub struct SectionContext {
    /// Name of the section being located or read.
    pub name: &'static str,
    /// Nesting depth while skipping foreign top-level sections.
    pub nesting: u32,
    /// Whether the cursor is inside the named section.
    pub in_section: bool,
    /// Field and structural errors counted so far.
    pub errors: u32,
    /// Set once the section's closing tag has been reached.
    pub loaded: bool,
    /// Cleared when the embedded checksum field does not match the rolling
    /// checksum. Sections without a checksum field stay valid.
    pub crc_valid: bool,
    crc: Crc32,
    crc_seen: Option<(u32, u32)>,
}

impl SectionContext {
    fn new(name: &'static str) -> Self {
        SectionContext {
            name,
            nesting: 0,
            in_section: false,
            errors: 0,
            loaded: false,
            crc_valid: true,
            crc: Crc32::new(),
            crc_seen: None,
        }
    }

    /// Rolling checksum over every preceding in-section line. The line the
    /// current tag sits on is not yet folded in, so a checksum field always
    /// compares against the accumulation up to, but excluding, itself.
    pub fn rolling_crc(&self) -> u32 {
        self.crc.value()
    }

    /// Record the value carried by the section's checksum field and update
    /// validity against the checksum accumulated so far.
    pub fn record_crc(&mut self, stored: u32) {
        let computed = self.crc.value();
        self.crc_seen = Some((stored, computed));
        self.crc_valid = stored == computed;
        if !self.crc_valid {
            warn!(
                section = self.name,
                stored = format_args!("{stored:08X}"),
                computed = format_args!("{computed:08X}"),
                "section checksum mismatch"
            );
        }
    }

    fn finish(&mut self) {
        self.loaded = true;
        self.crc_valid = match self.crc_seen {
            Some((stored, computed)) => stored == computed,
            None => true,
        };
        debug!(
            section = self.name,
            errors = self.errors,
            crc_valid = self.crc_valid,
            "section finished"
        );
    }
}

/// Parse context over a pre-split document.
///
/// All cursor, checksum, and section state lives here, so independent
/// parses may run concurrently on separate `Parser` values; only callers
/// sharing one configuration workspace need the session lock.
#[derive(Debug)]
pub struct Parser<'a> {
    lines: &'a [String],
    cursor: usize,
    pending: Option<usize>,
    /// State of the section currently being located or read.
    pub section: SectionContext,
}

impl<'a> Parser<'a> {
    /// Create a parser over pre-split lines (see [`crate::split_lines`]).
    pub fn new(lines: &'a [String]) -> Self {
        Parser {
            lines,
            cursor: 0,
            pending: None,
            section: SectionContext::new(""),
        }
    }

    /// Rewind and scan for the opening tag of `name` at the top level.
    ///
    /// Tags belonging to other top-level sections bump a nesting counter and
    /// are otherwise ignored; nothing outside the named section is folded
    /// into the checksum. Returns whether the section was found, leaving the
    /// cursor just past its opening line on success.
    pub fn find_section(&mut self, name: &'static str) -> bool {
        self.cursor = 0;
        self.pending = None;
        self.section = SectionContext::new(name);
        while let Some(idx) = self.advance() {
            let tag = match scan_line(&self.lines[idx], idx + 1) {
                Ok(Some(tag)) => tag,
                // Malformed lines in foreign sections are not our concern.
                Ok(None) | Err(_) => continue,
            };
            match (tag.start, tag.end) {
                (true, false) => {
                    self.section.nesting += 1;
                    if self.section.nesting == 1 && tag.name == name {
                        self.section.in_section = true;
                        debug!(section = name, line = idx + 1, "section located");
                        return true;
                    }
                }
                (false, true) => {
                    self.section.nesting = self.section.nesting.saturating_sub(1);
                }
                // A complete one-line element changes no nesting.
                _ => {}
            }
        }
        debug!(section = name, "section not present");
        false
    }

    /// Pull the next tag inside the active section.
    ///
    /// Comment lines are skipped but still checksummed. Returns `None` once
    /// the section's closing tag is consumed (setting the loaded flag and
    /// finalizing checksum validity), when input runs out, or when a
    /// structural error ends the read early with one counted error.
    pub fn next_tag(&mut self) -> Option<Tag> {
        while self.section.in_section {
            let Some(idx) = self.advance() else {
                // Ran off the document without a closing tag.
                self.section.in_section = false;
                warn!(section = self.section.name, "section never closed");
                return None;
            };
            let tag = match scan_line(&self.lines[idx], idx + 1) {
                Ok(Some(tag)) => tag,
                Ok(None) => continue,
                Err(err) => {
                    warn!(section = self.section.name, %err, "structural error, abandoning section");
                    self.section.errors += 1;
                    self.section.in_section = false;
                    return None;
                }
            };
            if tag.end && !tag.start && tag.name == self.section.name {
                self.section.in_section = false;
                self.section.finish();
                return None;
            }
            return Some(tag);
        }
        None
    }

    /// Step the cursor, folding the previously visited in-section line into
    /// the rolling checksum. Deferring the fold by one line keeps the line
    /// carrying the checksum field out of its own verification.
    fn advance(&mut self) -> Option<usize> {
        if self.cursor >= self.lines.len() {
            return None;
        }
        if self.section.in_section {
            if let Some(prev) = self.pending.take() {
                self.section.crc.fold(self.lines[prev].as_bytes());
            }
            self.pending = Some(self.cursor);
        }
        let idx = self.cursor;
        self.cursor += 1;
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn finds_section_after_skipped_one() {
        let lines = doc(&[
            "<? generated by stationtool ?>",
            "<netcfg>",
            "<host>10.0.0.1</host>",
            "</netcfg>",
            "<station>",
            "<name>KSU1</name>",
            "</station>",
        ]);
        let mut parser = Parser::new(&lines);
        assert!(parser.find_section("station"));
        let tag = parser.next_tag().unwrap();
        assert_eq!(tag.name, "name");
        assert_eq!(tag.value, "KSU1");
        assert!(parser.next_tag().is_none());
        assert!(parser.section.loaded);
        assert_eq!(parser.section.errors, 0);
    }

    #[test]
    fn missing_section_reports_absent() {
        let lines = doc(&["<station>", "<name>KSU1</name>", "</station>"]);
        let mut parser = Parser::new(&lines);
        assert!(!parser.find_section("netcfg"));
        assert!(!parser.section.loaded);
    }

    #[test]
    fn crc_excludes_own_line_and_opening_tag() {
        let body = ["<name>KSU1</name>", "<network>XX</network>"];
        let mut expect = Crc32::new();
        for line in body {
            expect.fold(line.as_bytes());
        }
        let lines = doc(&[
            "<station>",
            body[0],
            body[1],
            "<crc>DEADBEEF</crc>",
            "</station>",
        ]);
        let mut parser = Parser::new(&lines);
        assert!(parser.find_section("station"));
        // name, network, then the crc tag itself.
        parser.next_tag().unwrap();
        parser.next_tag().unwrap();
        let crc_tag = parser.next_tag().unwrap();
        assert_eq!(crc_tag.name, "crc");
        assert_eq!(parser.section.rolling_crc(), expect.value());
    }

    #[test]
    fn comment_lines_inside_section_are_checksummed() {
        let body = ["<? note ?>", "<name>KSU1</name>"];
        let mut expect = Crc32::new();
        for line in body {
            expect.fold(line.as_bytes());
        }
        let lines = doc(&["<station>", body[0], body[1], "<crc>0</crc>", "</station>"]);
        let mut parser = Parser::new(&lines);
        assert!(parser.find_section("station"));
        parser.next_tag().unwrap();
        let crc_tag = parser.next_tag().unwrap();
        assert_eq!(crc_tag.name, "crc");
        assert_eq!(parser.section.rolling_crc(), expect.value());
    }

    #[test]
    fn structural_error_ends_section_without_loading() {
        let lines = doc(&[
            "<station>",
            "<name>KSU1</network>",
            "<owner>nobody</owner>",
            "</station>",
        ]);
        let mut parser = Parser::new(&lines);
        assert!(parser.find_section("station"));
        assert!(parser.next_tag().is_none());
        assert_eq!(parser.section.errors, 1);
        assert!(!parser.section.loaded);
    }

    #[test]
    fn loaded_set_even_with_field_errors() {
        let lines = doc(&["<station>", "<bogus>1</bogus>", "</station>"]);
        let mut parser = Parser::new(&lines);
        assert!(parser.find_section("station"));
        // Caller counts the unmatched tag; driver still reaches the close.
        let tag = parser.next_tag().unwrap();
        assert_eq!(tag.name, "bogus");
        parser.section.errors += 1;
        assert!(parser.next_tag().is_none());
        assert!(parser.section.loaded);
        assert_eq!(parser.section.errors, 1);
    }

    #[test]
    fn record_crc_match_and_mismatch() {
        let mut ctx = SectionContext::new("station");
        ctx.crc.fold(b"<name>KSU1</name>");
        let good = ctx.rolling_crc();
        ctx.record_crc(good);
        assert!(ctx.crc_valid);
        ctx.record_crc(good ^ 1);
        assert!(!ctx.crc_valid);
    }
}
