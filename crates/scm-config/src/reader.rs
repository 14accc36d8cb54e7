//! Descriptor-driven section reading.
//!
//! [`read_section`] pumps tags out of the section driver, matches each one
//! against the target's descriptor table, and decodes matches into the
//! target's slots. Everything a section-specific type has to supply is the
//! [`FieldTarget`] implementation: its table, its slot resolution, and
//! optional record delimiters for repeated records.

use scm_text::{Parser, Tag};
use tracing::warn;

use crate::decode::{decode_value, parse_crc, FieldError, SlotMut};
use crate::descriptor::{match_tag, ArrayFrame, ArrayStack, FieldDescriptor, TagMatch, ValueType};

/// A typed section record the reader decodes into.
pub trait FieldTarget {
    /// Tag name of the top-level section.
    const NAME: &'static str;
    /// Ordered descriptor table of the section.
    const DESCRIPTORS: &'static [FieldDescriptor];

    /// Resolve the destination slot of a matched field in the current
    /// array context. `None` counts as one field error.
    fn slot(&mut self, field: &'static str, frames: &[ArrayFrame]) -> Option<SlotMut<'_>>;

    /// A repeated record's opening tag was read. `errors` is the section
    /// error count at this point.
    fn record_start(&mut self, _name: &'static str, _errors: u32) {}

    /// A repeated record's closing tag was read; returns the number of
    /// errors the record's own finalization adds.
    fn record_end(&mut self, _name: &'static str, _errors: u32) -> u32 {
        0
    }
}

/// Outcome of reading one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionReport {
    /// The section's opening tag was located.
    pub found: bool,
    /// The section's closing tag was reached.
    pub loaded: bool,
    /// Field and structural errors counted while reading.
    pub errors: u32,
    /// Cleared when the embedded checksum did not verify.
    pub crc_valid: bool,
}

impl SectionReport {
    fn absent() -> Self {
        SectionReport {
            found: false,
            loaded: false,
            errors: 0,
            crc_valid: true,
        }
    }
}

/// Locate `T`'s section and decode every tag in it into `record`.
///
/// Field-level problems are counted and skipped; only a structural error
/// (tag mismatch, missing closing tag) ends the read early. The report
/// mirrors the section context when the pump stops.
pub fn read_section<T: FieldTarget>(parser: &mut Parser<'_>, record: &mut T) -> SectionReport {
    if !parser.find_section(T::NAME) {
        return SectionReport::absent();
    }
    let mut stack = ArrayStack::new();
    while let Some(tag) = parser.next_tag() {
        apply_tag(parser, &mut stack, record, &tag);
    }
    SectionReport {
        found: true,
        loaded: parser.section.loaded,
        errors: parser.section.errors,
        crc_valid: parser.section.crc_valid,
    }
}

fn apply_tag<T: FieldTarget>(
    parser: &mut Parser<'_>,
    stack: &mut ArrayStack,
    record: &mut T,
    tag: &Tag,
) {
    match match_tag(T::DESCRIPTORS, tag) {
        TagMatch::Scalar { field, ty } => match (tag.start, tag.end) {
            (true, true) => decode_field(parser, stack, record, field, ty, tag),
            (true, false) => {
                warn!(
                    section = parser.section.name,
                    field,
                    line = tag.line,
                    "value element written as a bare tag"
                );
                parser.section.errors += 1;
            }
            // A stray closing tag of a value element carries nothing.
            _ => {}
        },
        TagMatch::RecordStart { name } => record.record_start(name, parser.section.errors),
        TagMatch::RecordEnd { name } => {
            let added = record.record_end(name, parser.section.errors);
            parser.section.errors += added;
        }
        TagMatch::ArrayOpen { array, index } => {
            if !stack.push(array, index) {
                nesting_error(parser, tag);
            }
        }
        TagMatch::ArrayClose { .. } => {
            stack.pop();
        }
        TagMatch::Compact {
            array,
            index,
            field,
            ty,
        } => {
            if stack.push(array, index) {
                decode_field(parser, stack, record, field, ty, tag);
                stack.pop();
            } else {
                nesting_error(parser, tag);
            }
        }
        TagMatch::Unmatched => {
            warn!(
                section = parser.section.name,
                tag = %tag.name,
                line = tag.line,
                "unmatched tag"
            );
            parser.section.errors += 1;
        }
    }
}

fn decode_field<T: FieldTarget>(
    parser: &mut Parser<'_>,
    stack: &ArrayStack,
    record: &mut T,
    field: &'static str,
    ty: ValueType,
    tag: &Tag,
) {
    if let ValueType::Crc = ty {
        match parse_crc(&tag.value) {
            Ok(stored) => parser.section.record_crc(stored),
            Err(err) => field_error(parser, field, tag.line, &err),
        }
        return;
    }
    let Some(slot) = record.slot(field, stack.frames()) else {
        field_error(parser, field, tag.line, &FieldError::Unbound);
        return;
    };
    match decode_value(ty, &tag.value, slot) {
        Ok(soft) => parser.section.errors += soft,
        Err(err) => field_error(parser, field, tag.line, &err),
    }
}

fn field_error(parser: &mut Parser<'_>, field: &str, line: usize, err: &FieldError) {
    warn!(
        section = parser.section.name,
        field,
        line,
        %err,
        "field rejected"
    );
    parser.section.errors += 1;
}

fn nesting_error(parser: &mut Parser<'_>, tag: &Tag) {
    warn!(
        section = parser.section.name,
        tag = %tag.name,
        line = tag.line,
        "array nesting too deep"
    );
    parser.section.errors += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ValueType;
    use scm_text::{split_lines, Crc32};

    /// Minimal target with one scalar, one compact-eligible array, and the
    /// checksum field.
    #[derive(Debug, Default)]
    struct Probe {
        label: String,
        taps: [u16; 3],
        starts: u32,
        ends: u32,
    }

    impl FieldTarget for Probe {
        const NAME: &'static str = "probe";
        const DESCRIPTORS: &'static [FieldDescriptor] = &[
            FieldDescriptor::record_start("grp"),
            FieldDescriptor::text("label", 8),
            FieldDescriptor::array_numeric("tap", 1, 3),
            FieldDescriptor::word("level"),
            FieldDescriptor::array_end("tap"),
            FieldDescriptor::record_end("grp"),
            FieldDescriptor::checksum(),
        ];

        fn slot(&mut self, field: &'static str, frames: &[ArrayFrame]) -> Option<SlotMut<'_>> {
            match (field, frames) {
                ("label", []) => Some(SlotMut::Text(&mut self.label)),
                ("level", [t]) if t.array == "tap" => {
                    Some(SlotMut::Word(self.taps.get_mut(t.index)?))
                }
                _ => None,
            }
        }

        fn record_start(&mut self, _name: &'static str, _errors: u32) {
            self.starts += 1;
        }

        fn record_end(&mut self, _name: &'static str, _errors: u32) -> u32 {
            self.ends += 1;
            0
        }
    }

    fn parse(doc: &str) -> (Probe, SectionReport) {
        let lines = split_lines(doc);
        let mut parser = Parser::new(&lines);
        let mut probe = Probe::default();
        let report = read_section(&mut parser, &mut probe);
        (probe, report)
    }

    #[test]
    fn decodes_scalars_arrays_and_records() {
        let (probe, report) = parse(
            "<probe>\n\
             <grp>\n\
             <label>north</label>\n\
             <tap1>\n<level>7</level>\n</tap1>\n\
             <tap3>42</tap3>\n\
             </grp>\n\
             </probe>\n",
        );
        assert!(report.found && report.loaded);
        assert_eq!(report.errors, 0);
        assert!(report.crc_valid);
        assert_eq!(probe.label, "north");
        assert_eq!(probe.taps, [7, 0, 42]);
        assert_eq!((probe.starts, probe.ends), (1, 1));
    }

    #[test]
    fn field_errors_do_not_stop_the_read() {
        let (probe, report) = parse(
            "<probe>\n\
             <label>way too long for eight</label>\n\
             <tap4>1</tap4>\n\
             <tap1>99999</tap1>\n\
             <mystery>1</mystery>\n\
             <label></label>\n\
             </probe>\n",
        );
        assert!(report.loaded);
        // truncation, out-of-range index, word overflow, unmatched tag.
        assert_eq!(report.errors, 4);
        assert_eq!(probe.label, "");
        assert_eq!(probe.taps, [0, 0, 0]);
    }

    #[test]
    fn bare_value_tag_counts_one_error() {
        let (_, report) = parse("<probe>\n<label>\n</probe>\n");
        assert_eq!(report.errors, 1);
        assert!(report.loaded);
    }

    #[test]
    fn checksum_verifies_against_preceding_lines() {
        let body = ["<label>ok</label>"];
        let mut crc = Crc32::new();
        for line in body {
            crc.fold(line.as_bytes());
        }
        let doc = format!(
            "<probe>\n{}\n<crc>{:08X}</crc>\n</probe>\n",
            body[0],
            crc.value()
        );
        let (_, report) = parse(&doc);
        assert!(report.crc_valid);
        assert_eq!(report.errors, 0);

        let tampered = doc.replace("<label>ok</label>", "<label>no</label>");
        let (probe, report) = parse(&tampered);
        assert!(!report.crc_valid);
        // Fields stay populated; validity is advisory.
        assert_eq!(probe.label, "no");
        assert!(report.loaded);
    }

    #[test]
    fn absent_section_reports_not_found() {
        let lines = split_lines("<other>\n<x>1</x>\n</other>\n");
        let mut parser = Parser::new(&lines);
        let mut probe = Probe::default();
        let report = read_section(&mut parser, &mut probe);
        assert!(!report.found && !report.loaded);
        assert_eq!(report.errors, 0);
    }
}
