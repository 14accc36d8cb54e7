//! Field descriptor tables and the tag matcher.
//!
//! Each section declares its layout as an ordered table of
//! [`FieldDescriptor`] rows. The matcher resolves an incoming tag against
//! that table: plain fields and record delimiters by exact name, array
//! elements by prefix plus a baseline-relative index. The declarative table
//! is the only per-section knowledge the section reader needs.

use scm_text::Tag;

/// Declared type of a scalar field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Unsigned decimal, 8 bits.
    Byte,
    /// Signed decimal, 16 bits.
    Short,
    /// Unsigned decimal, 16 bits.
    Word,
    /// Signed decimal, 32 bits.
    Int,
    /// Unsigned decimal, 32 bits.
    Long,
    Float,
    Double,
    /// Quoted/escaped text, truncated with an error past `max` characters.
    Text { max: usize },
    /// Comma-separated sampling frequencies folded into an offered-bitmap.
    FreqList,
    /// Comma-separated event-only entries (1-3) folded into a bitmap.
    EventList,
    /// Comma-separated exclude entries (`I1`..`I4`, `X1`..`X4`).
    ExcludeList,
    /// The reserved section checksum field, a hexadecimal 32-bit value.
    Crc,
}

/// How an array element tag's index suffix is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Decimal suffix, e.g. `chan1`..`chan7` with base 1.
    Numeric { base: u16 },
    /// Single-letter suffix, e.g. `sensorA`/`sensorB` with base `b'A'`.
    Letter { base: u8 },
}

impl IndexKind {
    /// Resolve a tag suffix to a zero-based element index. Returns `None`
    /// when the suffix does not have the declared shape or falls below the
    /// baseline; range checking against the element count is the caller's.
    pub fn resolve(&self, suffix: &str) -> Option<usize> {
        match *self {
            IndexKind::Numeric { base } => {
                let value: u16 = suffix.parse().ok()?;
                value.checked_sub(base).map(usize::from)
            }
            IndexKind::Letter { base } => {
                let mut chars = suffix.chars();
                let letter = chars.next()?;
                if chars.next().is_some() || !letter.is_ascii_alphabetic() {
                    return None;
                }
                (letter as u8).checked_sub(base).map(usize::from)
            }
        }
    }
}

/// Array declaration carried by an array-start row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayDecl {
    pub index: IndexKind,
    pub count: usize,
}

/// Kind of a descriptor table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescKind {
    /// Opening tag of a repeated record, e.g. `<iir>`.
    RecordStart,
    /// Closing tag of a repeated record.
    RecordEnd,
    Scalar(ValueType),
    /// First row of an array span; the row name is the tag prefix.
    ArrayStart(ArrayDecl),
    /// Last row of an array span.
    ArrayEnd,
}

/// One row of a section's ordered descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: DescKind,
}

impl FieldDescriptor {
    pub const fn scalar(name: &'static str, ty: ValueType) -> Self {
        FieldDescriptor {
            name,
            kind: DescKind::Scalar(ty),
        }
    }

    pub const fn byte(name: &'static str) -> Self {
        Self::scalar(name, ValueType::Byte)
    }

    pub const fn short(name: &'static str) -> Self {
        Self::scalar(name, ValueType::Short)
    }

    pub const fn word(name: &'static str) -> Self {
        Self::scalar(name, ValueType::Word)
    }

    pub const fn int(name: &'static str) -> Self {
        Self::scalar(name, ValueType::Int)
    }

    pub const fn long(name: &'static str) -> Self {
        Self::scalar(name, ValueType::Long)
    }

    pub const fn float(name: &'static str) -> Self {
        Self::scalar(name, ValueType::Float)
    }

    pub const fn double(name: &'static str) -> Self {
        Self::scalar(name, ValueType::Double)
    }

    pub const fn text(name: &'static str, max: usize) -> Self {
        Self::scalar(name, ValueType::Text { max })
    }

    /// The reserved per-section checksum field.
    pub const fn checksum() -> Self {
        Self::scalar("crc", ValueType::Crc)
    }

    pub const fn record_start(name: &'static str) -> Self {
        FieldDescriptor {
            name,
            kind: DescKind::RecordStart,
        }
    }

    pub const fn record_end(name: &'static str) -> Self {
        FieldDescriptor {
            name,
            kind: DescKind::RecordEnd,
        }
    }

    pub const fn array_numeric(name: &'static str, base: u16, count: usize) -> Self {
        FieldDescriptor {
            name,
            kind: DescKind::ArrayStart(ArrayDecl {
                index: IndexKind::Numeric { base },
                count,
            }),
        }
    }

    pub const fn array_letter(name: &'static str, base: u8, count: usize) -> Self {
        FieldDescriptor {
            name,
            kind: DescKind::ArrayStart(ArrayDecl {
                index: IndexKind::Letter { base },
                count,
            }),
        }
    }

    pub const fn array_end(name: &'static str) -> Self {
        FieldDescriptor {
            name,
            kind: DescKind::ArrayEnd,
        }
    }
}

/// Arrays nest at most this deep (sensor -> control line).
pub const MAX_ARRAY_DEPTH: usize = 2;

/// One active array element while its tags are being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayFrame {
    /// Tag prefix of the array, e.g. `"sensor"`.
    pub array: &'static str,
    /// Resolved zero-based element index.
    pub index: usize,
}

/// Stack of active array elements, outermost first.
#[derive(Debug, Default)]
pub struct ArrayStack {
    frames: Vec<ArrayFrame>,
}

impl ArrayStack {
    pub fn new() -> Self {
        ArrayStack {
            frames: Vec::with_capacity(MAX_ARRAY_DEPTH),
        }
    }

    /// Enter an array element. Returns `false` when the nesting limit is
    /// already reached; the caller counts that as a field error.
    pub fn push(&mut self, array: &'static str, index: usize) -> bool {
        if self.frames.len() == MAX_ARRAY_DEPTH {
            return false;
        }
        self.frames.push(ArrayFrame { array, index });
        true
    }

    pub fn pop(&mut self) -> Option<ArrayFrame> {
        self.frames.pop()
    }

    pub fn frames(&self) -> &[ArrayFrame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Outcome of matching one tag against a descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMatch {
    /// A scalar field; decoded when both tag flags are present.
    Scalar { field: &'static str, ty: ValueType },
    RecordStart { name: &'static str },
    RecordEnd { name: &'static str },
    /// Opening tag of an array element.
    ArrayOpen { array: &'static str, index: usize },
    /// Closing tag of an array element.
    ArrayClose { array: &'static str },
    /// Array element opened and closed on one line; the value belongs to
    /// the array's single contained field.
    Compact {
        array: &'static str,
        index: usize,
        field: &'static str,
        ty: ValueType,
    },
    /// No descriptor accepts the tag; counted as a field error.
    Unmatched,
}

/// Resolve `tag` against an ordered descriptor table.
///
/// Non-array rows match by exact name first; array rows then match by
/// prefix with the remainder resolved per the declared [`IndexKind`]. An
/// index outside `[0, count)` fails the match outright.
pub fn match_tag(descriptors: &[FieldDescriptor], tag: &Tag) -> TagMatch {
    // Legacy alias: configurations written before the calibration monitor
    // moved onto digitizer channel 7 still use its old tag name.
    let name: &str = if tag.name == "calmon" {
        "chan7"
    } else {
        &tag.name
    };

    for desc in descriptors {
        if desc.name != name {
            continue;
        }
        match desc.kind {
            DescKind::Scalar(ty) => {
                return TagMatch::Scalar {
                    field: desc.name,
                    ty,
                }
            }
            DescKind::RecordStart if tag.start && !tag.end => {
                return TagMatch::RecordStart { name: desc.name }
            }
            DescKind::RecordEnd if tag.end && !tag.start => {
                return TagMatch::RecordEnd { name: desc.name }
            }
            _ => {}
        }
    }

    for (at, desc) in descriptors.iter().enumerate() {
        let DescKind::ArrayStart(decl) = desc.kind else {
            continue;
        };
        let Some(suffix) = name.strip_prefix(desc.name) else {
            continue;
        };
        if suffix.is_empty() {
            continue;
        }
        let Some(index) = decl.index.resolve(suffix) else {
            continue;
        };
        if index >= decl.count {
            // Out of the declared range: no partial acceptance.
            return TagMatch::Unmatched;
        }
        return match (tag.start, tag.end) {
            (true, false) => TagMatch::ArrayOpen {
                array: desc.name,
                index,
            },
            (false, true) => TagMatch::ArrayClose { array: desc.name },
            (true, true) => match contained_field(descriptors, at) {
                Some((field, ty)) => TagMatch::Compact {
                    array: desc.name,
                    index,
                    field,
                    ty,
                },
                None => TagMatch::Unmatched,
            },
            (false, false) => TagMatch::Unmatched,
        };
    }

    TagMatch::Unmatched
}

/// The single field of a compact-eligible array: exactly one scalar row
/// between the array-start and array-end rows.
fn contained_field(
    descriptors: &[FieldDescriptor],
    array_at: usize,
) -> Option<(&'static str, ValueType)> {
    match (descriptors.get(array_at + 1), descriptors.get(array_at + 2)) {
        (
            Some(FieldDescriptor {
                name,
                kind: DescKind::Scalar(ty),
            }),
            Some(FieldDescriptor {
                kind: DescKind::ArrayEnd,
                ..
            }),
        ) => Some((*name, *ty)),
        _ => None,
    }
}
