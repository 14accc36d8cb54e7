//! Tag tokenizer over pre-split lines.

use thiserror::Error;

use crate::escape::unescape;

/// Marker that turns a whole line into a comment.
const COMMENT_MARKER: &str = "<?";

/// Structural errors raised by the tokenizer. These end the read of the
/// active section; the section driver converts them into one counted error
/// and reports end-of-input to its caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    /// The closing tag on a value line names a different element.
    #[error("line {line}: <{open}> closed by </{close}>")]
    TagMismatch {
        line: usize,
        open: String,
        close: String,
    },
    /// A value follows the opening tag but no closing tag ends the line.
    #[error("line {line}: <{open}> has a value but no closing tag")]
    UnterminatedValue { line: usize, open: String },
    /// A `<` never reaches a matching `>` on the line.
    #[error("line {line}: unterminated tag")]
    UnterminatedTag { line: usize },
}

/// One tag extracted from a logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Element name between the angle brackets.
    pub name: String,
    /// An opening tag was present.
    pub start: bool,
    /// A closing tag was present.
    pub end: bool,
    /// Trimmed, unescaped inline value (empty unless both flags are set).
    pub value: String,
    /// 1-based line number the tag was read from.
    pub line: usize,
}

/// Extract the tag on a single logical line.
///
/// Returns `Ok(None)` for comment lines (any line containing `<?`) and for
/// lines without a tag. A `<name>value</name>` line yields both flags and
/// the trimmed, unescaped value; a bare `<name>` or `</name>` line yields
/// one flag and an empty value.
pub fn scan_line(line: &str, lineno: usize) -> Result<Option<Tag>, ScanError> {
    if line.contains(COMMENT_MARKER) {
        return Ok(None);
    }
    let Some(open) = line.find('<') else {
        return Ok(None);
    };
    let rest = &line[open + 1..];
    if let Some(rest) = rest.strip_prefix('/') {
        let Some(gt) = rest.find('>') else {
            return Err(ScanError::UnterminatedTag { line: lineno });
        };
        return Ok(Some(Tag {
            name: rest[..gt].trim().to_string(),
            start: false,
            end: true,
            value: String::new(),
            line: lineno,
        }));
    }
    let Some(gt) = rest.find('>') else {
        return Err(ScanError::UnterminatedTag { line: lineno });
    };
    let name = rest[..gt].trim().to_string();
    let after = &rest[gt + 1..];
    let Some(close_open) = after.find('<') else {
        if after.trim().is_empty() {
            return Ok(Some(Tag {
                name,
                start: true,
                end: false,
                value: String::new(),
                line: lineno,
            }));
        }
        return Err(ScanError::UnterminatedValue {
            line: lineno,
            open: name,
        });
    };
    let value = after[..close_open].trim();
    let closer = &after[close_open + 1..];
    let close_name = match closer.strip_prefix('/').and_then(|c| {
        let gt = c.find('>')?;
        Some(c[..gt].trim())
    }) {
        Some(close_name) => close_name,
        None => {
            return Err(ScanError::UnterminatedValue {
                line: lineno,
                open: name,
            })
        }
    };
    if close_name != name {
        return Err(ScanError::TagMismatch {
            line: lineno,
            open: name,
            close: close_name.to_string(),
        });
    }
    Ok(Some(Tag {
        name,
        start: true,
        end: true,
        value: unescape(value),
        line: lineno,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_element_on_one_line() {
        let tag = scan_line("  <name>KSU1</name>", 3).unwrap().unwrap();
        assert_eq!(tag.name, "name");
        assert!(tag.start && tag.end);
        assert_eq!(tag.value, "KSU1");
        assert_eq!(tag.line, 3);
    }

    #[test]
    fn bare_open_and_close() {
        let open = scan_line("<sensors>", 1).unwrap().unwrap();
        assert!(open.start && !open.end);
        let close = scan_line("</sensors>", 9).unwrap().unwrap();
        assert!(!close.start && close.end);
        assert_eq!(close.name, "sensors");
    }

    #[test]
    fn comment_and_blank_lines_skip() {
        assert_eq!(scan_line("<? station KSU1 ?>", 1).unwrap(), None);
        assert_eq!(scan_line("   ", 2).unwrap(), None);
        assert_eq!(scan_line("no markup here", 3).unwrap(), None);
    }

    #[test]
    fn value_is_trimmed_and_unescaped() {
        let tag = scan_line("<description>  K&amp;S vault  </description>", 1)
            .unwrap()
            .unwrap();
        assert_eq!(tag.value, "K&S vault");
    }

    #[test]
    fn mismatched_closing_name() {
        let err = scan_line("<host>10.0.0.1</port>", 7).unwrap_err();
        assert_eq!(
            err,
            ScanError::TagMismatch {
                line: 7,
                open: "host".into(),
                close: "port".into(),
            }
        );
    }

    #[test]
    fn value_without_closing_tag() {
        let err = scan_line("<host>10.0.0.1", 2).unwrap_err();
        assert!(matches!(err, ScanError::UnterminatedValue { .. }));
    }

    #[test]
    fn empty_value_element() {
        let tag = scan_line("<owner></owner>", 1).unwrap().unwrap();
        assert!(tag.start && tag.end);
        assert_eq!(tag.value, "");
    }
}
