//! Typed decoding of scalar field values into destination slots.

use thiserror::Error;

use crate::descriptor::ValueType;
use crate::grammar;

/// Reasons a single field value is rejected. Each rejection counts one
/// section error; decoding then continues with the next tag.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    /// Empty values are accepted only for text destinations.
    #[error("empty value")]
    Empty,
    #[error("bad number {0:?}")]
    Parse(String),
    #[error("{0:?} out of range")]
    Range(String),
    /// The truncated prefix is still stored.
    #[error("text longer than {max} characters")]
    Truncated { max: usize },
    /// The record offers no destination for this tag in the current array
    /// context.
    #[error("tag has no destination here")]
    Unbound,
    /// Descriptor type and destination slot disagree; a table defect.
    #[error("destination slot type mismatch")]
    Slot,
}

/// Mutable view of the destination a matched scalar writes to.
#[derive(Debug)]
pub enum SlotMut<'a> {
    Byte(&'a mut u8),
    Short(&'a mut i16),
    Word(&'a mut u16),
    Int(&'a mut i32),
    Long(&'a mut u32),
    Float(&'a mut f32),
    Double(&'a mut f64),
    Text(&'a mut String),
}

/// Decode `value` per the declared type into `slot`.
///
/// Returns the number of soft errors for list types (each malformed list
/// entry counts one, the remaining entries still decode). All other types
/// either store the value or fail as a whole. [`ValueType::Crc`] never
/// reaches a slot; the section reader hands it to the section context.
pub fn decode_value(ty: ValueType, value: &str, slot: SlotMut<'_>) -> Result<u32, FieldError> {
    if value.is_empty() && !matches!(ty, ValueType::Text { .. }) {
        return Err(FieldError::Empty);
    }
    match (ty, slot) {
        (ValueType::Byte, SlotMut::Byte(dst)) => {
            *dst = parse_unsigned(value, u8::MAX as u64)? as u8;
            Ok(0)
        }
        (ValueType::Word, SlotMut::Word(dst)) => {
            *dst = parse_unsigned(value, u16::MAX as u64)? as u16;
            Ok(0)
        }
        (ValueType::Long, SlotMut::Long(dst)) => {
            *dst = parse_unsigned(value, u32::MAX as u64)? as u32;
            Ok(0)
        }
        (ValueType::Short, SlotMut::Short(dst)) => {
            *dst = parse_signed(value, i16::MIN as i64, i16::MAX as i64)? as i16;
            Ok(0)
        }
        (ValueType::Int, SlotMut::Int(dst)) => {
            *dst = parse_signed(value, i32::MIN as i64, i32::MAX as i64)? as i32;
            Ok(0)
        }
        (ValueType::Float, SlotMut::Float(dst)) => {
            *dst = value
                .parse()
                .map_err(|_| FieldError::Parse(value.to_string()))?;
            Ok(0)
        }
        (ValueType::Double, SlotMut::Double(dst)) => {
            *dst = value
                .parse()
                .map_err(|_| FieldError::Parse(value.to_string()))?;
            Ok(0)
        }
        (ValueType::Text { max }, SlotMut::Text(dst)) => decode_text(value, max, dst),
        (ValueType::FreqList, SlotMut::Word(dst)) => {
            let (map, errors) = grammar::freq_bitmap(value);
            *dst = map;
            Ok(errors)
        }
        (ValueType::EventList, SlotMut::Byte(dst)) => {
            let (map, errors) = grammar::event_bitmap(value);
            *dst = map;
            Ok(errors)
        }
        (ValueType::ExcludeList, SlotMut::Byte(dst)) => {
            let (map, errors) = grammar::exclude_bitmap(value);
            *dst = map;
            Ok(errors)
        }
        _ => Err(FieldError::Slot),
    }
}

/// Parse the hexadecimal value of the reserved checksum field.
pub fn parse_crc(value: &str) -> Result<u32, FieldError> {
    if value.is_empty() {
        return Err(FieldError::Empty);
    }
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16).map_err(|_| FieldError::Parse(value.to_string()))
}

fn parse_unsigned(value: &str, max: u64) -> Result<u64, FieldError> {
    let parsed: u64 = value
        .parse()
        .map_err(|_| FieldError::Parse(value.to_string()))?;
    if parsed > max {
        return Err(FieldError::Range(value.to_string()));
    }
    Ok(parsed)
}

fn parse_signed(value: &str, min: i64, max: i64) -> Result<i64, FieldError> {
    let parsed: i64 = value
        .parse()
        .map_err(|_| FieldError::Parse(value.to_string()))?;
    if parsed < min || parsed > max {
        return Err(FieldError::Range(value.to_string()));
    }
    Ok(parsed)
}

fn decode_text(value: &str, max: usize, dst: &mut String) -> Result<u32, FieldError> {
    let inner = strip_quotes(value);
    // Escapes are already decoded by the tokenizer; anything outside the
    // printable ASCII range clears the whole value.
    if inner.bytes().any(|b| !(0x20..=0x7E).contains(&b)) {
        dst.clear();
        return Ok(0);
    }
    if inner.chars().count() > max {
        *dst = inner.chars().take(max).collect();
        return Err(FieldError::Truncated { max });
    }
    dst.clear();
    dst.push_str(inner);
    Ok(0)
}

/// Strip one layer of surrounding double quotes, only when balanced.
fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
