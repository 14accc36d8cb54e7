//! Channel source grammar: free-text specifiers to routing keys.
//!
//! A channel's `<source>` value is matched in fixed priority order against
//! the name tables, the `DECIMATE` literal, and the digitizer-backed
//! shapes `MDn_freq`, `CMfreq`, `ACn_freq`. The first rule that accepts
//! the shape wins; its table and bitmap checks are then binding.

use thiserror::Error;
use tracing::warn;

use scm_tables::{
    field_index, freq_bit, SourceClass, ACCEL_CHANNELS, ACCEL_GROUP_BASE, ACCEL_MAX_HZ, CAL_GROUP,
    ENGINEERING_FIELDS, GPS_FIELDS, MAIN_CHANNELS, SOH_FIELDS, TIMING_FIELDS,
};

use crate::records::Channel;

/// Why a channel's source specifier was rejected. Any of these drops the
/// whole channel from the chain and the dispatch tables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("unrecognized source {0:?}")]
    Unrecognized(String),
    /// The frequency is not in the fixed table, or past the accelerometer
    /// limit.
    #[error("{spec}: frequency {hz} is not offered")]
    Frequency { spec: String, hz: u16 },
    /// The frequency exists but is not enabled in the channel's configured
    /// bitmap.
    #[error("{spec}: frequency {hz} is disabled")]
    Disabled { spec: String, hz: u16 },
    #[error("decimation source {0:?} not found")]
    Decimation(String),
}

/// Routing key material resolved from a source specifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSource {
    pub class: SourceClass,
    pub sub_field: u16,
    /// Frequency table position for digitizer-backed channels.
    pub freq_bit: Option<u8>,
    /// Dispatch group for digitizer-backed channels (main 0-5, cal 6,
    /// accelerometer 7-9).
    pub group: Option<u8>,
    /// Samples per second.
    pub rate: f64,
    /// Handle of the decimation source channel.
    pub dec_source: Option<usize>,
}

impl ResolvedSource {
    fn fixed(class: SourceClass, index: u8) -> Self {
        ResolvedSource {
            class,
            sub_field: index as u16,
            freq_bit: None,
            group: None,
            rate: class.nominal_rate().unwrap_or(1.0),
            dec_source: None,
        }
    }
}

/// Configuration state the resolver consults.
#[derive(Debug, Clone, Copy)]
pub struct SourceEnv<'a> {
    /// Offered-frequency bitmaps of digitizer channels 1-7; entry 6 is the
    /// calibration monitor.
    pub chan_freqs: &'a [u16; 7],
    /// Offered-frequency bitmaps of the accelerometer channels.
    pub accel_freqs: &'a [u16; 3],
    /// Channels linked so far, for decimation source lookup.
    pub channels: &'a [Channel],
}

/// Resolve an upper-cased source specifier, first matching rule wins.
pub fn resolve_source(
    spec: &str,
    dec_name: &str,
    env: &SourceEnv<'_>,
) -> Result<ResolvedSource, SourceError> {
    if let Some(index) = field_index(&TIMING_FIELDS, spec) {
        return Ok(ResolvedSource::fixed(SourceClass::Timing, index));
    }
    if let Some(index) = field_index(&SOH_FIELDS, spec) {
        return Ok(ResolvedSource::fixed(SourceClass::Soh, index));
    }
    if let Some(index) = field_index(&ENGINEERING_FIELDS, spec) {
        return Ok(ResolvedSource::fixed(SourceClass::Engineering, index));
    }
    if let Some(index) = field_index(&GPS_FIELDS, spec) {
        return Ok(ResolvedSource::fixed(SourceClass::Gps, index));
    }
    if spec == "DECIMATE" {
        let source = env
            .channels
            .iter()
            .position(|chan| chan.seed.eq_ignore_ascii_case(dec_name))
            .ok_or_else(|| SourceError::Decimation(dec_name.to_string()))?;
        return Ok(ResolvedSource {
            class: SourceClass::Decimation,
            sub_field: source as u16,
            freq_bit: None,
            group: None,
            rate: env.channels[source].rate / 10.0,
            dec_source: Some(source),
        });
    }
    if let Some(rest) = spec.strip_prefix("MD") {
        if let Some((digit, hz)) = digit_freq(rest, MAIN_CHANNELS) {
            let group = digit - 1;
            let bit = enabled_bit(spec, hz, env.chan_freqs[group as usize])?;
            return Ok(ResolvedSource {
                class: SourceClass::MainDigitizer,
                sub_field: ((group as u16) << 4) | bit as u16,
                freq_bit: Some(bit),
                group: Some(group),
                rate: hz as f64,
                dec_source: None,
            });
        }
    }
    if let Some(rest) = spec.strip_prefix("CM") {
        // Written both with and without the separator in deployed files.
        let rest = rest.strip_prefix('_').unwrap_or(rest);
        if let Ok(hz) = rest.parse::<u16>() {
            let bit = enabled_bit(spec, hz, env.chan_freqs[CAL_GROUP as usize])?;
            return Ok(ResolvedSource {
                class: SourceClass::CalMonitor,
                sub_field: ((CAL_GROUP as u16) << 4) | bit as u16,
                freq_bit: Some(bit),
                group: Some(CAL_GROUP),
                rate: hz as f64,
                dec_source: None,
            });
        }
    }
    if let Some(rest) = spec.strip_prefix("AC") {
        if let Some((digit, hz)) = digit_freq(rest, ACCEL_CHANNELS) {
            if hz > ACCEL_MAX_HZ {
                return Err(SourceError::Frequency {
                    spec: spec.to_string(),
                    hz,
                });
            }
            let group = ACCEL_GROUP_BASE + digit - 1;
            let bit = enabled_bit(spec, hz, env.accel_freqs[(digit - 1) as usize])?;
            return Ok(ResolvedSource {
                class: SourceClass::Accelerometer,
                sub_field: ((group as u16) << 4) | bit as u16,
                freq_bit: Some(bit),
                group: Some(group),
                rate: hz as f64,
                dec_source: None,
            });
        }
    }
    Err(SourceError::Unrecognized(spec.to_string()))
}

/// Parse a `<digit>_<freq>` remainder; `None` when the shape does not fit,
/// so the specifier falls through to the next rule.
fn digit_freq(rest: &str, max_digit: u8) -> Option<(u8, u16)> {
    let mut chars = rest.chars();
    let digit = chars.next()?.to_digit(10)? as u8;
    if !(1..=max_digit).contains(&digit) {
        return None;
    }
    let freq = chars.as_str().strip_prefix('_')?;
    let hz: u16 = freq.parse().ok()?;
    Some((digit, hz))
}

fn enabled_bit(spec: &str, hz: u16, bitmap: u16) -> Result<u8, SourceError> {
    let bit = freq_bit(hz).ok_or_else(|| SourceError::Frequency {
        spec: spec.to_string(),
        hz,
    })?;
    if bitmap & (1 << bit) == 0 {
        return Err(SourceError::Disabled {
            spec: spec.to_string(),
            hz,
        });
    }
    Ok(bit)
}

/// Fold a comma-separated frequency list into an offered-bitmap. Entries
/// missing from the fixed table each count one error; the rest still set
/// their bits.
pub fn freq_bitmap(list: &str) -> (u16, u32) {
    let mut map = 0u16;
    let mut errors = 0u32;
    for token in list.split(',') {
        let token = token.trim();
        match token.parse::<u16>().ok().and_then(freq_bit) {
            Some(bit) => map |= 1 << bit,
            None => {
                warn!(token, "frequency not offered");
                errors += 1;
            }
        }
    }
    (map, errors)
}

/// Fold an event-only list (entries 1-3) into a bitmap.
pub fn event_bitmap(list: &str) -> (u8, u32) {
    let mut map = 0u8;
    let mut errors = 0u32;
    for token in list.split(',') {
        let token = token.trim();
        match token.parse::<u8>() {
            Ok(entry @ 1..=3) => map |= 1 << (entry - 1),
            _ => {
                warn!(token, "bad event-only entry");
                errors += 1;
            }
        }
    }
    (map, errors)
}

/// Fold an exclude list into a bitmap: `I1`..`I4` set bits 4-7, `X1`..`X4`
/// set bits 0-3.
pub fn exclude_bitmap(list: &str) -> (u8, u32) {
    let mut map = 0u8;
    let mut errors = 0u32;
    for token in list.split(',') {
        let token = token.trim();
        let mut chars = token.chars();
        let bit = match (chars.next(), chars.as_str()) {
            (Some('I') | Some('i'), digits) => entry_1_to_4(digits).map(|n| 3 + n),
            (Some('X') | Some('x'), digits) => entry_1_to_4(digits).map(|n| n - 1),
            _ => None,
        };
        match bit {
            Some(bit) => map |= 1 << bit,
            None => {
                warn!(token, "bad exclude entry");
                errors += 1;
            }
        }
    }
    (map, errors)
}

fn entry_1_to_4(digits: &str) -> Option<u8> {
    digits.parse::<u8>().ok().filter(|n| (1..=4).contains(n))
}
