#![cfg_attr(docsrs, feature(doc_cfg))]
//! Fixed name and frequency tables for channel-to-source routing.
//!
//! These tables are part of the station wire vocabulary: channel source
//! specifiers in configuration files name entries here, and the sub-field
//! codes derived from table positions are baked into archived data. Entries
//! must keep their order.

use core::fmt;

/// Generalized source category a channel's data originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SourceClass {
    /// Timekeeping fields sampled once a second.
    Timing = 0,
    /// Slow state-of-health measurements.
    Soh = 1,
    /// Engineering and telemetry counters.
    Engineering = 2,
    /// GPS position and reception fields.
    Gps = 3,
    /// One of the six main digitizer channels.
    MainDigitizer = 4,
    /// The calibration monitor channel.
    CalMonitor = 5,
    /// One of the three accelerometer channels.
    Accelerometer = 6,
    /// Derived stream decimated from another channel.
    Decimation = 7,
    /// Station message stream; assigned by the acquisition pipeline, never
    /// by the configuration grammar.
    Logger = 8,
}

impl SourceClass {
    /// Stable routing code of the category.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Convert a raw routing code back into a [`SourceClass`].
    pub const fn from_code(code: u8) -> Option<SourceClass> {
        match code {
            0 => Some(SourceClass::Timing),
            1 => Some(SourceClass::Soh),
            2 => Some(SourceClass::Engineering),
            3 => Some(SourceClass::Gps),
            4 => Some(SourceClass::MainDigitizer),
            5 => Some(SourceClass::CalMonitor),
            6 => Some(SourceClass::Accelerometer),
            7 => Some(SourceClass::Decimation),
            8 => Some(SourceClass::Logger),
            _ => None,
        }
    }

    /// Fixed sample rate of the category, when it has one. Digitizer-backed
    /// and decimated categories take their rate from the channel instead.
    pub const fn nominal_rate(self) -> Option<f64> {
        match self {
            SourceClass::Timing | SourceClass::Engineering | SourceClass::Gps => Some(1.0),
            SourceClass::Soh => Some(0.1),
            _ => None,
        }
    }

    /// Whether channels of this category route through the per-group
    /// dispatch table rather than the per-source one.
    pub const fn is_digitizer_backed(self) -> bool {
        matches!(
            self,
            SourceClass::MainDigitizer | SourceClass::CalMonitor | SourceClass::Accelerometer
        )
    }
}

impl fmt::Display for SourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceClass::Timing => "timing",
            SourceClass::Soh => "soh",
            SourceClass::Engineering => "engineering",
            SourceClass::Gps => "gps",
            SourceClass::MainDigitizer => "main-digitizer",
            SourceClass::CalMonitor => "cal-monitor",
            SourceClass::Accelerometer => "accelerometer",
            SourceClass::Decimation => "decimation",
            SourceClass::Logger => "logger",
        };
        f.write_str(name)
    }
}

/// Timing field names; the sub-field code is the table position.
pub const TIMING_FIELDS: [&str; 3] = ["PHASE", "CLOCKQUAL", "CLOCKLOSS"];

/// State-of-health field names, sampled at 0.1 Hz.
pub const SOH_FIELDS: [&str; 6] = [
    "ANTCURR",
    "INPVOLT",
    "SYSTEMP",
    "MAINCURR",
    "SENSACURR",
    "SENSBCURR",
];

/// Engineering field names.
pub const ENGINEERING_FIELDS: [&str; 4] = ["GPIO1", "GPIO2", "PACKETBUF", "COMMEVT"];

/// GPS field names.
pub const GPS_FIELDS: [&str; 5] = ["LAT", "LON", "ELEV", "SATCOUNT", "TIMEBASE"];

/// Sampling frequencies the digitizer offers, in Hz. The frequency bit used
/// in routing keys and configuration bitmaps is the table position.
pub const FREQUENCIES: [u16; 10] = [1, 10, 20, 40, 50, 100, 200, 250, 500, 1000];

/// Number of main digitizer channels (`MD1`..`MD6`).
pub const MAIN_CHANNELS: u8 = 6;
/// Number of accelerometer channels (`AC1`..`AC3`).
pub const ACCEL_CHANNELS: u8 = 3;
/// Dispatch group of the calibration monitor channel.
pub const CAL_GROUP: u8 = 6;
/// Dispatch group of the first accelerometer channel.
pub const ACCEL_GROUP_BASE: u8 = 7;
/// Total number of dispatch groups (main 0-5, cal 6, accel 7-9).
pub const GROUP_COUNT: usize = 10;
/// Highest frequency an accelerometer channel accepts, in Hz.
pub const ACCEL_MAX_HZ: u16 = 200;

/// Bit index of `hz` in the fixed frequency table.
pub fn freq_bit(hz: u16) -> Option<u8> {
    FREQUENCIES.iter().position(|&f| f == hz).map(|i| i as u8)
}

/// Position of `name` in a fixed field table.
pub fn field_index(table: &[&str], name: &str) -> Option<u8> {
    table.iter().position(|&f| f == name).map(|i| i as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for code in 0..=8u8 {
            let class = SourceClass::from_code(code).unwrap();
            assert_eq!(class.code(), code);
        }
        assert_eq!(SourceClass::from_code(9), None);
    }

    #[test]
    fn freq_bits_follow_table_order() {
        assert_eq!(freq_bit(1), Some(0));
        assert_eq!(freq_bit(100), Some(5));
        assert_eq!(freq_bit(1000), Some(9));
        assert_eq!(freq_bit(5000), None);
    }

    #[test]
    fn field_lookup_is_positional() {
        assert_eq!(field_index(&SOH_FIELDS, "INPVOLT"), Some(1));
        assert_eq!(field_index(&SOH_FIELDS, "NOPE"), None);
    }

    #[test]
    fn rates_match_categories() {
        assert_eq!(SourceClass::Timing.nominal_rate(), Some(1.0));
        assert_eq!(SourceClass::Soh.nominal_rate(), Some(0.1));
        assert_eq!(SourceClass::MainDigitizer.nominal_rate(), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trips_by_variant_name() {
        let json = serde_json::to_string(&SourceClass::MainDigitizer).unwrap();
        assert_eq!(json, "\"MainDigitizer\"");
        let back: SourceClass = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SourceClass::MainDigitizer);
    }
}
