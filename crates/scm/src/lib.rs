#![cfg_attr(docsrs, feature(doc_cfg))]
//! Station configuration facade: load an SCM document into typed records
//! and routing tables.
//!
//! ```
//! let text = "<station>\n<name>KSU1</name>\n<network>XK</network>\n</station>\n";
//! let cfg = scm::load_str(text);
//! assert!(cfg.loaded.contains(scm::SectionSet::STATION));
//! assert_eq!(cfg.station.name, "KSU1");
//! assert_eq!(cfg.errors(scm::Section::Station), 0);
//! ```
//!
//! Malformed content degrades instead of failing: every section reports an
//! error count, the `loaded` and `crc_failed` maps say what was found and
//! what did not verify, and only I/O problems surface as [`ConfigError`].
//! Threads sharing one configuration workspace hold [`acquire`]'s session
//! guard across a parse and release it after copying the records out.

pub use scm_config as config;
pub use scm_tables as tables;
pub use scm_text as text;

pub mod link;
mod load;

use bitflags::bitflags;
use thiserror::Error;

use scm_config::{
    Channel, Detector, DigitizerRecord, DispatchTables, IirFilter, NetcfgRecord, SensorsRecord,
    StationRecord,
};

pub use link::{LinkError, SupervisorLink};
pub use load::{load_file, load_str};
pub use scm_config::{acquire, try_acquire, Session};

/// Error type of the configuration facade. Content problems are never
/// errors; they degrade into per-section counters on [`StationConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

bitflags! {
    /// Bit per top-level section, for the loaded and checksum-failed maps.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SectionSet: u8 {
        const STATION = 1 << 0;
        const NETCFG = 1 << 1;
        const SENSORS = 1 << 2;
        const DIGITIZER = 1 << 3;
        const IIRFILTERS = 1 << 4;
        const DETECTORS = 1 << 5;
        const CHANNELS = 1 << 6;
    }
}

/// The top-level sections, in the order one parse reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Station,
    Netcfg,
    Sensors,
    Digitizer,
    IirFilters,
    Detectors,
    Channels,
}

/// Number of top-level sections.
pub const SECTION_COUNT: usize = 7;

impl Section {
    pub const ALL: [Section; SECTION_COUNT] = [
        Section::Station,
        Section::Netcfg,
        Section::Sensors,
        Section::Digitizer,
        Section::IirFilters,
        Section::Detectors,
        Section::Channels,
    ];

    /// Tag name of the section.
    pub const fn name(self) -> &'static str {
        match self {
            Section::Station => "station",
            Section::Netcfg => "netcfg",
            Section::Sensors => "sensors",
            Section::Digitizer => "digitizer",
            Section::IirFilters => "iirfilters",
            Section::Detectors => "detectors",
            Section::Channels => "channels",
        }
    }

    pub const fn flag(self) -> SectionSet {
        match self {
            Section::Station => SectionSet::STATION,
            Section::Netcfg => SectionSet::NETCFG,
            Section::Sensors => SectionSet::SENSORS,
            Section::Digitizer => SectionSet::DIGITIZER,
            Section::IirFilters => SectionSet::IIRFILTERS,
            Section::Detectors => SectionSet::DETECTORS,
            Section::Channels => SectionSet::CHANNELS,
        }
    }
}

/// Everything one parse of a station configuration document produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationConfig {
    pub station: StationRecord,
    pub netcfg: NetcfgRecord,
    pub sensors: SensorsRecord,
    pub digitizer: DigitizerRecord,
    /// IIR filter chain, in parse order.
    pub filters: Vec<IirFilter>,
    pub detectors: Vec<Detector>,
    /// Linked channels, in parse order; handles index into this chain.
    pub channels: Vec<Channel>,
    pub dispatch: DispatchTables,
    /// Sections whose closing tag was reached.
    pub loaded: SectionSet,
    /// Sections whose embedded checksum did not verify. Their fields are
    /// populated regardless; trust is the caller's decision.
    pub crc_failed: SectionSet,
    errors: [u32; SECTION_COUNT],
}

impl StationConfig {
    /// Errors counted while reading one section.
    pub fn errors(&self, section: Section) -> u32 {
        self.errors[section as usize]
    }

    pub fn total_errors(&self) -> u32 {
        self.errors.iter().sum()
    }

    pub(crate) fn set_errors(&mut self, section: Section, errors: u32) {
        self.errors[section as usize] = errors;
    }
}
