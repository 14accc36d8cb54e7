//! Typed section records and their descriptor tables.
//!
//! One type per top-level section. Simple sections are plain structs the
//! reader fills in place; the filter, detector, and channel sections build
//! chains of records, committing one entry per repeated record when its
//! closing tag is reached.

use std::mem;

use tracing::{debug, warn};

use scm_tables::SourceClass;

use crate::decode::SlotMut;
use crate::descriptor::{ArrayFrame, FieldDescriptor, ValueType};
use crate::dispatch::{ChanHandle, DispatchTables};
use crate::grammar::{resolve_source, SourceEnv};
use crate::reader::FieldTarget;

/// Number of sensor slots (`sensorA`, `sensorB`).
pub const SENSOR_COUNT: usize = 2;
/// Control lines per sensor (`line1`..`line4`).
pub const SENSOR_LINES: usize = 4;
/// Digitizer channels `chan1`..`chan7`; `chan7` is the calibration
/// monitor.
pub const DIGITIZER_CHANNELS: usize = 7;
/// Accelerometer channels `accel1`..`accel3`.
pub const ACCEL_COUNT: usize = 3;
/// Most filter sections one IIR filter may declare.
pub const MAX_FILTER_SECTIONS: usize = 8;
/// Most poles one filter section may declare.
pub const MAX_FILTER_POLES: u8 = 10;

/// Station identity block.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StationRecord {
    /// Station code, up to five characters.
    pub name: String,
    /// Two-letter network code.
    pub network: String,
    pub description: String,
    pub owner: String,
}

impl FieldTarget for StationRecord {
    const NAME: &'static str = "station";
    const DESCRIPTORS: &'static [FieldDescriptor] = &[
        FieldDescriptor::text("name", 5),
        FieldDescriptor::text("network", 2),
        FieldDescriptor::text("description", 60),
        FieldDescriptor::text("owner", 40),
        FieldDescriptor::checksum(),
    ];

    fn slot(&mut self, field: &'static str, frames: &[ArrayFrame]) -> Option<SlotMut<'_>> {
        if !frames.is_empty() {
            return None;
        }
        match field {
            "name" => Some(SlotMut::Text(&mut self.name)),
            "network" => Some(SlotMut::Text(&mut self.network)),
            "description" => Some(SlotMut::Text(&mut self.description)),
            "owner" => Some(SlotMut::Text(&mut self.owner)),
            _ => None,
        }
    }
}

/// Supervisory-link network parameters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NetcfgRecord {
    pub host: String,
    pub baseport: u16,
    /// Seconds before an unanswered request is retried.
    pub timeout: u16,
    pub retries: u8,
    /// Keepalive interval in seconds; zero disables it.
    pub keepalive: u16,
}

impl FieldTarget for NetcfgRecord {
    const NAME: &'static str = "netcfg";
    const DESCRIPTORS: &'static [FieldDescriptor] = &[
        FieldDescriptor::text("host", 64),
        FieldDescriptor::word("baseport"),
        FieldDescriptor::word("timeout"),
        FieldDescriptor::byte("retries"),
        FieldDescriptor::word("keepalive"),
        FieldDescriptor::checksum(),
    ];

    fn slot(&mut self, field: &'static str, frames: &[ArrayFrame]) -> Option<SlotMut<'_>> {
        if !frames.is_empty() {
            return None;
        }
        match field {
            "host" => Some(SlotMut::Text(&mut self.host)),
            "baseport" => Some(SlotMut::Word(&mut self.baseport)),
            "timeout" => Some(SlotMut::Word(&mut self.timeout)),
            "retries" => Some(SlotMut::Byte(&mut self.retries)),
            "keepalive" => Some(SlotMut::Word(&mut self.keepalive)),
            _ => None,
        }
    }
}

/// One attached sensor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Sensor {
    pub model: String,
    pub serial: String,
    /// Function assigned to each control line.
    pub lines: [String; SENSOR_LINES],
}

/// The letter-indexed sensor array (`sensorA`, `sensorB`), each element
/// carrying a nested numeric control-line array.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SensorsRecord {
    pub sensors: [Sensor; SENSOR_COUNT],
}

impl FieldTarget for SensorsRecord {
    const NAME: &'static str = "sensors";
    const DESCRIPTORS: &'static [FieldDescriptor] = &[
        FieldDescriptor::array_letter("sensor", b'A', SENSOR_COUNT),
        FieldDescriptor::text("model", 20),
        FieldDescriptor::text("serial", 16),
        FieldDescriptor::array_numeric("line", 1, SENSOR_LINES),
        FieldDescriptor::text("func", 12),
        FieldDescriptor::array_end("line"),
        FieldDescriptor::array_end("sensor"),
        FieldDescriptor::checksum(),
    ];

    fn slot(&mut self, field: &'static str, frames: &[ArrayFrame]) -> Option<SlotMut<'_>> {
        match (field, frames) {
            ("model", [s]) if s.array == "sensor" => {
                Some(SlotMut::Text(&mut self.sensors.get_mut(s.index)?.model))
            }
            ("serial", [s]) if s.array == "sensor" => {
                Some(SlotMut::Text(&mut self.sensors.get_mut(s.index)?.serial))
            }
            ("func", [s, l]) if s.array == "sensor" && l.array == "line" => Some(SlotMut::Text(
                self.sensors.get_mut(s.index)?.lines.get_mut(l.index)?,
            )),
            _ => None,
        }
    }
}

/// Digitizer identity and the offered-frequency bitmap of every channel.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DigitizerRecord {
    pub serial: String,
    /// Offered-frequency bitmaps for `chan1`..`chan7`; positions follow
    /// the fixed frequency table.
    pub chans: [u16; DIGITIZER_CHANNELS],
    /// Offered-frequency bitmaps for `accel1`..`accel3`.
    pub accels: [u16; ACCEL_COUNT],
}

impl FieldTarget for DigitizerRecord {
    const NAME: &'static str = "digitizer";
    const DESCRIPTORS: &'static [FieldDescriptor] = &[
        FieldDescriptor::text("serial", 16),
        FieldDescriptor::array_numeric("chan", 1, DIGITIZER_CHANNELS),
        FieldDescriptor::scalar("freqs", ValueType::FreqList),
        FieldDescriptor::array_end("chan"),
        FieldDescriptor::array_numeric("accel", 1, ACCEL_COUNT),
        FieldDescriptor::scalar("freqs", ValueType::FreqList),
        FieldDescriptor::array_end("accel"),
        FieldDescriptor::checksum(),
    ];

    fn slot(&mut self, field: &'static str, frames: &[ArrayFrame]) -> Option<SlotMut<'_>> {
        match (field, frames) {
            ("serial", []) => Some(SlotMut::Text(&mut self.serial)),
            ("freqs", [c]) if c.array == "chan" => {
                Some(SlotMut::Word(self.chans.get_mut(c.index)?))
            }
            ("freqs", [a]) if a.array == "accel" => {
                Some(SlotMut::Word(self.accels.get_mut(a.index)?))
            }
            _ => None,
        }
    }
}

/// One second-order stage of an IIR filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSection {
    /// Cutoff as a ratio of the reference frequency.
    pub cutoff: f64,
    pub poles: u8,
    /// Highpass form when set, lowpass otherwise.
    pub high: bool,
}

/// A named IIR filter, referenced by detectors.
#[derive(Debug, Clone, PartialEq)]
pub struct IirFilter {
    pub name: String,
    pub gain: f32,
    pub reffreq: f32,
    pub sections: Vec<FilterSection>,
}

#[derive(Debug, Default, Clone, Copy)]
struct SectDraft {
    cutoff: f64,
    poles: u8,
    high: u8,
}

#[derive(Debug, Default)]
struct FilterDraft {
    name: String,
    gain: f32,
    reffreq: f32,
    sects: u8,
    sections: [SectDraft; MAX_FILTER_SECTIONS],
    seen: u8,
}

/// Builds the filter chain from repeated `<iir>` records, in parse order.
#[derive(Debug, Default)]
pub struct FilterChain {
    pub filters: Vec<IirFilter>,
    draft: FilterDraft,
}

impl FieldTarget for FilterChain {
    const NAME: &'static str = "iirfilters";
    const DESCRIPTORS: &'static [FieldDescriptor] = &[
        FieldDescriptor::record_start("iir"),
        FieldDescriptor::text("name", 12),
        FieldDescriptor::float("gain"),
        FieldDescriptor::float("reffreq"),
        FieldDescriptor::byte("sects"),
        FieldDescriptor::array_numeric("sect", 1, MAX_FILTER_SECTIONS),
        FieldDescriptor::double("cutoff"),
        FieldDescriptor::byte("poles"),
        FieldDescriptor::byte("high"),
        FieldDescriptor::array_end("sect"),
        FieldDescriptor::record_end("iir"),
        FieldDescriptor::checksum(),
    ];

    fn slot(&mut self, field: &'static str, frames: &[ArrayFrame]) -> Option<SlotMut<'_>> {
        match (field, frames) {
            ("name", []) => Some(SlotMut::Text(&mut self.draft.name)),
            ("gain", []) => Some(SlotMut::Float(&mut self.draft.gain)),
            ("reffreq", []) => Some(SlotMut::Float(&mut self.draft.reffreq)),
            ("sects", []) => Some(SlotMut::Byte(&mut self.draft.sects)),
            ("cutoff", [s]) if s.array == "sect" => {
                self.draft.seen = self.draft.seen.max(s.index as u8 + 1);
                Some(SlotMut::Double(
                    &mut self.draft.sections.get_mut(s.index)?.cutoff,
                ))
            }
            ("poles", [s]) if s.array == "sect" => {
                self.draft.seen = self.draft.seen.max(s.index as u8 + 1);
                Some(SlotMut::Byte(
                    &mut self.draft.sections.get_mut(s.index)?.poles,
                ))
            }
            ("high", [s]) if s.array == "sect" => {
                self.draft.seen = self.draft.seen.max(s.index as u8 + 1);
                Some(SlotMut::Byte(
                    &mut self.draft.sections.get_mut(s.index)?.high,
                ))
            }
            _ => None,
        }
    }

    fn record_start(&mut self, _name: &'static str, _errors: u32) {
        self.draft = FilterDraft::default();
    }

    fn record_end(&mut self, _name: &'static str, _errors: u32) -> u32 {
        let mut added = 0u32;
        let declared = self.draft.sects as usize;
        let seen = self.draft.seen as usize;
        let keep = if (1..=MAX_FILTER_SECTIONS).contains(&declared) {
            if declared != seen {
                warn!(
                    filter = %self.draft.name,
                    declared,
                    seen,
                    "filter section count disagrees"
                );
                added += 1;
            }
            declared.min(seen)
        } else {
            warn!(
                filter = %self.draft.name,
                declared,
                "filter section count out of range"
            );
            added += 1;
            seen
        };
        let mut sections = Vec::with_capacity(keep);
        for (at, sect) in self.draft.sections[..keep].iter().enumerate() {
            if !(1..=MAX_FILTER_POLES).contains(&sect.poles) {
                warn!(
                    filter = %self.draft.name,
                    section = at + 1,
                    poles = sect.poles,
                    "pole count out of range"
                );
                added += 1;
            }
            if sect.high > 1 {
                warn!(
                    filter = %self.draft.name,
                    section = at + 1,
                    high = sect.high,
                    "highpass flag must be 0 or 1"
                );
                added += 1;
            }
            sections.push(FilterSection {
                cutoff: sect.cutoff,
                poles: sect.poles,
                high: sect.high != 0,
            });
        }
        self.filters.push(IirFilter {
            name: mem::take(&mut self.draft.name),
            gain: self.draft.gain,
            reffreq: self.draft.reffreq,
            sections,
        });
        added
    }
}

/// Trigger parameters, one variant per detector record kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorParams {
    /// Short-term/long-term amplitude ratio trigger (`<mh>`).
    Ratio { ratio: f32, quiet: f32, window: u16 },
    /// Fixed amplitude threshold trigger (`<thresh>`).
    Threshold { low: i32, high: i32, tail: u16 },
}

/// An event detector channels may subscribe to.
#[derive(Debug, Clone, PartialEq)]
pub struct Detector {
    pub name: String,
    /// Filter name as written in the configuration.
    pub filter_name: String,
    /// Handle into the filter chain when the name resolved.
    pub filter: Option<usize>,
    pub params: DetectorParams,
}

#[derive(Debug, Default)]
struct DetectorDraft {
    name: String,
    filter: String,
    ratio: f32,
    quiet: f32,
    window: u16,
    low: i32,
    high: i32,
    tail: u16,
}

/// Builds the detector list from repeated `<mh>` and `<thresh>` records.
#[derive(Debug)]
pub struct DetectorSet {
    pub detectors: Vec<Detector>,
    filter_names: Vec<String>,
    draft: DetectorDraft,
}

impl DetectorSet {
    pub fn new(filters: &[IirFilter]) -> Self {
        DetectorSet {
            detectors: Vec::new(),
            filter_names: filters.iter().map(|f| f.name.clone()).collect(),
            draft: DetectorDraft::default(),
        }
    }
}

impl FieldTarget for DetectorSet {
    const NAME: &'static str = "detectors";
    const DESCRIPTORS: &'static [FieldDescriptor] = &[
        FieldDescriptor::record_start("mh"),
        FieldDescriptor::text("name", 12),
        FieldDescriptor::text("filter", 12),
        FieldDescriptor::float("ratio"),
        FieldDescriptor::float("quiet"),
        FieldDescriptor::word("window"),
        FieldDescriptor::record_end("mh"),
        FieldDescriptor::record_start("thresh"),
        FieldDescriptor::text("name", 12),
        FieldDescriptor::text("filter", 12),
        FieldDescriptor::int("low"),
        FieldDescriptor::int("high"),
        FieldDescriptor::word("tail"),
        FieldDescriptor::record_end("thresh"),
        FieldDescriptor::checksum(),
    ];

    fn slot(&mut self, field: &'static str, frames: &[ArrayFrame]) -> Option<SlotMut<'_>> {
        if !frames.is_empty() {
            return None;
        }
        match field {
            "name" => Some(SlotMut::Text(&mut self.draft.name)),
            "filter" => Some(SlotMut::Text(&mut self.draft.filter)),
            "ratio" => Some(SlotMut::Float(&mut self.draft.ratio)),
            "quiet" => Some(SlotMut::Float(&mut self.draft.quiet)),
            "window" => Some(SlotMut::Word(&mut self.draft.window)),
            "low" => Some(SlotMut::Int(&mut self.draft.low)),
            "high" => Some(SlotMut::Int(&mut self.draft.high)),
            "tail" => Some(SlotMut::Word(&mut self.draft.tail)),
            _ => None,
        }
    }

    fn record_start(&mut self, _name: &'static str, _errors: u32) {
        self.draft = DetectorDraft::default();
    }

    fn record_end(&mut self, name: &'static str, _errors: u32) -> u32 {
        let mut added = 0u32;
        let filter = if self.draft.filter.is_empty() {
            None
        } else {
            let found = self
                .filter_names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(&self.draft.filter));
            if found.is_none() {
                warn!(
                    detector = %self.draft.name,
                    filter = %self.draft.filter,
                    "unknown filter"
                );
                added += 1;
            }
            found
        };
        let params = if name == "mh" {
            DetectorParams::Ratio {
                ratio: self.draft.ratio,
                quiet: self.draft.quiet,
                window: self.draft.window,
            }
        } else {
            DetectorParams::Threshold {
                low: self.draft.low,
                high: self.draft.high,
                tail: self.draft.tail,
            }
        };
        // An unresolved filter does not discard the detector.
        self.detectors.push(Detector {
            name: mem::take(&mut self.draft.name),
            filter_name: mem::take(&mut self.draft.filter),
            filter,
            params,
        });
        added
    }
}

/// A linked acquisition channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// SEED code the stream is published under.
    pub seed: String,
    /// Source specifier as written.
    pub source: String,
    pub class: SourceClass,
    pub sub_field: u16,
    pub freq_bit: Option<u8>,
    /// Samples per second.
    pub rate: f64,
    /// Source channel this one decimates.
    pub dec_source: Option<ChanHandle>,
    /// Handles into the detector list, in the configured order.
    pub detectors: Vec<usize>,
    pub event_only: u8,
    pub exclude: u8,
}

#[derive(Debug, Default)]
struct ChanDraft {
    seed: String,
    source: String,
    decsource: String,
    detlist: String,
    event_only: u8,
    exclude: u8,
}

/// Builds the channel chain and the dispatch tables from repeated `<chan>`
/// records.
///
/// A record is linked only when its parse finished without a single new
/// error; anything else leaves the chain and both tables untouched.
#[derive(Debug)]
pub struct ChannelSet {
    pub channels: Vec<Channel>,
    pub dispatch: DispatchTables,
    chan_freqs: [u16; DIGITIZER_CHANNELS],
    accel_freqs: [u16; ACCEL_COUNT],
    detector_names: Vec<String>,
    draft: ChanDraft,
    errors_at_start: u32,
}

impl ChannelSet {
    pub fn new(digitizer: &DigitizerRecord, detectors: &[Detector]) -> Self {
        ChannelSet {
            channels: Vec::new(),
            dispatch: DispatchTables::default(),
            chan_freqs: digitizer.chans,
            accel_freqs: digitizer.accels,
            detector_names: detectors.iter().map(|d| d.name.clone()).collect(),
            draft: ChanDraft::default(),
            errors_at_start: 0,
        }
    }

    pub fn into_parts(self) -> (Vec<Channel>, DispatchTables) {
        (self.channels, self.dispatch)
    }
}

impl FieldTarget for ChannelSet {
    const NAME: &'static str = "channels";
    const DESCRIPTORS: &'static [FieldDescriptor] = &[
        FieldDescriptor::record_start("chan"),
        FieldDescriptor::text("seed", 6),
        FieldDescriptor::text("source", 24),
        FieldDescriptor::text("decsource", 6),
        FieldDescriptor::text("detlist", 64),
        FieldDescriptor::scalar("eventonly", ValueType::EventList),
        FieldDescriptor::scalar("exclude", ValueType::ExcludeList),
        FieldDescriptor::record_end("chan"),
        FieldDescriptor::checksum(),
    ];

    fn slot(&mut self, field: &'static str, frames: &[ArrayFrame]) -> Option<SlotMut<'_>> {
        if !frames.is_empty() {
            return None;
        }
        match field {
            "seed" => Some(SlotMut::Text(&mut self.draft.seed)),
            "source" => Some(SlotMut::Text(&mut self.draft.source)),
            "decsource" => Some(SlotMut::Text(&mut self.draft.decsource)),
            "detlist" => Some(SlotMut::Text(&mut self.draft.detlist)),
            "eventonly" => Some(SlotMut::Byte(&mut self.draft.event_only)),
            "exclude" => Some(SlotMut::Byte(&mut self.draft.exclude)),
            _ => None,
        }
    }

    fn record_start(&mut self, _name: &'static str, errors: u32) {
        self.draft = ChanDraft::default();
        self.errors_at_start = errors;
    }

    fn record_end(&mut self, _name: &'static str, errors: u32) -> u32 {
        let mut added = 0u32;
        let spec = self.draft.source.to_ascii_uppercase();
        let env = SourceEnv {
            chan_freqs: &self.chan_freqs,
            accel_freqs: &self.accel_freqs,
            channels: &self.channels,
        };
        let resolved = match resolve_source(&spec, &self.draft.decsource, &env) {
            Ok(resolved) => Some(resolved),
            Err(err) => {
                warn!(seed = %self.draft.seed, %err, "channel source rejected");
                added += 1;
                None
            }
        };
        let mut detectors = Vec::new();
        for token in self.draft.detlist.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match self
                .detector_names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(token))
            {
                Some(handle) => detectors.push(handle),
                None => {
                    warn!(seed = %self.draft.seed, detector = token, "unknown detector");
                    added += 1;
                }
            }
        }
        if added > 0 || errors != self.errors_at_start {
            debug!(seed = %self.draft.seed, "channel dropped");
            return added;
        }
        let Some(resolved) = resolved else {
            return added;
        };
        let handle = self.channels.len();
        match (resolved.group, resolved.freq_bit) {
            (Some(group), Some(bit)) => self.dispatch.insert_group(group, bit, handle),
            _ => self
                .dispatch
                .insert_source(resolved.class, resolved.sub_field, handle),
        }
        debug!(
            seed = %self.draft.seed,
            class = %resolved.class,
            handle,
            "channel linked"
        );
        self.channels.push(Channel {
            seed: mem::take(&mut self.draft.seed),
            source: mem::take(&mut self.draft.source),
            class: resolved.class,
            sub_field: resolved.sub_field,
            freq_bit: resolved.freq_bit,
            rate: resolved.rate,
            dec_source: resolved.dec_source,
            detectors,
            event_only: self.draft.event_only,
            exclude: self.draft.exclude,
        });
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_section;
    use scm_text::{split_lines, Parser};

    fn read<T: FieldTarget>(doc: &str, record: &mut T) -> crate::reader::SectionReport {
        let lines = split_lines(doc);
        let mut parser = Parser::new(&lines);
        read_section(&mut parser, record)
    }

    #[test]
    fn station_fields_decode() {
        let mut station = StationRecord::default();
        let report = read(
            "<station>\n\
             <name>KSU1</name>\n\
             <network>XK</network>\n\
             <description>\"Konza Prairie vault\"</description>\n\
             <owner>KSU Geology &amp; Geophysics</owner>\n\
             </station>\n",
            &mut station,
        );
        assert!(report.loaded);
        assert_eq!(report.errors, 0);
        assert_eq!(station.name, "KSU1");
        assert_eq!(station.network, "XK");
        assert_eq!(station.description, "Konza Prairie vault");
        assert_eq!(station.owner, "KSU Geology & Geophysics");
    }

    #[test]
    fn netcfg_numbers_decode_with_range_checks() {
        let mut netcfg = NetcfgRecord::default();
        let report = read(
            "<netcfg>\n\
             <host>acq.example.net</host>\n\
             <baseport>7100</baseport>\n\
             <timeout>30</timeout>\n\
             <retries>300</retries>\n\
             <keepalive>60</keepalive>\n\
             </netcfg>\n",
            &mut netcfg,
        );
        assert!(report.loaded);
        // 300 does not fit the retries byte.
        assert_eq!(report.errors, 1);
        assert_eq!(netcfg.retries, 0);
        assert_eq!(netcfg.baseport, 7100);
        assert_eq!(netcfg.keepalive, 60);
    }

    #[test]
    fn sensors_nested_arrays_decode() {
        let mut sensors = SensorsRecord::default();
        let report = read(
            "<sensors>\n\
             <sensorA>\n\
             <model>STS-2</model>\n\
             <serial>89041</serial>\n\
             <line1>CALEN</line1>\n\
             <line2>\n<func>UNLOCK</func>\n</line2>\n\
             </sensorA>\n\
             <sensorB>\n\
             <model>EpiSensor</model>\n\
             </sensorB>\n\
             <sensorC>\n\
             </sensors>\n",
            &mut sensors,
        );
        assert!(report.loaded);
        // sensorC is outside the declared pair.
        assert_eq!(report.errors, 1);
        assert_eq!(sensors.sensors[0].model, "STS-2");
        assert_eq!(sensors.sensors[0].serial, "89041");
        assert_eq!(sensors.sensors[0].lines[0], "CALEN");
        assert_eq!(sensors.sensors[0].lines[1], "UNLOCK");
        assert_eq!(sensors.sensors[1].model, "EpiSensor");
    }

    #[test]
    fn digitizer_freq_lists_and_calmon_alias() {
        let mut digitizer = DigitizerRecord::default();
        let report = read(
            "<digitizer>\n\
             <serial>Q4120-0077</serial>\n\
             <chan1>100,1000</chan1>\n\
             <chan2>\n<freqs>1,20</freqs>\n</chan2>\n\
             <calmon>250</calmon>\n\
             <accel1>200</accel1>\n\
             </digitizer>\n",
            &mut digitizer,
        );
        assert!(report.loaded);
        assert_eq!(report.errors, 0);
        assert_eq!(digitizer.chans[0], (1 << 5) | (1 << 9));
        assert_eq!(digitizer.chans[1], 1 | (1 << 2));
        // calmon is the historical alias of chan7.
        assert_eq!(digitizer.chans[6], 1 << 7);
        assert_eq!(digitizer.accels[0], 1 << 6);
    }

    #[test]
    fn filters_chain_in_parse_order() {
        let mut chain = FilterChain::default();
        let report = read(
            "<iirfilters>\n\
             <iir>\n\
             <name>BP2</name>\n\
             <gain>1.0</gain>\n\
             <reffreq>20.0</reffreq>\n\
             <sects>2</sects>\n\
             <sect1>\n<cutoff>0.1</cutoff>\n<poles>2</poles>\n<high>1</high>\n</sect1>\n\
             <sect2>\n<cutoff>0.4</cutoff>\n<poles>4</poles>\n<high>0</high>\n</sect2>\n\
             </iir>\n\
             <iir>\n\
             <name>LP1</name>\n\
             <gain>0.5</gain>\n\
             <reffreq>1.0</reffreq>\n\
             <sects>1</sects>\n\
             <sect1>\n<cutoff>0.8</cutoff>\n<poles>3</poles>\n<high>0</high>\n</sect1>\n\
             </iir>\n\
             </iirfilters>\n",
            &mut chain,
        );
        assert!(report.loaded);
        assert_eq!(report.errors, 0);
        assert_eq!(chain.filters.len(), 2);
        assert_eq!(chain.filters[0].name, "BP2");
        assert_eq!(chain.filters[0].sections.len(), 2);
        assert!(chain.filters[0].sections[0].high);
        assert!(!chain.filters[0].sections[1].high);
        assert_eq!(chain.filters[1].name, "LP1");
        assert_eq!(chain.filters[1].sections[0].poles, 3);
    }

    #[test]
    fn filter_section_count_mismatch_is_counted() {
        let mut chain = FilterChain::default();
        let report = read(
            "<iirfilters>\n\
             <iir>\n\
             <name>ODD</name>\n\
             <sects>3</sects>\n\
             <sect1>\n<cutoff>0.5</cutoff>\n<poles>2</poles>\n<high>0</high>\n</sect1>\n\
             </iir>\n\
             </iirfilters>\n",
            &mut chain,
        );
        assert_eq!(report.errors, 1);
        // The filter is kept with the sections that were actually present.
        assert_eq!(chain.filters.len(), 1);
        assert_eq!(chain.filters[0].sections.len(), 1);
    }

    #[test]
    fn detectors_resolve_filters_case_insensitively() {
        let filters = [IirFilter {
            name: "BP2".to_string(),
            gain: 1.0,
            reffreq: 20.0,
            sections: Vec::new(),
        }];
        let mut detectors = DetectorSet::new(&filters);
        let report = read(
            "<detectors>\n\
             <mh>\n\
             <name>STA1</name>\n\
             <filter>bp2</filter>\n\
             <ratio>4.0</ratio>\n\
             <quiet>2.5</quiet>\n\
             <window>80</window>\n\
             </mh>\n\
             <thresh>\n\
             <name>CLIP</name>\n\
             <filter>GHOST</filter>\n\
             <low>-8000000</low>\n\
             <high>8000000</high>\n\
             <tail>40</tail>\n\
             </thresh>\n\
             </detectors>\n",
            &mut detectors,
        );
        assert!(report.loaded);
        // GHOST does not name a filter.
        assert_eq!(report.errors, 1);
        assert_eq!(detectors.detectors.len(), 2);
        assert_eq!(detectors.detectors[0].filter, Some(0));
        assert_eq!(
            detectors.detectors[0].params,
            DetectorParams::Ratio {
                ratio: 4.0,
                quiet: 2.5,
                window: 80,
            }
        );
        // The detector with the unresolved filter is still kept.
        assert_eq!(detectors.detectors[1].filter, None);
        assert_eq!(detectors.detectors[1].filter_name, "GHOST");
        assert_eq!(
            detectors.detectors[1].params,
            DetectorParams::Threshold {
                low: -8_000_000,
                high: 8_000_000,
                tail: 40,
            }
        );
    }

    fn digitizer_with(md1: u16) -> DigitizerRecord {
        let mut digitizer = DigitizerRecord::default();
        digitizer.chans[0] = md1;
        digitizer
    }

    #[test]
    fn channel_links_only_when_clean() {
        let digitizer = digitizer_with(1 << 5); // MD1 offers 100 Hz
        let mut set = ChannelSet::new(&digitizer, &[]);
        let report = read(
            "<channels>\n\
             <chan>\n\
             <seed>BHZ</seed>\n\
             <source>MD1_100</source>\n\
             </chan>\n\
             <chan>\n\
             <seed>SHZ</seed>\n\
             <source>MD1_50</source>\n\
             </chan>\n\
             </channels>\n",
            &mut set,
        );
        assert!(report.loaded);
        assert_eq!(report.errors, 1);
        let (channels, dispatch) = set.into_parts();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].seed, "BHZ");
        assert_eq!(channels[0].class, SourceClass::MainDigitizer);
        assert_eq!(channels[0].rate, 100.0);
        assert_eq!(dispatch.group_chain(0, 5), &[0]);
        assert!(dispatch.group_chain(0, 4).is_empty());
    }

    #[test]
    fn field_error_inside_record_drops_the_channel() {
        let digitizer = digitizer_with(1 << 5);
        let mut set = ChannelSet::new(&digitizer, &[]);
        let report = read(
            "<channels>\n\
             <chan>\n\
             <seed>BHZ</seed>\n\
             <source>MD1_100</source>\n\
             <eventonly>1,9</eventonly>\n\
             </chan>\n\
             </channels>\n",
            &mut set,
        );
        assert_eq!(report.errors, 1);
        assert!(set.channels.is_empty());
        assert!(set.dispatch.is_empty());
    }

    #[test]
    fn decimate_chains_to_a_linked_channel() {
        let digitizer = digitizer_with(1 << 5);
        let mut set = ChannelSet::new(&digitizer, &[]);
        let report = read(
            "<channels>\n\
             <chan>\n\
             <seed>BHZ</seed>\n\
             <source>MD1_100</source>\n\
             </chan>\n\
             <chan>\n\
             <seed>LHZ</seed>\n\
             <source>DECIMATE</source>\n\
             <decsource>bhz</decsource>\n\
             </chan>\n\
             <chan>\n\
             <seed>VHZ</seed>\n\
             <source>DECIMATE</source>\n\
             <decsource>MHZ</decsource>\n\
             </chan>\n\
             </channels>\n",
            &mut set,
        );
        // The VHZ source never linked.
        assert_eq!(report.errors, 1);
        let (channels, dispatch) = set.into_parts();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].seed, "LHZ");
        assert_eq!(channels[1].class, SourceClass::Decimation);
        assert_eq!(channels[1].dec_source, Some(0));
        assert_eq!(channels[1].rate, 10.0);
        assert_eq!(dispatch.source_chain(SourceClass::Decimation, 0), &[1]);
    }

    #[test]
    fn detlist_and_bitmaps_carry_into_the_channel() {
        let digitizer = digitizer_with(1 << 5);
        let detectors = vec![Detector {
            name: "STA1".to_string(),
            filter_name: String::new(),
            filter: None,
            params: DetectorParams::Ratio {
                ratio: 4.0,
                quiet: 2.5,
                window: 80,
            },
        }];
        let mut set = ChannelSet::new(&digitizer, &detectors);
        let report = read(
            "<channels>\n\
             <chan>\n\
             <seed>BHZ</seed>\n\
             <source>MD1_100</source>\n\
             <detlist>sta1</detlist>\n\
             <eventonly>1,3</eventonly>\n\
             <exclude>I2,X1</exclude>\n\
             </chan>\n\
             </channels>\n",
            &mut set,
        );
        assert_eq!(report.errors, 0);
        assert_eq!(set.channels.len(), 1);
        assert_eq!(set.channels[0].detectors, &[0]);
        assert_eq!(set.channels[0].event_only, 0b101);
        assert_eq!(set.channels[0].exclude, (1 << 5) | 1);
    }

    #[test]
    fn unknown_detector_reference_drops_the_channel() {
        let digitizer = digitizer_with(1 << 5);
        let mut set = ChannelSet::new(&digitizer, &[]);
        let report = read(
            "<channels>\n\
             <chan>\n\
             <seed>BHZ</seed>\n\
             <source>MD1_100</source>\n\
             <detlist>NOPE</detlist>\n\
             </chan>\n\
             </channels>\n",
            &mut set,
        );
        assert_eq!(report.errors, 1);
        assert!(set.channels.is_empty());
    }
}
