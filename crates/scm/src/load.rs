//! Whole-file loading and the section-by-section parse sequence.

use std::fs;
use std::path::Path;

use tracing::info;

use scm_config::{read_section, ChannelSet, DetectorSet, FilterChain, SectionReport};
use scm_text::{split_lines, Parser};

use crate::{ConfigError, Section, StationConfig};

/// Read a configuration file and parse it. Only I/O failures are errors;
/// content problems degrade into the returned record's counters.
pub fn load_file(path: impl AsRef<Path>) -> Result<StationConfig, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    info!(path = %path.display(), bytes = text.len(), "loading station configuration");
    Ok(load_str(&text))
}

/// Parse a configuration document already in memory.
///
/// Sections are read in dependency order: filters before the detectors
/// that reference them, the digitizer and detectors before the channels
/// that consult their bitmaps and names. The line cursor rewinds for every
/// section, so the document order is free.
pub fn load_str(text: &str) -> StationConfig {
    let lines = split_lines(text);
    let mut parser = Parser::new(&lines);
    let mut cfg = StationConfig::default();

    let report = read_section(&mut parser, &mut cfg.station);
    note(&mut cfg, Section::Station, report);
    let report = read_section(&mut parser, &mut cfg.netcfg);
    note(&mut cfg, Section::Netcfg, report);
    let report = read_section(&mut parser, &mut cfg.sensors);
    note(&mut cfg, Section::Sensors, report);
    let report = read_section(&mut parser, &mut cfg.digitizer);
    note(&mut cfg, Section::Digitizer, report);

    let mut filters = FilterChain::default();
    let report = read_section(&mut parser, &mut filters);
    note(&mut cfg, Section::IirFilters, report);
    cfg.filters = filters.filters;

    let mut detectors = DetectorSet::new(&cfg.filters);
    let report = read_section(&mut parser, &mut detectors);
    note(&mut cfg, Section::Detectors, report);
    cfg.detectors = detectors.detectors;

    let mut channels = ChannelSet::new(&cfg.digitizer, &cfg.detectors);
    let report = read_section(&mut parser, &mut channels);
    note(&mut cfg, Section::Channels, report);
    let (channels, dispatch) = channels.into_parts();
    cfg.channels = channels;
    cfg.dispatch = dispatch;

    info!(
        loaded = ?cfg.loaded,
        crc_failed = ?cfg.crc_failed,
        errors = cfg.total_errors(),
        channels = cfg.channels.len(),
        "configuration parsed"
    );
    cfg
}

fn note(cfg: &mut StationConfig, section: Section, report: SectionReport) {
    if report.loaded {
        cfg.loaded.insert(section.flag());
    }
    if report.found && !report.crc_valid {
        cfg.crc_failed.insert(section.flag());
    }
    cfg.set_errors(section, report.errors);
}
