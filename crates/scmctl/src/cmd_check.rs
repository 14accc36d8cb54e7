use std::path::Path;

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::info;

use scm::{Section, StationConfig};

use crate::common;

#[derive(Serialize)]
struct SectionStatus {
    section: &'static str,
    loaded: bool,
    crc_ok: bool,
    errors: u32,
}

fn statuses(cfg: &StationConfig) -> Vec<SectionStatus> {
    Section::ALL
        .iter()
        .map(|&section| SectionStatus {
            section: section.name(),
            loaded: cfg.loaded.contains(section.flag()),
            crc_ok: !cfg.crc_failed.contains(section.flag()),
            errors: cfg.errors(section),
        })
        .collect()
}

pub fn run(file: &Path, json: bool) -> Result<()> {
    let cfg = common::load(file)?;
    info!(
        channels = cfg.channels.len(),
        routes = cfg.dispatch.slot_count(),
        "configuration parsed"
    );

    let statuses = statuses(&cfg);
    if json {
        common::print_json(&statuses)?;
    } else {
        println!(
            "{:<12} {:>6} {:>5} {:>7}",
            "section", "loaded", "crc", "errors"
        );
        for status in &statuses {
            println!(
                "{:<12} {:>6} {:>5} {:>7}",
                status.section,
                if status.loaded { "yes" } else { "no" },
                if status.crc_ok { "ok" } else { "FAIL" },
                status.errors
            );
        }
    }

    let errors = cfg.total_errors();
    let crc_failures = cfg.crc_failed.bits().count_ones();
    if errors > 0 || crc_failures > 0 {
        bail!(
            "{errors} field errors, {crc_failures} checksum failures in {}",
            file.display()
        );
    }
    Ok(())
}
