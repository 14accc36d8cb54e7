use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::common;

#[derive(Serialize)]
struct StationEntry<'a> {
    name: &'a str,
    network: &'a str,
    description: &'a str,
    digitizer: &'a str,
    filters: Vec<&'a str>,
    detectors: Vec<&'a str>,
}

#[derive(Serialize)]
struct ChannelEntry<'a> {
    handle: usize,
    seed: &'a str,
    class: String,
    sub_field: u16,
    rate: f64,
    detectors: &'a [usize],
}

#[derive(Serialize)]
struct RouteEntry {
    key: String,
    chain: Vec<usize>,
}

#[derive(Serialize)]
struct Dump<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    station: Option<StationEntry<'a>>,
    channels: Vec<ChannelEntry<'a>>,
    routes: Vec<RouteEntry>,
}

pub fn run(file: &Path, routing: bool, json: bool) -> Result<()> {
    let cfg = common::load(file)?;

    let mut sources: Vec<_> = cfg.dispatch.source_slots().collect();
    sources.sort_by_key(|((class, sub), _)| (class.code(), *sub));
    let mut groups: Vec<_> = cfg.dispatch.group_slots().collect();
    groups.sort();

    if json {
        let dump = Dump {
            station: (!routing).then(|| StationEntry {
                name: &cfg.station.name,
                network: &cfg.station.network,
                description: &cfg.station.description,
                digitizer: &cfg.digitizer.serial,
                filters: cfg.filters.iter().map(|f| f.name.as_str()).collect(),
                detectors: cfg.detectors.iter().map(|d| d.name.as_str()).collect(),
            }),
            channels: cfg
                .channels
                .iter()
                .enumerate()
                .map(|(handle, chan)| ChannelEntry {
                    handle,
                    seed: &chan.seed,
                    class: chan.class.to_string(),
                    sub_field: chan.sub_field,
                    rate: chan.rate,
                    detectors: &chan.detectors,
                })
                .collect(),
            routes: sources
                .iter()
                .map(|((class, sub), chain)| RouteEntry {
                    key: format!("{class}/{sub}"),
                    chain: chain.to_vec(),
                })
                .chain(groups.iter().map(|((group, bit), chain)| RouteEntry {
                    key: format!("group{group}/bit{bit}"),
                    chain: chain.to_vec(),
                }))
                .collect(),
        };
        return common::print_json(&dump);
    }

    if !routing {
        println!(
            "station {} net {} \"{}\"",
            cfg.station.name, cfg.station.network, cfg.station.description
        );
        println!(
            "netcfg {}:{} timeout {}s retries {}",
            cfg.netcfg.host, cfg.netcfg.baseport, cfg.netcfg.timeout, cfg.netcfg.retries
        );
        for (at, sensor) in cfg.sensors.sensors.iter().enumerate() {
            if sensor.model.is_empty() {
                continue;
            }
            println!(
                "sensor{} {} serial {}",
                (b'A' + at as u8) as char,
                sensor.model,
                sensor.serial
            );
        }
        println!("digitizer {}", cfg.digitizer.serial);
        for filter in &cfg.filters {
            println!(
                "filter {} gain {} ref {} Hz, {} sections",
                filter.name,
                filter.gain,
                filter.reffreq,
                filter.sections.len()
            );
        }
        for detector in &cfg.detectors {
            println!("detector {} filter {}", detector.name, detector.filter_name);
        }
    }
    println!("channels:");
    for (handle, chan) in cfg.channels.iter().enumerate() {
        println!(
            "  [{handle}] {} {} {} Hz sub {}",
            chan.seed, chan.class, chan.rate, chan.sub_field
        );
    }
    println!("routes:");
    for ((class, sub), chain) in sources {
        println!("  {class}/{sub} -> {chain:?}");
    }
    for ((group, bit), chain) in groups {
        println!("  group {group} bit {bit} -> {chain:?}");
    }
    Ok(())
}
