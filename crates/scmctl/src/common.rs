use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use scm::StationConfig;

pub fn load(path: &Path) -> Result<StationConfig> {
    scm::load_file(path).with_context(|| format!("load {}", path.display()))
}

pub fn print_json<T: Serialize>(payload: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}
