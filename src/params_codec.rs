//! Text format of ViralFlow `.params` files.
//!
//! One `<name> <value>` pair per line, `#` comments, fields in a fixed order.
//! Decoding is forgiving: hand-edited files are expected, so malformed lines
//! and unknown keys are skipped instead of reported.

use crate::{
    error::{Result, ViralflowError},
    params::{ParamKey, ParameterSet, ParamsPatch},
};
use std::{fs, path::Path};
use tracing::{debug, warn};

pub const HEADER_LINES: [&str; 2] = [
    "# ViralFlow params generated by ViralFlow GUI",
    "# See https://viralflow.github.io/ for argument descriptions",
];

pub fn defaults() -> ParameterSet {
    ParameterSet::defaults()
}

pub fn normalize(params: &ParameterSet) -> ParameterSet {
    params.normalized()
}

/// Renders the normalized form of `params` as `.params` lines, headers
/// included.
pub fn serialize(params: &ParameterSet) -> Vec<String> {
    let params = params.normalized();
    let mut lines: Vec<String> = HEADER_LINES.iter().map(|s| s.to_string()).collect();
    for key in ParamKey::ORDER {
        if let Some(value) = params.get(key) {
            lines.push(format!("{key} {value}"));
        }
    }
    lines
}

/// Full file contents, newline-terminated.
pub fn to_params_text(params: &ParameterSet) -> String {
    let mut text = serialize(params).join("\n");
    text.push('\n');
    text
}

pub fn deserialize(text: &str) -> ParamsPatch {
    let mut patch = ParamsPatch::new();
    for raw in text.split('\n') {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let value = value.trim_start();
        let Some(key) = ParamKey::from_name(name) else {
            debug!(key = name, "ignoring unknown parameter");
            continue;
        };
        if !patch.insert_raw(key, value) {
            debug!(%key, value, "dropping unparseable parameter value");
        }
    }
    patch
}

pub fn export_params_file(path: &Path, params: &ParameterSet) -> Result<()> {
    fs::write(path, to_params_text(params)).map_err(|e| ViralflowError::write(path, e))?;
    debug!(path = %path.display(), "wrote params file");
    Ok(())
}

/// Reads a `.params` file and fills whatever it does not mention from the
/// defaults.
pub fn import_params_file(path: &Path) -> Result<ParameterSet> {
    let text = fs::read_to_string(path).map_err(|e| ViralflowError::read(path, e))?;
    let patch = deserialize(&text);
    if patch.is_empty() {
        warn!(path = %path.display(), "params file contained no recognised fields");
    }
    Ok(patch.over_defaults())
}
