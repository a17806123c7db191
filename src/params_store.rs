use crate::{
    error::{Result, ViralflowError},
    params::{is_single_line, FieldKind, ParamKey, ParamValue, ParameterSet, VirusMode},
};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// JSON store keeping the last edited parameters between sessions.
///
/// Records are saved exactly as edited, before normalization, so values for
/// the custom reference genome or `ndedup` survive a temporary mode switch.
#[derive(Debug, Clone)]
pub struct ParamsStore {
    path: PathBuf,
}

fn value_from_json(key: ParamKey, value: &Value) -> Option<ParamValue> {
    match key.kind() {
        FieldKind::Virus => value
            .as_str()
            .and_then(VirusMode::parse)
            .map(ParamValue::Virus),
        FieldKind::Text => match value {
            Value::String(s) if is_single_line(s) => Some(ParamValue::Text(s.clone())),
            Value::Number(n) => Some(ParamValue::Text(n.to_string())),
            _ => None,
        },
        FieldKind::Flag => value.as_bool().map(ParamValue::Flag),
        FieldKind::Integer => value
            .as_i64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|n| n.is_finite() && n.fract() == 0.0)
                    .map(|n| n as i64)
            })
            .map(ParamValue::Integer),
    }
}

/// Merges a stored (possibly partial or legacy) JSON object over the
/// defaults, one field at a time. `null` and mistyped values keep the
/// default.
pub fn params_from_json(value: &Value) -> ParameterSet {
    let mut params = ParameterSet::defaults();
    let Some(object) = value.as_object() else {
        warn!("stored params are not a JSON object, using defaults");
        return params;
    };
    for key in ParamKey::ORDER {
        let Some(raw) = object.get(key.name()) else {
            continue;
        };
        if raw.is_null() {
            continue;
        }
        match value_from_json(key, raw) {
            Some(value) => {
                params.assign(key, value);
            }
            None => warn!(%key, value = %raw, "ignoring stored param with unexpected type"),
        }
    }
    params
}

impl ParamsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: an absent or unreadable store yields the defaults.
    pub fn load(&self) -> ParameterSet {
        match self.try_load() {
            Ok(Some(params)) => params,
            Ok(None) => ParameterSet::defaults(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read params");
                ParameterSet::defaults()
            }
        }
    }

    fn try_load(&self) -> Result<Option<ParameterSet>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path).map_err(|e| ViralflowError::read(&self.path, e))?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| ViralflowError::parse_json(&self.path, e))?;
        Ok(Some(params_from_json(&value)))
    }

    pub fn save(&self, params: &ParameterSet) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| ViralflowError::write(dir, e))?;
        }
        let text = serde_json::to_string_pretty(params)?;
        fs::write(&self.path, text).map_err(|e| ViralflowError::write(&self.path, e))?;
        debug!(path = %self.path.display(), "saved params");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params_codec::{deserialize, to_params_text};
    use serde_json::json;

    #[test]
    fn test_missing_store_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParamsStore::new(dir.path().join("params.json"));
        assert_eq!(store.load(), ParameterSet::defaults());
    }

    #[test]
    fn test_save_keeps_inapplicable_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParamsStore::new(dir.path().join("nested").join("params.json"));
        let mut p = ParameterSet::defaults();
        p.virus = VirusMode::Custom;
        p.ref_genome_code = Some("MN908947.3".to_string());
        p.virus = VirusMode::SarsCov2;
        store.save(&p).unwrap();

        let loaded = store.load();
        assert_eq!(loaded, p);
        assert_eq!(loaded.ref_genome_code.as_deref(), Some("MN908947.3"));
        assert_eq!(loaded.normalized().ref_genome_code, None);
    }

    #[test]
    fn test_legacy_partial_json_merges_over_defaults() {
        let p = params_from_json(&json!({
            "virus": "custom",
            "minLen": 60.0,
            "primersBED": null,
            "depth": "ten",
            "legacyField": true,
            "nextflowSimCalls": 8
        }));
        assert_eq!(p.virus, VirusMode::Custom);
        assert_eq!(p.min_len, 60);
        assert_eq!(p.primers_bed, "");
        assert_eq!(p.depth, 5);
        assert_eq!(p.nextflow_sim_calls, "8");
    }

    #[test]
    fn test_multiline_text_in_store_keeps_default() {
        let p = params_from_json(&json!({
            "outDir": "/runs\nvirus custom",
            "depth": 9
        }));
        assert_eq!(p.out_dir, ParameterSet::defaults().out_dir);
        assert_eq!(p.depth, 9);
        let back = deserialize(&to_params_text(&p)).over_defaults();
        assert_eq!(back.virus, VirusMode::SarsCov2);
    }

    #[test]
    fn test_non_object_json_yields_defaults() {
        assert_eq!(params_from_json(&json!([1, 2])), ParameterSet::defaults());
    }

    #[test]
    fn test_corrupt_store_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        fs::write(&path, "{").unwrap();
        assert_eq!(ParamsStore::new(path).load(), ParameterSet::defaults());
    }
}
