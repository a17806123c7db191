use crate::error::{ErrorCode, Result, ViralflowError};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VirusMode {
    #[default]
    #[serde(rename = "sars-cov2")]
    SarsCov2,
    #[serde(rename = "custom")]
    Custom,
}

impl VirusMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SarsCov2 => "sars-cov2",
            Self::Custom => "custom",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sars-cov2" => Some(Self::SarsCov2),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Semantic type of a field, which decides how its value is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Virus,
    Text,
    Flag,
    Integer,
}

impl FieldKind {
    fn expected(&self) -> &'static str {
        match self {
            Self::Virus => "'sars-cov2' or 'custom'",
            Self::Text => "text",
            Self::Flag => "'true' or 'false'",
            Self::Integer => "an integer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamKey {
    Virus,
    PrimersBed,
    OutDir,
    InDir,
    RunSnpEff,
    WriteMappedReads,
    MinLen,
    Depth,
    MappingQuality,
    BaseQuality,
    MinDpIntrahost,
    TrimLen,
    RefGenomeCode,
    ReferenceGff,
    ReferenceGenome,
    NextflowSimCalls,
    FastpThreads,
    BwaThreads,
    Dedup,
    Ndedup,
}

impl ParamKey {
    /// Order in which fields are written to a `.params` file.
    pub const ORDER: [ParamKey; 20] = [
        Self::Virus,
        Self::PrimersBed,
        Self::OutDir,
        Self::InDir,
        Self::RunSnpEff,
        Self::WriteMappedReads,
        Self::MinLen,
        Self::Depth,
        Self::MappingQuality,
        Self::BaseQuality,
        Self::MinDpIntrahost,
        Self::TrimLen,
        Self::RefGenomeCode,
        Self::ReferenceGff,
        Self::ReferenceGenome,
        Self::NextflowSimCalls,
        Self::FastpThreads,
        Self::BwaThreads,
        Self::Dedup,
        Self::Ndedup,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Virus => "virus",
            Self::PrimersBed => "primersBED",
            Self::OutDir => "outDir",
            Self::InDir => "inDir",
            Self::RunSnpEff => "runSnpEff",
            Self::WriteMappedReads => "writeMappedReads",
            Self::MinLen => "minLen",
            Self::Depth => "depth",
            Self::MappingQuality => "mapping_quality",
            Self::BaseQuality => "base_quality",
            Self::MinDpIntrahost => "minDpIntrahost",
            Self::TrimLen => "trimLen",
            Self::RefGenomeCode => "refGenomeCode",
            Self::ReferenceGff => "referenceGFF",
            Self::ReferenceGenome => "referenceGenome",
            Self::NextflowSimCalls => "nextflowSimCalls",
            Self::FastpThreads => "fastp_threads",
            Self::BwaThreads => "bwa_threads",
            Self::Dedup => "dedup",
            Self::Ndedup => "ndedup",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ORDER.iter().copied().find(|key| key.name() == name)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Virus => FieldKind::Virus,
            Self::PrimersBed
            | Self::OutDir
            | Self::InDir
            | Self::RefGenomeCode
            | Self::ReferenceGff
            | Self::ReferenceGenome
            | Self::NextflowSimCalls => FieldKind::Text,
            Self::RunSnpEff | Self::WriteMappedReads | Self::Dedup => FieldKind::Flag,
            Self::MinLen
            | Self::Depth
            | Self::MappingQuality
            | Self::BaseQuality
            | Self::MinDpIntrahost
            | Self::TrimLen
            | Self::FastpThreads
            | Self::BwaThreads
            | Self::Ndedup => FieldKind::Integer,
        }
    }

    /// Parses a raw token for this field. `None` means the value is not
    /// acceptable and the field should be left out.
    pub fn parse_value(&self, raw: &str) -> Option<ParamValue> {
        match self.kind() {
            FieldKind::Virus => VirusMode::parse(raw).map(ParamValue::Virus),
            FieldKind::Text => parse_text(raw).map(ParamValue::Text),
            FieldKind::Flag => parse_flag(raw).map(ParamValue::Flag),
            FieldKind::Integer => parse_integer(raw).map(ParamValue::Integer),
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A `.params` entry is one line, so a text value may not span several.
pub fn is_single_line(text: &str) -> bool {
    !text.contains(['\n', '\r'])
}

/// `null` is the on-disk token for an empty text value.
fn parse_text(raw: &str) -> Option<String> {
    if !is_single_line(raw) {
        return None;
    }
    if raw == "null" {
        Some(String::new())
    } else {
        Some(raw.to_string())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    // Integral decimals such as `75.0` or `1e2` are accepted as well.
    let n = raw.parse::<f64>().ok()?;
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Virus(VirusMode),
    Text(String),
    Flag(bool),
    Integer(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Virus(mode) => f.write_str(mode.as_str()),
            Self::Text(text) if text.is_empty() => f.write_str("null"),
            Self::Text(text) => f.write_str(text),
            Self::Flag(flag) => write!(f, "{flag}"),
            Self::Integer(n) => write!(f, "{n}"),
        }
    }
}

/// Structured configuration of a pipeline run.
///
/// The conditional fields (`ref_genome_code`, `reference_gff`,
/// `reference_genome`, `ndedup`) are `None` when absent. A record read from
/// the store keeps whatever values were last entered for them, even if the
/// current mode flags make them inapplicable; [`ParameterSet::normalized`]
/// strips them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    pub virus: VirusMode,
    #[serde(rename = "primersBED")]
    pub primers_bed: String,
    #[serde(rename = "outDir")]
    pub out_dir: String,
    #[serde(rename = "inDir")]
    pub in_dir: String,
    #[serde(rename = "runSnpEff")]
    pub run_snp_eff: bool,
    #[serde(rename = "writeMappedReads")]
    pub write_mapped_reads: bool,
    #[serde(rename = "minLen")]
    pub min_len: i64,
    pub depth: i64,
    pub mapping_quality: i64,
    pub base_quality: i64,
    #[serde(rename = "minDpIntrahost")]
    pub min_dp_intrahost: i64,
    #[serde(rename = "trimLen")]
    pub trim_len: i64,
    #[serde(rename = "refGenomeCode", skip_serializing_if = "Option::is_none")]
    pub ref_genome_code: Option<String>,
    #[serde(rename = "referenceGFF", skip_serializing_if = "Option::is_none")]
    pub reference_gff: Option<String>,
    #[serde(rename = "referenceGenome", skip_serializing_if = "Option::is_none")]
    pub reference_genome: Option<String>,
    #[serde(rename = "nextflowSimCalls")]
    pub nextflow_sim_calls: String,
    pub fastp_threads: i64,
    pub bwa_threads: i64,
    pub dedup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ndedup: Option<i64>,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            virus: VirusMode::SarsCov2,
            primers_bed: String::new(),
            out_dir: "launchDir/output/".to_string(),
            in_dir: "launchDir/input/".to_string(),
            run_snp_eff: true,
            write_mapped_reads: true,
            min_len: 75,
            depth: 5,
            mapping_quality: 30,
            base_quality: 30,
            min_dp_intrahost: 100,
            trim_len: 0,
            ref_genome_code: Some(String::new()),
            reference_gff: Some(String::new()),
            reference_genome: Some(String::new()),
            nextflow_sim_calls: String::new(),
            fastp_threads: 1,
            bwa_threads: 1,
            dedup: false,
            ndedup: Some(3),
        }
    }
}

impl ParameterSet {
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Strips the fields that do not apply under the current mode flags.
    pub fn normalized(&self) -> Self {
        let mut ret = self.clone();
        if ret.virus != VirusMode::Custom {
            ret.ref_genome_code = None;
            ret.reference_gff = None;
            ret.reference_genome = None;
        }
        if !ret.dedup {
            ret.ndedup = None;
        }
        ret
    }

    pub fn get(&self, key: ParamKey) -> Option<ParamValue> {
        let text = |s: &String| Some(ParamValue::Text(s.clone()));
        let int = |n: i64| Some(ParamValue::Integer(n));
        match key {
            ParamKey::Virus => Some(ParamValue::Virus(self.virus)),
            ParamKey::PrimersBed => text(&self.primers_bed),
            ParamKey::OutDir => text(&self.out_dir),
            ParamKey::InDir => text(&self.in_dir),
            ParamKey::RunSnpEff => Some(ParamValue::Flag(self.run_snp_eff)),
            ParamKey::WriteMappedReads => Some(ParamValue::Flag(self.write_mapped_reads)),
            ParamKey::MinLen => int(self.min_len),
            ParamKey::Depth => int(self.depth),
            ParamKey::MappingQuality => int(self.mapping_quality),
            ParamKey::BaseQuality => int(self.base_quality),
            ParamKey::MinDpIntrahost => int(self.min_dp_intrahost),
            ParamKey::TrimLen => int(self.trim_len),
            ParamKey::RefGenomeCode => self.ref_genome_code.as_ref().and_then(text),
            ParamKey::ReferenceGff => self.reference_gff.as_ref().and_then(text),
            ParamKey::ReferenceGenome => self.reference_genome.as_ref().and_then(text),
            ParamKey::NextflowSimCalls => text(&self.nextflow_sim_calls),
            ParamKey::FastpThreads => int(self.fastp_threads),
            ParamKey::BwaThreads => int(self.bwa_threads),
            ParamKey::Dedup => Some(ParamValue::Flag(self.dedup)),
            ParamKey::Ndedup => self.ndedup.and_then(int),
        }
    }

    /// Stores `value` under `key`. Returns `false` when the value's type does
    /// not match the field.
    pub fn assign(&mut self, key: ParamKey, value: ParamValue) -> bool {
        match (key, value) {
            (ParamKey::Virus, ParamValue::Virus(mode)) => self.virus = mode,
            (ParamKey::PrimersBed, ParamValue::Text(s)) => self.primers_bed = s,
            (ParamKey::OutDir, ParamValue::Text(s)) => self.out_dir = s,
            (ParamKey::InDir, ParamValue::Text(s)) => self.in_dir = s,
            (ParamKey::RunSnpEff, ParamValue::Flag(b)) => self.run_snp_eff = b,
            (ParamKey::WriteMappedReads, ParamValue::Flag(b)) => self.write_mapped_reads = b,
            (ParamKey::MinLen, ParamValue::Integer(n)) => self.min_len = n,
            (ParamKey::Depth, ParamValue::Integer(n)) => self.depth = n,
            (ParamKey::MappingQuality, ParamValue::Integer(n)) => self.mapping_quality = n,
            (ParamKey::BaseQuality, ParamValue::Integer(n)) => self.base_quality = n,
            (ParamKey::MinDpIntrahost, ParamValue::Integer(n)) => self.min_dp_intrahost = n,
            (ParamKey::TrimLen, ParamValue::Integer(n)) => self.trim_len = n,
            (ParamKey::RefGenomeCode, ParamValue::Text(s)) => self.ref_genome_code = Some(s),
            (ParamKey::ReferenceGff, ParamValue::Text(s)) => self.reference_gff = Some(s),
            (ParamKey::ReferenceGenome, ParamValue::Text(s)) => self.reference_genome = Some(s),
            (ParamKey::NextflowSimCalls, ParamValue::Text(s)) => self.nextflow_sim_calls = s,
            (ParamKey::FastpThreads, ParamValue::Integer(n)) => self.fastp_threads = n,
            (ParamKey::BwaThreads, ParamValue::Integer(n)) => self.bwa_threads = n,
            (ParamKey::Dedup, ParamValue::Flag(b)) => self.dedup = b,
            (ParamKey::Ndedup, ParamValue::Integer(n)) => self.ndedup = Some(n),
            _ => return false,
        }
        true
    }

    /// Edits one field from its textual form, as typed by a user.
    pub fn set_field(&mut self, name: &str, raw: &str) -> Result<()> {
        let key = ParamKey::from_name(name).ok_or_else(|| {
            ViralflowError::new(ErrorCode::NotFound, format!("Unknown parameter '{name}'"))
        })?;
        let value = key.parse_value(raw).ok_or_else(|| {
            ViralflowError::invalid_input(format!(
                "Invalid value '{raw}' for '{key}', expected {}",
                key.kind().expected()
            ))
        })?;
        self.assign(key, value);
        Ok(())
    }

    /// Returns a copy of `self` with every key of `patch` applied on top.
    pub fn merged_with(&self, patch: &ParamsPatch) -> Self {
        let mut ret = self.clone();
        for (key, value) in patch.iter() {
            ret.assign(*key, value.clone());
        }
        ret
    }
}

/// The keys successfully decoded from a parameter file, and nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamsPatch {
    values: BTreeMap<ParamKey, ParamValue>,
}

impl ParamsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `raw` for `key` and keeps it when acceptable.
    pub fn insert_raw(&mut self, key: ParamKey, raw: &str) -> bool {
        match key.parse_value(raw) {
            Some(value) => {
                self.values.insert(key, value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: ParamKey) -> Option<&ParamValue> {
        self.values.get(&key)
    }

    pub fn contains(&self, key: ParamKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, &ParamValue)> {
        self.values.iter()
    }

    /// Fills in every missing field from [`ParameterSet::defaults`].
    pub fn over_defaults(&self) -> ParameterSet {
        ParameterSet::defaults().merged_with(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let p = ParameterSet::defaults();
        assert_eq!(p.virus, VirusMode::SarsCov2);
        assert_eq!(p.out_dir, "launchDir/output/");
        assert_eq!(p.in_dir, "launchDir/input/");
        assert_eq!(p.min_len, 75);
        assert_eq!(p.min_dp_intrahost, 100);
        assert_eq!(p.ndedup, Some(3));
        assert!(p.run_snp_eff && p.write_mapped_reads && !p.dedup);
    }

    #[test]
    fn test_normalize_strips_custom_fields_and_ndedup() {
        let p = ParameterSet::defaults().normalized();
        assert_eq!(p.ref_genome_code, None);
        assert_eq!(p.reference_gff, None);
        assert_eq!(p.reference_genome, None);
        assert_eq!(p.ndedup, None);
    }

    #[test]
    fn test_normalize_keeps_applicable_fields() {
        let mut p = ParameterSet::defaults();
        p.virus = VirusMode::Custom;
        p.dedup = true;
        p.ref_genome_code = Some("NC_045512".to_string());
        let n = p.normalized();
        assert_eq!(n.ref_genome_code.as_deref(), Some("NC_045512"));
        assert_eq!(n.reference_gff.as_deref(), Some(""));
        assert_eq!(n.ndedup, Some(3));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut p = ParameterSet::defaults();
        p.dedup = true;
        for mode in [VirusMode::SarsCov2, VirusMode::Custom] {
            p.virus = mode;
            let once = p.normalized();
            assert_eq!(once.normalized(), once);
        }
    }

    #[test]
    fn test_set_field_parses_typed_values() {
        let mut p = ParameterSet::defaults();
        p.set_field("virus", "custom").unwrap();
        p.set_field("minLen", "50").unwrap();
        p.set_field("dedup", "true").unwrap();
        p.set_field("referenceGFF", "/data/ref.gff").unwrap();
        assert_eq!(p.virus, VirusMode::Custom);
        assert_eq!(p.min_len, 50);
        assert!(p.dedup);
        assert_eq!(p.reference_gff.as_deref(), Some("/data/ref.gff"));
    }

    #[test]
    fn test_set_field_rejects_bad_values() {
        let mut p = ParameterSet::defaults();
        let err = p.set_field("depth", "deep").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        let err = p.set_field("runSnpEff", "yes").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        let err = p.set_field("foo", "bar").unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(p, ParameterSet::defaults());
    }

    #[test]
    fn test_set_field_rejects_multiline_text() {
        let mut p = ParameterSet::defaults();
        let err = p.set_field("outDir", "/runs\nvirus custom").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        let err = p.set_field("primersBED", "a.bed\rdepth 1").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert_eq!(p, ParameterSet::defaults());
        p.set_field("outDir", "/runs/with space").unwrap();
        assert_eq!(p.out_dir, "/runs/with space");
    }

    #[test]
    fn test_integer_parser_accepts_integral_decimals_only() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("-3"), Some(-3));
        assert_eq!(parse_integer("75.0"), Some(75));
        assert_eq!(parse_integer("1e2"), Some(100));
        assert_eq!(parse_integer("7.5"), None);
        assert_eq!(parse_integer("NaN"), None);
        assert_eq!(parse_integer("many"), None);
    }

    #[test]
    fn test_store_json_uses_original_field_names() {
        let json = serde_json::to_value(ParameterSet::defaults()).unwrap();
        assert_eq!(json["virus"], "sars-cov2");
        assert_eq!(json["primersBED"], "");
        assert_eq!(json["mapping_quality"], 30);
        assert_eq!(json["referenceGFF"], "");
        let stripped = serde_json::to_value(ParameterSet::defaults().normalized()).unwrap();
        assert!(stripped.get("ndedup").is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let p: ParameterSet =
            serde_json::from_str(r#"{ "virus": "custom", "depth": 12 }"#).unwrap();
        assert_eq!(p.virus, VirusMode::Custom);
        assert_eq!(p.depth, 12);
        assert_eq!(p.min_len, 75);
        assert_eq!(p.ndedup, Some(3));
    }
}
