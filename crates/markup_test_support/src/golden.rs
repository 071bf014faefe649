//! Golden case files: TOML (or JSON) lists of operations with their
//! expected rendering.

use std::fs;
use std::path::Path;

use serde::Deserialize;

pub const GOLDEN_FORMAT_V1: &str = "markup-golden-v1";

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Text,
    Bytes,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GoldenOp {
    Quote,
    Concat,
    Radd,
    Join,
    Repeat,
    Format,
}

/// One operand. Byte strings use `\xNN` escapes.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FixtureArg {
    Text(String),
    Bytes(String),
    SafeText(String),
    SafeBytes(String),
    Int(i64),
    Float(f64),
    None(bool),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct GoldenCase {
    pub id: String,
    pub op: GoldenOp,
    /// Flavor of the safe operand (template, separator, left side).
    pub flavor: Flavor,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub args: Vec<FixtureArg>,
    /// `format`: pass `args` as a tuple rather than a single value.
    #[serde(default)]
    pub tuple: bool,
    #[serde(default)]
    pub count: usize,
    /// `quote`: explicit text preference.
    #[serde(default)]
    pub prefer_text: Option<bool>,
    pub expect: String,
    pub expect_flavor: Flavor,
}

#[derive(Clone, Debug, Deserialize)]
struct GoldenFile {
    format: String,
    #[serde(rename = "case")]
    cases: Vec<GoldenCase>,
}

/// Load and validate a golden file; panics with the path on any problem.
pub fn load_golden(path: &Path) -> Vec<GoldenCase> {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read golden file {path:?}: {err}"));
    let file: GoldenFile = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .unwrap_or_else(|err| panic!("failed to parse golden JSON {path:?}: {err}")),
        _ => toml::from_str(&content)
            .unwrap_or_else(|err| panic!("failed to parse golden TOML {path:?}: {err}")),
    };
    assert_eq!(
        file.format, GOLDEN_FORMAT_V1,
        "unsupported golden format in {path:?}"
    );
    assert!(!file.cases.is_empty(), "golden file {path:?} has no cases");

    let mut ids: Vec<&str> = file.cases.iter().map(|c| c.id.as_str()).collect();
    ids.sort_unstable();
    if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
        panic!("duplicate golden case id in {path:?}: {}", pair[0]);
    }
    file.cases
}
