//! Loading of update and fill tables from YAML or JSON files.
//!
//! Files ending in `.json` go through `serde_json`; everything else is read
//! as YAML. Cell values may be written as plain scalars (`3`, `true`, `1.5`)
//! and are stored as the text they would occupy in the CSV.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, de};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::io_utils;

pub const DEFAULT_KEY_COLUMN: &str = "card_name";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CellValue(pub String);

impl CellValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue(value.to_string())
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match JsonValue::deserialize(deserializer)? {
            JsonValue::String(s) => Ok(CellValue(s)),
            JsonValue::Number(n) => Ok(CellValue(n.to_string())),
            JsonValue::Bool(b) => Ok(CellValue(b.to_string())),
            JsonValue::Null => Ok(CellValue(String::new())),
            other => Err(de::Error::custom(format!(
                "expected a scalar cell value, found {other}"
            ))),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn parse_rules<T: DeserializeOwned>(raw: &str, json: bool) -> Result<T> {
    if json {
        serde_json::from_str(raw).context("Parsing JSON rules")
    } else {
        serde_yaml::from_str(raw).context("Parsing YAML rules")
    }
}

pub fn load_rules<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = io_utils::read_to_string(path)?;
    parse_rules(&raw, is_json(path)).with_context(|| format!("Loading rules from {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn scalars_become_cell_text() {
        let parsed: BTreeMap<String, CellValue> =
            parse_rules("a: 3\nb: true\nc: \"$500\"\nd: 1.5\ne: ~\n", false).unwrap();
        assert_eq!(parsed["a"].as_str(), "3");
        assert_eq!(parsed["b"].as_str(), "true");
        assert_eq!(parsed["c"].as_str(), "$500");
        assert_eq!(parsed["d"].as_str(), "1.5");
        assert_eq!(parsed["e"].as_str(), "");
    }

    #[test]
    fn nested_values_are_rejected() {
        let parsed: Result<BTreeMap<String, CellValue>> = parse_rules("{\"a\": [1, 2]}", true);
        assert!(parsed.is_err());
    }
}
