//! Populate one column from a keyed lookup table, falling back to a second
//! table keyed by another column (e.g. issuer homepage when a card has no
//! dedicated application link).

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::{
    cli::FillArgs,
    columns::{self, ColumnPosition},
    dataset::Dataset,
    error::TransformError,
    pipeline,
    rules::{self, CellValue, DEFAULT_KEY_COLUMN},
};

fn default_overwrite() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fallback {
    pub column: String,
    #[serde(default)]
    pub values: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FillRules {
    #[serde(default)]
    pub key_column: Option<String>,
    pub column: String,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<String, CellValue>,
    #[serde(default)]
    pub fallback: Option<Fallback>,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

impl FillRules {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            key_column: None,
            column: column.into(),
            after: None,
            before: None,
            values: BTreeMap::new(),
            fallback: None,
            overwrite: true,
        }
    }

    pub fn position(&self) -> ColumnPosition {
        ColumnPosition::from_anchors(self.after.as_deref(), self.before.as_deref())
    }

    pub fn key_column(&self) -> &str {
        self.key_column.as_deref().unwrap_or(DEFAULT_KEY_COLUMN)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillSummary {
    pub column_added: bool,
    pub from_table: usize,
    pub from_fallback: usize,
    pub kept: usize,
    pub unresolved: usize,
    pub cells_changed: usize,
    pub unknown_keys: Vec<String>,
}

pub fn execute(args: &FillArgs) -> Result<()> {
    let fill: FillRules = rules::load_rules(&args.rules)?;
    info!(
        "Filling '{}' from {} keyed value(s) in {:?}",
        fill.column,
        fill.values.len(),
        args.rules
    );
    pipeline::rewrite(&args.dataset, |dataset| {
        let summary = apply_fill(dataset, &fill, args.strict)
            .with_context(|| format!("Applying fill rules from {:?}", args.rules))?;
        info!(
            "'{}': {} from table, {} from fallback, {} kept, {} unresolved ({} cell(s) changed)",
            fill.column,
            summary.from_table,
            summary.from_fallback,
            summary.kept,
            summary.unresolved,
            summary.cells_changed
        );
        Ok(())
    })
}

fn trimmed_table(values: &BTreeMap<String, CellValue>) -> HashMap<&str, &str> {
    values
        .iter()
        .map(|(key, value)| (key.trim(), value.as_str()))
        .collect()
}

pub fn apply_fill(
    dataset: &mut Dataset,
    fill: &FillRules,
    strict: bool,
) -> Result<FillSummary, TransformError> {
    let key_idx = dataset.require_column(fill.key_column())?;

    let mut unknown_keys = Vec::new();
    for key in fill.values.keys() {
        if !dataset.rows_with_key(key_idx, key).is_empty() {
            continue;
        }
        if strict {
            return Err(TransformError::UnknownKey {
                key: key.clone(),
                key_column: fill.key_column().to_string(),
            });
        }
        warn!("No row has {} '{key}'; fill value skipped", fill.key_column());
        unknown_keys.push(key.clone());
    }

    let fallback = match &fill.fallback {
        Some(fallback) => match dataset.column_index(&fallback.column) {
            Some(_) => Some(fallback),
            None if strict => return Err(TransformError::MissingColumn(fallback.column.clone())),
            None => {
                warn!(
                    "Fallback column '{}' not found; only the keyed table applies",
                    fallback.column
                );
                None
            }
        },
        None => None,
    };

    let mut summary = FillSummary {
        unknown_keys,
        ..FillSummary::default()
    };
    if dataset.column_index(&fill.column).is_none() {
        columns::add_columns(
            dataset,
            std::slice::from_ref(&fill.column),
            &fill.position(),
            "",
        );
        summary.column_added = true;
    }
    let target_idx = dataset.require_column(&fill.column)?;
    let fallback_idx = match fallback {
        Some(fallback) => Some(dataset.require_column(&fallback.column)?),
        None => None,
    };

    let table = trimmed_table(&fill.values);
    let fallback_table = fallback.map(|f| trimmed_table(&f.values)).unwrap_or_default();

    for row in 0..dataset.row_count() {
        let key = dataset.cell(row, key_idx).trim();
        let resolved = match table.get(key) {
            Some(value) => Some((*value, false)),
            None => fallback_idx
                .and_then(|idx| fallback_table.get(dataset.cell(row, idx).trim()))
                .map(|value| (*value, true)),
        };
        let Some((value, via_fallback)) = resolved else {
            debug!("Row {}: no value for '{key}'", row + 2);
            summary.unresolved += 1;
            continue;
        };
        if !fill.overwrite && !dataset.cell(row, target_idx).is_empty() {
            summary.kept += 1;
            continue;
        }
        if via_fallback {
            summary.from_fallback += 1;
        } else {
            summary.from_table += 1;
        }
        if dataset.set_cell(row, target_idx, value) {
            summary.cells_changed += 1;
        }
    }
    Ok(summary)
}
