//! Keyed record patches: overwrite named cells of the rows whose key matches.
//!
//! Rules are validated against the dataset before any cell is touched, so a
//! strict-mode failure leaves the dataset exactly as it was loaded.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{debug, info, warn};
use serde::Deserialize;

use crate::{
    cli::PatchArgs,
    dataset::Dataset,
    error::TransformError,
    pipeline,
    rules::{self, CellValue, DEFAULT_KEY_COLUMN},
};

/// What to do when a rule key matches more than one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum DuplicateKeyPolicy {
    #[default]
    Reject,
    First,
    Last,
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub key_column: Option<String>,
    #[serde(default)]
    pub updates: BTreeMap<String, BTreeMap<String, CellValue>>,
}

impl RuleSet {
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn insert<K, C, V>(&mut self, key: K, column: C, value: V)
    where
        K: Into<String>,
        C: Into<String>,
        V: Into<String>,
    {
        self.updates
            .entry(key.into())
            .or_default()
            .insert(column.into(), CellValue(value.into()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOptions {
    pub key_column: String,
    pub strict: bool,
    pub duplicates: DuplicateKeyPolicy,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            strict: false,
            duplicates: DuplicateKeyPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub rules: usize,
    pub rows_matched: usize,
    pub cells_changed: usize,
    pub unknown_keys: Vec<String>,
    pub unknown_columns: Vec<String>,
}

struct PlannedPatch<'r> {
    rows: Vec<usize>,
    cells: Vec<(usize, &'r str)>,
}

pub fn execute(args: &PatchArgs) -> Result<()> {
    let rule_set: RuleSet = rules::load_rules(&args.rules)?;
    let options = PatchOptions {
        key_column: args
            .key
            .clone()
            .or_else(|| rule_set.key_column.clone())
            .unwrap_or_else(|| DEFAULT_KEY_COLUMN.to_string()),
        strict: args.strict,
        duplicates: args.duplicates,
    };
    info!(
        "Applying {} update rule(s) from {:?} keyed on '{}'",
        rule_set.len(),
        args.rules,
        options.key_column
    );
    pipeline::rewrite(&args.dataset, |dataset| {
        let summary = apply_updates(dataset, &rule_set, &options)
            .with_context(|| format!("Applying rules from {:?}", args.rules))?;
        info!(
            "Updated {} row(s), {} cell(s) changed, {} of {} rule(s) unmatched",
            summary.rows_matched,
            summary.cells_changed,
            summary.unknown_keys.len(),
            summary.rules
        );
        Ok(())
    })
}

pub fn apply_updates(
    dataset: &mut Dataset,
    rule_set: &RuleSet,
    options: &PatchOptions,
) -> Result<PatchSummary, TransformError> {
    let key_idx = dataset.require_column(&options.key_column)?;
    let mut summary = PatchSummary {
        rules: rule_set.len(),
        ..PatchSummary::default()
    };

    let mut plan = Vec::with_capacity(rule_set.len());
    for (key, columns) in &rule_set.updates {
        let matches = dataset.rows_with_key(key_idx, key);
        let rows = match matches.len() {
            0 => {
                if options.strict {
                    return Err(TransformError::UnknownKey {
                        key: key.clone(),
                        key_column: options.key_column.clone(),
                    });
                }
                warn!("No row has {} '{key}'; rule skipped", options.key_column);
                summary.unknown_keys.push(key.clone());
                Vec::new()
            }
            1 => matches,
            count => select_duplicates(key, matches, count, options.duplicates)?,
        };

        let mut cells = Vec::with_capacity(columns.len());
        for (column, value) in columns {
            match dataset.column_index(column) {
                Some(idx) => cells.push((idx, value.as_str())),
                None if options.strict => {
                    return Err(TransformError::UnknownColumn {
                        key: key.clone(),
                        column: column.clone(),
                    });
                }
                None => {
                    warn!("Rule for '{key}' names unknown column '{column}'; value ignored");
                    if !summary.unknown_columns.contains(column) {
                        summary.unknown_columns.push(column.clone());
                    }
                }
            }
        }
        plan.push(PlannedPatch { rows, cells });
    }

    for patch in plan {
        for row in patch.rows {
            summary.rows_matched += 1;
            for (column, value) in &patch.cells {
                if dataset.set_cell(row, *column, value) {
                    summary.cells_changed += 1;
                    debug!(
                        "Row {}: '{}' set to {:?}",
                        row + 2,
                        dataset.headers()[*column],
                        value
                    );
                }
            }
        }
    }
    Ok(summary)
}

fn select_duplicates(
    key: &str,
    matches: Vec<usize>,
    count: usize,
    policy: DuplicateKeyPolicy,
) -> Result<Vec<usize>, TransformError> {
    match policy {
        DuplicateKeyPolicy::Reject => Err(TransformError::DuplicateKey {
            key: key.to_string(),
            count,
        }),
        DuplicateKeyPolicy::First => {
            warn!("Key '{key}' matches {count} rows; patching the first");
            Ok(matches.into_iter().take(1).collect())
        }
        DuplicateKeyPolicy::Last => {
            warn!("Key '{key}' matches {count} rows; patching the last");
            Ok(matches.into_iter().last().into_iter().collect())
        }
        DuplicateKeyPolicy::All => {
            warn!("Key '{key}' matches {count} rows; patching all of them");
            Ok(matches)
        }
    }
}
