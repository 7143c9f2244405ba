//! Header evolution: adding columns next to an anchor and dropping columns.
//!
//! Both operations are rerun-safe. Adding a column that already exists does
//! nothing, and removing one that is already gone only logs.

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    cli::{AddColumnArgs, RemoveColumnArgs},
    dataset::Dataset,
    error::TransformError,
    pipeline,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    After(String),
    Before(String),
    End,
}

impl ColumnPosition {
    pub fn from_anchors(after: Option<&str>, before: Option<&str>) -> Self {
        match (after, before) {
            (Some(anchor), _) => ColumnPosition::After(anchor.to_string()),
            (None, Some(anchor)) => ColumnPosition::Before(anchor.to_string()),
            (None, None) => ColumnPosition::End,
        }
    }

    /// Header index where the first new column lands. A missing anchor
    /// falls back to appending.
    pub fn resolve(&self, dataset: &Dataset) -> usize {
        let end = dataset.headers().len();
        match self {
            ColumnPosition::After(anchor) => match dataset.column_index(anchor) {
                Some(idx) => idx + 1,
                None => {
                    warn!("Anchor column '{anchor}' not found; appending at the end");
                    end
                }
            },
            ColumnPosition::Before(anchor) => match dataset.column_index(anchor) {
                Some(idx) => idx,
                None => {
                    warn!("Anchor column '{anchor}' not found; appending at the end");
                    end
                }
            },
            ColumnPosition::End => end,
        }
    }
}

/// Inserts each missing name, in order, at `position`. Returns the names that
/// were actually added.
pub fn add_columns(
    dataset: &mut Dataset,
    names: &[String],
    position: &ColumnPosition,
    fill: &str,
) -> Vec<String> {
    let pending = names
        .iter()
        .filter(|name| {
            let present = dataset.column_index(name).is_some();
            if present {
                debug!("Column '{name}' already present; leaving it in place");
            }
            !present
        })
        .fold(Vec::<&String>::new(), |mut acc, name| {
            if !acc.contains(&name) {
                acc.push(name);
            }
            acc
        });
    if pending.is_empty() {
        return Vec::new();
    }

    let mut at = position.resolve(dataset);
    let mut added = Vec::with_capacity(pending.len());
    for name in pending {
        dataset.insert_column(at, name, fill);
        at += 1;
        added.push(name.clone());
    }
    info!("Added column(s) {added:?} at position {}", at - added.len());
    added
}

/// Drops every named column present in the header. In strict mode a name that
/// is not present fails the whole call before anything is removed.
pub fn remove_columns(
    dataset: &mut Dataset,
    names: &[String],
    strict: bool,
) -> Result<Vec<String>, TransformError> {
    if strict {
        if let Some(missing) = names.iter().find(|name| dataset.column_index(name).is_none()) {
            return Err(TransformError::MissingColumn(missing.clone()));
        }
    }
    let mut removed = Vec::new();
    for name in names {
        match dataset.column_index(name) {
            Some(idx) => {
                if let Some(header) = dataset.remove_column(idx) {
                    removed.push(header);
                }
            }
            None => warn!("Column '{name}' not present; nothing to remove"),
        }
    }
    Ok(removed)
}

pub fn execute_add(args: &AddColumnArgs) -> Result<()> {
    let position = ColumnPosition::from_anchors(args.after.as_deref(), args.before.as_deref());
    pipeline::rewrite(&args.dataset, |dataset| {
        let added = add_columns(dataset, &args.columns, &position, &args.value);
        if added.is_empty() {
            info!("All requested column(s) already present; header unchanged");
        }
        Ok(())
    })
}

pub fn execute_remove(args: &RemoveColumnArgs) -> Result<()> {
    pipeline::rewrite(&args.dataset, |dataset| {
        let removed = remove_columns(dataset, &args.columns, args.strict)
            .context("Removing columns")?;
        info!("Removed {} column(s): {removed:?}", removed.len());
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::parse(
            "card_name,issuer,application_link,bank_rules\nAmex Gold,Amex,https://a,rule\n",
            b',',
        )
        .unwrap()
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn new_columns_follow_anchor_in_order() {
        let mut dataset = sample();
        let added = add_columns(
            &mut dataset,
            &names(&["ftf", "lounge"]),
            &ColumnPosition::After("application_link".into()),
            "",
        );
        assert_eq!(added, names(&["ftf", "lounge"]));
        assert_eq!(
            dataset.headers(),
            names(&["card_name", "issuer", "application_link", "ftf", "lounge", "bank_rules"])
        );
        assert_eq!(dataset.rows()[0][3], "");
        assert_eq!(dataset.rows()[0][5], "rule");
    }

    #[test]
    fn before_anchor_places_columns_ahead_of_it() {
        let mut dataset = sample();
        add_columns(
            &mut dataset,
            &names(&["notes"]),
            &ColumnPosition::Before("issuer".into()),
            "n/a",
        );
        assert_eq!(dataset.headers()[1], "notes");
        assert_eq!(dataset.rows()[0][1], "n/a");
    }

    #[test]
    fn missing_anchor_appends() {
        let mut dataset = sample();
        add_columns(
            &mut dataset,
            &names(&["ftf"]),
            &ColumnPosition::After("nope".into()),
            "",
        );
        assert_eq!(dataset.headers().last().map(String::as_str), Some("ftf"));
    }

    #[test]
    fn adding_twice_is_a_no_op() {
        let mut dataset = sample();
        let position = ColumnPosition::After("issuer".into());
        add_columns(&mut dataset, &names(&["ftf", "ftf"]), &position, "");
        let first = dataset.clone();
        let added = add_columns(&mut dataset, &names(&["ftf"]), &position, "");
        assert!(added.is_empty());
        assert_eq!(dataset, first);
        assert_eq!(dataset.headers().iter().filter(|h| *h == "ftf").count(), 1);
    }

    #[test]
    fn remove_drops_values_from_every_row() {
        let mut dataset = sample();
        let removed = remove_columns(&mut dataset, &names(&["bank_rules", "gone"]), false).unwrap();
        assert_eq!(removed, names(&["bank_rules"]));
        assert_eq!(dataset.rows()[0].len(), 3);
        assert_eq!(dataset.row_count(), 1);
    }

    #[test]
    fn strict_remove_rejects_unknown_column() {
        let mut dataset = sample();
        let err = remove_columns(&mut dataset, &names(&["bank_rules", "gone"]), true).unwrap_err();
        assert_eq!(err, TransformError::MissingColumn("gone".into()));
        assert!(dataset.column_index("bank_rules").is_some());
    }
}
