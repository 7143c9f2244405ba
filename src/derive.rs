use anyhow::{Context, Result};
use log::{info, warn};
use rust_decimal::Decimal;

use crate::{
    amount::{self, DEFAULT_RATIO_PLACES},
    cli::DeriveArgs,
    dataset::Dataset,
    error::TransformError,
    pipeline,
};

pub const DEFAULT_RATIO_COLUMN: &str = "bonus_to_spend_ratio";
pub const DEFAULT_NUMERATOR_COLUMN: &str = "estimated_bonus_value_usd";
pub const DEFAULT_DENOMINATOR_COLUMN: &str = "minimum_spend_amount";

/// `name = numerator / denominator`, written with a fixed number of places
/// and left blank whenever the denominator is not positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioColumn {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
    pub places: u32,
}

impl Default for RatioColumn {
    fn default() -> Self {
        Self {
            name: DEFAULT_RATIO_COLUMN.to_string(),
            numerator: DEFAULT_NUMERATOR_COLUMN.to_string(),
            denominator: DEFAULT_DENOMINATOR_COLUMN.to_string(),
            places: DEFAULT_RATIO_PLACES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeriveSummary {
    pub inserted: bool,
    pub computed: usize,
    pub blank: usize,
    pub overflowed: usize,
    pub changed: usize,
}

impl RatioColumn {
    /// Unrounded ratio for a pair of raw cells.
    pub fn expected(&self, numerator: &str, denominator: &str) -> Option<Decimal> {
        amount::ratio(
            amount::parse_amount(numerator),
            amount::parse_amount(denominator),
        )
    }

    pub fn render(&self, numerator: &str, denominator: &str) -> String {
        self.expected(numerator, denominator)
            .map(|value| amount::format_ratio(value, self.places))
            .unwrap_or_default()
    }

    pub fn apply(&self, dataset: &mut Dataset) -> Result<DeriveSummary, TransformError> {
        dataset.require_column(&self.numerator)?;
        let denominator_idx = dataset.require_column(&self.denominator)?;

        let mut summary = DeriveSummary::default();
        if dataset.column_index(&self.name).is_none() {
            dataset.insert_column(denominator_idx + 1, &self.name, "");
            summary.inserted = true;
        }
        let target = dataset.require_column(&self.name)?;
        let numerator = dataset.require_column(&self.numerator)?;
        let denominator = dataset.require_column(&self.denominator)?;

        for row in 0..dataset.row_count() {
            let num = amount::parse_amount(dataset.cell(row, numerator));
            let den = amount::parse_amount(dataset.cell(row, denominator));
            let value = match amount::ratio(num, den) {
                Some(value) => {
                    summary.computed += 1;
                    amount::format_ratio(value, self.places)
                }
                None if den > Decimal::ZERO => {
                    warn!(
                        "Row {}: {} / {} overflows; '{}' left blank",
                        row + 2,
                        self.numerator,
                        self.denominator,
                        self.name
                    );
                    summary.overflowed += 1;
                    summary.blank += 1;
                    String::new()
                }
                None => {
                    summary.blank += 1;
                    String::new()
                }
            };
            if dataset.set_cell(row, target, &value) {
                summary.changed += 1;
            }
        }
        Ok(summary)
    }
}

pub fn execute(args: &DeriveArgs) -> Result<()> {
    let column = RatioColumn {
        name: args.name.clone(),
        numerator: args.numerator.clone(),
        denominator: args.denominator.clone(),
        places: args.places,
    };
    pipeline::rewrite(&args.dataset, |dataset| {
        let summary = column
            .apply(dataset)
            .with_context(|| format!("Deriving '{}'", column.name))?;
        let placement = if summary.inserted {
            format!("added after '{}'", column.denominator)
        } else {
            "recomputed in place".to_string()
        };
        info!(
            "'{}' = {} / {} {placement}: {} computed, {} blank ({} overflowed), {} changed",
            column.name,
            column.numerator,
            column.denominator,
            summary.computed,
            summary.blank,
            summary.overflowed,
            summary.changed
        );
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflowing_ratio_is_counted_and_left_blank() {
        let text = "card_name,estimated_bonus_value_usd,minimum_spend_amount\n\
Huge,79228162514264337593543950335,0.0000000001\n\
X,150,$500\n";
        let mut dataset = Dataset::parse(text, b',').unwrap();
        let summary = RatioColumn::default().apply(&mut dataset).unwrap();
        assert_eq!(summary.overflowed, 1);
        assert_eq!(summary.blank, 1);
        assert_eq!(summary.computed, 1);
        assert_eq!(dataset.cell(0, 3), "");
        assert_eq!(dataset.cell(1, 3), "0.3000");
    }

    #[test]
    fn ratio_column_lands_after_denominator() {
        let text = "card_name,estimated_bonus_value_usd,minimum_spend_amount,annual_fee\n\
X,150,$500,0\n\
Y,750,\"$6,000\",95\n\
Z,200,,0\n\
W,junk,$1000,0\n";
        let mut dataset = Dataset::parse(text, b',').unwrap();
        let summary = RatioColumn::default().apply(&mut dataset).unwrap();
        assert!(summary.inserted);
        assert_eq!(dataset.headers()[3], "bonus_to_spend_ratio");
        assert_eq!(dataset.headers()[4], "annual_fee");
        let ratios: Vec<&str> = (0..4).map(|row| dataset.cell(row, 3)).collect();
        assert_eq!(ratios, vec!["0.3000", "0.1250", "", "0.0000"]);
        assert_eq!(summary.computed, 3);
        assert_eq!(summary.blank, 1);
    }

    #[test]
    fn rerun_recomputes_without_moving_the_column() {
        let text = "card_name,minimum_spend_amount,bonus_to_spend_ratio,estimated_bonus_value_usd\n\
X,$500,0.9999,150\n";
        let mut dataset = Dataset::parse(text, b',').unwrap();
        let column = RatioColumn::default();
        let first = column.apply(&mut dataset).unwrap();
        assert!(!first.inserted);
        assert_eq!(first.changed, 1);
        assert_eq!(dataset.cell(0, 2), "0.3000");
        let headers = dataset.headers().to_vec();
        let second = column.apply(&mut dataset).unwrap();
        assert_eq!(second.changed, 0);
        assert_eq!(dataset.headers(), headers.as_slice());
    }

    #[test]
    fn missing_source_column_is_reported() {
        let mut dataset = Dataset::parse("card_name,minimum_spend_amount\nX,$500\n", b',').unwrap();
        let err = RatioColumn::default().apply(&mut dataset).unwrap_err();
        assert_eq!(
            err,
            TransformError::MissingColumn("estimated_bonus_value_usd".into())
        );
        assert_eq!(dataset.headers().len(), 2);
    }

    #[test]
    fn custom_precision() {
        let column = RatioColumn {
            places: 2,
            ..RatioColumn::default()
        };
        assert_eq!(column.render("1", "3"), "0.33");
        assert_eq!(column.render("1", "-3"), "");
    }
}
