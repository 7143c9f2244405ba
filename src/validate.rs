//! Read-only consistency check of the derived ratio column.
//!
//! Every row's ratio is recomputed from its source columns and compared with
//! the stored cell. Denominator amounts shared by many rows are listed too,
//! since identical minimum-spend figures across unrelated cards usually mean
//! a value was copied from the wrong row.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use log::info;
use rust_decimal::Decimal;

use crate::{
    amount,
    cli::ValidateArgs,
    dataset::Dataset,
    derive::RatioColumn,
    error::TransformError,
    io_utils,
    rules::DEFAULT_KEY_COLUMN,
    table::{Align, TextTable},
};

pub const DEFAULT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);
pub const DEFAULT_HIGH_RATIO: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
pub const DEFAULT_REPEAT_LIMIT: usize = 4;

const BANNER_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOptions {
    pub key_column: String,
    pub ratio: RatioColumn,
    pub tolerance: Decimal,
    pub high_ratio: Decimal,
    pub repeat_limit: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            ratio: RatioColumn::default(),
            tolerance: DEFAULT_TOLERANCE,
            high_ratio: DEFAULT_HIGH_RATIO,
            repeat_limit: DEFAULT_REPEAT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    /// Stored ratio disagrees with the recomputed one, or a ratio is stored
    /// where the denominator is not positive.
    RatioMismatch,
    /// Denominator is positive but the stored cell is empty or not a number.
    RatioMissing,
    HighRatio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFinding {
    /// 1-based line number in the file, header included.
    pub line: usize,
    pub key: String,
    pub kind: FindingKind,
    pub stored: Option<Decimal>,
    pub expected: Option<Decimal>,
    pub numerator: Decimal,
    pub denominator: Decimal,
}

impl RowFinding {
    pub fn detail(&self) -> String {
        match (self.kind, self.expected, self.stored) {
            (FindingKind::RatioMismatch, None, Some(stored)) => format!(
                "{} is not positive but ratio is {}",
                amount::format_amount(self.denominator),
                amount::format_ratio(stored, 4)
            ),
            (FindingKind::RatioMismatch, Some(expected), Some(stored)) => format!(
                "stored {} vs expected {}",
                amount::format_ratio(stored, 4),
                amount::format_ratio(expected, 4)
            ),
            (FindingKind::RatioMissing, Some(expected), _) => {
                format!("expected {}", amount::format_ratio(expected, 4))
            }
            (_, _, stored) => format!(
                "ratio {} ({} / {})",
                stored
                    .map(|s| amount::format_ratio(s, 2))
                    .unwrap_or_default(),
                amount::format_amount(self.numerator),
                amount::format_amount(self.denominator)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatedAmount {
    pub amount: Decimal,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub total_rows: usize,
    pub findings: Vec<RowFinding>,
    pub repeated: Vec<RepeatedAmount>,
    pub options: ValidationOptions,
}

impl ValidationReport {
    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &RowFinding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    pub fn issue_count(&self) -> usize {
        self.findings.len() + self.repeated.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }

    pub fn render(&self) -> String {
        let banner = "=".repeat(BANNER_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out, "{banner}");
        let _ = writeln!(out, "CARD OFFER VALIDATION");
        let _ = writeln!(out, "{banner}");

        self.render_findings(
            &mut out,
            FindingKind::RatioMismatch,
            "RATIO MISMATCHES:".to_string(),
            Some("No ratio mismatches."),
        );
        self.render_findings(
            &mut out,
            FindingKind::RatioMissing,
            "RATIO MISSING:".to_string(),
            None,
        );
        self.render_findings(
            &mut out,
            FindingKind::HighRatio,
            format!("HIGH RATIO (>{}):", self.options.high_ratio.normalize()),
            None,
        );

        if !self.repeated.is_empty() {
            let _ = writeln!(
                out,
                "\nSAME {} ON {}+ ROWS:",
                self.options.ratio.denominator.to_uppercase(),
                self.options.repeat_limit + 1
            );
            let mut table = TextTable::new(["amount", "rows", self.options.key_column.as_str()])
                .align(0, Align::Right)
                .align(1, Align::Right);
            for repeated in &self.repeated {
                table.push_row(vec![
                    amount::format_amount(repeated.amount),
                    repeated.keys.len().to_string(),
                    repeated.keys.join("; "),
                ]);
            }
            out.push_str(&table.render());
        }

        let _ = writeln!(out, "\nTotal rows: {}", self.total_rows);
        let _ = writeln!(out, "{banner}");
        out
    }

    fn render_findings(
        &self,
        out: &mut String,
        kind: FindingKind,
        title: String,
        when_empty: Option<&str>,
    ) {
        let mut table = TextTable::new(["line", self.options.key_column.as_str(), "detail"])
            .align(0, Align::Right);
        for finding in self.of_kind(kind) {
            table.push_row(vec![
                finding.line.to_string(),
                finding.key.clone(),
                finding.detail(),
            ]);
        }
        if table.is_empty() {
            if let Some(message) = when_empty {
                let _ = writeln!(out, "\n{message}");
            }
            return;
        }
        let _ = writeln!(out, "\n{title}");
        out.push_str(&table.render());
    }
}

pub fn validate(
    dataset: &Dataset,
    options: &ValidationOptions,
) -> Result<ValidationReport, TransformError> {
    let key_idx = dataset.require_column(&options.key_column)?;
    let numerator_idx = dataset.require_column(&options.ratio.numerator)?;
    let denominator_idx = dataset.require_column(&options.ratio.denominator)?;
    let ratio_idx = dataset.require_column(&options.ratio.name)?;

    let mut findings = Vec::new();
    let mut amounts = Vec::new();
    for (row, values) in dataset.rows().iter().enumerate() {
        let key = values[key_idx].trim().to_string();
        let numerator = amount::parse_amount(&values[numerator_idx]);
        let denominator = amount::parse_amount(&values[denominator_idx]);
        let stored = amount::parse_ratio(&values[ratio_idx]);
        let expected = amount::ratio(numerator, denominator);
        if denominator > Decimal::ZERO {
            amounts.push((denominator.normalize(), key.clone()));
        }

        let kind = match (expected, stored) {
            (None, Some(stored)) if !stored.is_zero() => Some(FindingKind::RatioMismatch),
            (None, _) => None,
            (Some(_), None) => Some(FindingKind::RatioMissing),
            (Some(expected), Some(stored)) if (stored - expected).abs() > options.tolerance => {
                Some(FindingKind::RatioMismatch)
            }
            (Some(_), Some(stored)) if stored > options.high_ratio => Some(FindingKind::HighRatio),
            (Some(_), Some(_)) => None,
        };
        if let Some(kind) = kind {
            findings.push(RowFinding {
                line: row + 2,
                key,
                kind,
                stored,
                expected,
                numerator,
                denominator,
            });
        }
    }

    let repeated = amounts
        .into_iter()
        .into_group_map()
        .into_iter()
        .filter(|(_, keys)| keys.len() > options.repeat_limit)
        .map(|(amount, keys)| RepeatedAmount { amount, keys })
        .sorted_by(|a, b| {
            b.keys
                .len()
                .cmp(&a.keys.len())
                .then_with(|| a.amount.cmp(&b.amount))
        })
        .collect();

    Ok(ValidationReport {
        total_rows: dataset.row_count(),
        findings,
        repeated,
        options: options.clone(),
    })
}

pub fn execute(args: &ValidateArgs) -> Result<()> {
    let delimiter = io_utils::resolve_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let dataset = Dataset::load(&args.input, delimiter, encoding)?;
    let options = ValidationOptions {
        key_column: args.key.clone(),
        ratio: RatioColumn {
            name: args.name.clone(),
            numerator: args.numerator.clone(),
            denominator: args.denominator.clone(),
            ..RatioColumn::default()
        },
        tolerance: args.tolerance,
        high_ratio: args.high_ratio,
        repeat_limit: args.repeat_limit,
    };
    let report = validate(&dataset, &options)
        .with_context(|| format!("Validating {:?}", args.input))?;
    print!("{}", report.render());
    info!(
        "Checked {} row(s): {} row finding(s), {} repeated amount(s)",
        report.total_rows,
        report.findings.len(),
        report.repeated.len()
    );
    if args.deny_findings && !report.is_clean() {
        bail!("Validation reported {} issue(s)", report.issue_count());
    }
    Ok(())
}
