use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use crate::{
    derive::{DEFAULT_DENOMINATOR_COLUMN, DEFAULT_NUMERATOR_COLUMN, DEFAULT_RATIO_COLUMN},
    patch::DuplicateKeyPolicy,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Maintain the credit-card attribute CSV dataset", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Overwrite cells of keyed rows from a YAML/JSON update table
    Patch(PatchArgs),
    /// Populate one column from a keyed lookup with an optional fallback lookup
    Fill(FillArgs),
    /// Compute a ratio column from two currency-like columns
    Derive(DeriveArgs),
    /// Insert one or more empty columns next to an anchor column
    AddColumn(AddColumnArgs),
    /// Drop one or more columns from the header and every row
    RemoveColumn(RemoveColumnArgs),
    /// Check stored ratios and repeated amounts without writing anything
    Validate(ValidateArgs),
}

/// Input/output options shared by every command that rewrites the dataset.
#[derive(Debug, Clone, Args)]
pub struct DatasetArgs {
    /// Dataset file to read (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Where to write the result (defaults to rewriting the input; `-` for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding for the output (defaults to the input encoding)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Print a unified diff of the changes instead of writing them
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct PatchArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
    /// YAML (or .json) file with an `updates` table keyed by record name
    #[arg(short = 'r', long = "rules")]
    pub rules: PathBuf,
    /// Key column used to match rules (overrides `key_column` in the rules file)
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,
    /// Fail instead of warning when a rule names an unknown key or column
    #[arg(long)]
    pub strict: bool,
    /// How to treat a rule key that matches more than one row
    #[arg(long = "duplicates", value_enum, default_value = "reject")]
    pub duplicates: DuplicateKeyPolicy,
}

#[derive(Debug, Args)]
pub struct FillArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
    /// YAML (or .json) file describing the target column and lookup tables
    #[arg(short = 'r', long = "rules")]
    pub rules: PathBuf,
    /// Fail when a table key matches no row or the fallback column is missing
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Args)]
pub struct DeriveArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
    /// Name of the derived column
    #[arg(long, default_value = DEFAULT_RATIO_COLUMN)]
    pub name: String,
    /// Column holding the numerator amount
    #[arg(long, default_value = DEFAULT_NUMERATOR_COLUMN)]
    pub numerator: String,
    /// Column holding the denominator amount; the derived column follows it
    #[arg(long, default_value = DEFAULT_DENOMINATOR_COLUMN)]
    pub denominator: String,
    /// Decimal places written to the derived column
    #[arg(long, default_value_t = crate::amount::DEFAULT_RATIO_PLACES)]
    pub places: u32,
}

#[derive(Debug, Args)]
pub struct AddColumnArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
    /// Column names to add, in order (repeat or comma-separate)
    #[arg(short = 'c', long = "column", required = true, value_delimiter = ',', action = clap::ArgAction::Append)]
    pub columns: Vec<String>,
    /// Insert immediately after this column
    #[arg(long, conflicts_with = "before")]
    pub after: Option<String>,
    /// Insert immediately before this column
    #[arg(long)]
    pub before: Option<String>,
    /// Value written into the new cells
    #[arg(long, default_value = "")]
    pub value: String,
}

#[derive(Debug, Args)]
pub struct RemoveColumnArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
    /// Column names to remove (repeat or comma-separate)
    #[arg(short = 'c', long = "column", required = true, value_delimiter = ',', action = clap::ArgAction::Append)]
    pub columns: Vec<String>,
    /// Fail when a named column is not present
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Dataset file to check (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Column naming each record in the report
    #[arg(short = 'k', long = "key", default_value = crate::rules::DEFAULT_KEY_COLUMN)]
    pub key: String,
    /// Stored ratio column
    #[arg(long, default_value = DEFAULT_RATIO_COLUMN)]
    pub name: String,
    /// Numerator column of the ratio
    #[arg(long, default_value = DEFAULT_NUMERATOR_COLUMN)]
    pub numerator: String,
    /// Denominator column of the ratio; also checked for repeated amounts
    #[arg(long, default_value = DEFAULT_DENOMINATOR_COLUMN)]
    pub denominator: String,
    /// Largest accepted difference between stored and recomputed ratio
    #[arg(long, default_value = "0.0001", value_parser = parse_decimal)]
    pub tolerance: Decimal,
    /// Ratios above this value are listed for manual review
    #[arg(long = "high-ratio", default_value = "0.5", value_parser = parse_decimal)]
    pub high_ratio: Decimal,
    /// Report amounts shared by more than this many rows
    #[arg(long = "repeat-limit", default_value_t = crate::validate::DEFAULT_REPEAT_LIMIT)]
    pub repeat_limit: usize,
    /// Exit with an error when the report contains any finding
    #[arg(long = "deny-findings")]
    pub deny_findings: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_decimal(value: &str) -> Result<Decimal, String> {
    let parsed = Decimal::from_str(value.trim())
        .map_err(|err| format!("'{value}' is not a decimal number: {err}"))?;
    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(format!("'{value}' must not be negative"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_column_accepts_comma_separated_names() {
        let cli = Cli::try_parse_from([
            "cardset",
            "add-column",
            "-i",
            "cards.csv",
            "-c",
            "ftf,lounge",
            "-c",
            "ge_tsa_precheck",
            "--after",
            "application_link",
        ])
        .unwrap();
        match cli.command {
            Commands::AddColumn(args) => {
                assert_eq!(args.columns, vec!["ftf", "lounge", "ge_tsa_precheck"]);
                assert_eq!(args.after.as_deref(), Some("application_link"));
                assert!(args.dataset.output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn after_and_before_conflict() {
        let result = Cli::try_parse_from([
            "cardset", "add-column", "-i", "x.csv", "-c", "a", "--after", "b", "--before", "c",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn decimal_thresholds_reject_garbage() {
        assert_eq!(parse_decimal("0.5").unwrap(), Decimal::new(5, 1));
        assert!(parse_decimal("half").is_err());
        assert!(parse_decimal("-1").is_err());
    }

    #[test]
    fn delimiter_aliases() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert!(parse_delimiter("ab").is_err());
    }
}
