//! Shared read-modify-write cycle for every command that changes the dataset.
//!
//! The input is read and decoded in full, one transform runs against the
//! in-memory dataset, and the result is either written back (in place unless
//! `--output` says otherwise) or shown as a unified diff for `--dry-run`.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use log::info;
use similar::TextDiff;

use crate::{cli::DatasetArgs, dataset::Dataset, io_utils};

pub fn rewrite<F>(args: &DatasetArgs, transform: F) -> Result<()>
where
    F: FnOnce(&mut Dataset) -> Result<()>,
{
    let delimiter = io_utils::resolve_delimiter(&args.input, args.delimiter);
    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_encoding = match args.output_encoding.as_deref() {
        Some(label) => io_utils::resolve_encoding(Some(label))?,
        None => input_encoding,
    };

    let bytes = io_utils::read_input(&args.input)?;
    let original = io_utils::decode_text(&bytes, input_encoding)
        .with_context(|| format!("Decoding {:?}", args.input))?;
    let mut dataset =
        Dataset::parse(&original, delimiter).with_context(|| format!("Parsing {:?}", args.input))?;
    let rows_before = dataset.row_count();

    transform(&mut dataset)?;
    ensure!(
        dataset.row_count() == rows_before,
        "Transform changed the row count from {rows_before} to {}",
        dataset.row_count()
    );

    let rendered = dataset.to_text(delimiter)?;
    if args.dry_run {
        print!("{}", render_diff(&original, &rendered, &args.input));
        info!("Dry run: {} row(s) checked, nothing written", rows_before);
        return Ok(());
    }

    let destination = args.output.as_deref().unwrap_or(&args.input);
    let encoded = io_utils::encode_text(&rendered, output_encoding)?;
    io_utils::write_output(destination, &encoded)?;
    info!(
        "Wrote {} row(s) x {} column(s) -> {}",
        dataset.row_count(),
        dataset.headers().len(),
        describe(destination)
    );
    Ok(())
}

/// Unified line diff between the file as read and as it would be written.
pub fn render_diff(before: &str, after: &str, path: &Path) -> String {
    if before == after {
        return "No changes.\n".to_string();
    }
    let label = path.display().to_string();
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(1)
        .header(&label, &label)
        .to_string()
}

fn describe(path: &Path) -> String {
    if io_utils::is_dash(path) {
        "stdout".to_string()
    } else {
        path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn diff_shows_only_changed_lines() {
        let before = "card_name,fee\nA,1\nB,2\nC,3\nD,4\n";
        let after = "card_name,fee\nA,1\nB,9\nC,3\nD,4\n";
        let diff = render_diff(before, after, &PathBuf::from("cards.csv"));
        assert!(diff.contains("-B,2"));
        assert!(diff.contains("+B,9"));
        assert!(!diff.contains("D,4"));
    }

    #[test]
    fn identical_text_reports_no_changes() {
        assert_eq!(render_diff("a\n", "a\n", &PathBuf::from("x.csv")), "No changes.\n");
    }
}
