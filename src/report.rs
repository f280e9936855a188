//! CSV report export.
//!
//! A report holds three sections separated by marker rows: a legend mapping
//! class ids to names, the per-class summary, and the flat detection log.
//! Fields are `;`-delimited and confidences carry four decimals.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::classes::ClassNames;
use crate::session::Aggregator;

const DELIMITER: u8 = b';';

/// Write the report for `aggregator` to `writer`.
///
/// Fails without writing anything when nothing has been recorded.
pub fn write_report<W: Write>(
    writer: W,
    aggregator: &Aggregator,
    classes: &ClassNames,
) -> Result<()> {
    ensure_not_empty(aggregator)?;
    let summary = aggregator.summarize();
    let mut csv = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .from_writer(writer);

    csv.write_record(["[legend]"])?;
    csv.write_record(["class_id", "class_name"])?;
    for class_id in summary.keys() {
        csv.write_record([class_id.to_string(), classes.name(*class_id)])?;
    }

    csv.write_record(["[summary]"])?;
    csv.write_record(["class_id", "mean_confidence", "detections"])?;
    for (class_id, class_summary) in &summary {
        csv.write_record([
            class_id.to_string(),
            format!("{:.4}", class_summary.average),
            class_summary.count.to_string(),
        ])?;
    }

    csv.write_record(["[detections]"])?;
    csv.write_record(["frame", "class_id", "confidence", "mask_area"])?;
    for record in aggregator.detections() {
        csv.write_record([
            record.frame_index.to_string(),
            record.class_id.to_string(),
            format!("{:.4}", record.confidence),
            record
                .mask_area
                .map(|area| area.to_string())
                .unwrap_or_default(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Export the report to `path`, replacing any existing file.
pub fn export_csv(path: &Path, aggregator: &Aggregator, classes: &ClassNames) -> Result<()> {
    ensure_not_empty(aggregator)?;
    let file = File::create(path)
        .with_context(|| format!("failed to create report {}", path.display()))?;
    write_report(file, aggregator, classes)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    log::info!(
        "exported {} detections over {} classes to {}",
        aggregator.total(),
        aggregator.classes().count(),
        path.display()
    );
    Ok(())
}

fn ensure_not_empty(aggregator: &Aggregator) -> Result<()> {
    if aggregator.is_empty() {
        return Err(anyhow!("nothing to export: no detections recorded"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Aggregator {
        let mut aggregator = Aggregator::new();
        aggregator.record(1, 0.6, 0);
        aggregator.record(2, 0.9, 0);
        aggregator.record(1, 0.8, 1);
        aggregator
    }

    #[test]
    fn sections_appear_in_order() {
        let classes = ClassNames::from_list(["scratch", "crack", "dent"]);
        let mut out = Vec::new();
        write_report(&mut out, &sample(), &classes).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[legend]",
                "class_id;class_name",
                "1;crack",
                "2;dent",
                "[summary]",
                "class_id;mean_confidence;detections",
                "1;0.7000;2",
                "2;0.9000;1",
                "[detections]",
                "frame;class_id;confidence;mask_area",
                "0;1;0.6000;",
                "0;2;0.9000;",
                "1;1;0.8000;",
            ]
        );
    }

    #[test]
    fn empty_aggregator_writes_nothing() {
        let mut out = Vec::new();
        let err = write_report(&mut out, &Aggregator::new(), &ClassNames::new()).unwrap_err();
        assert!(err.to_string().contains("nothing to export"));
        assert!(out.is_empty());
    }
}
