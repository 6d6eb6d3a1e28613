use super::verdict::{Tally, Verdict};
use super::EvalError;
use crate::constants::SUMMARY_CSV_HEADER;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Precision,
    Recall,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Precision => f.write_str("precision"),
            MetricKind::Recall => f.write_str("recall"),
        }
    }
}

/// One summary row: the fraction of each verdict for one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub true_fraction: f64,
    pub plausible_fraction: f64,
    pub implausible_fraction: f64,
    pub false_fraction: f64,
    pub total: usize,
    pub metric: String,
    pub source: String,
}

impl MetricRow {
    pub fn fraction_sum(&self) -> f64 {
        self.true_fraction + self.plausible_fraction + self.implausible_fraction + self.false_fraction
    }
}

/// Turns a tally into fractions of its total.
///
/// A tally with no verdicts is an error: an empty sample must be visible, not
/// reported as a row of zeros.
pub fn aggregate(source: &str, tally: &Tally, metric: MetricKind) -> Result<MetricRow, EvalError> {
    let total = tally.total();
    if total == 0 {
        return Err(EvalError::EmptySample {
            file: source.to_string(),
            no_evidence: tally.no_evidence,
            unrecognized: tally.unrecognized,
        });
    }
    let fraction = |verdict: Verdict| tally.count(verdict) as f64 / total as f64;
    Ok(MetricRow {
        true_fraction: fraction(Verdict::True),
        plausible_fraction: fraction(Verdict::Plausible),
        implausible_fraction: fraction(Verdict::Implausible),
        false_fraction: fraction(Verdict::False),
        total,
        metric: metric.to_string(),
        source: source.to_string(),
    })
}

/// Writes the summary CSV, replacing any previous file.
pub fn write_summary(path: &Path, rows: &[MetricRow]) -> Result<(), EvalError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EvalError::io(parent, e))?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(SUMMARY_CSV_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| EvalError::io(path, e))?;
    info!("Results summary written to '{}'.", path.display());
    Ok(())
}
