use std::borrow::Cow;

use crate::domain::DataFormat;
use crate::error::IngestError;

use super::{fail, Sample, ValidationNotes, ValidationOutcome};

/// Validate BED interval lines: at least 3 whitespace-separated fields with
/// integer start/end and `start < end`.
pub fn validate_bed(sample: Sample<'_>, horizon: usize) -> Result<ValidationOutcome, IngestError> {
    let format = DataFormat::Bed;
    let lines = sample.lines();
    let window_cut = sample.truncated || lines.len() > horizon;
    let mut records = 0usize;

    for (index, line) in lines.iter().enumerate().take(horizon) {
        let line = String::from_utf8_lossy(line);
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("track")
            || trimmed.starts_with("browser")
        {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(fail(
                format,
                format!(
                    "expected at least 3 fields, got {} at sampled line {}",
                    fields.len(),
                    index + 1
                ),
            ));
        }
        let start: u64 = fields[1].parse().map_err(|_| {
            fail(
                format,
                format!("start is not an integer at sampled line {}", index + 1),
            )
        })?;
        let end: u64 = fields[2].parse().map_err(|_| {
            fail(
                format,
                format!("end is not an integer at sampled line {}", index + 1),
            )
        })?;
        if start >= end {
            return Err(fail(
                format,
                format!(
                    "interval start {start} is not before end {end} at sampled line {}",
                    index + 1
                ),
            ));
        }
        records += 1;
    }

    if records == 0 && !window_cut {
        return Err(fail(format, "no BED intervals in sampled region"));
    }

    Ok(ValidationOutcome {
        format,
        notes: ValidationNotes {
            record_count: Some(records),
            ..ValidationNotes::default()
        },
    })
}

pub fn validate_gff(sample: Sample<'_>, horizon: usize) -> Result<ValidationOutcome, IngestError> {
    validate_annotation(DataFormat::Gff, sample, horizon)
}

pub fn validate_gtf(sample: Sample<'_>, horizon: usize) -> Result<ValidationOutcome, IngestError> {
    validate_annotation(DataFormat::Gtf, sample, horizon)
}

/// Shared GFF/GTF checks: 9 tab-separated fields with a non-empty attribute
/// column. When the `##gff-version 3` directive is present the attribute
/// column must additionally parse as `key=value` pairs.
fn validate_annotation(
    format: DataFormat,
    sample: Sample<'_>,
    horizon: usize,
) -> Result<ValidationOutcome, IngestError> {
    let lines = sample.lines();
    let window_cut = sample.truncated || lines.len() > horizon;
    let mut records = 0usize;
    let mut gff3 = false;

    for (index, line) in lines.iter().enumerate().take(horizon) {
        let line: Cow<'_, str> = String::from_utf8_lossy(line);
        if line.is_empty() {
            continue;
        }
        if let Some(directive) = line.strip_prefix("##gff-version") {
            gff3 = directive.trim().starts_with('3');
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 9 {
            return Err(fail(
                format,
                format!(
                    "expected 9 tab-separated fields, got {} at sampled line {}",
                    fields.len(),
                    index + 1
                ),
            ));
        }
        let attributes = fields[8].trim();
        if attributes.is_empty() {
            return Err(fail(
                format,
                format!("empty attribute field at sampled line {}", index + 1),
            ));
        }
        if gff3 {
            for pair in attributes.split(';') {
                let pair = pair.trim();
                if pair.is_empty() {
                    continue;
                }
                if !pair.contains('=') {
                    return Err(fail(
                        format,
                        format!(
                            "attribute '{pair}' is not a key=value pair at sampled line {}",
                            index + 1
                        ),
                    ));
                }
            }
        }
        records += 1;
    }

    if records == 0 && !window_cut {
        return Err(fail(format, "no annotation records in sampled region"));
    }

    Ok(ValidationOutcome {
        format,
        notes: ValidationNotes {
            record_count: Some(records),
            ..ValidationNotes::default()
        },
    })
}
