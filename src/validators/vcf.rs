use std::borrow::Cow;

use crate::domain::DataFormat;
use crate::error::IngestError;

use super::{fail, Sample, ValidationNotes, ValidationOutcome};

const FILEFORMAT_PREFIX: &str = "##fileformat=VCF";
const REQUIRED_COLUMNS: [&str; 8] = [
    "#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO",
];

/// Validate the VCF header block and a sample of data records.
pub fn validate(sample: Sample<'_>, horizon: usize) -> Result<ValidationOutcome, IngestError> {
    let format = DataFormat::Vcf;
    let lines = sample.lines();
    let window_cut = sample.truncated || lines.len() > horizon;

    let Some(first) = lines.first() else {
        return Err(fail(format, "no content in sampled region"));
    };
    if !decode(first).starts_with(FILEFORMAT_PREFIX) {
        return Err(fail(
            format,
            "missing ##fileformat=VCF header on first line",
        ));
    }

    let mut iter = lines.iter().enumerate().take(horizon).skip(1);
    let mut header_columns: Option<usize> = None;

    for (index, line) in iter.by_ref() {
        let line = decode(line);
        if line.starts_with("##") {
            continue;
        }
        if line.starts_with("#CHROM") {
            header_columns = Some(check_column_header(&line)?);
            break;
        }
        return Err(fail(
            format,
            format!(
                "expected #CHROM column header before data at sampled line {}",
                index + 1
            ),
        ));
    }

    let Some(header_columns) = header_columns else {
        if window_cut {
            // Meta lines filled the whole inspection window; nothing to
            // refute. The header may sit beyond it.
            return Ok(outcome(header_columns, 0));
        }
        return Err(fail(
            format,
            "missing required #CHROM column header line",
        ));
    };

    let mut records = 0usize;
    for (index, line) in iter {
        let line = decode(line);
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != header_columns {
            return Err(fail(
                format,
                format!(
                    "expected {header_columns} columns, got {} at sampled line {}",
                    fields.len(),
                    index + 1
                ),
            ));
        }
        if fields[1].parse::<u64>().map(|pos| pos > 0) != Ok(true) {
            return Err(fail(
                format,
                format!(
                    "POS is not a positive integer at sampled line {}",
                    index + 1
                ),
            ));
        }
        records += 1;
    }

    Ok(outcome(Some(header_columns), records))
}

fn outcome(columns: Option<usize>, records: usize) -> ValidationOutcome {
    ValidationOutcome {
        format: DataFormat::Vcf,
        notes: ValidationNotes {
            record_count: Some(records),
            column_count: columns,
            ..ValidationNotes::default()
        },
    }
}

fn check_column_header(line: &str) -> Result<usize, IngestError> {
    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < REQUIRED_COLUMNS.len() {
        return Err(fail(DataFormat::Vcf, "missing required VCF columns"));
    }
    for (expected, actual) in REQUIRED_COLUMNS.iter().zip(&columns) {
        if expected != actual {
            return Err(fail(
                DataFormat::Vcf,
                format!("expected column {expected}, found {actual} in #CHROM header"),
            ));
        }
    }
    // FORMAT and sample columns are optional, but if anything follows INFO it
    // must begin with FORMAT.
    if columns.len() > REQUIRED_COLUMNS.len() && columns[8] != "FORMAT" {
        return Err(fail(
            DataFormat::Vcf,
            "expected FORMAT column after INFO in #CHROM header",
        ));
    }
    Ok(columns.len())
}

fn decode<'a>(line: &'a [u8]) -> Cow<'a, str> {
    String::from_utf8_lossy(line)
}
