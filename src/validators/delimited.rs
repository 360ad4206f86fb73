use crate::domain::DataFormat;
use crate::error::IngestError;

use super::{fail, Sample, ValidationNotes, ValidationOutcome};

/// Validate CSV/TSV by sniffing the delimiter from the first non-empty line
/// and checking that the sampled rows keep a consistent column count.
///
/// The sniffed delimiter decides the detected format, so a comma-separated
/// `.txt` upload is stored as `csv`.
pub fn validate(
    declared: DataFormat,
    sample: Sample<'_>,
    sample_rows: usize,
) -> Result<ValidationOutcome, IngestError> {
    let lines = sample.lines();
    let mut rows = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.is_empty());

    let Some((first_index, first_line)) = rows.next() else {
        return Err(fail(declared, "no content in sampled region"));
    };
    let first_line = decode(declared, first_line, first_index)?;

    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();
    let (delimiter, detected) = if tabs > 0 && tabs >= commas {
        ('\t', DataFormat::Tsv)
    } else if commas > 0 {
        (',', DataFormat::Csv)
    } else {
        return Err(fail(
            declared,
            "could not detect a delimiter (expected comma or tab)",
        ));
    };

    let expected_columns = first_line.split(delimiter).count();
    let mut sampled = 1usize;
    for (index, line) in rows.take(sample_rows.saturating_sub(1)) {
        let line = decode(declared, line, index)?;
        let columns = line.split(delimiter).count();
        if columns != expected_columns {
            return Err(fail(
                detected,
                format!(
                    "expected {expected_columns} columns, got {columns} at sampled line {}",
                    index + 1
                ),
            ));
        }
        sampled += 1;
    }

    Ok(ValidationOutcome {
        format: detected,
        notes: ValidationNotes {
            sampled_lines: Some(sampled),
            delimiter: Some(delimiter),
            column_count: Some(expected_columns),
            ..ValidationNotes::default()
        },
    })
}

fn decode<'a>(
    format: DataFormat,
    line: &'a [u8],
    index: usize,
) -> Result<&'a str, IngestError> {
    std::str::from_utf8(line).map_err(|_| {
        fail(
            format,
            format!("not valid UTF-8 at sampled line {}", index + 1),
        )
    })
}
