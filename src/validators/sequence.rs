use crate::domain::DataFormat;
use crate::error::IngestError;

use super::{fail, Sample, ValidationNotes, ValidationOutcome};

/// Validate FASTA record structure: `>` header lines, each followed by at
/// least one non-empty sequence line.
pub fn validate_fasta(sample: Sample<'_>, horizon: usize) -> Result<ValidationOutcome, IngestError> {
    let format = DataFormat::Fasta;
    let lines = sample.lines();

    let mut records = 0usize;
    let mut sequence_lines = 0usize;
    let mut seen_header = false;
    let mut sampled = 0usize;

    for (index, line) in lines.iter().enumerate().take(horizon) {
        sampled = index + 1;
        if line.is_empty() {
            continue;
        }
        if line.starts_with(b">") {
            if seen_header && sequence_lines == 0 {
                return Err(fail(
                    format,
                    format!("record with no sequence lines before sampled line {}", index + 1),
                ));
            }
            seen_header = true;
            sequence_lines = 0;
            records += 1;
        } else {
            if !seen_header {
                return Err(fail(
                    format,
                    "first non-blank line does not start with '>'",
                ));
            }
            sequence_lines += 1;
        }
    }

    if !seen_header {
        return Err(fail(format, "no FASTA records in sampled region"));
    }
    // A header at the very end of a truncated sample may have its sequence
    // beyond the window; only a complete stream can prove it empty.
    let sample_exhausted = sample.truncated || sampled < lines.len();
    if sequence_lines == 0 && !sample_exhausted {
        return Err(fail(format, "final record has no sequence lines"));
    }

    Ok(ValidationOutcome {
        format,
        notes: ValidationNotes {
            sampled_lines: Some(sampled),
            record_count: Some(records),
            ..ValidationNotes::default()
        },
    })
}

/// Validate FASTQ 4-line blocks: `@` header, sequence, `+` separator, quality
/// of equal length to the sequence.
pub fn validate_fastq(sample: Sample<'_>, horizon: usize) -> Result<ValidationOutcome, IngestError> {
    let format = DataFormat::Fastq;
    let lines = sample.lines();

    let mut usable = lines.len().min(horizon);
    let window_cut = sample.truncated || usable < lines.len();
    if window_cut {
        // Drop a trailing incomplete block; the rest of it sits beyond the
        // sampled window.
        usable -= usable % 4;
    } else if usable % 4 != 0 {
        return Err(fail(
            format,
            format!("line count {usable} in sampled region is not a multiple of 4"),
        ));
    }

    let mut blocks = 0usize;
    for (block, chunk) in lines[..usable].chunks_exact(4).enumerate() {
        if !chunk[0].starts_with(b"@") {
            return Err(fail(
                format,
                format!("header does not start with '@' at record {}", block + 1),
            ));
        }
        if !chunk[2].starts_with(b"+") {
            return Err(fail(
                format,
                format!("separator does not start with '+' at record {}", block + 1),
            ));
        }
        if chunk[1].len() != chunk[3].len() {
            return Err(fail(
                format,
                format!(
                    "sequence and quality lengths differ ({} vs {}) at record {}",
                    chunk[1].len(),
                    chunk[3].len(),
                    block + 1
                ),
            ));
        }
        blocks += 1;
    }

    if blocks == 0 {
        return Err(fail(format, "no complete FASTQ records in sampled region"));
    }

    Ok(ValidationOutcome {
        format,
        notes: ValidationNotes {
            sampled_lines: Some(usable),
            record_count: Some(blocks),
            ..ValidationNotes::default()
        },
    })
}
