//! Bounded-memory content validators, one module per format family.
//!
//! Every validator inspects at most a fixed sample prefix of the upload and
//! at most `sampling_horizon_lines` lines/records within it. A parse failure
//! inside that window fails the whole file; passing the window asserts
//! nothing about the bytes beyond it.

use serde::{Deserialize, Serialize};

use crate::config::IngestConfig;
use crate::domain::DataFormat;
use crate::error::IngestError;

mod alignment;
mod delimited;
mod interval;
mod sequence;
mod vcf;

/// Structured findings from a content validator. Fixed optional fields, not a
/// free-form map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationNotes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampled_lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_count: Option<usize>,
}

/// Successful validation: the authoritative detected format plus notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub format: DataFormat,
    pub notes: ValidationNotes,
}

/// The sampled prefix of an upload stream.
///
/// `truncated` marks a sample that stopped at the prefix cap rather than at
/// end-of-stream; validators must not fail a record that may simply continue
/// past the cap.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub bytes: &'a [u8],
    pub truncated: bool,
}

impl<'a> Sample<'a> {
    pub fn complete(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            truncated: false,
        }
    }

    /// Split into lines, dropping a partial trailing line when the sample was
    /// cut mid-stream.
    pub fn lines(&self) -> Vec<&'a [u8]> {
        let mut lines: Vec<&[u8]> = self
            .bytes
            .split(|byte| *byte == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .collect();
        if self.bytes.last() == Some(&b'\n') || self.bytes.is_empty() {
            lines.pop();
        } else if self.truncated {
            // Last line may continue beyond the sampled prefix.
            lines.pop();
        }
        lines
    }
}

pub(crate) fn fail(format: DataFormat, reason: impl Into<String>) -> IngestError {
    IngestError::Validation {
        format: format.to_string(),
        reason: reason.into(),
    }
}

/// Dispatch to the matching validator. The match is exhaustive over the
/// closed format enum.
pub fn validate_content(
    format: DataFormat,
    declared_mime: &str,
    sample: Sample<'_>,
    config: &IngestConfig,
) -> Result<ValidationOutcome, IngestError> {
    let horizon = config.sampling_horizon_lines;
    match format {
        DataFormat::Csv | DataFormat::Tsv => {
            delimited::validate(format, sample, config.delimited_sample_rows)
        }
        DataFormat::Vcf => vcf::validate(sample, horizon),
        DataFormat::Fasta => sequence::validate_fasta(sample, horizon),
        DataFormat::Fastq => sequence::validate_fastq(sample, horizon),
        DataFormat::Bed => interval::validate_bed(sample, horizon),
        DataFormat::Gff => interval::validate_gff(sample, horizon),
        DataFormat::Gtf => interval::validate_gtf(sample, horizon),
        DataFormat::Sam => alignment::validate_sam(sample, horizon),
        DataFormat::Bam => alignment::validate_bam(sample, declared_mime),
        DataFormat::Xlsx => alignment::validate_xlsx(sample),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_sample_keeps_final_line() {
        let sample = Sample::complete(b"a\nb\nc");
        assert_eq!(sample.lines(), vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
    }

    #[test]
    fn truncated_sample_drops_partial_final_line() {
        let sample = Sample {
            bytes: b"a\nb\npartia",
            truncated: true,
        };
        assert_eq!(sample.lines(), vec![&b"a"[..], &b"b"[..]]);
    }

    #[test]
    fn trailing_newline_is_not_an_empty_line() {
        let sample = Sample::complete(b"a\r\nb\n");
        assert_eq!(sample.lines(), vec![&b"a"[..], &b"b"[..]]);
    }
}
