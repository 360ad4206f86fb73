use std::io::Read;

use flate2::read::GzDecoder;

use crate::domain::DataFormat;
use crate::error::IngestError;

use super::{fail, Sample, ValidationNotes, ValidationOutcome};

/// Validate SAM structure: optional `@`-prefixed header block (starting with
/// `@HD` when present), then alignment rows with at least 11 mandatory
/// tab-separated fields.
pub fn validate_sam(sample: Sample<'_>, horizon: usize) -> Result<ValidationOutcome, IngestError> {
    let format = DataFormat::Sam;
    let lines = sample.lines();
    let window_cut = sample.truncated || lines.len() > horizon;
    let mut headers = 0usize;
    let mut alignments = 0usize;

    for (index, line) in lines.iter().enumerate().take(horizon) {
        if line.is_empty() {
            continue;
        }
        if line.starts_with(b"@") {
            if alignments > 0 {
                return Err(fail(
                    format,
                    format!("header line after alignment records at sampled line {}", index + 1),
                ));
            }
            if headers == 0 && !line.starts_with(b"@HD") {
                return Err(fail(format, "first header record is not @HD"));
            }
            headers += 1;
            continue;
        }
        let fields = line.split(|byte| *byte == b'\t').count();
        if fields < 11 {
            return Err(fail(
                format,
                format!(
                    "expected at least 11 tab-separated fields, got {fields} at sampled line {}",
                    index + 1
                ),
            ));
        }
        alignments += 1;
    }

    if headers == 0 && alignments == 0 && !window_cut {
        return Err(fail(format, "no SAM content in sampled region"));
    }

    Ok(ValidationOutcome {
        format,
        notes: ValidationNotes {
            sampled_lines: Some(headers + alignments),
            record_count: Some(alignments),
            ..ValidationNotes::default()
        },
    })
}

/// Validate the BGZF container signature and the `BAM\x01` magic inside the
/// first compressed block. No record-level parsing.
pub fn validate_bam(
    sample: Sample<'_>,
    declared_mime: &str,
) -> Result<ValidationOutcome, IngestError> {
    let format = DataFormat::Bam;
    let declared = declared_mime.trim().to_ascii_lowercase();
    if declared.starts_with("text/") {
        return Err(fail(
            format,
            format!("BAM requires a binary MIME type, got {declared}"),
        ));
    }

    let bytes = sample.bytes;
    if bytes.len() < 18 {
        return Err(fail(format, "file too short for a BGZF header"));
    }
    if bytes[0] != 0x1f || bytes[1] != 0x8b {
        return Err(fail(format, "missing BGZF gzip magic"));
    }
    if bytes[3] & 0x04 == 0 {
        return Err(fail(format, "gzip header has no extra field (not BGZF)"));
    }
    let xlen = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;
    if !has_bc_subfield(&bytes[12..], xlen) {
        return Err(fail(format, "missing BGZF BC subfield"));
    }

    let mut decoder = GzDecoder::new(bytes);
    let mut magic = [0u8; 4];
    decoder
        .read_exact(&mut magic)
        .map_err(|_| fail(format, "failed to decompress first BGZF block"))?;
    if &magic != b"BAM\x01" {
        return Err(fail(format, "missing BAM magic in first block"));
    }

    Ok(ValidationOutcome {
        format,
        notes: ValidationNotes::default(),
    })
}

fn has_bc_subfield(extra: &[u8], xlen: usize) -> bool {
    let extra = match extra.get(..xlen) {
        Some(extra) => extra,
        None => return false,
    };
    let mut offset = 0usize;
    while offset + 4 <= extra.len() {
        let len = u16::from_le_bytes([extra[offset + 2], extra[offset + 3]]) as usize;
        if extra[offset] == b'B' && extra[offset + 1] == b'C' {
            return true;
        }
        offset += 4 + len;
    }
    false
}

/// Validate the XLSX container by its ZIP local-file-header magic. The central
/// directory sits at end-of-file, outside the sampled prefix, so this is a
/// signature floor like BAM.
pub fn validate_xlsx(sample: Sample<'_>) -> Result<ValidationOutcome, IngestError> {
    if !sample.bytes.starts_with(b"PK\x03\x04") {
        return Err(fail(DataFormat::Xlsx, "missing ZIP signature"));
    }
    Ok(ValidationOutcome {
        format: DataFormat::Xlsx,
        notes: ValidationNotes::default(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    /// Single-block BGZF payload with the BC extra subfield, as written by
    /// samtools.
    fn bgzf_block(payload: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        let gzip = encoder.finish().unwrap();

        let mut block = Vec::new();
        block.extend_from_slice(&[0x1f, 0x8b, 0x08, 0x04]);
        block.extend_from_slice(&[0, 0, 0, 0]); // mtime
        block.extend_from_slice(&[0, 0xff]); // xfl, os
        let xlen: u16 = 6;
        block.extend_from_slice(&xlen.to_le_bytes());
        block.extend_from_slice(b"BC");
        block.extend_from_slice(&2u16.to_le_bytes());
        let bsize = (block.len() + 2 + gzip.len() - 10 - 1) as u16;
        block.extend_from_slice(&bsize.to_le_bytes());
        // Deflate stream plus crc/isize from the plain gzip encoding.
        block.extend_from_slice(&gzip[10..]);
        block
    }

    #[test]
    fn sam_with_header_and_alignments_passes() {
        let data = b"@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\nr1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n";
        let outcome = validate_sam(Sample::complete(data), 100).unwrap();
        assert_eq!(outcome.notes.record_count, Some(1));
    }

    #[test]
    fn sam_headerless_alignments_pass() {
        let data = b"r1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n";
        validate_sam(Sample::complete(data), 100).unwrap();
    }

    #[test]
    fn sam_first_header_must_be_hd() {
        let data = b"@SQ\tSN:chr1\tLN:1000\nr1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n";
        let err = validate_sam(Sample::complete(data), 100).unwrap_err();
        assert_matches!(err, IngestError::Validation { ref reason, .. } if reason.contains("@HD"));
    }

    #[test]
    fn sam_short_alignment_row_fails() {
        let data = b"@HD\tVN:1.6\nr1\t0\tchr1\t1\n";
        let err = validate_sam(Sample::complete(data), 100).unwrap_err();
        assert_matches!(err, IngestError::Validation { ref reason, .. } if reason.contains("11"));
    }

    #[test]
    fn sam_header_after_alignment_fails() {
        let data = b"@HD\tVN:1.6\nr1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n@SQ\tSN:chr1\tLN:9\n";
        let err = validate_sam(Sample::complete(data), 100).unwrap_err();
        assert_matches!(err, IngestError::Validation { ref reason, .. } if reason.contains("after alignment"));
    }

    #[test]
    fn bam_block_passes() {
        let mut payload = b"BAM\x01".to_vec();
        payload.extend_from_slice(&[0u8; 16]);
        let block = bgzf_block(&payload);
        let outcome = validate_bam(
            Sample::complete(&block),
            "application/octet-stream",
        )
        .unwrap();
        assert_eq!(outcome.format, DataFormat::Bam);
    }

    #[test]
    fn bam_text_mime_fails() {
        let block = bgzf_block(b"BAM\x01");
        let err = validate_bam(Sample::complete(&block), "text/plain").unwrap_err();
        assert_matches!(err, IngestError::Validation { ref reason, .. } if reason.contains("binary MIME"));
    }

    #[test]
    fn bam_plain_gzip_fails() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"BAM\x01").unwrap();
        let gzip = encoder.finish().unwrap();
        let err = validate_bam(Sample::complete(&gzip), "application/octet-stream").unwrap_err();
        assert_matches!(err, IngestError::Validation { ref reason, .. } if reason.contains("BGZF") || reason.contains("extra field"));
    }

    #[test]
    fn bam_wrong_inner_magic_fails() {
        let block = bgzf_block(b"NOTBAM__");
        let err = validate_bam(Sample::complete(&block), "application/octet-stream").unwrap_err();
        assert_matches!(err, IngestError::Validation { ref reason, .. } if reason.contains("BAM magic"));
    }

    #[test]
    fn bam_garbage_fails() {
        let err =
            validate_bam(Sample::complete(b"not a bam file at all"), "").unwrap_err();
        assert_matches!(err, IngestError::Validation { ref reason, .. } if reason.contains("gzip magic"));
    }

    #[test]
    fn xlsx_zip_magic() {
        validate_xlsx(Sample::complete(b"PK\x03\x04rest-of-archive")).unwrap();
        let err = validate_xlsx(Sample::complete(b"<html>")).unwrap_err();
        assert_matches!(err, IngestError::Validation { ref reason, .. } if reason.contains("ZIP"));
    }
}
