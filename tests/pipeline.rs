use std::io::Cursor;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use sha2::{Digest, Sha256};

use genomeai_ingest::app::App;
use genomeai_ingest::config::IngestConfig;
use genomeai_ingest::domain::{DataFormat, ProcessingStatus, UserId};
use genomeai_ingest::error::IngestError;
use genomeai_ingest::notify::NopNotifier;
use genomeai_ingest::output;
use genomeai_ingest::records::ProcessingRecord;

const VCF: &[u8] = b"##fileformat=VCFv4.2\n##source=test\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\nchr1\t12345\trs1\tA\tG\t99\tPASS\tDP=30\nchr2\t67890\t.\tC\tT\t50\tPASS\tDP=12\n";

fn app_in(dir: &std::path::Path) -> App<NopNotifier> {
    let root = Utf8PathBuf::from_path_buf(dir.to_path_buf()).unwrap();
    let mut config = IngestConfig::with_roots(root.join("uploads"), root.join("records"));
    config.min_disk_headroom_bytes = 0;
    App::new(config, NopNotifier)
}

fn user() -> UserId {
    "alice_01".parse().unwrap()
}

fn ingest(
    app: &App<NopNotifier>,
    filename: &str,
    mime: &str,
    data: &[u8],
) -> Result<ProcessingRecord, IngestError> {
    app.ingest(
        &user(),
        filename,
        mime,
        data.len() as u64,
        &mut Cursor::new(data.to_vec()),
    )
}

#[test]
fn vcf_upload_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let record = ingest(&app, "variants.vcf", "text/plain", VCF).unwrap();

    assert_eq!(record.file_format, DataFormat::Vcf);
    assert_eq!(record.processing_status, ProcessingStatus::Queued);
    assert_eq!(record.file_size, VCF.len() as u64);
    assert_eq!(record.file_hash, hex::encode(Sha256::digest(VCF)));

    let stored = std::fs::read(&record.file_path).unwrap();
    assert_eq!(stored, VCF);

    let loaded = app.get_status(&record.upload_id).unwrap();
    assert_eq!(loaded.file_hash, record.file_hash);
    assert_eq!(loaded.original_filename, "variants.vcf");
}

#[test]
fn vcf_with_long_meta_header_ingests() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    // More meta lines than the sampling horizon inspects; the #CHROM header
    // and data sit beyond it in a complete, well-formed file.
    let mut data = String::from("##fileformat=VCFv4.2\n");
    for i in 0..150 {
        data.push_str(&format!("##contig=<ID=chr{i},length=1000>\n"));
    }
    data.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n");
    data.push_str("chr1\t100\t.\tA\tT\t50\tPASS\t.\n");

    let record = ingest(&app, "annotated.vcf", "text/plain", data.as_bytes()).unwrap();
    assert_eq!(record.file_format, DataFormat::Vcf);
    assert_eq!(record.file_size, data.len() as u64);
}

#[test]
fn success_envelope_shape() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let record = ingest(&app, "variants.vcf", "text/plain", VCF).unwrap();
    let envelope = output::success_record(&record);

    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["fileFormat"], "vcf");
    assert_eq!(envelope["userId"], "alice_01");
    assert!(envelope["uploadTimestamp"].as_str().unwrap().contains('T'));
}

#[test]
fn failure_envelope_shape() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let err = ingest(&app, "notes.docx", "text/plain", b"hello").unwrap_err();
    let envelope = output::failure(&err);

    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["errorCode"], "INVALID_FILE_TYPE");
    assert!(envelope["error"].as_str().unwrap().contains("docx"));
}

#[test]
fn fastq_length_mismatch_is_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let bad = b"@read1\nACGTACGT\n+\nIII\n";
    let err = ingest(&app, "reads.fastq", "text/plain", bad).unwrap_err();
    assert_matches!(err, IngestError::Validation { .. });
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    // A rejected upload leaves nothing behind.
    assert!(app.list_history(&user()).unwrap().is_empty());
    assert!(!dir.path().join("uploads").exists());
}

#[test]
fn zero_byte_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let err = ingest(&app, "empty.csv", "text/csv", b"").unwrap_err();
    assert_eq!(err.error_code(), "EMPTY_FILE");
}

#[test]
fn oversize_declared_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let err = app
        .ingest(
            &user(),
            "cohort.vcf",
            "text/plain",
            6 * 1024 * 1024 * 1024,
            &mut Cursor::new(Vec::new()),
        )
        .unwrap_err();
    assert_matches!(err, IngestError::FileTooLarge { .. });
    assert_eq!(err.error_code(), "FILE_TOO_LARGE");
}

#[test]
fn concurrent_same_name_uploads_get_distinct_records() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let mut upload_ids = Vec::new();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| ingest(&app, "shared.vcf", "text/plain", VCF).unwrap()))
            .collect();
        for handle in handles {
            upload_ids.push(handle.join().unwrap().upload_id);
        }
    });

    let mut deduped = upload_ids.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), upload_ids.len());

    for upload_id in &upload_ids {
        let record = app.get_status(upload_id).unwrap();
        assert!(std::path::Path::new(&record.file_path).exists());
    }
}

#[test]
fn history_is_user_scoped_and_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let first = ingest(&app, "first.vcf", "text/plain", VCF).unwrap();
    let second = ingest(&app, "second.vcf", "text/plain", VCF).unwrap();

    let history = app.list_history(&user()).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].upload_id, second.upload_id);
    assert_eq!(history[1].upload_id, first.upload_id);

    let other: UserId = "bob_02".parse().unwrap();
    assert!(app.list_history(&other).unwrap().is_empty());
}

#[test]
fn lifecycle_runs_queued_processing_completed() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let record = ingest(&app, "tracked.vcf", "text/plain", VCF).unwrap();
    assert_eq!(record.processing_status, ProcessingStatus::Queued);

    app.transition(&record.upload_id, ProcessingStatus::Processing, None)
        .unwrap();
    let done = app
        .transition(
            &record.upload_id,
            ProcessingStatus::Completed,
            Some("pipeline finished".to_string()),
        )
        .unwrap();
    assert_eq!(done.processing_status, ProcessingStatus::Completed);

    // Terminal states are final.
    let err = app
        .transition(&record.upload_id, ProcessingStatus::Processing, None)
        .unwrap_err();
    assert_matches!(err, IngestError::InvalidTransition { .. });

    let persisted = app.get_status(&record.upload_id).unwrap();
    assert_eq!(persisted.processing_status, ProcessingStatus::Completed);
    assert_eq!(
        persisted.metadata.processing_notes,
        vec!["pipeline finished".to_string()]
    );
}

#[test]
fn unknown_upload_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let err = app.get_status("nobody_20260101_000000_000000_x.vcf").unwrap_err();
    assert_matches!(err, IngestError::RecordNotFound(_));
    assert_eq!(err.error_code(), "NOT_FOUND");
}

#[test]
fn traversal_filenames_are_confined_to_storage_root() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    let record = ingest(&app, "../../../../tmp/evil.vcf", "text/plain", VCF).unwrap();
    let stored = Utf8PathBuf::from(&record.file_path);
    assert!(stored
        .as_std_path()
        .starts_with(dir.path().join("uploads")));
    assert!(record.upload_id.ends_with("evil.vcf"));
}

#[test]
fn delimited_upload_reports_detected_format() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_in(dir.path());

    // A .csv file whose content is tab-separated: content wins.
    let data = b"gene\texpression\tsample\nBRCA1\t12.5\ts1\nTP53\t8.1\ts2\n";
    let record = ingest(&app, "matrix.csv", "text/csv", data).unwrap();
    assert_eq!(record.file_format, DataFormat::Tsv);
    assert_eq!(record.metadata.validation_results.delimiter, Some('\t'));
    assert_eq!(record.metadata.validation_results.column_count, Some(3));
}
