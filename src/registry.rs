use serde::Serialize;

use crate::domain::DataFormat;

/// Validation rules for one supported format. Immutable after registry
/// construction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescriptor {
    pub format: DataFormat,
    pub extensions: &'static [&'static str],
    pub mime_types: &'static [&'static str],
    #[serde(rename = "maxSizeBytes")]
    pub max_bytes: u64,
}

impl FormatDescriptor {
    /// Declared MIME is advisory only; this just answers whether it matches
    /// the whitelist.
    pub fn mime_allowed(&self, declared: &str) -> bool {
        let declared = declared.trim().to_ascii_lowercase();
        self.mime_types.iter().any(|mime| *mime == declared)
    }
}

/// Extension-to-descriptor mapping, built once at startup and read-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    descriptors: Vec<FormatDescriptor>,
}

impl FormatRegistry {
    pub fn new(max_bytes: u64) -> Self {
        let table: &[(DataFormat, &'static [&'static str], &'static [&'static str])] = &[
            (DataFormat::Csv, &["csv"], &["text/csv"]),
            (
                DataFormat::Tsv,
                &["tsv", "txt"],
                &["text/tab-separated-values", "text/plain"],
            ),
            (
                DataFormat::Xlsx,
                &["xlsx"],
                &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
            ),
            (DataFormat::Vcf, &["vcf"], &["text/plain"]),
            (DataFormat::Fasta, &["fasta", "fa"], &["text/plain"]),
            (DataFormat::Fastq, &["fastq", "fq"], &["text/plain"]),
            (DataFormat::Bed, &["bed"], &["text/plain"]),
            (DataFormat::Gff, &["gff", "gff3"], &["text/plain"]),
            (DataFormat::Gtf, &["gtf"], &["text/plain"]),
            (DataFormat::Sam, &["sam"], &["text/plain"]),
            (DataFormat::Bam, &["bam"], &["application/octet-stream"]),
        ];

        let descriptors = table
            .iter()
            .map(|(format, extensions, mime_types)| FormatDescriptor {
                format: *format,
                extensions,
                mime_types,
                max_bytes,
            })
            .collect();

        Self { descriptors }
    }

    /// Case-insensitive lookup by bare extension (no leading dot).
    pub fn lookup_extension(&self, extension: &str) -> Option<&FormatDescriptor> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.extensions.contains(&extension.as_str()))
    }

    pub fn descriptor(&self, format: DataFormat) -> &FormatDescriptor {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.format == format)
            .expect("every DataFormat variant is registered")
    }

    pub fn descriptors(&self) -> &[FormatDescriptor] {
        &self.descriptors
    }
}

/// Extract the lowercase extension from a declared filename.
pub fn extension_of(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}
