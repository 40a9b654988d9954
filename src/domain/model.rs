use serde::{Deserialize, Serialize};

/// One FASTQ entry. `id` is stored without the leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastqRecord {
    pub id: String,
    pub sequence: String,
    pub quality: String,
}

impl FastqRecord {
    pub fn new(
        id: impl Into<String>,
        sequence: impl Into<String>,
        quality: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
            quality: quality.into(),
        }
    }
}

/// One feature line of a GFF3/GTF file. Coordinates are 1-based, inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GffRecord {
    pub seqid: String,
    pub source: String,
    pub feature_type: String,
    pub start: u64,
    pub end: u64,
    pub score: Option<f64>,
    pub strand: Option<char>,
    pub phase: Option<u8>,
    pub attributes: String,
}
