use crate::model::import::{ImportMode, SourceFormat};
use crate::model::mapping::FieldMapping;
use serde::{Deserialize, Serialize};

/// Request payload for starting an import job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartImportRequest {
    /// Storage key of a previously uploaded file, `<owner>/<file>`.
    pub source_location: String,
    /// Fiscal year applied to rows without a year column.
    pub year: i32,
    #[serde(default)]
    pub format: Option<SourceFormat>,
    #[serde(default)]
    pub mapping: Option<FieldMapping>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub mode: ImportMode,
}

/// Request payload for one caller-iterated step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessChunkRequest {
    pub offset: u64,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub location: String,
    pub md5: String,
    pub bytes: u64,
}
