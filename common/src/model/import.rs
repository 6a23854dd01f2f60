use serde::{Deserialize, Serialize};
use std::path::Path;

/// Physical layout of an uploaded registry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Delimited,
    Spreadsheet,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Delimited => "delimited",
            SourceFormat::Spreadsheet => "spreadsheet",
        }
    }

    pub fn parse(value: &str) -> Option<SourceFormat> {
        match value {
            "delimited" => Some(SourceFormat::Delimited),
            "spreadsheet" => Some(SourceFormat::Spreadsheet),
            _ => None,
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &str) -> Option<SourceFormat> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;
        match ext.as_str() {
            "csv" | "txt" | "tsv" => Some(SourceFormat::Delimited),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(SourceFormat::Spreadsheet),
            _ => None,
        }
    }
}

/// Who drives the chunk loop of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// The client calls the chunk endpoint until `done`.
    #[default]
    Iterated,
    /// The server loops over chunks in a background task.
    Background,
    /// The server parses the file as a stream with pause/resume control.
    Stream,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Iterated => "iterated",
            ImportMode::Background => "background",
            ImportMode::Stream => "stream",
        }
    }

    pub fn parse(value: &str) -> Option<ImportMode> {
        match value {
            "iterated" => Some(ImportMode::Iterated),
            "background" => Some(ImportMode::Background),
            "stream" => Some(ImportMode::Stream),
            _ => None,
        }
    }
}

/// Number of distinct canonical records touched by one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCounts {
    pub companies: u64,
    pub entities: u64,
    pub holdings: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_inferred_from_extension() {
        assert_eq!(SourceFormat::from_path("o1/aksjonaerer.CSV"), Some(SourceFormat::Delimited));
        assert_eq!(SourceFormat::from_path("o1/register.xlsx"), Some(SourceFormat::Spreadsheet));
        assert_eq!(SourceFormat::from_path("o1/register.pdf"), None);
        assert_eq!(SourceFormat::from_path("o1/register"), None);
    }
}
