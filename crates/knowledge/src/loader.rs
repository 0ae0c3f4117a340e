//! Document loading and text extraction.
//!
//! Every supported file type is a [`DocumentFormat`] variant that owns its
//! extraction. Structured formats (CSV, JSON arrays) yield one text unit per
//! row or record so each can be retrieved on its own.

use navigator_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{Document, TextUnit};

/// Extensions accepted by [`DocumentFormat::from_filename`].
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["pdf", "csv", "txt", "text", "md", "json"];

/// Policy table columns rendered first, with their display labels.
const POLICY_COLUMNS: [(&str, &str); 5] = [
    ("Policy_Name", "Policy"),
    ("Policy_ID", "Policy ID"),
    ("Description", "Description"),
    ("Status", "Status"),
    ("Effective_Date", "Effective Date"),
];

/// Closed set of document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Csv,
    PlainText,
    Json,
}

impl DocumentFormat {
    /// Detect the format from a filename's extension.
    pub fn from_filename(filename: &str) -> AppResult<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("csv") => Ok(Self::Csv),
            Some("txt") | Some("text") | Some("md") => Ok(Self::PlainText),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(AppError::UnsupportedFormat(format!(
                "{} (extension .{})",
                filename, other
            ))),
            None => Err(AppError::UnsupportedFormat(format!(
                "{} (no extension)",
                filename
            ))),
        }
    }

    /// Parse the stored name of a format.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "csv" => Some(Self::Csv),
            "plain_text" => Some(Self::PlainText),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Csv => "csv",
            Self::PlainText => "plain_text",
            Self::Json => "json",
        }
    }

    /// Extract the text units of a file of this format.
    pub fn extract(&self, filename: &str, bytes: &[u8]) -> AppResult<Vec<TextUnit>> {
        let units = match self {
            Self::Pdf => extract_pdf(filename, bytes)?,
            Self::Csv => extract_csv(filename, bytes)?,
            Self::PlainText => vec![TextUnit::new(0, None, decode_text(filename, bytes)?)],
            Self::Json => extract_json(filename, bytes)?,
        };

        tracing::debug!(
            "Extracted {} units from {} ({})",
            units.len(),
            filename,
            self.as_str()
        );

        Ok(units)
    }
}

/// Load a document from disk.
pub fn load(path: &Path) -> AppResult<Document> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::UnsupportedFormat(format!("{:?} (no file name)", path)))?;

    // Reject by extension before reading the file
    DocumentFormat::from_filename(filename)?;

    let bytes = std::fs::read(path)?;
    load_bytes(filename, &bytes)
}

/// Build a document from a filename and its raw content.
pub fn load_bytes(filename: &str, bytes: &[u8]) -> AppResult<Document> {
    let format = DocumentFormat::from_filename(filename)?;
    let units = format.extract(filename, bytes)?;
    Ok(Document::new(filename, format, units))
}

fn extraction_error(filename: &str, message: impl Into<String>) -> AppError {
    AppError::Extraction {
        file: filename.to_string(),
        message: message.into(),
    }
}

fn extract_pdf(filename: &str, bytes: &[u8]) -> AppResult<Vec<TextUnit>> {
    // pdf-extract panics on some malformed inputs
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| extraction_error(filename, "PDF parser aborted on malformed input"))?
        .map_err(|e| extraction_error(filename, format!("PDF extraction failed: {}", e)))?;

    if extracted.trim().is_empty() {
        return Err(extraction_error(filename, "PDF contains no extractable text"));
    }

    Ok(vec![TextUnit::new(0, None, extracted)])
}

fn decode_text(filename: &str, bytes: &[u8]) -> AppResult<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| extraction_error(filename, format!("invalid UTF-8: {}", e)))?;

    if text.contains('\0') {
        return Err(extraction_error(filename, "binary content (NUL bytes)"));
    }

    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
}

fn extract_csv(filename: &str, bytes: &[u8]) -> AppResult<Vec<TextUnit>> {
    let text = decode_text(filename, bytes)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| extraction_error(filename, format!("invalid CSV header: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    // Known policy columns first, the rest in file order
    let mut order: Vec<(usize, String)> = Vec::with_capacity(headers.len());
    for (column, label) in POLICY_COLUMNS {
        if let Some(pos) = headers.iter().position(|h| h == column) {
            order.push((pos, label.to_string()));
        }
    }
    for (pos, header) in headers.iter().enumerate() {
        if !order.iter().any(|(p, _)| *p == pos) {
            order.push((pos, header.clone()));
        }
    }

    let mut units = Vec::new();
    for (row_number, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            extraction_error(filename, format!("invalid CSV row {}: {}", row_number + 1, e))
        })?;

        let lines: Vec<String> = order
            .iter()
            .filter_map(|(pos, label)| {
                record
                    .get(*pos)
                    .filter(|value| !value.is_empty())
                    .map(|value| format!("{}: {}", label, value))
            })
            .collect();

        if lines.is_empty() {
            continue;
        }

        units.push(TextUnit::new(
            units.len(),
            Some(format!("row {}", row_number + 1)),
            lines.join("\n"),
        ));
    }

    if units.is_empty() {
        return Err(extraction_error(filename, "CSV has no data rows"));
    }

    Ok(units)
}

fn extract_json(filename: &str, bytes: &[u8]) -> AppResult<Vec<TextUnit>> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| extraction_error(filename, format!("invalid JSON: {}", e)))?;

    let render = |value: &serde_json::Value| -> AppResult<String> {
        match value {
            serde_json::Value::String(s) => Ok(s.clone()),
            other => serde_json::to_string_pretty(other)
                .map_err(|e| extraction_error(filename, e.to_string())),
        }
    };

    match &value {
        serde_json::Value::Array(items) => {
            let mut units = Vec::with_capacity(items.len());
            for (record, item) in items.iter().enumerate() {
                let text = render(item)?;
                if text.trim().is_empty() {
                    continue;
                }
                units.push(TextUnit::new(
                    units.len(),
                    Some(format!("record {}", record + 1)),
                    text,
                ));
            }
            if units.is_empty() {
                return Err(extraction_error(filename, "JSON array has no records"));
            }
            Ok(units)
        }
        other => Ok(vec![TextUnit::new(0, None, render(other)?)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            DocumentFormat::from_filename("EO-14067.PDF").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_filename("policies.csv").unwrap(),
            DocumentFormat::Csv
        );
        assert_eq!(
            DocumentFormat::from_filename("notes.md").unwrap(),
            DocumentFormat::PlainText
        );
        assert_eq!(
            DocumentFormat::from_filename("records.json").unwrap(),
            DocumentFormat::Json
        );
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(
            DocumentFormat::from_filename("setup.exe"),
            Err(AppError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            DocumentFormat::from_filename("README"),
            Err(AppError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_format_names_round_trip() {
        for format in [
            DocumentFormat::Pdf,
            DocumentFormat::Csv,
            DocumentFormat::PlainText,
            DocumentFormat::Json,
        ] {
            assert_eq!(DocumentFormat::parse(format.as_str()), Some(format));
        }
    }

    #[test]
    fn test_plain_text() {
        let doc = load_bytes("doc1.txt", b"Policy X requires annual review.").unwrap();
        assert_eq!(doc.units.len(), 1);
        assert_eq!(doc.text, "Policy X requires annual review.");
        assert_eq!(doc.format, DocumentFormat::PlainText);
    }

    #[test]
    fn test_plain_text_rejects_binary() {
        let result = load_bytes("blob.txt", &[0x66, 0x00, 0x67]);
        assert!(matches!(result, Err(AppError::Extraction { .. })));

        let result = load_bytes("latin1.txt", &[0xe9, 0x74, 0xe9]);
        assert!(matches!(result, Err(AppError::Extraction { .. })));
    }

    #[test]
    fn test_csv_rows_become_units() {
        let csv = "Policy_ID,Policy_Name,Status,Agency\n\
                   P-1,Telework,Active,OPM\n\
                   ,,,\n\
                   P-2,Records Retention,Repealed,NARA\n";
        let doc = load_bytes("policies.csv", csv.as_bytes()).unwrap();

        assert_eq!(doc.units.len(), 2);
        assert_eq!(
            doc.units[0].text,
            "Policy: Telework\nPolicy ID: P-1\nStatus: Active\nAgency: OPM"
        );
        assert_eq!(doc.units[0].label.as_deref(), Some("row 1"));
        assert_eq!(doc.units[1].label.as_deref(), Some("row 3"));
        assert_eq!(doc.units[1].index, 1);
    }

    #[test]
    fn test_csv_without_rows_fails() {
        let result = load_bytes("empty.csv", b"Policy_Name,Status\n");
        assert!(matches!(result, Err(AppError::Extraction { .. })));
    }

    #[test]
    fn test_json_array_records() {
        let json = r#"[{"title": "Telework"}, "Plain record", {"title": "Travel"}]"#;
        let doc = load_bytes("records.json", json.as_bytes()).unwrap();

        assert_eq!(doc.units.len(), 3);
        assert!(doc.units[0].text.contains("\"title\": \"Telework\""));
        assert_eq!(doc.units[1].text, "Plain record");
        assert_eq!(doc.units[2].label.as_deref(), Some("record 3"));
    }

    #[test]
    fn test_json_object_is_one_unit() {
        let doc = load_bytes("one.json", br#"{"a": 1}"#).unwrap();
        assert_eq!(doc.units.len(), 1);
    }

    #[test]
    fn test_invalid_json() {
        let result = load_bytes("broken.json", b"{not json");
        assert!(matches!(result, Err(AppError::Extraction { .. })));
    }

    #[test]
    fn test_corrupted_pdf() {
        let result = load_bytes("broken.pdf", b"%PDF-1.4 this is not really a pdf");
        assert!(matches!(result, Err(AppError::Extraction { .. })));
    }

    #[test]
    fn test_load_from_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("memo.txt");
        std::fs::write(&path, "Travel must be approved in advance.").unwrap();

        let doc = load(&path).unwrap();
        assert_eq!(doc.filename, "memo.txt");
        assert_eq!(doc.text, "Travel must be approved in advance.");
    }
}
