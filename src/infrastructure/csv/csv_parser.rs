// ============================================================
// CSV PARSER
// ============================================================
// Parse CSV files with encoding detection and strict row shapes

use std::path::Path;

use csv::{ReaderBuilder, Trim};
use encoding_rs::WINDOWS_1252;
use tracing::warn;

use crate::domain::error::AppError;

/// Header and untyped records of a CSV file
#[derive(Debug, Clone, PartialEq)]
pub struct RawCsv {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

/// CSV parser with encoding detection
pub struct CsvParser {
    /// Delimiter character (default: comma)
    delimiter: u8,

    /// Whether to trim whitespace from values
    trim: bool,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: true,
        }
    }
}

impl CsvParser {
    /// Create a new CSV parser with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to trim whitespace
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Parse a CSV file
    pub fn parse_file(&self, path: &Path) -> Result<RawCsv, AppError> {
        let content = read_with_encoding_detection(path)?;
        self.parse_content(&content)
    }

    /// Parse a CSV file, sniffing the delimiter from its first lines
    pub fn parse_file_auto_detect(&self, path: &Path) -> Result<RawCsv, AppError> {
        let content = read_with_encoding_detection(path)?;
        let delimiter = Self::detect_delimiter(&content);
        Self {
            delimiter,
            trim: self.trim,
        }
        .parse_content(&content)
    }

    /// Parse CSV content from string
    pub fn parse_content(&self, content: &str) -> Result<RawCsv, AppError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(if self.trim { Trim::All } else { Trim::None })
            .flexible(false)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AppError::ParseError(format!("Failed to read CSV headers: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(AppError::ParseError("CSV file has no header row".to_string()));
        }
        if let Some(idx) = headers.iter().position(|h| h.is_empty()) {
            return Err(AppError::ParseError(format!(
                "CSV header {} is empty",
                idx + 1
            )));
        }

        let mut records = Vec::new();
        for (index, result) in reader.records().enumerate() {
            // csv reports a ragged row as UnequalLengths since flexible(false)
            let record = result.map_err(|e| {
                AppError::ParseError(format!("Failed to parse CSV row {}: {}", index + 1, e))
            })?;
            records.push(record.iter().map(str::to_string).collect());
        }

        Ok(RawCsv { headers, records })
    }

    /// Detect delimiter from content (comma, semicolon, tab, pipe)
    pub fn detect_delimiter(content: &str) -> u8 {
        let candidates = [b',', b';', b'\t', b'|'];
        let sample_lines: Vec<_> = content.lines().take(10).collect();

        let mut best_delimiter = b',';
        let mut best_score = 0.0f32;

        if sample_lines.is_empty() {
            return best_delimiter;
        }

        for &delimiter in &candidates {
            let field_counts: Vec<usize> = sample_lines
                .iter()
                .map(|line| line.bytes().filter(|&b| b == delimiter).count())
                .collect();

            // Score by consistency (low standard deviation) and frequency
            let avg = field_counts.iter().sum::<usize>() as f32 / field_counts.len() as f32;
            let variance = field_counts
                .iter()
                .map(|&x| (x as f32 - avg).powi(2))
                .sum::<f32>()
                / field_counts.len() as f32;

            let score = avg / (1.0 + variance.sqrt());

            if score > best_score {
                best_score = score;
                best_delimiter = delimiter;
            }
        }

        best_delimiter
    }
}

/// Read a file as UTF-8, falling back to Windows-1252 for legacy exports
fn read_with_encoding_detection(path: &Path) -> Result<String, AppError> {
    let buffer = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::FileNotFound(path.display().to_string()),
        _ => AppError::IoError(format!("Failed to read {}: {}", path.display(), e)),
    })?;

    let bytes = buffer.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&buffer);
    match std::str::from_utf8(bytes) {
        Ok(content) => Ok(content.to_string()),
        Err(_) => {
            warn!(
                path = %path.display(),
                "File is not valid UTF-8, decoding as Windows-1252"
            );
            let (content, _, _) = WINDOWS_1252.decode(bytes);
            Ok(content.into_owned())
        }
    }
}
