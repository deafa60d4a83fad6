use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::GridError;
use crate::table::frame::{DataFrame, Field, FieldType, Value};

/// Rows inspected when guessing a column's type
const TYPE_SAMPLE: usize = 1_000;

/// Detected file format
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Tsv,
}

impl FileFormat {
    /// Detect format from file extension
    fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(FileFormat::Csv),
            "tsv" | "tab" => Some(FileFormat::Tsv),
            _ => None,
        }
    }

    fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv => b',',
            FileFormat::Tsv => b'\t',
        }
    }
}

/// Result of loading a file, including any warnings
pub struct LoadResult {
    pub frame: DataFrame,
    pub warnings: Vec<String>,
}

pub struct FileIO {
    pub file_path: PathBuf,
    format: FileFormat,
    delimiter: u8,
}

impl FileIO {
    /// Unknown extensions are read as CSV. An explicit delimiter overrides
    /// the one implied by the extension.
    pub fn new(file_path: PathBuf, delimiter: Option<u8>) -> Self {
        let format = FileFormat::from_extension(&file_path).unwrap_or(FileFormat::Csv);
        let delimiter = delimiter.unwrap_or_else(|| format.delimiter());
        Self { file_path, format, delimiter }
    }

    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Load the file into a frame; the first record is the header
    pub fn load_frame(&self) -> Result<LoadResult, GridError> {
        let file = File::open(&self.file_path)
            .map_err(|source| GridError::Read { path: self.file_path.clone(), source })?;
        let reader = BufReader::with_capacity(1 << 20, file); // 1 MB
        let LoadResult { frame, warnings } = read_frame(reader, self.delimiter)?;
        Ok(LoadResult { frame: frame.with_name(&self.file_name()), warnings })
    }
}

/// Parse delimited text into a frame, inferring a type per column
pub fn read_frame<R: io::Read>(reader: R, delimiter: u8) -> Result<LoadResult, GridError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::Fields)
        .from_reader(reader);

    let mut records = csv_reader.records();
    let header: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(|s| s.to_string()).collect(),
        None => return Ok(LoadResult { frame: DataFrame::new(Vec::new()), warnings: Vec::new() }),
    };

    let mut columns: Vec<Vec<String>> = vec![Vec::new(); header.len()];
    let mut warnings = Vec::new();
    let mut padded = 0;
    let mut truncated = 0;

    for record in records {
        let record = record?;
        if record.len() < header.len() {
            padded += 1;
        } else if record.len() > header.len() {
            truncated += 1;
        }
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or("").to_string());
        }
    }

    if padded > 0 {
        warnings.push(format!("Padded {} short rows with empty cells", padded));
    }
    if truncated > 0 {
        warnings.push(format!("Dropped extra cells from {} long rows", truncated));
    }

    let names = unique_names(&header);
    let fields: Vec<Field> = names.iter()
        .zip(columns)
        .map(|(name, raw)| {
            let field_type = infer_column_type(&raw);
            let values = raw.iter().map(|s| parse_value(s, field_type)).collect();
            Field::new(name, field_type, values)
        })
        .collect();

    debug!(fields = fields.len(), rows = fields.first().map(|f| f.len()).unwrap_or(0), "loaded delimited file");
    Ok(LoadResult { frame: DataFrame::new(fields), warnings })
}

/// Blank headers get a positional name and duplicates a numeric suffix
fn unique_names(header: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(header.len());
    for (i, raw) in header.iter().enumerate() {
        let base = if raw.is_empty() { format!("Field {}", i + 1) } else { raw.clone() };
        let mut name = base.clone();
        let mut n = 2;
        while names.contains(&name) {
            name = format!("{} {}", base, n);
            n += 1;
        }
        names.push(name);
    }
    names
}

/// Guess a column type from a sample of its non-empty cells
fn infer_column_type(raw: &[String]) -> FieldType {
    let sample: Vec<&str> = raw.iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .take(TYPE_SAMPLE)
        .collect();

    if sample.is_empty() {
        return FieldType::String;
    }
    if sample.iter().all(|s| s.parse::<f64>().is_ok()) {
        FieldType::Number
    } else if sample.iter().all(|s| parse_bool(s).is_some()) {
        FieldType::Boolean
    } else if sample.iter().all(|s| parse_time(s).is_some()) {
        FieldType::Time
    } else {
        FieldType::String
    }
}

fn parse_value(raw: &str, field_type: FieldType) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    let parsed = match field_type {
        FieldType::Number => raw.parse::<f64>().ok().map(Value::Number),
        FieldType::Boolean => parse_bool(raw).map(Value::Bool),
        FieldType::Time => parse_time(raw).map(Value::Time),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::Text(raw.to_string()))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` or a bare date, as epoch milliseconds
fn parse_time(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
