//! Injected file-parsing capability (spec §6 "File-format contract
//! (consumed)"): `parse(path, filename) -> {table_key -> rows}`. The core
//! only depends on the [`FileParser`] trait; the in-tree csv/xlsx/xls/parquet
//! implementations are the default injected capability, not a specification
//! of the (out-of-scope) HTTP upload contract that stages files for them.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

#[async_trait]
pub trait FileParser: Send + Sync {
    /// Lowercase extensions (without the leading dot) this parser handles.
    fn extensions(&self) -> &'static [&'static str];

    /// Parses `path` (whose original upload name was `filename`, used only to
    /// pick a parser and for error messages) into `table_key -> rows`.
    async fn parse(&self, path: &Path, filename: &str) -> CoreResult<BTreeMap<String, Vec<Value>>>;
}

/// The synthetic table key single-table formats (csv, parquet) are exposed
/// under (spec §4.4).
pub const PRIMARY_TABLE_KEY: &str = "primary";

/// Picks a [`FileParser`] by the extension of `filename` (spec §4.9 step 3).
pub struct ParserFactory {
    parsers: Vec<Box<dyn FileParser>>,
}

impl ParserFactory {
    pub fn with_default_parsers() -> Self {
        Self {
            parsers: vec![
                Box::new(CsvParser),
                Box::new(ExcelParser),
                Box::new(ParquetParser),
            ],
        }
    }

    pub fn parser_for(&self, filename: &str) -> CoreResult<&dyn FileParser> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| CoreError::validation("filename", "file has no extension"))?;
        self.parsers
            .iter()
            .find(|p| p.extensions().contains(&ext.as_str()))
            .map(|b| b.as_ref())
            .ok_or_else(|| CoreError::validation("filename", format!("unsupported file extension '.{ext}'")))
    }
}

/// `.csv`: single table under [`PRIMARY_TABLE_KEY`]. Scalar fields are
/// type-inferred from their raw text (CSV has no native types) the same way
/// the commit preparer would widen mixed columns, so a column of `"1"`,
/// `"2.5"` round-trips as numbers rather than staying stringly-typed.
pub struct CsvParser;

#[async_trait]
impl FileParser for CsvParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    async fn parse(&self, path: &Path, filename: &str) -> CoreResult<BTreeMap<String, Vec<Value>>> {
        let path = path.to_path_buf();
        let filename = filename.to_string();
        let rows = tokio::task::spawn_blocking(move || -> CoreResult<Vec<Value>> {
            let mut reader = csv::Reader::from_path(&path)?;
            let headers = reader.headers()?.clone();
            let mut rows = Vec::new();
            for record in reader.records() {
                let record = record?;
                let mut obj = serde_json::Map::new();
                for (header, field) in headers.iter().zip(record.iter()) {
                    obj.insert(header.to_string(), infer_scalar(field));
                }
                rows.push(Value::Object(obj));
            }
            if rows.is_empty() && headers.is_empty() {
                return Err(CoreError::validation("filename", format!("'{filename}' has no header row")));
            }
            Ok(rows)
        })
        .await
        .map_err(|e| CoreError::Internal(format!("csv parse task panicked: {e}")))??;

        Ok(BTreeMap::from([(PRIMARY_TABLE_KEY.to_string(), rows)]))
    }
}

/// `.xlsx`/`.xls`: one table key per sheet, the sheet's first row used as
/// the header (spec §4.4 "Excel exposes one key per sheet").
pub struct ExcelParser;

#[async_trait]
impl FileParser for ExcelParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["xlsx", "xls"]
    }

    async fn parse(&self, path: &Path, _filename: &str) -> CoreResult<BTreeMap<String, Vec<Value>>> {
        use calamine::Reader;

        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> CoreResult<BTreeMap<String, Vec<Value>>> {
            let mut workbook: calamine::Sheets<_> = calamine::open_workbook_auto(&path)
                .map_err(|e| CoreError::ExternalServiceError(e.to_string()))?;
            let mut tables = BTreeMap::new();
            for sheet_name in workbook.sheet_names().to_vec() {
                let range = workbook
                    .worksheet_range(&sheet_name)
                    .map_err(|e| CoreError::ExternalServiceError(e.to_string()))?;
                let mut rows_iter = range.rows();
                let Some(header) = rows_iter.next() else {
                    tables.insert(sheet_name, Vec::new());
                    continue;
                };
                let headers: Vec<String> = header.iter().map(calamine_cell_to_string).collect();
                let mut rows = Vec::new();
                for record in rows_iter {
                    let mut obj = serde_json::Map::new();
                    for (name, cell) in headers.iter().zip(record.iter()) {
                        obj.insert(name.clone(), calamine_cell_to_json(cell));
                    }
                    rows.push(Value::Object(obj));
                }
                tables.insert(sheet_name, rows);
            }
            Ok(tables)
        })
        .await
        .map_err(|e| CoreError::Internal(format!("excel parse task panicked: {e}")))?
    }
}

fn calamine_cell_to_string(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn calamine_cell_to_json(cell: &calamine::Data) -> Value {
    use calamine::Data;
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Data::Int(i) => Value::Number((*i).into()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Value::String(d.and_utc().to_rfc3339()))
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(format!("{e:?}")),
    }
}

/// `.parquet`: single table under [`PRIMARY_TABLE_KEY`]; each row group's
/// rows are read via the `parquet` crate's row API and converted through its
/// JSON projection, which already maps Arrow-ish logical types onto the
/// dtypes the commit preparer expects.
pub struct ParquetParser;

#[async_trait]
impl FileParser for ParquetParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["parquet"]
    }

    async fn parse(&self, path: &Path, _filename: &str) -> CoreResult<BTreeMap<String, Vec<Value>>> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let path = path.to_path_buf();
        let rows = tokio::task::spawn_blocking(move || -> CoreResult<Vec<Value>> {
            let file = std::fs::File::open(&path)?;
            let reader = SerializedFileReader::new(file)
                .map_err(|e| CoreError::ExternalServiceError(e.to_string()))?;
            let mut rows = Vec::new();
            for row in reader
                .get_row_iter(None)
                .map_err(|e| CoreError::ExternalServiceError(e.to_string()))?
            {
                let row = row.map_err(|e| CoreError::ExternalServiceError(e.to_string()))?;
                rows.push(row.to_json_value());
            }
            Ok(rows)
        })
        .await
        .map_err(|e| CoreError::Internal(format!("parquet parse task panicked: {e}")))??;

        Ok(BTreeMap::from([(PRIMARY_TABLE_KEY.to_string(), rows)]))
    }
}

/// Infers a JSON scalar from a raw CSV field: integer, then float, then
/// bool, falling back to string. Matches the commit preparer's own dtype
/// widening so a CSV-sourced column ends up with the same schema a
/// natively-typed Parquet column would.
fn infer_scalar(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = field.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match field {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    Value::String(field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_integers() {
        assert_eq!(infer_scalar("42"), Value::Number(42.into()));
    }

    #[test]
    fn infers_floats() {
        assert_eq!(infer_scalar("1.5"), json_number(1.5));
    }

    #[test]
    fn infers_booleans() {
        assert_eq!(infer_scalar("true"), Value::Bool(true));
    }

    #[test]
    fn empty_field_is_null() {
        assert_eq!(infer_scalar(""), Value::Null);
    }

    #[test]
    fn non_numeric_stays_string() {
        assert_eq!(infer_scalar("abc"), Value::String("abc".to_string()));
    }

    #[test]
    fn factory_picks_parser_by_extension() {
        let factory = ParserFactory::with_default_parsers();
        assert!(factory.parser_for("rows.csv").is_ok());
        assert!(factory.parser_for("sheet.xlsx").is_ok());
        assert!(factory.parser_for("sheet.xls").is_ok());
        assert!(factory.parser_for("data.parquet").is_ok());
        assert!(factory.parser_for("data.json").is_err());
        assert!(factory.parser_for("no_extension").is_err());
    }

    fn json_number(f: f64) -> Value {
        Value::Number(serde_json::Number::from_f64(f).unwrap())
    }
}
