use serde_json::Value;
use std::time::Duration;

/// Tabular result of one query, ready for export.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    /// Query name (`sales-by-city`, ...).
    pub name: String,
    pub title: String,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<CellValue>>,
    pub row_count: usize,
    pub execution_time: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub max_width: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Json(Value),
}

impl CellValue {
    pub fn display(&self) -> String {
        match self {
            CellValue::Null => "NULL".to_string(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Json(j) => j.to_string(),
        }
    }

    pub fn display_width(&self) -> usize {
        unicode_width::UnicodeWidthStr::width(self.display().as_str())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Int(_) | CellValue::Float(_))
    }
}

impl From<&Value> for CellValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Number(n) => match n.as_i64() {
                Some(i) => CellValue::Int(i),
                None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Null),
            },
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Json(other.clone()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Int(value.into())
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Int(value.into())
    }
}

/// A typed output row that can be laid out as a report line.
pub trait ReportRow {
    /// Column names in output order.
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<CellValue>;
}

impl ReportTable {
    pub fn from_rows<R: ReportRow>(
        name: &str,
        title: &str,
        rows: &[R],
        execution_time: Duration,
    ) -> Self {
        let rows: Vec<Vec<CellValue>> = rows.iter().map(ReportRow::cells).collect();
        let mut columns: Vec<ColumnInfo> = R::COLUMNS
            .iter()
            .map(|name| ColumnInfo {
                name: name.to_string(),
                max_width: unicode_width::UnicodeWidthStr::width(*name),
            })
            .collect();

        for row in &rows {
            for (column, cell) in columns.iter_mut().zip(row) {
                column.max_width = column.max_width.max(cell.display_width());
            }
        }

        Self {
            name: name.to_string(),
            title: title.to_string(),
            columns,
            row_count: rows.len(),
            rows,
            execution_time,
        }
    }

    /// Same contents, ignoring how long the query took.
    pub fn same_contents(&self, other: &ReportTable) -> bool {
        self.name == other.name && self.columns == other.columns && self.rows == other.rows
    }
}
