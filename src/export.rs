use serde::{Deserialize, Serialize};

use crate::report::{CellValue, ReportTable};

/// Output formats for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Tsv,
    #[default]
    Table,
}

/// Render every report in `format`.
pub fn render(format: ExportFormat, reports: &[ReportTable]) -> String {
    match format {
        ExportFormat::Json => to_json(reports),
        ExportFormat::Csv => join_sections(reports, to_csv),
        ExportFormat::Tsv => join_sections(reports, to_tsv),
        ExportFormat::Table => join_sections(reports, to_table),
    }
}

fn join_sections(reports: &[ReportTable], f: fn(&ReportTable) -> String) -> String {
    reports.iter().map(f).collect::<Vec<_>>().join("\n")
}

pub fn to_csv(report: &ReportTable) -> String {
    let mut output = String::new();

    let headers: Vec<String> = report.columns.iter().map(|c| csv_escape(&c.name)).collect();
    output.push_str(&headers.join(","));
    output.push('\n');

    for row in &report.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| csv_escape(&cell_to_text(cell)))
            .collect();
        output.push_str(&cells.join(","));
        output.push('\n');
    }

    output
}

pub fn to_tsv(report: &ReportTable) -> String {
    let mut output = String::new();

    let headers: Vec<&str> = report.columns.iter().map(|c| c.name.as_str()).collect();
    output.push_str(&headers.join("\t"));
    output.push('\n');

    for row in &report.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| cell_to_text(cell).replace(['\t', '\n', '\r'], " "))
            .collect();
        output.push_str(&cells.join("\t"));
        output.push('\n');
    }

    output
}

/// One report as a JSON array of row objects; several reports as an object
/// keyed by query name.
pub fn to_json(reports: &[ReportTable]) -> String {
    let value = match reports {
        [single] => report_to_json(single),
        many => serde_json::Value::Object(
            many.iter()
                .map(|r| (r.name.clone(), report_to_json(r)))
                .collect(),
        ),
    };
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "[]".to_string())
}

fn report_to_json(report: &ReportTable) -> serde_json::Value {
    let rows = report
        .rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (i, cell) in row.iter().enumerate() {
                let col_name = report
                    .columns
                    .get(i)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| format!("column_{}", i));
                obj.insert(col_name, cell_to_json(cell));
            }
            serde_json::Value::Object(obj)
        })
        .collect();
    serde_json::Value::Array(rows)
}

/// Aligned text table; numbers are right-aligned.
pub fn to_table(report: &ReportTable) -> String {
    let widths: Vec<usize> = report.columns.iter().map(|c| c.max_width).collect();
    let mut output = format!("{}\n", report.title);

    let header: Vec<String> = report
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| pad(&c.name, *w, false))
        .collect();
    output.push_str(header.join(" | ").trim_end());
    output.push('\n');

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&rule.join("-+-"));
    output.push('\n');

    for row in &report.rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(&cell.display(), *w, cell.is_numeric()))
            .collect();
        output.push_str(cells.join(" | ").trim_end());
        output.push('\n');
    }

    let noun = if report.row_count == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "({} {}, {:.1} ms)\n",
        report.row_count,
        noun,
        report.execution_time.as_secs_f64() * 1000.0
    ));
    output
}

fn pad(text: &str, width: usize, right: bool) -> String {
    let fill = width.saturating_sub(unicode_width::UnicodeWidthStr::width(text));
    if right {
        format!("{}{}", " ".repeat(fill), text)
    } else {
        format!("{}{}", text, " ".repeat(fill))
    }
}

fn cell_to_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Null => String::new(),
        other => other.display(),
    }
}

fn cell_to_json(cell: &CellValue) -> serde_json::Value {
    match cell {
        CellValue::Null => serde_json::Value::Null,
        CellValue::Int(i) => serde_json::json!(*i),
        CellValue::Float(f) => serde_json::json!(*f),
        CellValue::Text(s) => serde_json::Value::String(s.clone()),
        CellValue::Json(j) => j.clone(),
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
