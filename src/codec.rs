use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader as _};
use rust_xlsxwriter::Workbook;
use std::path::Path;

/// In-memory tabular data: ordered headers, ordered rows of cell text.
/// Interchange representation between the spreadsheet and delimited codecs;
/// a decode→encode round trip preserves it exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RowSet {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn is_empty_schema(&self) -> bool {
        self.headers.is_empty()
    }
}

pub fn decode(path: &Path) -> Result<RowSet> {
    match extension(path).as_deref() {
        Some("csv") => decode_csv(path),
        _ => decode_spreadsheet(path),
    }
}

pub fn encode(rows: &RowSet, path: &Path) -> Result<()> {
    match extension(path).as_deref() {
        Some("csv") => encode_csv(rows, path),
        Some("xlsx") => encode_xlsx(rows, path),
        other => Err(anyhow!(
            "unsupported output format: {:?} ({})",
            other,
            path.display()
        )),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn decode_csv(path: &Path) -> Result<RowSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening csv: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| "reading csv header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| "reading csv record")?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RowSet::new(headers, rows))
}

fn encode_csv(rows: &RowSet, path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("creating csv: {}", path.display()))?;

    writer
        .write_record(&rows.headers)
        .with_context(|| "writing csv header row")?;
    for row in &rows.rows {
        writer.write_record(row).with_context(|| "writing csv record")?;
    }
    writer.flush().with_context(|| "flushing csv")?;
    Ok(())
}

fn decode_spreadsheet(path: &Path) -> Result<RowSet> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("opening spreadsheet: {}", path.display()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("spreadsheet has no sheets: {}", path.display()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading sheet '{sheet}'"))?;

    let mut rows_iter = range.rows();
    let headers = match rows_iter.next() {
        Some(row) => row.iter().map(cell_text).collect(),
        None => Vec::new(),
    };
    let rows = rows_iter
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    Ok(RowSet::new(headers, rows))
}

fn encode_xlsx(rows: &RowSet, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in rows.headers.iter().enumerate() {
        worksheet
            .write_string(0, col_index(col)?, header.as_str())
            .with_context(|| "writing header cell")?;
    }
    for (r, row) in rows.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            worksheet
                .write_string(r as u32 + 1, col_index(c)?, cell.as_str())
                .with_context(|| format!("writing cell at row {}", r + 2))?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("saving spreadsheet: {}", path.display()))?;
    Ok(())
}

fn col_index(col: usize) -> Result<u16> {
    u16::try_from(col).map_err(|_| anyhow!("too many columns: {}", col + 1))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => float_text(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

// Excel stores integers as floats; render 3.0 as "3" so values survive the
// spreadsheet→csv→spreadsheet trip unchanged.
fn float_text(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
