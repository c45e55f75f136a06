//! Tabular output in text, CSV and JSON.

use anyhow::Result;
use std::io::Write;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns (default)
    #[default]
    Text,
    /// Comma-separated values with a header row
    Csv,
    /// A JSON array of row objects
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Rows of optional cells under named columns. Missing cells render as `-`
/// in text, empty in CSV and `null` in JSON.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Create an empty table.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row.
    pub fn push(&mut self, row: Vec<Option<String>>) {
        self.rows.push(row);
    }

    /// Render the table.
    pub fn write<W: Write>(&self, format: OutputFormat, writer: &mut W) -> Result<()> {
        match format {
            OutputFormat::Text => self.write_text(writer),
            OutputFormat::Csv => self.write_csv(writer),
            OutputFormat::Json => self.write_json(writer),
        }
    }

    fn write_text<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.columns.is_empty() {
            return Ok(());
        }

        // Calculate column widths
        let mut widths: Vec<usize> = self.columns.iter().map(String::len).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.as_deref().map_or(1, str::len);
                if i < widths.len() && len > widths[i] {
                    widths[i] = len;
                }
            }
        }

        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(writer, "  ")?;
            }
            write!(writer, "{:width$}", col, width = widths[i])?;
        }
        writeln!(writer)?;

        for (i, width) in widths.iter().enumerate() {
            if i > 0 {
                write!(writer, "  ")?;
            }
            write!(writer, "{}", "-".repeat(*width))?;
        }
        writeln!(writer)?;

        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    write!(writer, "  ")?;
                }
                let cell = cell.as_deref().unwrap_or("-");
                // Right-align everything but the first column.
                match widths.get(i) {
                    Some(width) if i > 0 => write!(writer, "{cell:>width$}")?,
                    Some(width) => write!(writer, "{cell:width$}")?,
                    None => write!(writer, "{cell}")?,
                }
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    fn write_csv<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(&self.columns)?;
        for row in &self.rows {
            csv.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or_default()))?;
        }
        csv.flush()?;
        Ok(())
    }

    fn write_json<W: Write>(&self, writer: &mut W) -> Result<()> {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, cell)| {
                        let value = cell
                            .clone()
                            .map_or(serde_json::Value::Null, serde_json::Value::String);
                        (col.clone(), value)
                    })
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect();

        writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(["date", "amount"]);
        table.push(vec![Some("2024-01-01".to_string()), Some("10".to_string())]);
        table.push(vec![Some("2024-01-02".to_string()), None]);
        table
    }

    fn render(format: OutputFormat) -> String {
        let mut out = Vec::new();
        sample().write(format, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_alignment() {
        let text = render(OutputFormat::Text);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "date        amount");
        assert_eq!(lines[1], "----------  ------");
        assert_eq!(lines[2], "2024-01-01      10");
        assert_eq!(lines[3], "2024-01-02       -");
    }

    #[test]
    fn test_csv() {
        assert_eq!(
            render(OutputFormat::Csv),
            "date,amount\n2024-01-01,10\n2024-01-02,\n"
        );
    }

    #[test]
    fn test_json_nulls() {
        let value: serde_json::Value = serde_json::from_str(&render(OutputFormat::Json)).unwrap();
        assert_eq!(value[0]["amount"], "10");
        assert!(value[1]["amount"].is_null());
    }
}
