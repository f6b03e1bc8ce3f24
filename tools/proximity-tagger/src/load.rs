use anyhow::{Context, Result};
use std::path::Path;
use transit_proximity::Table;

/// Read a headed CSV file into a [`Table`] named `name`.
///
/// Cells are trimmed; every record must have as many fields as the header.
pub fn read_table(path: &Path, name: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Failed to read record {} of {}", index + 1, path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let table = Table::from_rows(name, headers, rows)?;
    log::info!("  Loaded {} rows from {}", table.len(), path.display());
    Ok(table)
}
