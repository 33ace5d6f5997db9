//! CSV export of grid rows.

use csv::{Terminator, WriterBuilder};

use crate::column::ColumnDescriptor;
use crate::record::{FORMATTED_VALUE_SUFFIX, Record, is_metadata_key, value_text};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to flush CSV writer: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV output is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

struct ExportColumn {
    header: String,
    key: String,
}

/// Render rows as CSV text, one `\n`-terminated line per record. With
/// columns, each column exports its raw field and, when any row carries one,
/// its formatted companion. Without columns, every non-metadata attribute of
/// the first row is exported.
pub fn export_csv(rows: &[Record], columns: &[ColumnDescriptor]) -> Result<String, ExportError> {
    let Some(first) = rows.first() else {
        return Ok(String::new());
    };

    let export_columns: Vec<ExportColumn> = if columns.is_empty() {
        first
            .keys()
            .filter(|k| !is_metadata_key(k))
            .map(|k| ExportColumn {
                header: k.clone(),
                key: k.clone(),
            })
            .collect()
    } else {
        columns
            .iter()
            .flat_map(|col| {
                let formatted_key = format!("{}{FORMATTED_VALUE_SUFFIX}", col.field_name);
                let has_formatted = rows.iter().any(|row| row.has(&formatted_key));
                let raw = ExportColumn {
                    header: col.display_name.clone(),
                    key: col.field_name.clone(),
                };
                let formatted = has_formatted.then(|| ExportColumn {
                    header: format!("{} (Formatted)", col.display_name),
                    key: formatted_key,
                });
                std::iter::once(raw).chain(formatted)
            })
            .collect()
    };

    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(export_columns.iter().map(|c| c.header.as_str()))?;
    for row in rows {
        writer.write_record(
            export_columns
                .iter()
                .map(|c| row.get(&c.key).map(value_text).unwrap_or_default()),
        )?;
    }
    writer.flush()?;

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
