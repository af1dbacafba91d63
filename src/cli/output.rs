//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::core::record::Record;
use crate::core::schema::{EntityDescription, PRIMARY_KEY};
use crate::error::Error;
use crate::storage::StoreStats;
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats a status response.
#[must_use]
pub fn format_status(stats: &StoreStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(stats),
        OutputFormat::Json => format_json(stats),
    }
}

fn format_status_text(stats: &StoreStats) -> String {
    let mut output = String::new();
    output.push_str("recordkit Status\n");
    output.push_str("================\n\n");
    let _ = writeln!(output, "  Store:         {}", stats.kind);
    if let Some(path) = &stats.path {
        let _ = writeln!(output, "  Path:          {path}");
    }
    let _ = writeln!(output, "  Schema:        v{}", stats.schema_version);
    if let Some(size) = stats.db_size {
        let _ = writeln!(output, "  DB size:       {}", format_size(size));
    }
    output.push_str("\n  Records:\n");
    for (entity, count) in &stats.entity_counts {
        let _ = writeln!(output, "    {:<20} {count}", truncate(entity, 20));
    }
    output
}

/// JSON form of a record: its object id followed by its values.
#[must_use]
pub fn record_json(record: &Record) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    object.insert(
        PRIMARY_KEY.to_string(),
        record
            .object_id()
            .map_or(serde_json::Value::Null, serde_json::Value::from),
    );
    for (field, value) in record.values() {
        object.insert(field.clone(), value.to_json());
    }
    serde_json::Value::Object(object)
}

/// Formats a list of records of one entity.
#[must_use]
pub fn format_records(entity: &EntityDescription, records: &[&Record], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_records_text(entity, records),
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = records.iter().map(|r| record_json(r)).collect();
            format_json(&rows)
        }
    }
}

fn format_records_text(entity: &EntityDescription, records: &[&Record]) -> String {
    if records.is_empty() {
        return format!("No {} records found.\n", entity.name);
    }

    let mut output = String::new();
    let _ = write!(output, "{:<8}", "ID");
    for field in &entity.fields {
        let _ = write!(output, " {:<20}", truncate(&field.name, 20));
    }
    output.push('\n');
    output.push_str(&"-".repeat(8 + 21 * entity.fields.len()));
    output.push('\n');

    for record in records {
        let id = record
            .object_id()
            .map_or_else(|| "-".to_string(), |i| i.to_string());
        let _ = write!(output, "{id:<8}");
        for field in &entity.fields {
            let value = record
                .get(&field.name)
                .map_or_else(|| "-".to_string(), ToString::to_string);
            let _ = write!(output, " {:<20}", truncate(&value, 20));
        }
        output.push('\n');
    }

    let _ = writeln!(output, "\n{} record(s)", records.len());
    output
}

/// Formats a newly created record.
#[must_use]
pub fn format_created(record: &Record, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "Created {} record {}\n",
            record.entity(),
            record
                .object_id()
                .map_or_else(|| "-".to_string(), |i| i.to_string())
        ),
        OutputFormat::Json => format_json(&record_json(record)),
    }
}

/// Formats a record count.
#[must_use]
pub fn format_count(entity: &str, count: usize, format: OutputFormat) -> String {
    #[derive(Serialize)]
    struct CountOutput<'a> {
        entity: &'a str,
        count: usize,
    }

    match format {
        OutputFormat::Text => format!("{count}\n"),
        OutputFormat::Json => format_json(&CountOutput { entity, count }),
    }
}

/// Formats the result of a delete-all.
#[must_use]
pub fn format_deleted(entity: &str, deleted: usize, format: OutputFormat) -> String {
    #[derive(Serialize)]
    struct DeleteOutput<'a> {
        entity: &'a str,
        deleted: usize,
    }

    match format {
        OutputFormat::Text => format!("Deleted {deleted} {entity} record(s)\n"),
        OutputFormat::Json => format_json(&DeleteOutput { entity, deleted }),
    }
}

/// Formats a plain status message.
#[must_use]
pub fn format_message(message: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{message}\n"),
        OutputFormat::Json => format_json(&serde_json::json!({ "message": message })),
    }
}

/// Formats an error for display.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => format_json(&serde_json::json!({ "error": error.to_string() })),
    }
}

fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a byte size as human-readable.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Truncates a string to max characters with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}
