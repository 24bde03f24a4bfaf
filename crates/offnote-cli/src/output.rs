//! Output formatting helpers for the CLI.

use chrono::{DateTime, Utc};
use comfy_table::presets::NOTHING;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use offnote_core::Note;

const SUMMARY_MAX: usize = 60;

pub fn note_json(note: &Note) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::to_value(note)?)
}

pub fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// First line of the content, truncated for table display.
pub fn summary(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or("");
    if first_line.chars().count() > SUMMARY_MAX {
        let truncated: String = first_line.chars().take(SUMMARY_MAX - 1).collect();
        format!("{}…", truncated)
    } else {
        first_line.to_string()
    }
}

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

/// Borderless table with dim headers.
pub fn simple_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|header| Cell::new(header).add_attribute(Attribute::Dim))
            .collect::<Vec<_>>(),
    );
    for i in 0..headers.len() {
        if let Some(column) = table.column_mut(i) {
            column.set_padding((0, 2));
        }
    }
    for row in rows {
        table.add_row(row);
    }
    table.to_string()
}

pub fn notes_table(notes: &[Note]) -> String {
    let rows = notes
        .iter()
        .map(|note| {
            vec![
                note.id.clone(),
                format_time(&note.updated_at),
                note.title.clone(),
                summary(&note.content),
                note.tags.join(", "),
            ]
        })
        .collect();
    simple_table(&["ID", "UPDATED", "TITLE", "CONTENT", "TAGS"], rows)
}

pub fn print_note(note: &Note, quiet: bool) {
    if !quiet {
        println!("ID: {}", note.id);
        println!("Title: {}", note.title);
        println!("Created: {}", note.created_at);
        println!("Updated: {}", note.updated_at);
        if !note.tags.is_empty() {
            println!("Tags: {}", note.tags.join(", "));
        }
        println!();
    }
    println!("{}", note.content);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_truncates_first_line() {
        assert_eq!(summary("short\nsecond line"), "short");
        let long = "x".repeat(100);
        let result = summary(&long);
        assert_eq!(result.chars().count(), SUMMARY_MAX);
        assert!(result.ends_with('…'));
    }
}
