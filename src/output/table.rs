//
//  bitbucket-client
//  output/table.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Table Output Formatting
//!
//! Builds `comfy_table` tables for terminal output, including a generic
//! rendering of raw JSON responses.
//!
//! ## Example
//!
//! ```rust
//! use bitbucket_client::output::TableBuilder;
//!
//! let rendered = TableBuilder::new()
//!     .color(false)
//!     .headers(["Name", "Default"])
//!     .row(["work", "Yes"])
//!     .render();
//! assert!(rendered.contains("work"));
//! ```

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde_json::Value;

/// Widest cell rendered for nested JSON before truncation.
const MAX_NESTED_WIDTH: usize = 40;

/// Creates a table with UTF-8 borders and dynamic column widths.
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// A builder for constructing formatted tables with a fluent API.
///
/// Headers are cyan when color is enabled. Color is auto-detected on
/// creation; use [`color`](TableBuilder::color) to override it.
pub struct TableBuilder {
    table: Table,
    headers: Vec<String>,
    color: bool,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self {
            table: create_table(),
            headers: Vec::new(),
            color: console::colors_enabled(),
        }
    }

    pub fn color(mut self, enabled: bool) -> Self {
        self.color = enabled;
        self
    }

    /// Sets the table headers.
    pub fn headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(|s| s.into()).collect();
        if self.color {
            let header_cells: Vec<Cell> = self
                .headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect();
            self.table.set_header(header_cells);
        } else {
            self.table.set_header(&self.headers);
        }
        self
    }

    pub fn row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let row: Vec<String> = cells.into_iter().map(|s| s.into()).collect();
        self.table.add_row(row);
        self
    }

    pub fn rows<I, R, S>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for row in rows {
            let row: Vec<String> = row.into_iter().map(|s| s.into()).collect();
            self.table.add_row(row);
        }
        self
    }

    pub fn render(self) -> String {
        self.table.to_string()
    }

    pub fn build(self) -> Table {
        self.table
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a boolean value as `Yes`/`No`.
pub fn format_bool(value: bool, color: bool) -> String {
    if color {
        use console::style;
        if value {
            style("Yes").green().to_string()
        } else {
            style("No").dim().to_string()
        }
    } else if value {
        "Yes".to_string()
    } else {
        "No".to_string()
    }
}

/// Truncates a string to at most `max_len` characters, ending in `...` when
/// shortened.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return s.chars().take(max_len).collect();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Renders an arbitrary JSON value as a table.
///
/// - an array of objects becomes one row per element, with a column for
///   every key in order of first appearance
/// - an object becomes a `Field`/`Value` table
/// - a paginated envelope is rendered through its `values`
/// - anything else is printed as a scalar
pub fn render_value(value: &Value, color: bool) -> String {
    match value {
        Value::Object(map) if map.get("values").is_some_and(Value::is_array) => {
            render_value(&map["values"], color)
        }
        Value::Array(items) if items.is_empty() => "No results.".to_string(),
        Value::Array(items) if items.iter().all(Value::is_object) => {
            let mut columns: Vec<&str> = Vec::new();
            for item in items {
                if let Value::Object(map) = item {
                    for key in map.keys() {
                        if !columns.contains(&key.as_str()) {
                            columns.push(key);
                        }
                    }
                }
            }
            let rows = items.iter().map(|item| {
                columns
                    .iter()
                    .map(|column| item.get(*column).map(cell_text).unwrap_or_default())
                    .collect::<Vec<_>>()
            });
            TableBuilder::new()
                .color(color)
                .headers(columns.iter().copied())
                .rows(rows)
                .render()
        }
        Value::Array(items) => TableBuilder::new()
            .color(color)
            .headers(["Value"])
            .rows(items.iter().map(|item| [cell_text(item)]))
            .render(),
        Value::Object(map) => TableBuilder::new()
            .color(color)
            .headers(["Field", "Value"])
            .rows(map.iter().map(|(key, value)| [key.clone(), cell_text(value)]))
            .render(),
        scalar => cell_text(scalar),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => truncate(&nested.to_string(), MAX_NESTED_WIDTH),
    }
}
