//
//  bitbucket-client
//  output/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Output Module
//!
//! Renders command results in the format a profile asks for:
//!
//! - **Table**: human-readable `comfy_table` output (the default)
//! - **JSON**: pretty-printed `serde_json`
//! - **YAML**: `serde_yaml`
//!
//! Status lines (success, warning, error) go through [`OutputWriter`] so
//! they are styled consistently with `console`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bitbucket_client::auth::OutputFormat;
//! use bitbucket_client::output::OutputWriter;
//!
//! let writer = OutputWriter::new(OutputFormat::Json);
//! writer.write(&serde_json::json!({"slug": "widgets"})).unwrap();
//! writer.write_success("done");
//! ```

mod table;

pub use table::*;

use serde::Serialize;

pub use crate::auth::OutputFormat;

/// Types that know how to draw themselves as a table.
pub trait TableOutput {
    /// Returns the table text, styled when `color` is set.
    fn render_table(&self, color: bool) -> String;
}

impl TableOutput for serde_json::Value {
    fn render_table(&self, color: bool) -> String {
        render_value(self, color)
    }
}

/// A unified output writer for the three output formats.
///
/// Data goes to stdout; warnings and errors go to stderr. Color is disabled
/// automatically when output is piped or `NO_COLOR` is set.
pub struct OutputWriter {
    format: OutputFormat,
    color: bool,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            color: console::colors_enabled(),
        }
    }

    /// Overrides color detection.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Renders `value` in the configured format.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON or YAML serialization fails.
    pub fn render<T: Serialize + TableOutput>(&self, value: &T) -> anyhow::Result<String> {
        Ok(match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?.trim_end().to_string(),
            OutputFormat::Table => value.render_table(self.color),
        })
    }

    /// Writes `value` to stdout in the configured format.
    pub fn write<T: Serialize + TableOutput>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", self.render(value)?);
        Ok(())
    }

    /// Writes a warning message to stderr, prefixed with `warning:`.
    pub fn write_warning(&self, msg: &str) {
        use console::style;
        if self.color {
            eprintln!("{} {}", style("warning:").yellow().bold(), msg);
        } else {
            eprintln!("warning: {}", msg);
        }
    }

    pub fn write_info(&self, msg: &str) {
        println!("{}", msg);
    }

    /// Writes a success message to stdout behind a check mark.
    pub fn write_success(&self, msg: &str) {
        use console::style;
        if self.color {
            println!("{} {}", style("✓").green().bold(), msg);
        } else {
            println!("✓ {}", msg);
        }
    }
}

/// Prints a key-value pair, dimming the key when color is enabled.
pub fn print_field(key: &str, value: &str, color: bool) {
    use console::style;
    if color {
        println!("{}: {}", style(key).dim(), value);
    } else {
        println!("{}: {}", key, value);
    }
}
