//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table, or the raw items as JSON
pub fn print_items<T: Serialize, R: Tabled>(items: &[T], rows: Vec<R>, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => match serde_json::to_string_pretty(items) {
            Ok(json) => println!("{}", json),
            Err(e) => print_error(&format!("Failed to serialize output: {}", e)),
        },
    }
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Cores, or `-` when unknown
pub fn format_cpu(cores: Option<f64>) -> String {
    match cores {
        Some(cores) => format!("{}", cores),
        None => "-".to_string(),
    }
}

/// Memory quantity as served by the API, or `-` when unknown
pub fn format_memory(memory: Option<&str>) -> String {
    memory.unwrap_or("-").to_string()
}

/// Color an instance status or yes/no flag
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "running" | "yes" => status.green().to_string(),
        "idle" => status.yellow().to_string(),
        "terminated" | "no" => status.red().to_string(),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_unknown_values() {
        assert_eq!(format_cpu(None), "-");
        assert_eq!(format_cpu(Some(1.1)), "1.1");
        assert_eq!(format_memory(None), "-");
        assert_eq!(format_memory(Some("180M")), "180M");
    }

    #[test]
    fn test_color_status_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(color_status("running"), "running");
        assert_eq!(color_status("unknown"), "unknown");
    }
}
