//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Hours used to turn hourly into monthly figures
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of rows
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serialisable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an hourly USD amount
pub fn format_hourly(amount: f64) -> String {
    format!("${:.4}/h", amount)
}

/// Format an hourly USD amount as a monthly one
pub fn format_monthly(hourly: f64) -> String {
    format!("${:.2}/mo", hourly * HOURS_PER_MONTH)
}

/// Format a percentage with sign
pub fn format_percent(percent: f64) -> String {
    format!("{:+.1}%", percent)
}

/// Color savings: green when positive, dimmed otherwise
pub fn color_savings(percent: f64) -> String {
    let formatted = format_percent(percent);
    if percent > 0.0 {
        formatted.green().to_string()
    } else {
        formatted.dimmed().to_string()
    }
}

/// Color a yes/no flag
pub fn color_flag(flag: bool) -> String {
    if flag {
        "yes".green().to_string()
    } else {
        "no".dimmed().to_string()
    }
}

/// Render a fleet as "3 x m6i.xlarge + 2 x m6a.xlarge"
pub fn format_fleet(types: &[String], counts: &[u32]) -> String {
    if types.is_empty() {
        return "-".to_string();
    }
    types
        .iter()
        .zip(counts)
        .map(|(t, n)| format!("{} x {}", n, t))
        .collect::<Vec<_>>()
        .join(" + ")
}
