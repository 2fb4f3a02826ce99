//! Cost-related CLI commands

use anyhow::Result;
use colored::Colorize;
use fleet_lib::EngineConfig;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use super::engine_for_snapshot;
use crate::output::{
    format_hourly, format_monthly, print_json, print_table, OutputFormat, HOURS_PER_MONTH,
};

/// Row for per-pool cost table
#[derive(Tabled)]
struct PoolCostRow {
    #[tabled(rename = "NodePool")]
    nodepool: String,
    #[tabled(rename = "Nodes")]
    nodes: u32,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Recommended")]
    recommended: String,
    #[tabled(rename = "Monthly Savings")]
    monthly_savings: String,
}

#[derive(Serialize)]
struct CostReport {
    pools_analyzed: u32,
    pools_with_recommendation: u32,
    current_hourly_cost: f64,
    recommended_hourly_cost: f64,
    hourly_savings: f64,
    current_monthly_cost: f64,
    recommended_monthly_cost: f64,
    monthly_savings: f64,
}

/// Show current vs recommended cost for the whole snapshot
pub async fn show_costs(
    config: &EngineConfig,
    snapshot: &Path,
    format: OutputFormat,
) -> Result<()> {
    let engine = engine_for_snapshot(config, snapshot)?;
    let report = engine.analyze().await?;
    let summary = &report.summary;

    match format {
        OutputFormat::Json => {
            print_json(&CostReport {
                pools_analyzed: summary.pools_analyzed,
                pools_with_recommendation: summary.pools_with_recommendation,
                current_hourly_cost: summary.current_hourly_cost,
                recommended_hourly_cost: summary.recommended_hourly_cost,
                hourly_savings: summary.hourly_savings,
                current_monthly_cost: summary.current_hourly_cost * HOURS_PER_MONTH,
                recommended_monthly_cost: summary.recommended_hourly_cost * HOURS_PER_MONTH,
                monthly_savings: summary.hourly_savings * HOURS_PER_MONTH,
            })?;
        }
        OutputFormat::Table => {
            let rows: Vec<PoolCostRow> = report
                .recommendations
                .iter()
                .map(|rec| PoolCostRow {
                    nodepool: rec.nodepool.clone(),
                    nodes: rec.current.node_count,
                    current: format_hourly(rec.current_hourly_cost),
                    recommended: format_hourly(rec.recommended_hourly_cost),
                    monthly_savings: format_monthly(rec.cost_savings),
                })
                .collect();
            print_table(&rows);
            println!();

            println!("{}", "Fleet Costs".bold());
            println!("{}", "=".repeat(50));
            println!("NodePools:              {}", summary.pools_analyzed);
            println!(
                "With recommendation:    {}",
                summary.pools_with_recommendation
            );
            println!(
                "Current:                {} ({})",
                format_hourly(summary.current_hourly_cost),
                format_monthly(summary.current_hourly_cost)
            );
            println!(
                "Recommended:            {} ({})",
                format_hourly(summary.recommended_hourly_cost).green(),
                format_monthly(summary.recommended_hourly_cost).green()
            );

            let savings_pct = if summary.current_hourly_cost > 0.0 {
                summary.hourly_savings / summary.current_hourly_cost * 100.0
            } else {
                0.0
            };
            println!(
                "{} {} ({:.1}%)",
                "Potential Savings:".bold(),
                format_monthly(summary.hourly_savings).green().bold(),
                savings_pct
            );
            println!();
            println!(
                "Generated: {}",
                report.generated_at.format("%Y-%m-%d %H:%M UTC").to_string().dimmed()
            );
        }
    }

    Ok(())
}
