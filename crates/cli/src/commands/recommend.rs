//! Recommendation CLI command

use anyhow::{bail, Result};
use colored::Colorize;
use fleet_lib::{EngineConfig, ProgressEvent, Recommendation};
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;
use tokio_stream::StreamExt;

use super::engine_for_snapshot;
use crate::output::{
    color_flag, color_savings, format_fleet, format_hourly, print_info, print_json, print_table,
    print_warning, OutputFormat,
};

/// Row for recommendations table
#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "NodePool")]
    nodepool: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Recommended")]
    recommended: String,
    #[tabled(rename = "Class")]
    pricing_class: String,
    #[tabled(rename = "Current $/h")]
    current_cost: String,
    #[tabled(rename = "New $/h")]
    recommended_cost: String,
    #[tabled(rename = "Savings")]
    savings: String,
    #[tabled(rename = "Change")]
    has_recommendation: String,
}

impl From<&Recommendation> for RecommendationRow {
    fn from(rec: &Recommendation) -> Self {
        let current_counts: Vec<u32> = rec
            .current
            .instance_types
            .iter()
            .map(|t| rec.current.nodes.iter().filter(|n| &n.instance_type == t).count() as u32)
            .collect();
        Self {
            nodepool: rec.nodepool.clone(),
            current: format_fleet(&rec.current.instance_types, &current_counts),
            recommended: format_fleet(
                &rec.recommended.instance_types,
                &rec.recommended.nodes_per_type,
            ),
            pricing_class: rec.recommended.pricing_class.to_string(),
            current_cost: format_hourly(rec.current_hourly_cost),
            recommended_cost: format_hourly(rec.recommended_hourly_cost),
            savings: color_savings(rec.savings_percent),
            has_recommendation: color_flag(rec.has_recommendation),
        }
    }
}

/// Analyse the snapshot and print one row per NodePool
pub async fn run(
    config: &EngineConfig,
    snapshot: &Path,
    nodepool: Option<&str>,
    progress: bool,
    format: OutputFormat,
) -> Result<()> {
    let engine = engine_for_snapshot(config, snapshot)?;

    let recommendations = if progress {
        collect_with_progress(Arc::new(engine)).await?
    } else {
        engine.analyze().await?.recommendations
    };

    let selected: Vec<Recommendation> = recommendations
        .into_iter()
        .filter(|r| nodepool.map(|name| r.nodepool == name).unwrap_or(true))
        .collect();

    if let Some(name) = nodepool {
        if selected.is_empty() {
            bail!("NodePool '{}' not found in snapshot", name);
        }
    }

    match format {
        OutputFormat::Json => print_json(&selected)?,
        OutputFormat::Table => {
            let rows: Vec<RecommendationRow> =
                selected.iter().map(RecommendationRow::from).collect();
            print_table(&rows);

            for rec in &selected {
                println!();
                println!("{}", rec.nodepool.bold());
                println!("  {}", rec.rationale);
                if let Some(explanation) = &rec.explanation {
                    println!("  {}", explanation.dimmed());
                }
            }
        }
    }

    Ok(())
}

async fn collect_with_progress(
    engine: Arc<fleet_lib::RecommendationEngine>,
) -> Result<Vec<Recommendation>> {
    let mut events = engine.stream();
    let mut recommendations = Vec::new();

    while let Some(event) = events.next().await {
        match event {
            ProgressEvent::Started { nodepools } => {
                print_info(&format!("Analysing {} NodePools", nodepools));
            }
            ProgressEvent::PoolStarted {
                nodepool,
                index,
                total,
            } => {
                eprintln!("[{}/{}] {}", index + 1, total, nodepool);
            }
            ProgressEvent::PoolCompleted { recommendation, .. } => {
                recommendations.push(*recommendation);
            }
            ProgressEvent::Failed { error } => {
                print_warning(&error);
                bail!("Analysis failed: {}", error);
            }
            ProgressEvent::Finished { summary } => {
                print_info(&format!(
                    "{} of {} NodePools have a recommendation",
                    summary.pools_with_recommendation, summary.pools_analyzed
                ));
            }
        }
    }

    Ok(recommendations)
}
