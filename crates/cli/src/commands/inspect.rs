//! Price and candidate lookups

use anyhow::Result;
use fleet_lib::catalog::RatioClass;
use fleet_lib::{Architecture, EngineConfig, PricingClass};
use tabled::Tabled;

use super::engine_without_inventory;
use crate::output::{
    format_hourly, format_monthly, print_info, print_json, print_success, print_table,
    print_warning, OutputFormat,
};

/// Row for candidates table
#[derive(Tabled)]
struct CandidateRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Instance Type")]
    name: String,
    #[tabled(rename = "vCPU")]
    vcpus: u32,
    #[tabled(rename = "Memory GiB")]
    memory_gib: String,
    #[tabled(rename = "Family")]
    family: String,
}

/// Resolve one price through the full chain
pub async fn show_price(
    config: &EngineConfig,
    instance_type: &str,
    class: PricingClass,
    format: OutputFormat,
) -> Result<()> {
    let engine = engine_without_inventory(config)?;
    let quote = engine.price(instance_type, class).await;

    match format {
        OutputFormat::Json => print_json(&quote)?,
        OutputFormat::Table => {
            if quote.is_resolved() {
                print_success(&format!(
                    "{} ({}): {} / {}  [source: {}]",
                    quote.instance_type,
                    quote.pricing_class,
                    format_hourly(quote.hourly_price),
                    format_monthly(quote.hourly_price),
                    quote.source
                ));
            } else {
                print_warning(&format!(
                    "No price available for {} ({})",
                    quote.instance_type, quote.pricing_class
                ));
            }
        }
    }

    Ok(())
}

/// List ranked candidate types for a requirement
pub async fn show_candidates(
    config: &EngineConfig,
    architecture: Architecture,
    cpu_cores: f64,
    memory_gib: f64,
    format: OutputFormat,
) -> Result<()> {
    let engine = engine_without_inventory(config)?;
    let candidates = engine.candidate_types(architecture, cpu_cores, memory_gib).await;

    match format {
        OutputFormat::Json => print_json(&candidates)?,
        OutputFormat::Table => {
            let class = candidates
                .ratio_class
                .unwrap_or_else(|| RatioClass::classify(cpu_cores, memory_gib));
            print_info(&format!(
                "{} candidates ({}, {:?})",
                class, architecture, candidates.source
            ));
            let rows: Vec<CandidateRow> = candidates
                .types
                .iter()
                .enumerate()
                .map(|(i, spec)| CandidateRow {
                    rank: i + 1,
                    name: spec.name.clone(),
                    vcpus: spec.vcpus,
                    memory_gib: format!("{:.1}", spec.memory_gib),
                    family: spec.family.to_string(),
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}
