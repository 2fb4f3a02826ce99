//! Instance-type identifier parsing
//!
//! An identifier such as `m6i.2xlarge` is split once into family letters
//! (`m`), generation (`6`), attribute letters (`i`) and size (`2xlarge`).
//! The family token is then looked up in [`FAMILY_TEMPLATES`].

use crate::models::Architecture;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse instance family classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceFamily {
    GeneralPurpose,
    ComputeOptimized,
    MemoryOptimized,
    Burstable,
    Accelerated,
}

impl fmt::Display for InstanceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstanceFamily::GeneralPurpose => "general-purpose",
            InstanceFamily::ComputeOptimized => "compute-optimized",
            InstanceFamily::MemoryOptimized => "memory-optimized",
            InstanceFamily::Burstable => "burstable",
            InstanceFamily::Accelerated => "accelerated",
        };
        f.write_str(name)
    }
}

/// Capacity and price template for one family token
#[derive(Debug, Clone, Copy)]
pub struct FamilyTemplate {
    pub token: &'static str,
    pub family: InstanceFamily,
    pub memory_per_vcpu: f64,
    /// On-demand USD/hour of the `xlarge` size on x86 Intel
    pub xlarge_hourly_price: f64,
    pub gpus: u32,
}

const fn template(
    token: &'static str,
    family: InstanceFamily,
    memory_per_vcpu: f64,
    xlarge_hourly_price: f64,
    gpus: u32,
) -> FamilyTemplate {
    FamilyTemplate {
        token,
        family,
        memory_per_vcpu,
        xlarge_hourly_price,
        gpus,
    }
}

pub const FAMILY_TEMPLATES: &[FamilyTemplate] = &[
    template("m", InstanceFamily::GeneralPurpose, 4.0, 0.192, 0),
    template("c", InstanceFamily::ComputeOptimized, 2.0, 0.17, 0),
    template("r", InstanceFamily::MemoryOptimized, 8.0, 0.252, 0),
    template("x", InstanceFamily::MemoryOptimized, 16.0, 0.4168, 0),
    template("z", InstanceFamily::MemoryOptimized, 8.0, 0.372, 0),
    template("t", InstanceFamily::Burstable, 4.0, 0.1664, 0),
    template("g", InstanceFamily::Accelerated, 4.0, 0.526, 1),
    template("p", InstanceFamily::Accelerated, 7.625, 1.53, 1),
    template("inf", InstanceFamily::Accelerated, 2.0, 0.228, 1),
    template("trn", InstanceFamily::Accelerated, 4.0, 0.67, 1),
];

const ARM_PRICE_FACTOR: f64 = 0.8;
const AMD_PRICE_FACTOR: f64 = 0.9;
const VCPUS_PER_XLARGE: f64 = 4.0;

/// Burstable sizes: (size, vCPUs, memory GiB)
const BURSTABLE_SIZES: &[(&str, u32, f64)] = &[
    ("nano", 2, 0.5),
    ("micro", 2, 1.0),
    ("small", 2, 2.0),
    ("medium", 2, 4.0),
    ("large", 2, 8.0),
    ("xlarge", 4, 16.0),
    ("2xlarge", 8, 32.0),
];

/// Parsed instance type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceTypeSpec {
    pub name: String,
    pub family_token: String,
    pub generation: u32,
    pub attributes: String,
    pub size: String,
    /// Size relative to `xlarge`
    pub size_multiplier: f64,
    pub vcpus: u32,
    pub memory_gib: f64,
    pub architecture: Architecture,
    pub family: InstanceFamily,
    pub gpus: u32,
}

impl InstanceTypeSpec {
    /// Parse an identifier, returning `None` for unknown families and sizes
    pub fn parse(name: &str) -> Option<Self> {
        let (prefix, size) = name.trim().split_once('.')?;

        let letters_end = prefix.find(|c: char| !c.is_ascii_lowercase())?;
        let family_token = &prefix[..letters_end];
        let rest = &prefix[letters_end..];
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let generation: u32 = rest[..digits_end].parse().ok()?;
        let attributes = &rest[digits_end..];

        let template = template_for(family_token)?;
        let size_multiplier = size_multiplier(size)?;

        let architecture = if attributes.contains('g') {
            Architecture::Arm64
        } else {
            Architecture::Amd64
        };

        let (vcpus, memory_gib) = if template.family == InstanceFamily::Burstable {
            let (_, vcpus, memory) = BURSTABLE_SIZES.iter().find(|(s, _, _)| *s == size)?;
            (*vcpus, *memory)
        } else {
            let vcpus = (VCPUS_PER_XLARGE * size_multiplier).round().max(1.0) as u32;
            (vcpus, vcpus as f64 * template.memory_per_vcpu)
        };

        Some(Self {
            name: name.trim().to_string(),
            family_token: family_token.to_string(),
            generation,
            attributes: attributes.to_string(),
            size: size.to_string(),
            size_multiplier,
            vcpus,
            memory_gib,
            architecture,
            family: template.family,
            gpus: if template.gpus > 0 {
                // larger accelerated sizes carry more devices
                template.gpus * (size_multiplier / 12.0).ceil().max(1.0) as u32
            } else {
                0
            },
        })
    }

    pub fn is_accelerated(&self) -> bool {
        self.family == InstanceFamily::Accelerated || self.gpus > 0
    }

    /// Family-heuristic on-demand price for this size
    pub fn heuristic_hourly_price(&self) -> f64 {
        let Some(template) = template_for(&self.family_token) else {
            return 0.0;
        };
        let mut price = template.xlarge_hourly_price * self.size_multiplier;
        if self.architecture == Architecture::Arm64 {
            price *= ARM_PRICE_FACTOR;
        } else if self.attributes.contains('a') {
            price *= AMD_PRICE_FACTOR;
        }
        price
    }

    /// Weighted capacity used for cost-efficiency ranking
    pub fn capacity_score(&self) -> f64 {
        0.7 * self.vcpus as f64 + 0.3 * self.memory_gib
    }
}

fn template_for(token: &str) -> Option<&'static FamilyTemplate> {
    FAMILY_TEMPLATES.iter().find(|t| t.token == token)
}

/// Size multiplier relative to `xlarge`; `metal` and unknown sizes are `None`
pub fn size_multiplier(size: &str) -> Option<f64> {
    match size {
        "nano" => Some(0.03125),
        "micro" => Some(0.0625),
        "small" => Some(0.125),
        "medium" => Some(0.25),
        "large" => Some(0.5),
        "xlarge" => Some(1.0),
        other => {
            let count = other.strip_suffix("xlarge")?;
            let n: u32 = count.parse().ok()?;
            (n > 0).then_some(n as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_general_purpose() {
        let spec = InstanceTypeSpec::parse("m6i.2xlarge").unwrap();
        assert_eq!(spec.family_token, "m");
        assert_eq!(spec.generation, 6);
        assert_eq!(spec.attributes, "i");
        assert_eq!(spec.size, "2xlarge");
        assert_eq!(spec.vcpus, 8);
        assert_eq!(spec.memory_gib, 32.0);
        assert_eq!(spec.architecture, Architecture::Amd64);
        assert_eq!(spec.family, InstanceFamily::GeneralPurpose);
        assert!((spec.heuristic_hourly_price() - 0.384).abs() < 1e-9);
    }

    #[test]
    fn test_parse_arm_and_amd_variants() {
        let graviton = InstanceTypeSpec::parse("r6g.xlarge").unwrap();
        assert_eq!(graviton.architecture, Architecture::Arm64);
        assert_eq!(graviton.family, InstanceFamily::MemoryOptimized);
        assert_eq!(graviton.memory_gib, 32.0);
        assert!((graviton.heuristic_hourly_price() - 0.252 * 0.8).abs() < 1e-9);

        let amd = InstanceTypeSpec::parse("c6a.4xlarge").unwrap();
        assert_eq!(amd.architecture, Architecture::Amd64);
        assert_eq!(amd.vcpus, 16);
        assert!((amd.heuristic_hourly_price() - 0.17 * 4.0 * 0.9).abs() < 1e-9);

        let x2 = InstanceTypeSpec::parse("x2gd.xlarge").unwrap();
        assert_eq!(x2.architecture, Architecture::Arm64);
        assert_eq!(x2.memory_gib, 64.0);
    }

    #[test]
    fn test_parse_burstable_uses_size_table() {
        let small = InstanceTypeSpec::parse("t3.small").unwrap();
        assert_eq!(small.family, InstanceFamily::Burstable);
        assert_eq!(small.vcpus, 2);
        assert_eq!(small.memory_gib, 2.0);
        assert!((small.heuristic_hourly_price() - 0.0208).abs() < 1e-9);

        let arm = InstanceTypeSpec::parse("t4g.medium").unwrap();
        assert_eq!(arm.architecture, Architecture::Arm64);
    }

    #[test]
    fn test_parse_accelerated() {
        let g5 = InstanceTypeSpec::parse("g5.xlarge").unwrap();
        assert!(g5.is_accelerated());
        assert_eq!(g5.gpus, 1);
        assert_eq!(g5.architecture, Architecture::Amd64);

        let g5g = InstanceTypeSpec::parse("g5g.2xlarge").unwrap();
        assert_eq!(g5g.architecture, Architecture::Arm64);

        let inf = InstanceTypeSpec::parse("inf2.xlarge").unwrap();
        assert_eq!(inf.family_token, "inf");
        assert_eq!(inf.generation, 2);

        let big = InstanceTypeSpec::parse("g4dn.24xlarge").unwrap();
        assert_eq!(big.gpus, 2);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(InstanceTypeSpec::parse("m5.metal").is_none());
        assert!(InstanceTypeSpec::parse("q9.xlarge").is_none());
        assert!(InstanceTypeSpec::parse("m6i").is_none());
        assert!(InstanceTypeSpec::parse("m.xlarge").is_none());
        assert!(InstanceTypeSpec::parse("").is_none());
    }

    #[test]
    fn test_size_multipliers() {
        assert_eq!(size_multiplier("large"), Some(0.5));
        assert_eq!(size_multiplier("medium"), Some(0.25));
        assert_eq!(size_multiplier("12xlarge"), Some(12.0));
        assert_eq!(size_multiplier("0xlarge"), None);
        assert_eq!(size_multiplier("metal"), None);
    }
}
