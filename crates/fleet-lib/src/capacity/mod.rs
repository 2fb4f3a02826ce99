//! Capacity model: canonical units for workload and node resources
//!
//! CPU is always expressed in cores and memory in GiB (`f64`). Raw
//! Kubernetes quantity strings are converted here, tolerantly.

mod quantity;

pub use quantity::{format_cores, format_gib, parse_cpu_cores, parse_memory_gib};

/// Serde helpers accepting either a number (already in canonical units) or a
/// Kubernetes quantity string.
pub mod serde_quantity {
    use super::{parse_cpu_cores, parse_memory_gib};
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawQuantity {
        Number(f64),
        Text(String),
    }

    pub fn cpu<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawQuantity::deserialize(deserializer)? {
            RawQuantity::Number(n) if n.is_finite() && n >= 0.0 => n,
            RawQuantity::Number(_) => 0.0,
            RawQuantity::Text(s) => parse_cpu_cores(&s),
        })
    }

    pub fn memory<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawQuantity::deserialize(deserializer)? {
            RawQuantity::Number(n) if n.is_finite() && n >= 0.0 => n,
            RawQuantity::Number(_) => 0.0,
            RawQuantity::Text(s) => parse_memory_gib(&s),
        })
    }
}
