//! Kubernetes resource quantity parsing
//!
//! CPU is normalised to cores and memory to GiB. Unparseable input yields 0
//! so a malformed value reads as "no requirement" instead of aborting an
//! analysis.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MILLICORES_PER_CORE: f64 = 1000.0;

/// e.g. "100m", "2", "1.5", "250000000n"
static CPU_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?|\.\d+)\s*(m|u|n)?$").unwrap());

/// e.g. "128Mi", "16Gi", "1.5G", "512k", "1073741824"
static MEMORY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?|\.\d+)\s*(Ki|Mi|Gi|Ti|Pi|Ei|[kKmMgGtTpPeE])?$").unwrap()
});

/// Parse a CPU quantity into cores.
///
/// - "500m" -> 0.5
/// - "2" -> 2.0
/// - "250000000n" -> 0.25
pub fn parse_cpu_cores(quantity: &str) -> f64 {
    let trimmed = quantity.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let Some(caps) = CPU_REGEX.captures(trimmed) else {
        debug!(quantity = %quantity, "Unparseable CPU quantity, treating as zero");
        return 0.0;
    };

    let value: f64 = match caps[1].parse() {
        Ok(v) => v,
        Err(_) => return 0.0,
    };

    match caps.get(2).map(|m| m.as_str()) {
        Some("m") => value / MILLICORES_PER_CORE,
        Some("u") => value / 1_000_000.0,
        Some("n") => value / 1_000_000_000.0,
        _ => value,
    }
}

/// Parse a memory quantity into GiB.
///
/// Binary suffixes (Ki/Mi/Gi/Ti) are powers of 1024, single-letter decimal
/// suffixes (k/m/g/t, either case) are powers of 1000. A bare number is bytes.
pub fn parse_memory_gib(quantity: &str) -> f64 {
    let trimmed = quantity.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let Some(caps) = MEMORY_REGEX.captures(trimmed) else {
        debug!(quantity = %quantity, "Unparseable memory quantity, treating as zero");
        return 0.0;
    };

    let value: f64 = match caps[1].parse() {
        Ok(v) => v,
        Err(_) => return 0.0,
    };

    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        None => 1.0,
        Some("Ki") => 1024.0,
        Some("Mi") => 1024.0_f64.powi(2),
        Some("Gi") => 1024.0_f64.powi(3),
        Some("Ti") => 1024.0_f64.powi(4),
        Some("Pi") => 1024.0_f64.powi(5),
        Some("Ei") => 1024.0_f64.powi(6),
        Some(unit) => match unit.to_ascii_lowercase().as_str() {
            "k" => 1e3,
            "m" => 1e6,
            "g" => 1e9,
            "t" => 1e12,
            "p" => 1e15,
            "e" => 1e18,
            _ => return 0.0,
        },
    };

    value * multiplier / BYTES_PER_GIB
}

/// Render cores for display ("500m", "4", "2.5")
pub fn format_cores(cores: f64) -> String {
    if cores > 0.0 && cores < 1.0 {
        format!("{}m", (cores * MILLICORES_PER_CORE).round() as u64)
    } else if (cores - cores.round()).abs() < 1e-9 {
        format!("{}", cores.round() as u64)
    } else {
        format!("{:.2}", cores)
    }
}

/// Render GiB for display ("512Mi", "16Gi", "7.5Gi")
pub fn format_gib(gib: f64) -> String {
    if gib > 0.0 && gib < 1.0 {
        format!("{}Mi", (gib * 1024.0).round() as u64)
    } else if (gib - gib.round()).abs() < 1e-9 {
        format!("{}Gi", gib.round() as u64)
    } else {
        format!("{:.1}Gi", gib)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_cpu_variants() {
        assert!(approx(parse_cpu_cores("500m"), 0.5));
        assert!(approx(parse_cpu_cores("2"), 2.0));
        assert!(approx(parse_cpu_cores("1.5"), 1.5));
        assert!(approx(parse_cpu_cores(" 250m "), 0.25));
        assert!(approx(parse_cpu_cores("250000000n"), 0.25));
        assert!(approx(parse_cpu_cores("1500u"), 0.0015));
    }

    #[test]
    fn test_parse_cpu_malformed_is_zero() {
        assert_eq!(parse_cpu_cores(""), 0.0);
        assert_eq!(parse_cpu_cores("two"), 0.0);
        assert_eq!(parse_cpu_cores("1Gi"), 0.0);
        assert_eq!(parse_cpu_cores("-1"), 0.0);
    }

    #[test]
    fn test_parse_memory_binary_units() {
        assert!(approx(parse_memory_gib("1Gi"), 1.0));
        assert!(approx(parse_memory_gib("512Mi"), 0.5));
        assert!(approx(parse_memory_gib("1048576Ki"), 1.0));
        assert!(approx(parse_memory_gib("2Ti"), 2048.0));
        assert!(approx(parse_memory_gib("1073741824"), 1.0));
    }

    #[test]
    fn test_parse_memory_decimal_units() {
        assert!(approx(parse_memory_gib("1G"), 1e9 / BYTES_PER_GIB));
        assert!(approx(parse_memory_gib("1g"), 1e9 / BYTES_PER_GIB));
        assert!(approx(parse_memory_gib("500M"), 5e8 / BYTES_PER_GIB));
        assert!(approx(parse_memory_gib("500m"), 5e8 / BYTES_PER_GIB));
        assert!(approx(parse_memory_gib("1000k"), 1e6 / BYTES_PER_GIB));
        assert!(approx(parse_memory_gib("1T"), 1e12 / BYTES_PER_GIB));
    }

    #[test]
    fn test_parse_memory_malformed_is_zero() {
        assert_eq!(parse_memory_gib(""), 0.0);
        assert_eq!(parse_memory_gib("lots"), 0.0);
        assert_eq!(parse_memory_gib("12Xi"), 0.0);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_cores(0.5), "500m");
        assert_eq!(format_cores(4.0), "4");
        assert_eq!(format_cores(2.5), "2.50");
        assert_eq!(format_gib(0.5), "512Mi");
        assert_eq!(format_gib(16.0), "16Gi");
        assert_eq!(format_gib(7.5), "7.5Gi");
    }
}
