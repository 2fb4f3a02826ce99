//! Hardcoded on-demand prices (USD/hour) for common instance types

use crate::catalog::gpu_instance;

const STATIC_PRICES: &[(&str, f64)] = &[
    // general purpose
    ("m5.large", 0.096),
    ("m5.xlarge", 0.192),
    ("m5.2xlarge", 0.384),
    ("m5.4xlarge", 0.768),
    ("m6i.large", 0.096),
    ("m6i.xlarge", 0.192),
    ("m6i.2xlarge", 0.384),
    ("m6i.4xlarge", 0.768),
    ("m6a.large", 0.0864),
    ("m6a.xlarge", 0.1728),
    ("m6a.2xlarge", 0.3456),
    ("m7i.xlarge", 0.2016),
    ("m6g.large", 0.077),
    ("m6g.xlarge", 0.154),
    ("m6g.2xlarge", 0.308),
    ("m7g.large", 0.0816),
    ("m7g.xlarge", 0.1632),
    ("m7g.2xlarge", 0.3264),
    // compute optimized
    ("c5.2xlarge", 0.34),
    ("c5.4xlarge", 0.68),
    ("c6i.2xlarge", 0.34),
    ("c6i.4xlarge", 0.68),
    ("c6a.2xlarge", 0.306),
    ("c6a.4xlarge", 0.612),
    ("c7i.2xlarge", 0.357),
    ("c6g.2xlarge", 0.272),
    ("c6g.4xlarge", 0.544),
    ("c7g.2xlarge", 0.29),
    ("c7g.4xlarge", 0.58),
    // memory optimized
    ("r5.xlarge", 0.252),
    ("r5.2xlarge", 0.504),
    ("r6i.large", 0.126),
    ("r6i.xlarge", 0.252),
    ("r6i.2xlarge", 0.504),
    ("r6a.xlarge", 0.2268),
    ("r6a.2xlarge", 0.4536),
    ("r6g.large", 0.1008),
    ("r6g.xlarge", 0.2016),
    ("r6g.2xlarge", 0.4032),
    ("r7g.xlarge", 0.2142),
    ("r7g.2xlarge", 0.4284),
    ("x2gd.xlarge", 0.334),
    // burstable
    ("t3.micro", 0.0104),
    ("t3.small", 0.0208),
    ("t3.medium", 0.0416),
    ("t3.large", 0.0832),
    ("t3.xlarge", 0.1664),
    ("t4g.small", 0.0168),
    ("t4g.medium", 0.0336),
];

/// Hardcoded on-demand price, including the GPU shapes
pub fn static_on_demand_price(instance_type: &str) -> Option<f64> {
    STATIC_PRICES
        .iter()
        .find(|(name, _)| *name == instance_type)
        .map(|(_, price)| *price)
        .or_else(|| gpu_instance(instance_type).map(|g| g.hourly_price))
}
