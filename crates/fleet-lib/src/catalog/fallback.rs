//! Static candidate tables used when the catalog cannot be reached

use super::instance::InstanceTypeSpec;
use super::RatioClass;
use crate::models::Architecture;

const AMD64_GENERAL: &[&str] = &[
    "m6i.large", "m6i.xlarge", "m6i.2xlarge", "m6a.large", "m6a.xlarge", "m6a.2xlarge",
    "m5.large", "m5.xlarge", "m5.2xlarge", "m7i.xlarge",
];

const AMD64_COMPUTE: &[&str] = &[
    "c6i.2xlarge", "c6i.4xlarge", "c6a.2xlarge", "c6a.4xlarge", "c5.2xlarge", "c5.4xlarge",
    "c7i.2xlarge",
];

const AMD64_MEMORY: &[&str] = &[
    "r6i.large", "r6i.xlarge", "r6i.2xlarge", "r6a.xlarge", "r6a.2xlarge", "r5.xlarge",
    "r5.2xlarge",
];

const ARM64_GENERAL: &[&str] = &[
    "m6g.large", "m6g.xlarge", "m6g.2xlarge", "m7g.large", "m7g.xlarge", "m7g.2xlarge",
];

const ARM64_COMPUTE: &[&str] = &["c6g.2xlarge", "c6g.4xlarge", "c7g.2xlarge", "c7g.4xlarge"];

const ARM64_MEMORY: &[&str] = &[
    "r6g.large", "r6g.xlarge", "r6g.2xlarge", "r7g.xlarge", "r7g.2xlarge", "x2gd.xlarge",
];

/// Known GPU instance shape
#[derive(Debug, Clone, Copy)]
pub struct GpuInstance {
    pub name: &'static str,
    pub architecture: Architecture,
    pub gpus: u32,
    pub vcpus: u32,
    pub memory_gib: f64,
    pub hourly_price: f64,
}

impl GpuInstance {
    pub fn price_per_gpu(&self) -> f64 {
        self.hourly_price / self.gpus.max(1) as f64
    }

    pub fn to_spec(&self) -> Option<InstanceTypeSpec> {
        let mut spec = InstanceTypeSpec::parse(self.name)?;
        spec.gpus = self.gpus;
        spec.vcpus = self.vcpus;
        spec.memory_gib = self.memory_gib;
        Some(spec)
    }
}

const fn gpu(
    name: &'static str,
    architecture: Architecture,
    gpus: u32,
    vcpus: u32,
    memory_gib: f64,
    hourly_price: f64,
) -> GpuInstance {
    GpuInstance {
        name,
        architecture,
        gpus,
        vcpus,
        memory_gib,
        hourly_price,
    }
}

/// name, architecture, GPUs, vCPUs, memory GiB, on-demand USD/hour
pub const GPU_INSTANCES: &[GpuInstance] = &[
    gpu("g4dn.xlarge", Architecture::Amd64, 1, 4, 16.0, 0.526),
    gpu("g4dn.2xlarge", Architecture::Amd64, 1, 8, 32.0, 0.752),
    gpu("g4dn.12xlarge", Architecture::Amd64, 4, 48, 192.0, 3.912),
    gpu("g5.xlarge", Architecture::Amd64, 1, 4, 16.0, 1.006),
    gpu("g5.2xlarge", Architecture::Amd64, 1, 8, 32.0, 1.212),
    gpu("g5.12xlarge", Architecture::Amd64, 4, 48, 192.0, 5.672),
    gpu("p3.2xlarge", Architecture::Amd64, 1, 8, 61.0, 3.06),
    gpu("p3.8xlarge", Architecture::Amd64, 4, 32, 244.0, 12.24),
    gpu("g5g.xlarge", Architecture::Arm64, 1, 4, 8.0, 0.42),
    gpu("g5g.2xlarge", Architecture::Arm64, 1, 8, 16.0, 0.556),
    gpu("g5g.16xlarge", Architecture::Arm64, 2, 64, 128.0, 2.744),
];

/// Fallback candidate identifiers for an architecture and ratio class
pub fn static_candidates(architecture: Architecture, class: RatioClass) -> &'static [&'static str] {
    match (architecture, class) {
        (Architecture::Amd64, RatioClass::General) => AMD64_GENERAL,
        (Architecture::Amd64, RatioClass::Compute) => AMD64_COMPUTE,
        (Architecture::Amd64, RatioClass::Memory) => AMD64_MEMORY,
        (Architecture::Arm64, RatioClass::General) => ARM64_GENERAL,
        (Architecture::Arm64, RatioClass::Compute) => ARM64_COMPUTE,
        (Architecture::Arm64, RatioClass::Memory) => ARM64_MEMORY,
    }
}

/// GPU shapes for an architecture, cheapest per GPU first
pub fn gpu_instances(architecture: Architecture) -> Vec<&'static GpuInstance> {
    let mut shapes: Vec<_> = GPU_INSTANCES
        .iter()
        .filter(|g| g.architecture == architecture)
        .collect();
    shapes.sort_by(|a, b| a.price_per_gpu().total_cmp(&b.price_per_gpu()));
    shapes
}

/// Look up a GPU shape by name
pub fn gpu_instance(name: &str) -> Option<&'static GpuInstance> {
    GPU_INSTANCES.iter().find(|g| g.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::instance::InstanceFamily;

    #[test]
    fn test_every_static_entry_parses_into_its_class() {
        for arch in [Architecture::Amd64, Architecture::Arm64] {
            for (class, family) in [
                (RatioClass::General, InstanceFamily::GeneralPurpose),
                (RatioClass::Compute, InstanceFamily::ComputeOptimized),
                (RatioClass::Memory, InstanceFamily::MemoryOptimized),
            ] {
                for name in static_candidates(arch, class) {
                    let spec = InstanceTypeSpec::parse(name).unwrap();
                    assert_eq!(spec.architecture, arch, "{}", name);
                    assert_eq!(spec.family, family, "{}", name);
                }
            }
        }
    }

    #[test]
    fn test_gpu_instances_sorted_by_price_per_gpu() {
        let shapes = gpu_instances(Architecture::Amd64);
        assert!(!shapes.is_empty());
        assert!(shapes.iter().all(|g| g.architecture == Architecture::Amd64));
        for pair in shapes.windows(2) {
            assert!(pair[0].price_per_gpu() <= pair[1].price_per_gpu());
        }

        let arm = gpu_instances(Architecture::Arm64);
        assert_eq!(arm[0].name, "g5g.xlarge");
    }

    #[test]
    fn test_gpu_spec_overrides_parsed_shape() {
        let spec = gpu_instance("g4dn.12xlarge").unwrap().to_spec().unwrap();
        assert_eq!(spec.gpus, 4);
        assert_eq!(spec.vcpus, 48);
    }
}
