//! Byte-quantity display helpers. GPU marketing mixes decimal GB and binary
//! GiB, so labels show both and the preferred unit is a user setting.

use crate::catalog::Gpu;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnitPreference {
    GiB,
    GB,
}

impl Default for UnitPreference {
    fn default() -> Self {
        Self::GiB
    }
}

impl std::fmt::Display for UnitPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GiB => write!(f, "GiB"),
            Self::GB => write!(f, "GB"),
        }
    }
}

pub fn bytes_to_gib(bytes: f64) -> f64 {
    bytes / (1024.0 * 1024.0 * 1024.0)
}

pub fn bytes_to_gb(bytes: f64) -> f64 {
    bytes / 1e9
}

pub fn format_bytes(bytes: f64, unit: UnitPreference, decimals: usize) -> String {
    let value = match unit {
        UnitPreference::GiB => bytes_to_gib(bytes),
        UnitPreference::GB => bytes_to_gb(bytes),
    };
    format!("{value:.decimals$} {unit}")
}

/// Capacity label showing both units, e.g. `"51.5 GB (48.0 GiB)"`.
pub fn gpu_capacity_label(gpu: &Gpu) -> String {
    let bytes = gpu.vram_bytes as f64;
    format!(
        "{:.1} GB ({:.1} GiB)",
        bytes_to_gb(bytes),
        bytes_to_gib(bytes)
    )
}
