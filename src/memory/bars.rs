use crate::catalog::{Gpu, Model};
use crate::state::Deployment;

use super::aggregate::{aggregate_per_gpu, GpuUsage};

/// What a bar segment represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Weights,
    Kv,
    Reserve,
    Free,
}

/// One segment of a per-GPU capacity bar. Weights and kv segments carry the
/// deployment and model they belong to; reserve and free do not.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSegment {
    pub kind: SegmentKind,
    pub bytes: f64,
    pub deployment_id: Option<String>,
    pub model_name: Option<String>,
}

/// A per-GPU capacity bar: per-deployment weights and kv segments, then one
/// reserve and one free segment. Segment bytes sum to `capacity_bytes`
/// whenever used + reserve fits within capacity (free clamps at 0 otherwise).
#[derive(Debug, Clone, PartialEq)]
pub struct GpuBar {
    pub gpu_id: String,
    pub gpu_name: String,
    pub capacity_bytes: f64,
    pub segments: Vec<BarSegment>,
}

/// Percent of capacity a segment occupies (0..100). A zero capacity is
/// treated as 1 byte so degenerate bars render as 0% rather than NaN.
pub fn segment_percent(capacity_bytes: f64, segment_bytes: f64) -> f64 {
    let total = if capacity_bytes > 0.0 {
        capacity_bytes
    } else {
        1.0
    };
    segment_bytes / total * 100.0
}

/// Inline labels only render when the segment occupies at least 10% of the
/// bar.
pub fn shows_inline_label(capacity_bytes: f64, segment_bytes: f64) -> bool {
    segment_percent(capacity_bytes, segment_bytes) >= 10.0
}

/// Builds the bar view for each GPU from its aggregated usage record.
pub fn build_bars(usage: &[GpuUsage]) -> Vec<GpuBar> {
    usage
        .iter()
        .map(|u| {
            let mut segments = Vec::with_capacity(u.parts.len() * 2 + 2);
            for part in &u.parts {
                segments.push(BarSegment {
                    kind: SegmentKind::Weights,
                    bytes: part.weight_bytes,
                    deployment_id: Some(part.deployment_id.clone()),
                    model_name: Some(part.model_name.clone()),
                });
                segments.push(BarSegment {
                    kind: SegmentKind::Kv,
                    bytes: part.kv_bytes,
                    deployment_id: Some(part.deployment_id.clone()),
                    model_name: Some(part.model_name.clone()),
                });
            }
            segments.push(BarSegment {
                kind: SegmentKind::Reserve,
                bytes: u.reserve_bytes(),
                deployment_id: None,
                model_name: None,
            });
            segments.push(BarSegment {
                kind: SegmentKind::Free,
                bytes: u.free_bytes(),
                deployment_id: None,
                model_name: None,
            });
            GpuBar {
                gpu_id: u.gpu_id.clone(),
                gpu_name: u.gpu_name.clone(),
                capacity_bytes: u.capacity_bytes,
                segments,
            }
        })
        .collect()
}

/// Aggregates and builds bars in one step.
pub fn build_per_gpu_bars(
    gpus: &[Gpu],
    models: &[Model],
    deployments: &[Deployment],
) -> Vec<GpuBar> {
    build_bars(&aggregate_per_gpu(gpus, models, deployments))
}

/// A temporary workload patch for previewing a change before applying it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentOverride {
    pub id: String,
    pub max_model_len: Option<u64>,
    pub max_num_seqs: Option<u64>,
}

/// Rebuilds bars against patched copies of the deployments, leaving the
/// originals untouched. Overrides naming unknown deployment ids are ignored.
pub fn build_per_gpu_bars_with_overrides(
    gpus: &[Gpu],
    models: &[Model],
    deployments: &[Deployment],
    overrides: &[DeploymentOverride],
) -> Vec<GpuBar> {
    let patched: Vec<Deployment> = deployments
        .iter()
        .map(|d| {
            let mut d = d.clone();
            if let Some(o) = overrides.iter().find(|o| o.id == d.id) {
                if let Some(len) = o.max_model_len {
                    d.max_model_len = len;
                }
                if let Some(seqs) = o.max_num_seqs {
                    d.max_num_seqs = seqs;
                }
            }
            d
        })
        .collect();
    build_per_gpu_bars(gpus, models, &patched)
}
