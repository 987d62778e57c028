use std::collections::HashMap;

use crate::catalog::{Gpu, Model};
use crate::state::Deployment;

use super::cost::{kv_bytes_per_token_per_gpu, kv_total_bytes_per_gpu, weight_bytes_per_gpu};
use super::fit::GpuFit;

/// One deployment's contribution to a GPU's usage.
#[derive(Debug, Clone, PartialEq)]
pub struct UsagePart {
    pub deployment_id: String,
    pub model_name: String,
    pub weight_bytes: f64,
    pub kv_bytes: f64,
}

/// Aggregated memory usage for one GPU. Derived, never persisted: every
/// consumer recomputes from the current snapshot, so the record cannot go
/// stale.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuUsage {
    pub gpu_id: String,
    pub gpu_name: String,
    pub capacity_bytes: f64,
    pub utilization_sum: f64,
    pub implied_reserve_frac: f64,
    pub used_bytes: f64,
    pub parts: Vec<UsagePart>,
}

impl GpuUsage {
    /// Capacity held back for the runtime (activations, fragmentation),
    /// implied by the unclaimed utilization fraction.
    pub fn reserve_bytes(&self) -> f64 {
        (self.implied_reserve_frac * self.capacity_bytes).max(0.0)
    }

    pub fn free_bytes(&self) -> f64 {
        (self.capacity_bytes - self.reserve_bytes() - self.used_bytes).max(0.0)
    }
}

impl std::fmt::Display for GpuUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "GpuUsage ({}):", self.gpu_id)?;
        crate::i_nlns(
            f,
            &[
                format_args!("Capacity: {:.2} GB", self.capacity_bytes / 1_073_741_824.0),
                format_args!("Used: {:.2} GB", self.used_bytes / 1_073_741_824.0),
                format_args!("Reserve: {:.2} GB", self.reserve_bytes() / 1_073_741_824.0),
                format_args!("Free: {:.2} GB", self.free_bytes() / 1_073_741_824.0),
                format_args!("Claimed utilization: {:.2}", self.utilization_sum),
                format_args!("Deployments: {}", self.parts.len()),
            ],
        )
    }
}

/// The single substitution point for an absent utilization share. Deployments
/// created through [`crate::PlanState`] always carry a share; records built by
/// hand may not, and an absent share claims nothing.
pub(crate) fn claimed_share(deployment: &Deployment) -> f64 {
    deployment.utilization_share.unwrap_or(0.0)
}

/// The effective shard count for cost math is the assignment size, not the
/// declared `tp` field. Declared parallelism is a validation concern; see
/// [`super::fit::validate_deployment`].
pub(crate) fn effective_tp(deployment: &Deployment) -> u32 {
    (deployment.assigned_gpu_ids.len() as u32).max(1)
}

/// Sums the claimed utilization share of every deployment assigned to each
/// GPU. Shares are not validated against 1; over-subscription surfaces through
/// the fit check on bytes, not here.
pub fn utilization_by_gpu(gpus: &[Gpu], deployments: &[Deployment]) -> HashMap<String, f64> {
    let mut sums: HashMap<String, f64> = gpus.iter().map(|g| (g.id.clone(), 0.0)).collect();
    for d in deployments {
        for gpu_id in &d.assigned_gpu_ids {
            if let Some(sum) = sums.get_mut(gpu_id) {
                *sum += claimed_share(d);
            }
        }
    }
    sums
}

/// Implied runtime reserve fraction per GPU: `max(0, 1 − ΣU)`. Unclaimed
/// capacity is assumed reserved by the runtime rather than available.
pub fn implied_reserve_by_gpu(gpus: &[Gpu], deployments: &[Deployment]) -> HashMap<String, f64> {
    utilization_by_gpu(gpus, deployments)
        .into_iter()
        .map(|(gpu_id, sum)| (gpu_id, (1.0 - sum).max(0.0)))
        .collect()
}

/// Aggregates weight and KV usage across possibly overlapping deployments,
/// one fresh [`GpuUsage`] record per GPU.
///
/// Deployments referencing an unknown model id contribute nothing (missing
/// reference is not an error at this layer). All byte quantities clamp at 0.
pub fn aggregate_per_gpu(
    gpus: &[Gpu],
    models: &[Model],
    deployments: &[Deployment],
) -> Vec<GpuUsage> {
    let utilization = utilization_by_gpu(gpus, deployments);
    let reserve = implied_reserve_by_gpu(gpus, deployments);
    let models_by_id: HashMap<&str, &Model> =
        models.iter().map(|m| (m.id.as_str(), m)).collect();

    let mut out = Vec::with_capacity(gpus.len());
    for gpu in gpus {
        let mut used = 0.0;
        let mut parts = Vec::new();
        for d in deployments {
            if !d.assigned_gpu_ids.iter().any(|id| id == &gpu.id) {
                continue;
            }
            let Some(model) = models_by_id.get(d.model_id.as_str()) else {
                continue;
            };
            let tp = effective_tp(d);
            let weight_bytes = weight_bytes_per_gpu(
                model.params_b,
                d.weight_dtype,
                tp,
                d.replication_overhead_frac,
            );
            let per_token = kv_bytes_per_token_per_gpu(
                model.layers,
                model.hidden_size,
                model.heads,
                model.num_key_value_heads,
                d.kv_dtype,
                tp,
                d.kv_overhead_frac,
            );
            let total_tokens = (d.max_model_len * d.max_num_seqs) as f64;
            let kv_bytes = kv_total_bytes_per_gpu(total_tokens, per_token);
            used += weight_bytes + kv_bytes;
            parts.push(UsagePart {
                deployment_id: d.id.clone(),
                model_name: model.name.clone(),
                weight_bytes,
                kv_bytes,
            });
        }
        out.push(GpuUsage {
            gpu_id: gpu.id.clone(),
            gpu_name: gpu.name.clone(),
            capacity_bytes: gpu.vram_bytes as f64,
            utilization_sum: utilization.get(&gpu.id).copied().unwrap_or(0.0),
            implied_reserve_frac: reserve.get(&gpu.id).copied().unwrap_or(0.0),
            used_bytes: used,
            parts,
        });
    }
    out
}

/// Pool-level roll-up for dashboard display.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolKpis {
    pub gpus: usize,
    pub total_capacity_bytes: f64,
    pub total_used_bytes: f64,
    pub total_reserve_bytes: f64,
    pub warnings: usize,
}

pub fn pool_kpis(usage: &[GpuUsage], fits: &[GpuFit]) -> PoolKpis {
    let failing: std::collections::HashSet<&str> = fits
        .iter()
        .filter(|f| !f.ok)
        .map(|f| f.gpu_id.as_str())
        .collect();
    let mut kpis = PoolKpis {
        gpus: usage.len(),
        total_capacity_bytes: 0.0,
        total_used_bytes: 0.0,
        total_reserve_bytes: 0.0,
        warnings: 0,
    };
    for u in usage {
        kpis.total_capacity_bytes += u.capacity_bytes;
        kpis.total_used_bytes += u.used_bytes.max(0.0);
        kpis.total_reserve_bytes += u.reserve_bytes();
        if failing.contains(u.gpu_id.as_str()) {
            kpis.warnings += 1;
        }
    }
    kpis
}
