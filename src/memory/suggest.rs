use std::collections::HashMap;

use crate::catalog::{Gpu, Model};
use crate::state::Deployment;

use super::aggregate::{claimed_share, effective_tp};
use super::cost::{kv_bytes_per_token_per_gpu, kv_total_bytes_per_gpu, weight_bytes_per_gpu};

/// Fraction of the residual KV budget a suggestion is allowed to claim.
/// Leaves deterministic headroom so the fit check never reports exactly-zero
/// free space as healthy.
pub const KV_SAFETY_FACTOR: f64 = 0.98;

/// Largest workload a deployment can run within its share of every assigned
/// GPU's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadSuggestion {
    pub max_model_len: u64,
    pub max_num_seqs: u64,
}

impl WorkloadSuggestion {
    const ZERO: Self = Self {
        max_model_len: 0,
        max_num_seqs: 0,
    };
}

/// Suggests the largest `max_model_len` (holding `max_num_seqs` fixed) and the
/// largest `max_num_seqs` (holding `max_model_len` fixed) that keep the
/// deployment's KV usage within the residual budget on every assigned GPU,
/// after implied reserve, every other deployment's usage, and the
/// deployment's own weights. The most constraining GPU governs.
///
/// Returns `{0, 0}` for an unknown deployment, an unknown model, or an empty
/// assignment. Applies [`KV_SAFETY_FACTOR`].
pub fn compute_suggestions(
    gpus: &[Gpu],
    models: &[Model],
    deployments: &[Deployment],
    deployment_id: &str,
) -> WorkloadSuggestion {
    compute_with_factor(gpus, models, deployments, deployment_id, KV_SAFETY_FACTOR)
}

/// [`compute_suggestions`] without the safety margin. Exists to prove the
/// margin is strictly protective: safe suggestions are ≤ raw ones.
pub fn compute_suggestions_raw(
    gpus: &[Gpu],
    models: &[Model],
    deployments: &[Deployment],
    deployment_id: &str,
) -> WorkloadSuggestion {
    compute_with_factor(gpus, models, deployments, deployment_id, 1.0)
}

fn compute_with_factor(
    gpus: &[Gpu],
    models: &[Model],
    deployments: &[Deployment],
    deployment_id: &str,
    safety_factor: f64,
) -> WorkloadSuggestion {
    let Some(target) = deployments.iter().find(|d| d.id == deployment_id) else {
        return WorkloadSuggestion::ZERO;
    };
    let models_by_id: HashMap<&str, &Model> =
        models.iter().map(|m| (m.id.as_str(), m)).collect();
    let Some(model) = models_by_id.get(target.model_id.as_str()) else {
        return WorkloadSuggestion::ZERO;
    };
    if target.assigned_gpu_ids.is_empty() {
        return WorkloadSuggestion::ZERO;
    }

    let tp = effective_tp(target);
    let own_weights = weight_bytes_per_gpu(
        model.params_b,
        target.weight_dtype,
        tp,
        target.replication_overhead_frac,
    );
    let per_token = kv_bytes_per_token_per_gpu(
        model.layers,
        model.hidden_size,
        model.heads,
        model.num_key_value_heads,
        target.kv_dtype,
        tp,
        target.kv_overhead_frac,
    );

    let mut per_gpu_lens = Vec::new();
    let mut per_gpu_seqs = Vec::new();
    for gpu_id in &target.assigned_gpu_ids {
        let Some(gpu) = gpus.iter().find(|g| &g.id == gpu_id) else {
            continue;
        };

        let mut utilization_sum = 0.0;
        let mut used_by_others = 0.0;
        for other in deployments {
            if !other.assigned_gpu_ids.iter().any(|id| id == gpu_id) {
                continue;
            }
            utilization_sum += claimed_share(other);
            if other.id == target.id {
                continue;
            }
            let Some(other_model) = models_by_id.get(other.model_id.as_str()) else {
                continue;
            };
            let other_tp = effective_tp(other);
            let weights = weight_bytes_per_gpu(
                other_model.params_b,
                other.weight_dtype,
                other_tp,
                other.replication_overhead_frac,
            );
            let other_per_token = kv_bytes_per_token_per_gpu(
                other_model.layers,
                other_model.hidden_size,
                other_model.heads,
                other_model.num_key_value_heads,
                other.kv_dtype,
                other_tp,
                other.kv_overhead_frac,
            );
            let tokens = (other.max_model_len * other.max_num_seqs) as f64;
            used_by_others += weights + kv_total_bytes_per_gpu(tokens, other_per_token);
        }

        // ΣU × capacity is capacity net of implied reserve.
        let budget = utilization_sum.max(0.0) * gpu.vram_bytes as f64;
        let kv_budget = (budget - used_by_others - own_weights).max(0.0) * safety_factor;

        per_gpu_lens.push(floor_div(kv_budget, per_token * target.max_num_seqs as f64));
        per_gpu_seqs.push(floor_div(kv_budget, per_token * target.max_model_len as f64));
    }

    WorkloadSuggestion {
        max_model_len: min_positive(&per_gpu_lens),
        max_num_seqs: min_positive(&per_gpu_seqs),
    }
}

/// Exact floor semantics: over-suggesting would break the safety contract, so
/// never round or ceil here.
fn floor_div(budget_bytes: f64, denom: f64) -> u64 {
    if budget_bytes <= 0.0 || denom <= 0.0 || !budget_bytes.is_finite() || !denom.is_finite() {
        return 0;
    }
    (budget_bytes / denom).floor() as u64
}

/// Minimum positive value; a GPU yielding 0 is excluded unless every GPU
/// yields 0 (its budget was already consumed by weights or other
/// deployments).
fn min_positive(values: &[u64]) -> u64 {
    values.iter().copied().filter(|&v| v > 0).min().unwrap_or(0)
}
