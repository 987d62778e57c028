use super::dtype::{KvDtype, WeightDtype};

/// Per-GPU bytes for model weights under tensor parallelism and replication
/// overhead.
///
/// Formula: `(params_b × 1e9 × bytes_per_param) / tp × (1 + replication_overhead_frac)`.
/// `replication_overhead_frac` is a fraction (0.02 = +2%). Returns 0 when `tp`
/// is 0 rather than erroring; the caller decides whether that is a problem.
pub fn weight_bytes_per_gpu(
    params_b: f64,
    dtype: WeightDtype,
    tp: u32,
    replication_overhead_frac: f64,
) -> f64 {
    if tp == 0 {
        return 0.0;
    }
    let total_param_bytes = params_b * 1e9 * dtype.bytes_per_param();
    let per_gpu = total_param_bytes / tp as f64;
    per_gpu * (1.0 + replication_overhead_frac)
}

/// GQA-aware KV cache bytes per token per GPU.
///
/// Formula: `2 × layers × num_kv_heads × (hidden/heads) × bytes_per_elem / tp × (1 + kv_overhead_frac)`.
/// The factor 2 covers the separate key and value tensors; scaling by
/// `num_kv_heads` rather than `heads` is what makes grouped-query attention
/// cheaper. With `num_kv_heads == heads` this degenerates to plain MHA.
pub fn kv_bytes_per_token_per_gpu(
    layers: u32,
    hidden_size: u32,
    heads: u32,
    num_kv_heads: u32,
    kv_dtype: KvDtype,
    tp: u32,
    kv_overhead_frac: f64,
) -> f64 {
    if tp == 0 || heads == 0 {
        return 0.0;
    }
    let head_dim = hidden_size as f64 / heads as f64;
    let base = 2.0 * layers as f64 * num_kv_heads as f64 * head_dim * kv_dtype.bytes_per_elem();
    let per_gpu = base / tp as f64;
    per_gpu * (1.0 + kv_overhead_frac)
}

/// Total KV cache bytes per GPU for a worst-case token load
/// (`max_model_len × max_num_seqs`, every sequence at the context limit).
pub fn kv_total_bytes_per_gpu(total_tokens: f64, per_token_bytes: f64) -> f64 {
    if total_tokens <= 0.0 || per_token_bytes <= 0.0 {
        return 0.0;
    }
    total_tokens * per_token_bytes
}

/// Effective per-GPU budget under a single utilization knob and fixed reserve:
/// `utilization × capacity − reserve_bytes`.
///
/// Legacy path. The aggregation engine derives reserve from summed
/// per-deployment utilization shares instead; this stays for callers that
/// want the one-knob model.
pub fn budget_bytes_per_gpu(capacity_bytes: f64, utilization: f64, reserve_bytes: f64) -> f64 {
    utilization * capacity_bytes - reserve_bytes
}
