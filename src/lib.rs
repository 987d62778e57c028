//! # llm_planner: Memory accounting and fit planning for LLM deployments on GPU pools
//!
//! Answers "does this set of LLM inference deployments fit on this pool of GPUs,
//! and what workload limits are safe for each one?" with a static, formula-based
//! estimator. No telemetry, no live measurement.
//!
//! ## Features
//!
//! * Byte-level weight and KV-cache cost models (tensor-parallel and GQA aware)
//! * Per-GPU aggregation across deployments that share GPUs, with implied
//!   runtime reserve derived from summed utilization shares
//! * Safe workload suggestions (`max_model_len` / `max_num_seqs`) under
//!   cross-deployment contention, governed by the most constraining GPU
//! * Fit classification and deployment validation for UI display
//! * Exact-sum waffle-grid cell mapping for capacity visualizations
//! * Best-effort view/unit preference persistence that never interrupts
//!   computation

// Internal modules
mod catalog;
mod logging;
mod prefs;
mod state;
mod units;

mod memory;

// Internal imports
#[allow(unused_imports)]
use anyhow::{anyhow, bail, Error, Result};
#[allow(unused_imports)]
use tracing::{debug, error, info, span, trace, warn, Level};

// Public exports
pub use self::{
    catalog::{
        default_gpu_catalog, default_model_catalog, gpu_catalog_from_json,
        model_catalog_from_json, Gpu, GpuKind, Model,
    },
    logging::{i_ln, i_lns, i_nln, i_nlns, LoggingConfig},
    memory::{
        aggregate::{
            aggregate_per_gpu, implied_reserve_by_gpu, pool_kpis, utilization_by_gpu, GpuUsage,
            PoolKpis, UsagePart,
        },
        bars::{
            build_per_gpu_bars, build_per_gpu_bars_with_overrides, segment_percent,
            shows_inline_label, BarSegment, DeploymentOverride, GpuBar, SegmentKind,
        },
        cost::{
            budget_bytes_per_gpu, kv_bytes_per_token_per_gpu, kv_total_bytes_per_gpu,
            weight_bytes_per_gpu,
        },
        dtype::{DtypeError, KvDtype, WeightDtype},
        fit::{fit_checks, validate_deployment, DeploymentValidation, GpuFit},
        suggest::{compute_suggestions, compute_suggestions_raw, WorkloadSuggestion},
        waffle::{build_per_gpu_waffles, map_bytes_to_waffle_cells, GpuWaffle, WaffleCells},
    },
    prefs::{Density, ViewPrefs},
    state::{Deployment, PlanState},
    units::{bytes_to_gb, bytes_to_gib, format_bytes, gpu_capacity_label, UnitPreference},
};
