//! The mutable planning session: catalogs, requested GPU counts, generated
//! GPU instances, and deployments. Everything derived (usage, bars, fit,
//! waffles, suggestions) is recomputed from this snapshot on demand.

use std::collections::HashMap;

use crate::catalog::{default_gpu_catalog, default_model_catalog, Gpu, GpuKind, Model};
use crate::memory::aggregate::{aggregate_per_gpu, pool_kpis, GpuUsage, PoolKpis};
use crate::memory::bars::{build_per_gpu_bars, build_per_gpu_bars_with_overrides, DeploymentOverride, GpuBar};
use crate::memory::dtype::{KvDtype, WeightDtype};
use crate::memory::fit::{fit_checks, validate_deployment, DeploymentValidation, GpuFit};
use crate::memory::suggest::{compute_suggestions, compute_suggestions_raw, WorkloadSuggestion};
use crate::memory::waffle::{build_per_gpu_waffles, GpuWaffle};

pub const DEFAULT_TP: u32 = 1;
pub const DEFAULT_KV_OVERHEAD_FRAC: f64 = 0.10;
pub const DEFAULT_REPLICATION_OVERHEAD_FRAC: f64 = 0.02;
pub const DEFAULT_MAX_MODEL_LEN: u64 = 4096;
pub const DEFAULT_MAX_NUM_SEQS: u64 = 1;
pub const DEFAULT_UTILIZATION_SHARE: f64 = 0.90;

/// A workload binding a model to a set of assigned GPU instances.
///
/// `tp` is the *declared* tensor-parallel degree and is a validation concern
/// only; the cost math shards by assignment size. The two overhead fields are
/// multiplicative fractions (0.10 = +10%).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub model_id: String,
    pub assigned_gpu_ids: Vec<String>,
    pub tp: u32,
    pub weight_dtype: WeightDtype,
    pub kv_dtype: KvDtype,
    pub kv_overhead_frac: f64,
    pub replication_overhead_frac: f64,
    pub max_model_len: u64,
    pub max_num_seqs: u64,
    /// Fraction of each assigned GPU's capacity this deployment is entitled
    /// to claim at runtime. Absent means it claims nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization_share: Option<f64>,
}

/// The planning session state.
#[derive(Debug, Clone)]
pub struct PlanState {
    pub gpu_catalog: Vec<GpuKind>,
    pub gpu_counts: HashMap<String, u32>,
    /// Generated instances; rebuilt wholesale whenever a count changes.
    pub gpus: Vec<Gpu>,
    pub models: Vec<Model>,
    pub deployments: Vec<Deployment>,
    next_deployment_id: u64,
}

impl Default for PlanState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanState {
    /// Starts a session with the built-in catalogs, no selected GPUs, and no
    /// deployments.
    pub fn new() -> Self {
        Self::with_catalogs(default_gpu_catalog(), default_model_catalog())
    }

    pub fn with_catalogs(gpu_catalog: Vec<GpuKind>, models: Vec<Model>) -> Self {
        Self {
            gpu_catalog,
            gpu_counts: HashMap::new(),
            gpus: Vec::new(),
            models,
            deployments: Vec::new(),
            next_deployment_id: 1,
        }
    }

    // ─────────────────────────── GPU selection ───────────────────────────

    /// Sets the requested instance count for a catalog type (negative counts
    /// floor at 0) and regenerates the instance pool. Existing deployments
    /// lose assignments to instances that no longer exist and have their `tp`
    /// clamped into the surviving assignment size.
    pub fn set_gpu_count(&mut self, type_id: &str, count: i64) {
        self.gpu_counts
            .insert(type_id.to_owned(), count.clamp(0, u32::MAX as i64) as u32);
        self.rebuild_selected_gpus();
    }

    pub fn increment_gpu(&mut self, type_id: &str, delta: i64) {
        let current = self.gpu_counts.get(type_id).copied().unwrap_or(0) as i64;
        self.set_gpu_count(type_id, current + delta);
    }

    fn rebuild_selected_gpus(&mut self) {
        let mut gpus = Vec::new();
        for kind in &self.gpu_catalog {
            let count = self.gpu_counts.get(&kind.id).copied().unwrap_or(0);
            if count > 0 {
                gpus.extend(kind.instances(count));
            }
        }
        self.gpus = gpus;
        for d in &mut self.deployments {
            d.assigned_gpu_ids
                .retain(|id| self.gpus.iter().any(|g| &g.id == id));
            let max_tp = (d.assigned_gpu_ids.len() as u32).max(1);
            d.tp = d.tp.clamp(1, max_tp);
        }
    }

    // ─────────────────────────── deployments ─────────────────────────────

    /// Adds a deployment with defaults (first catalog model, unassigned) and
    /// returns its id. Ids come from a monotonic counter, so they are unique
    /// within the session and stable across reruns.
    pub fn add_deployment(&mut self) -> String {
        let id = format!("dep_{}", self.next_deployment_id);
        self.next_deployment_id += 1;
        let model = self.models.first();
        self.deployments.push(Deployment {
            id: id.clone(),
            model_id: model.map(|m| m.id.clone()).unwrap_or_default(),
            assigned_gpu_ids: Vec::new(),
            tp: DEFAULT_TP,
            weight_dtype: model
                .map(|m| m.default_weight_dtype)
                .unwrap_or(WeightDtype::Bf16),
            kv_dtype: model.map(|m| m.default_kv_dtype).unwrap_or(KvDtype::Fp16),
            kv_overhead_frac: DEFAULT_KV_OVERHEAD_FRAC,
            replication_overhead_frac: DEFAULT_REPLICATION_OVERHEAD_FRAC,
            max_model_len: DEFAULT_MAX_MODEL_LEN,
            max_num_seqs: DEFAULT_MAX_NUM_SEQS,
            utilization_share: Some(DEFAULT_UTILIZATION_SHARE),
        });
        id
    }

    /// Removes the record. No cascade: nothing else references a deployment
    /// except by scanning.
    pub fn remove_deployment(&mut self, id: &str) {
        self.deployments.retain(|d| d.id != id);
    }

    pub fn deployment(&self, id: &str) -> Option<&Deployment> {
        self.deployments.iter().find(|d| d.id == id)
    }

    pub fn deployment_mut(&mut self, id: &str) -> Option<&mut Deployment> {
        self.deployments.iter_mut().find(|d| d.id == id)
    }

    pub fn model(&self, id: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.id == id)
    }

    // ─────────────────────────── derived views ───────────────────────────

    pub fn aggregate(&self) -> Vec<GpuUsage> {
        aggregate_per_gpu(&self.gpus, &self.models, &self.deployments)
    }

    pub fn fit_status(&self) -> Vec<GpuFit> {
        fit_checks(&self.aggregate())
    }

    pub fn bars(&self) -> Vec<GpuBar> {
        build_per_gpu_bars(&self.gpus, &self.models, &self.deployments)
    }

    pub fn bars_with_overrides(&self, overrides: &[DeploymentOverride]) -> Vec<GpuBar> {
        build_per_gpu_bars_with_overrides(&self.gpus, &self.models, &self.deployments, overrides)
    }

    pub fn waffles(&self, grid: u32) -> Vec<GpuWaffle> {
        build_per_gpu_waffles(&self.aggregate(), grid)
    }

    pub fn kpis(&self) -> PoolKpis {
        let usage = self.aggregate();
        let fits = fit_checks(&usage);
        pool_kpis(&usage, &fits)
    }

    pub fn validate(&self, deployment_id: &str) -> Option<DeploymentValidation> {
        self.deployment(deployment_id)
            .map(|d| validate_deployment(d, &self.gpus))
    }

    // ─────────────────────────── suggestions ─────────────────────────────

    pub fn suggestions(&self, deployment_id: &str) -> WorkloadSuggestion {
        compute_suggestions(&self.gpus, &self.models, &self.deployments, deployment_id)
    }

    pub fn suggestions_raw(&self, deployment_id: &str) -> WorkloadSuggestion {
        compute_suggestions_raw(&self.gpus, &self.models, &self.deployments, deployment_id)
    }

    /// Writes the suggested `max_model_len` into the deployment. The two
    /// apply calls are sequential, not atomic: applying the length first
    /// changes what [`Self::suggestions`] derives for `max_num_seqs`.
    pub fn apply_suggested_max_model_len(&mut self, deployment_id: &str) {
        let suggestion = self.suggestions(deployment_id);
        if let Some(d) = self.deployment_mut(deployment_id) {
            d.max_model_len = suggestion.max_model_len;
        }
    }

    /// Writes the suggested `max_num_seqs` into the deployment. See
    /// [`Self::apply_suggested_max_model_len`] for the ordering caveat.
    pub fn apply_suggested_max_num_seqs(&mut self, deployment_id: &str) {
        let suggestion = self.suggestions(deployment_id);
        if let Some(d) = self.deployment_mut(deployment_id) {
            d.max_num_seqs = suggestion.max_num_seqs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn catalog_state() -> PlanState {
        PlanState::with_catalogs(
            vec![GpuKind {
                id: "rtx".to_owned(),
                name: "RTX 6000 Ada".to_owned(),
                vram_bytes: 48 * GIB,
                vendor: None,
            }],
            default_model_catalog(),
        )
    }

    #[test]
    fn set_gpu_count_generates_and_rebuilds_instances() {
        let mut state = catalog_state();
        state.set_gpu_count("rtx", 2);
        assert_eq!(
            state.gpus.iter().map(|g| g.id.as_str()).collect::<Vec<_>>(),
            ["rtx#1", "rtx#2"]
        );

        // A deployment referencing a soon-to-vanish instance, with tp too
        // high for what survives.
        let id = state.add_deployment();
        let d = state.deployment_mut(&id).unwrap();
        d.assigned_gpu_ids = vec!["rtx#1".to_owned(), "rtx#3".to_owned()];
        d.tp = 3;

        state.set_gpu_count("rtx", 1);
        assert_eq!(
            state.gpus.iter().map(|g| g.id.as_str()).collect::<Vec<_>>(),
            ["rtx#1"]
        );
        let d = state.deployment(&id).unwrap();
        assert_eq!(d.assigned_gpu_ids, ["rtx#1"]);
        assert_eq!(d.tp, 1);

        state.increment_gpu("rtx", 1);
        assert_eq!(state.gpus.len(), 2);
        state.increment_gpu("rtx", -5);
        assert!(state.gpus.is_empty());
    }

    #[test]
    fn add_deployment_uses_defaults_and_counter_ids() {
        let mut state = catalog_state();
        let first = state.add_deployment();
        let second = state.add_deployment();
        assert_eq!(first, "dep_1");
        assert_eq!(second, "dep_2");

        let d = state.deployment(&first).unwrap();
        assert_eq!(d.model_id, state.models[0].id);
        assert_eq!(d.tp, DEFAULT_TP);
        assert_eq!(d.max_model_len, DEFAULT_MAX_MODEL_LEN);
        assert_eq!(d.max_num_seqs, DEFAULT_MAX_NUM_SEQS);
        assert_eq!(d.kv_overhead_frac, DEFAULT_KV_OVERHEAD_FRAC);
        assert_eq!(d.replication_overhead_frac, DEFAULT_REPLICATION_OVERHEAD_FRAC);
        assert_eq!(d.utilization_share, Some(DEFAULT_UTILIZATION_SHARE));

        state.remove_deployment(&first);
        assert!(state.deployment(&first).is_none());
        assert!(state.deployment(&second).is_some());
    }

    #[test]
    fn applying_length_then_seqs_is_order_dependent() {
        let mut state = catalog_state();
        state.set_gpu_count("rtx", 1);
        let id = state.add_deployment();
        let gpu_id = state.gpus[0].id.clone();
        {
            let d = state.deployment_mut(&id).unwrap();
            d.assigned_gpu_ids = vec![gpu_id];
            d.max_model_len = 4096;
            d.max_num_seqs = 1;
        }

        let first = state.suggestions(&id);
        assert!(first.max_model_len > 0);
        state.apply_suggested_max_model_len(&id);
        assert_eq!(state.deployment(&id).unwrap().max_model_len, first.max_model_len);

        // The second suggestion sees the applied length, so it differs from
        // what the first call would have suggested for seqs.
        let second = state.suggestions(&id);
        state.apply_suggested_max_num_seqs(&id);
        assert_eq!(state.deployment(&id).unwrap().max_num_seqs, second.max_num_seqs);
    }

    #[test]
    fn derived_views_recompute_from_the_same_snapshot() {
        let mut state = catalog_state();
        state.set_gpu_count("rtx", 1);
        let id = state.add_deployment();
        let gpu_id = state.gpus[0].id.clone();
        state.deployment_mut(&id).unwrap().assigned_gpu_ids = vec![gpu_id];

        let usage = state.aggregate();
        assert_eq!(usage.len(), 1);
        assert!(usage[0].used_bytes > 0.0);
        assert_eq!(state.fit_status().len(), 1);
        assert_eq!(state.bars().len(), 1);
        assert_eq!(state.waffles(10)[0].cells.total(), 100);
        assert_eq!(state.kpis().gpus, 1);
        assert!(state.validate(&id).unwrap().is_valid());
        assert!(state.validate("missing").is_none());
    }
}
