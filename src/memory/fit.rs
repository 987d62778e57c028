use crate::catalog::Gpu;
use crate::state::Deployment;

use super::aggregate::GpuUsage;

/// Used/(used+free) ratio above which a GPU is flagged as nearly saturated.
pub const HIGH_UTILIZATION_RATIO: f64 = 0.95;

pub const REASON_NO_HEADROOM: &str = "Over capacity or no headroom";
pub const REASON_HIGH_UTILIZATION: &str = "High utilization > 95%";
pub const REASON_MINIMAL_KV: &str = "Minimal KV not met";

/// Health classification for one GPU. `ok` with a reason is a warning;
/// `!ok` is an error. Reasons are display strings, not error values.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuFit {
    pub gpu_id: String,
    pub ok: bool,
    pub reason: Option<String>,
    pub used_bytes: f64,
    pub free_bytes: f64,
}

impl std::fmt::Display for GpuFit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "GpuFit ({}):", self.gpu_id)?;
        crate::i_nlns(
            f,
            &[
                format_args!("Ok: {}", self.ok),
                format_args!("Reason: {}", self.reason.as_deref().unwrap_or("-")),
                format_args!("Used: {:.2} GB", self.used_bytes / 1_073_741_824.0),
                format_args!("Free: {:.2} GB", self.free_bytes / 1_073_741_824.0),
            ],
        )
    }
}

/// Classifies each GPU from its aggregated usage.
///
/// Precedence: the no-headroom error is checked first and always reported.
/// The high-utilization warning suppresses the minimal-KV check so a
/// nearly-full GPU is not double-flagged; a GPU never carries both the
/// error and the warning.
pub fn fit_checks(usage: &[GpuUsage]) -> Vec<GpuFit> {
    let mut out = Vec::with_capacity(usage.len());
    for u in usage {
        let free = u.free_bytes();
        let budget = u.used_bytes + free;
        let mut reasons: Vec<&str> = Vec::new();
        let mut ok = true;

        if free <= 0.0 {
            reasons.push(REASON_NO_HEADROOM);
            ok = false;
        }

        let mut high_utilization = false;
        if free > 0.0 && budget > 0.0 && u.used_bytes / budget > HIGH_UTILIZATION_RATIO {
            reasons.push(REASON_HIGH_UTILIZATION);
            high_utilization = true;
        }

        // A deployment with loaded weights but no room for a single token of
        // KV cache is not viable.
        if !high_utilization
            && u.parts
                .iter()
                .any(|p| p.weight_bytes > 0.0 && p.kv_bytes <= 0.0)
        {
            reasons.push(REASON_MINIMAL_KV);
            ok = false;
        }

        let reason = if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        };
        out.push(GpuFit {
            gpu_id: u.gpu_id.clone(),
            ok,
            reason,
            used_bytes: u.used_bytes,
            free_bytes: free,
        });
    }
    out
}

/// Structural validation for a deployment's GPU assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl DeploymentValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks the declared tensor-parallel degree against the assignment size and
/// warns on capacity-heterogeneous TP groups. Distinct from [`fit_checks`]:
/// this validates structure, not byte budgets.
pub fn validate_deployment(deployment: &Deployment, gpus: &[Gpu]) -> DeploymentValidation {
    let mut validation = DeploymentValidation::default();

    let assigned: Vec<&Gpu> = gpus
        .iter()
        .filter(|g| deployment.assigned_gpu_ids.iter().any(|id| id == &g.id))
        .collect();
    if deployment.tp as usize > assigned.len() {
        validation
            .errors
            .push("TP must be ≤ number of assigned GPUs".to_owned());
    }
    let mut capacities: Vec<u64> = assigned.iter().map(|g| g.vram_bytes).collect();
    capacities.sort_unstable();
    capacities.dedup();
    if capacities.len() > 1 {
        validation
            .warnings
            .push("Mixed GPU capacities in TP group".to_owned());
    }
    validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::aggregate::{aggregate_per_gpu, GpuUsage, UsagePart};
    use crate::memory::test_support::{gib, make_deployment, make_gpu, make_model};

    fn usage(capacity: f64, reserve_frac: f64, used: f64, parts: Vec<UsagePart>) -> GpuUsage {
        GpuUsage {
            gpu_id: "g1".into(),
            gpu_name: "G1".into(),
            capacity_bytes: capacity,
            utilization_sum: 1.0 - reserve_frac,
            implied_reserve_frac: reserve_frac,
            used_bytes: used,
            parts,
        }
    }

    fn part(weights: f64, kv: f64) -> UsagePart {
        UsagePart {
            deployment_id: "d".into(),
            model_name: "M".into(),
            weight_bytes: weights,
            kv_bytes: kv,
        }
    }

    #[test]
    fn ok_when_under_budget() {
        let fits = fit_checks(&[usage(gib(24), 0.1, gib(10), vec![part(gib(9), gib(1))])]);
        assert!(fits[0].ok);
        assert_eq!(fits[0].reason, None);
        assert!(fits[0].free_bytes > 0.0);
    }

    #[test]
    fn no_headroom_is_an_error_and_always_wins() {
        // Used exceeds capacity minus reserve; free clamps to 0. The part
        // also has zero KV, but the headroom error is what gets reported.
        let fits = fit_checks(&[usage(gib(24), 0.8, gib(30), vec![part(gib(30), 0.0)])]);
        assert!(!fits[0].ok);
        assert_eq!(fits[0].free_bytes, 0.0);
        let reason = fits[0].reason.as_deref().unwrap();
        assert!(reason.contains(REASON_NO_HEADROOM));
        assert!(!reason.contains(REASON_HIGH_UTILIZATION));
    }

    #[test]
    fn high_utilization_is_a_warning_not_a_failure() {
        // used/(used+free) just over 0.95.
        let fits = fit_checks(&[usage(gib(100), 0.0, gib(96), vec![part(gib(90), gib(6))])]);
        assert!(fits[0].ok);
        assert_eq!(fits[0].reason.as_deref(), Some(REASON_HIGH_UTILIZATION));
    }

    #[test]
    fn high_utilization_suppresses_minimal_kv() {
        let fits = fit_checks(&[usage(gib(100), 0.0, gib(96), vec![part(gib(96), 0.0)])]);
        assert!(fits[0].ok);
        assert_eq!(fits[0].reason.as_deref(), Some(REASON_HIGH_UTILIZATION));
    }

    #[test]
    fn minimal_kv_is_an_error_below_the_warning_threshold() {
        let fits = fit_checks(&[usage(gib(100), 0.0, gib(50), vec![part(gib(50), 0.0)])]);
        assert!(!fits[0].ok);
        assert_eq!(fits[0].reason.as_deref(), Some(REASON_MINIMAL_KV));
    }

    #[test]
    fn zero_token_workload_flags_minimal_kv_end_to_end() {
        let gpus = vec![make_gpu("g1", 24)];
        let mut model = make_model("m1");
        model.params_b = 1.0;
        let deployments = vec![make_deployment("d", "m1", &["g1"], 0, 1, Some(0.5))];
        let fits = fit_checks(&aggregate_per_gpu(&gpus, &[model], &deployments));
        assert!(!fits[0].ok);
        assert!(fits[0]
            .reason
            .as_deref()
            .unwrap()
            .contains(REASON_MINIMAL_KV));
    }

    #[test]
    fn validates_tp_against_assignment_and_mixed_capacities() {
        let g1 = make_gpu("g#1", 24);
        let g2 = make_gpu("g#2", 48);
        let mut d = make_deployment("d", "m1", &["g#1", "g#2"], 128, 1, None);
        d.tp = 3;
        let validation = validate_deployment(&d, &[g1.clone(), g2.clone()]);
        assert_eq!(validation.errors, ["TP must be ≤ number of assigned GPUs"]);
        assert_eq!(validation.warnings, ["Mixed GPU capacities in TP group"]);
        assert!(!validation.is_valid());

        d.tp = 2;
        let validation = validate_deployment(&d, &[g1.clone(), g1.clone()]);
        assert!(validation.errors.is_empty());

        // Homogeneous capacities do not warn.
        let mut ok = make_deployment("d2", "m1", &["g#1"], 128, 1, None);
        ok.tp = 1;
        let validation = validate_deployment(&ok, &[g1, g2]);
        assert!(validation.is_valid());
        assert!(validation.warnings.is_empty());
    }
}
