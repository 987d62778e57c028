//! Static reference catalogs: GPU types and LLM architectures. Read-only
//! during a planning session; the engine never mutates them.

use crate::memory::dtype::{KvDtype, WeightDtype};

const GIB: u64 = 1024 * 1024 * 1024;

/// A GPU catalog *type*. Selectable instances are generated from a type plus a
/// requested count; see [`GpuKind::instances`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuKind {
    pub id: String,
    pub name: String,
    pub vram_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

impl GpuKind {
    fn new(id: &str, name: &str, vram_bytes: u64, vendor: &str) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            vram_bytes,
            vendor: Some(vendor.to_owned()),
        }
    }

    /// Generates `count` selectable instances with ids `"{type_id}#{n}"`,
    /// n starting at 1. Instances carry no identity beyond their id; callers
    /// regenerate them whenever the count changes.
    pub fn instances(&self, count: u32) -> Vec<Gpu> {
        (1..=count)
            .map(|n| Gpu {
                id: format!("{}#{}", self.id, n),
                name: format!("{} #{}", self.name, n),
                vram_bytes: self.vram_bytes,
                vendor: self.vendor.clone(),
            })
            .collect()
    }
}

/// A concrete GPU instance in the selected pool.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gpu {
    pub id: String,
    pub name: String,
    pub vram_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

/// LLM architecture parameters as listed in the model catalog.
///
/// Precondition from the catalog, not enforced here: `heads` divides
/// `hidden_size` and `num_key_value_heads` divides `heads` (integral head
/// dimension, well-formed GQA grouping).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: String,
    pub name: String,
    pub params_b: f64,
    pub layers: u32,
    pub hidden_size: u32,
    pub heads: u32,
    pub num_key_value_heads: u32,
    pub default_weight_dtype: WeightDtype,
    pub default_kv_dtype: KvDtype,
}

impl Model {
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: &str,
        name: &str,
        params_b: f64,
        layers: u32,
        hidden_size: u32,
        heads: u32,
        num_key_value_heads: u32,
    ) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            params_b,
            layers,
            hidden_size,
            heads,
            num_key_value_heads,
            default_weight_dtype: WeightDtype::Bf16,
            default_kv_dtype: KvDtype::Fp16,
        }
    }
}

/// Built-in GPU catalog used when no external catalog is supplied.
pub fn default_gpu_catalog() -> Vec<GpuKind> {
    vec![
        GpuKind::new("h100-80", "H100 SXM 80GB", 80 * GIB, "NVIDIA"),
        GpuKind::new("a100-80", "A100 SXM 80GB", 80 * GIB, "NVIDIA"),
        GpuKind::new("a100-40", "A100 PCIe 40GB", 40 * GIB, "NVIDIA"),
        GpuKind::new("l40s-48", "L40S 48GB", 48 * GIB, "NVIDIA"),
        GpuKind::new("rtx6000ada-48", "RTX 6000 Ada 48GB", 48 * GIB, "NVIDIA"),
        GpuKind::new("rtx4090-24", "RTX 4090 24GB", 24 * GIB, "NVIDIA"),
        GpuKind::new("mi300x-192", "MI300X 192GB", 192 * GIB, "AMD"),
    ]
}

/// Built-in model catalog used when no external catalog is supplied.
pub fn default_model_catalog() -> Vec<Model> {
    vec![
        Model::new("llama-3.1-8b", "Llama 3.1 8B Instruct", 8.0, 32, 4096, 32, 8),
        Model::new("llama-3.1-70b", "Llama 3.1 70B Instruct", 70.0, 80, 8192, 64, 8),
        Model::new("mistral-7b", "Mistral 7B Instruct v0.3", 7.0, 32, 4096, 32, 8),
        Model::new("qwen-2.5-14b", "Qwen 2.5 14B Instruct", 14.0, 48, 5120, 40, 8),
        Model::new("phi-4", "Phi 4", 14.7, 40, 5120, 40, 10),
    ]
}

/// Parses a GPU catalog from a JSON array, dropping entries that fail to
/// deserialize instead of rejecting the whole catalog.
pub fn gpu_catalog_from_json(json: &str) -> crate::Result<Vec<GpuKind>> {
    catalog_from_json(json, "GPU")
}

/// Parses a model catalog from a JSON array, dropping entries that fail to
/// deserialize instead of rejecting the whole catalog.
pub fn model_catalog_from_json(json: &str) -> crate::Result<Vec<Model>> {
    catalog_from_json(json, "model")
}

fn catalog_from_json<T: serde::de::DeserializeOwned>(
    json: &str,
    label: &str,
) -> crate::Result<Vec<T>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<T>(entry) {
            Ok(parsed) => out.push(parsed),
            Err(e) => {
                crate::warn!("Skipping invalid {label} catalog entry: {e}");
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_follow_the_id_scheme() {
        let kind = GpuKind::new("rtx", "RTX 6000 Ada", 48 * GIB, "NVIDIA");
        let gpus = kind.instances(2);
        assert_eq!(
            gpus.iter().map(|g| g.id.as_str()).collect::<Vec<_>>(),
            ["rtx#1", "rtx#2"]
        );
        assert_eq!(gpus[0].name, "RTX 6000 Ada #1");
        assert_eq!(gpus[1].vram_bytes, 48 * GIB);
        assert!(kind.instances(0).is_empty());
    }

    #[test]
    fn default_catalogs_have_unique_ids() {
        let gpus = default_gpu_catalog();
        for i in 0..gpus.len() {
            for j in i + 1..gpus.len() {
                assert_ne!(gpus[i].id, gpus[j].id, "duplicate GPU type id");
            }
        }
        let models = default_model_catalog();
        for i in 0..models.len() {
            for j in i + 1..models.len() {
                assert_ne!(models[i].id, models[j].id, "duplicate model id");
            }
        }
    }

    #[test]
    fn model_catalog_precondition_holds_for_presets() {
        for m in default_model_catalog() {
            assert_eq!(m.heads % m.num_key_value_heads, 0, "{}", m.id);
            assert_eq!(m.hidden_size % m.heads, 0, "{}", m.id);
        }
    }

    #[test]
    fn catalog_json_drops_invalid_entries() {
        let json = r#"[
            {"id": "a", "name": "A", "vramBytes": 1024},
            {"id": "b", "name": "B"},
            {"id": "c", "name": "C", "vramBytes": 2048, "vendor": "AMD"}
        ]"#;
        let gpus = gpu_catalog_from_json(json).unwrap();
        assert_eq!(
            gpus.iter().map(|g| g.id.as_str()).collect::<Vec<_>>(),
            ["a", "c"]
        );
        assert_eq!(gpus[1].vendor.as_deref(), Some("AMD"));
    }

    #[test]
    fn model_json_rejects_unknown_dtypes_per_entry() {
        let json = r#"[
            {"id": "m1", "name": "M1", "paramsB": 8, "layers": 32, "hiddenSize": 4096,
             "heads": 32, "numKeyValueHeads": 8,
             "defaultWeightDtype": "bf16", "defaultKvDtype": "fp16"},
            {"id": "m2", "name": "M2", "paramsB": 8, "layers": 32, "hiddenSize": 4096,
             "heads": 32, "numKeyValueHeads": 8,
             "defaultWeightDtype": "q13", "defaultKvDtype": "fp16"}
        ]"#;
        let models = model_catalog_from_json(json).unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "m1");
    }
}
