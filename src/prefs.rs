//! View and unit preference persistence. Strictly best-effort: a missing or
//! corrupt prefs file, an unwritable disk, or a malformed query string must
//! never affect computed results, so every failure path degrades to defaults
//! and logs at warn.

use std::path::{Path, PathBuf};

use crate::units::UnitPreference;

/// Waffle grid density choices offered by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Density {
    #[serde(rename = "10x10")]
    Grid10,
    #[serde(rename = "20x20")]
    Grid20,
}

impl Density {
    pub const fn grid_size(self) -> u32 {
        match self {
            Self::Grid10 => 10,
            Self::Grid20 => 20,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grid10 => "10x10",
            Self::Grid20 => "20x20",
        }
    }

    /// Lenient parse accepting `"10"`/`"10x10"`/`"20"`/`"20x20"` in any case.
    pub fn normalize(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "10" | "10x10" => Some(Self::Grid10),
            "20" | "20x20" => Some(Self::Grid20),
            _ => None,
        }
    }
}

impl Default for Density {
    fn default() -> Self {
        Self::Grid10
    }
}

/// How the GPU list is rendered: grid density, sort order, filters, search,
/// and the preferred byte unit.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewPrefs {
    pub density: Density,
    pub sort: String,
    /// `"all"`, `"ok"`, `"warn"`, or `"over"`.
    pub status_filter: String,
    /// Vendor name, or empty for all.
    pub vendor_filter: String,
    pub search: String,
    pub unit: UnitPreference,
}

impl Default for ViewPrefs {
    fn default() -> Self {
        Self {
            density: Density::default(),
            sort: "status_used".to_owned(),
            status_filter: "all".to_owned(),
            vendor_filter: String::new(),
            search: String::new(),
            unit: UnitPreference::default(),
        }
    }
}

impl ViewPrefs {
    /// Loads from the platform data directory, falling back to defaults on
    /// any failure.
    pub fn load() -> Self {
        match prefs_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Saves to the platform data directory. Failures are logged and
    /// swallowed.
    pub fn save(&self) {
        if let Some(path) = prefs_path() {
            self.save_to(&path);
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(prefs) => prefs,
            Err(e) => {
                crate::warn!("Ignoring unreadable view prefs at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) {
        let result = (|| -> crate::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(self)?)?;
            Ok(())
        })();
        if let Err(e) = result {
            crate::warn!("Failed to save view prefs to {}: {e}", path.display());
        }
    }

    /// Serializes only non-default values, keeping shared URLs clean.
    pub fn to_query_string(&self) -> String {
        let defaults = Self::default();
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if self.density != defaults.density {
            query.append_pair("density", self.density.as_str());
        }
        if self.sort != defaults.sort {
            query.append_pair("sort", &self.sort);
        }
        if self.status_filter != defaults.status_filter {
            query.append_pair("status", &self.status_filter);
        }
        if self.vendor_filter != defaults.vendor_filter {
            query.append_pair("vendor", &self.vendor_filter);
        }
        if self.search != defaults.search {
            query.append_pair("q", &self.search);
        }
        query.finish()
    }

    /// Applies recognized keys from a URL query string; unknown keys and
    /// unparseable values are ignored.
    pub fn apply_query_string(&mut self, query: &str) {
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "density" => {
                    if let Some(density) = Density::normalize(&value) {
                        self.density = density;
                    }
                }
                "sort" => self.sort = value.into_owned(),
                "status" => self.status_filter = value.into_owned(),
                "vendor" => self.vendor_filter = value.into_owned(),
                "q" => self.search = value.into_owned(),
                _ => {}
            }
        }
    }
}

fn prefs_path() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "llm_planner")?;
    Some(dirs.data_dir().join("view_prefs.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_normalization_is_lenient() {
        assert_eq!(Density::normalize("10"), Some(Density::Grid10));
        assert_eq!(Density::normalize("10X10"), Some(Density::Grid10));
        assert_eq!(Density::normalize("20x20"), Some(Density::Grid20));
        assert_eq!(Density::normalize("30"), None);
        assert_eq!(Density::normalize(""), None);
        assert_eq!(Density::Grid20.grid_size(), 20);
    }

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("view_prefs.json");

        let mut prefs = ViewPrefs::default();
        prefs.density = Density::Grid20;
        prefs.vendor_filter = "NVIDIA".to_owned();
        prefs.unit = crate::units::UnitPreference::GB;
        prefs.save_to(&path);

        assert_eq!(ViewPrefs::load_from(&path), prefs);
    }

    #[test]
    fn load_failures_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert_eq!(ViewPrefs::load_from(&missing), ViewPrefs::default());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        assert_eq!(ViewPrefs::load_from(&corrupt), ViewPrefs::default());
    }

    #[test]
    fn query_string_round_trip_keeps_only_non_defaults() {
        let mut prefs = ViewPrefs::default();
        assert_eq!(prefs.to_query_string(), "");

        prefs.density = Density::Grid20;
        prefs.search = "a100".to_owned();
        let query = prefs.to_query_string();
        assert!(query.contains("density=20x20"));
        assert!(query.contains("q=a100"));
        assert!(!query.contains("sort="));

        let mut parsed = ViewPrefs::default();
        parsed.apply_query_string(&query);
        assert_eq!(parsed.density, Density::Grid20);
        assert_eq!(parsed.search, "a100");

        // Unknown keys and junk density values are ignored.
        parsed.apply_query_string("?density=30x30&bogus=1");
        assert_eq!(parsed.density, Density::Grid20);
    }
}
