//! Tool-wide configuration (ambient). `HikeConfig` adjusts how the CLI
//! behaves — which hikefile and goal to default to, whether tracing is
//! verbose — and never affects build semantics, which live entirely in
//! hikefiles. Loading follows the teacher's `GlobalConfig::load`: three
//! layered TOML files merged key-by-key, later layers winning.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BuildError, BuildErrorKind, Result};
use crate::location::Location;

#[derive(Debug, Deserialize, Clone)]
pub struct HikeConfig {
    #[serde(default = "default_hikefile")]
    pub default_hikefile: String,
    #[serde(default = "default_goal")]
    pub default_goal: String,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for HikeConfig {
    fn default() -> Self {
        Self { default_hikefile: default_hikefile(), default_goal: default_goal(), verbose: false }
    }
}

fn default_hikefile() -> String {
    "hikefile".to_string()
}

fn default_goal() -> String {
    "build".to_string()
}

fn get_xdg_config() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(|| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")).ok())
        .map(|p| p.join("hike/hike.toml"))
}

fn load_toml_file(path: &Path) -> Result<toml::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BuildError::new(BuildErrorKind::CannotStat { path: path.to_path_buf(), source: e })
    })?;
    toml::from_str(&content).map_err(|e| {
        BuildError::at(
            BuildErrorKind::Syntax(format!("invalid config file {}: {e}", path.display())),
            Location::new(std::rc::Rc::new(path.to_path_buf()), 0, 0),
        )
    })
}

/// Recursively merge two TOML tables, overlay keys winning; scalars and
/// arrays are replaced wholesale by the overlay.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    use toml::Value;
    match (base, overlay) {
        (Value::Table(mut base_map), Value::Table(overlay_map)) => {
            for (k, v) in overlay_map {
                let merged = match base_map.remove(&k) {
                    Some(base_v) => merge_toml(base_v, v),
                    None => v,
                };
                base_map.insert(k, merged);
            }
            Value::Table(base_map)
        }
        (_, overlay) => overlay,
    }
}

impl HikeConfig {
    /// Load configuration with the teacher's layered-merge policy:
    /// `/etc/hike/hike.toml` → `$XDG_CONFIG_HOME/hike/hike.toml` →
    /// `./hike.toml`, each layer overriding only the keys it sets. Any
    /// layer that doesn't exist is silently skipped; if none exist,
    /// built-in defaults apply.
    pub fn load() -> Result<Self> {
        let mut layers = vec![PathBuf::from("/etc/hike/hike.toml")];
        if let Some(xdg) = get_xdg_config() {
            layers.push(xdg);
        }
        layers.push(PathBuf::from("./hike.toml"));

        let mut merged: Option<toml::Value> = None;
        for layer_path in &layers {
            if layer_path.exists() {
                let val = load_toml_file(layer_path)?;
                merged = Some(match merged {
                    Some(base) => merge_toml(base, val),
                    None => val,
                });
            }
        }

        match merged {
            None => Ok(Self::default()),
            Some(val) => HikeConfig::deserialize(val).map_err(|e| {
                BuildError::at(
                    BuildErrorKind::Syntax(format!("invalid configuration: {e}")),
                    Location::new(std::rc::Rc::new(PathBuf::from("./hike.toml")), 0, 0),
                )
            }),
        }
    }
}
