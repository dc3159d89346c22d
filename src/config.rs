//! Settings for cfgtree itself, loaded in layers
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/cfgtree/cfgtree.toml`
//! 3. Local config: a file given explicitly (`--settings`)
//! 4. Environment variables: `CFGTREE_*` prefix, `__` between nested keys

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::template::DEFAULT_MAX_ITERATIONS;
use crate::application::ApplicationError;
use crate::domain::expand_env_vars;

/// How `.env` sources are read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnvSourceSettings {
    /// Only take upper-case names from the process environment
    pub uppercase_only: bool,
    /// Overlay process environment variables onto `.env` values
    pub include_process_env: bool,
}

impl Default for EnvSourceSettings {
    fn default() -> Self {
        Self {
            uppercase_only: true,
            include_process_env: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawEnvSourceSettings {
    pub uppercase_only: Option<bool>,
    pub include_process_env: Option<bool>,
}

impl EnvSourceSettings {
    fn merge(&self, overlay: &RawEnvSourceSettings) -> Self {
        Self {
            uppercase_only: overlay.uppercase_only.unwrap_or(self.uppercase_only),
            include_process_env: overlay
                .include_process_env
                .unwrap_or(self.include_process_env),
        }
    }
}

/// Raw settings for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub base_dir: Option<PathBuf>,
    pub max_iterations: Option<usize>,
    pub unique: Option<bool>,
    pub masks: Option<Vec<String>>,
    pub sources: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub env: RawEnvSourceSettings,
}

/// Unified configuration for cfgtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directory for relative `file:` and `yaml:` template paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
    /// Ceiling for template passes and per-value rewrites
    pub max_iterations: usize,
    /// Fail on ambiguous suffix lookups instead of taking the first match
    pub unique: bool,
    /// Masks applied to suffix lookups without their own mask
    pub masks: Vec<String>,
    /// Sources loaded when none are given on the command line
    pub sources: Vec<PathBuf>,
    pub env: EnvSourceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dir: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            unique: true,
            masks: vec![],
            sources: vec![],
            env: EnvSourceSettings::default(),
        }
    }
}

/// Get the XDG config directory for cfgtree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "cfgtree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("cfgtree.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Merge arrays with union semantics and negation support.
    ///
    /// Items prefixed with `!` remove the corresponding item; order of first
    /// appearance is kept.
    ///
    /// # Examples
    /// ```ignore
    /// merge_array(&["a", "b"], &["c"])       // → ["a", "b", "c"]
    /// merge_array(&["a", "b"], &["!a", "c"]) // → ["b", "c"]
    /// ```
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let removed: HashSet<&str> = overlay
            .iter()
            .filter_map(|p| p.strip_prefix('!'))
            .collect();
        let mut result: Vec<String> = Vec::new();
        for item in base.iter().chain(overlay.iter().filter(|p| !p.starts_with('!'))) {
            if !removed.contains(item.as_str()) && !result.contains(item) {
                result.push(item.clone());
            }
        }
        result
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        if let Some(base_dir) = &self.base_dir {
            self.base_dir = Some(PathBuf::from(expand_env_vars(
                base_dir.to_string_lossy().as_ref(),
            )));
        }
        self.sources = self
            .sources
            .iter()
            .map(|p| PathBuf::from(expand_env_vars(p.to_string_lossy().as_ref())))
            .collect();
    }

    /// Merge a local file onto self: scalars replace, masks union.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            base_dir: overlay.base_dir.clone().or_else(|| self.base_dir.clone()),
            max_iterations: overlay.max_iterations.unwrap_or(self.max_iterations),
            unique: overlay.unique.unwrap_or(self.unique),
            masks: overlay
                .masks
                .as_ref()
                .map(|o| Self::merge_array(&self.masks, o))
                .unwrap_or_else(|| self.masks.clone()),
            sources: overlay
                .sources
                .clone()
                .unwrap_or_else(|| self.sources.clone()),
            env: self.env.merge(&overlay.env),
        }
    }

    /// Apply the global file onto defaults; arrays are replaced, not merged.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            masks: global.masks.clone().unwrap_or_else(|| self.masks.clone()),
            ..self.merge_with(&RawSettings {
                masks: None,
                ..global.clone()
            })
        }
    }

    /// Load settings with layered precedence.
    ///
    /// `local` is an explicitly requested settings file; it must exist.
    pub fn load(local: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(local_path) = local {
            let raw = load_raw_settings(local_path)?;
            current = current.merge_with(&raw);
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();

        if current.max_iterations == 0 {
            return Err(ApplicationError::Config {
                message: "max_iterations must be at least 1".to_string(),
            });
        }
        Ok(current)
    }

    /// Apply CFGTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("CFGTREE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("base_dir") {
            settings.base_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_int("max_iterations") {
            settings.max_iterations = usize::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("CFGTREE_MAX_ITERATIONS out of range: {val}"),
            })?;
        }
        if let Ok(val) = config.get_bool("unique") {
            settings.unique = val;
        }
        if let Ok(val) = config.get_string("masks") {
            settings.masks = split_list(&val);
        }
        if let Ok(val) = config.get_string("sources") {
            settings.sources = split_list(&val).into_iter().map(PathBuf::from).collect();
        }
        if let Ok(val) = config.get_bool("env.uppercase_only") {
            settings.env.uppercase_only = val;
        }
        if let Ok(val) = config.get_bool("env.include_process_env") {
            settings.env.include_process_env = val;
        }

        Ok(settings)
    }

    /// Load a single settings file on top of defaults, ignoring other layers.
    pub fn load_file_only(path: &Path) -> Result<Self, ApplicationError> {
        let defaults = Settings::default();
        let config = Config::builder()
            .set_default("max_iterations", defaults.max_iterations as i64)
            .map_err(config_err)?
            .set_default("unique", defaults.unique)
            .map_err(config_err)?
            .set_default("env.uppercase_only", defaults.env.uppercase_only)
            .map_err(config_err)?
            .set_default("env.include_process_env", defaults.env.include_process_env)
            .map_err(config_err)?
            .add_source(File::from(path).required(true))
            .build()
            .map_err(config_err)?;

        let mut settings: Self = config.try_deserialize().map_err(config_err)?;
        settings.expand_paths();
        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# cfgtree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/cfgtree/cfgtree.toml
#   Local:  file passed with --settings
#   Env:    CFGTREE_* environment variables (CFGTREE_ENV__UPPERCASE_ONLY=false)
#
# Masks from the local file are merged with the global ones;
# use "!mask" to remove an inherited mask.

# Directory for relative file: and yaml: template paths
# base_dir = "~/project/config"

# Ceiling for template passes and per-value rewrites
# max_iterations = 64

# Fail on ambiguous suffix lookups
# unique = true

# Masks for suffix lookups, e.g. ["env.**"]
# masks = []

# Sources loaded when none are given with --source
# sources = ["config.yaml", ".env"]

[env]
# Only take upper-case names from the process environment
# uppercase_only = true

# Overlay process environment variables onto .env values
# include_process_env = false
"#
        .to_string()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn given_default_settings_then_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.max_iterations, 64);
        assert!(settings.unique);
        assert!(settings.env.uppercase_only);
        assert!(!settings.env.include_process_env);
        assert!(settings.base_dir.is_none());
    }

    #[test]
    fn given_local_file_when_loading_then_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfgtree.toml");
        fs::write(
            &path,
            "max_iterations = 8\nunique = false\nmasks = [\"env.**\"]\n[env]\ninclude_process_env = true\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.max_iterations, 8);
        assert!(!settings.unique);
        assert!(settings.masks.contains(&"env.**".to_string()));
        assert!(settings.env.include_process_env);
        assert!(settings.env.uppercase_only);
    }

    #[test]
    fn given_missing_local_file_when_loading_then_config_error() {
        let err = Settings::load(Some(Path::new("/no/such/cfgtree.toml"))).unwrap_err();
        assert!(matches!(err, ApplicationError::Config { .. }));
    }

    #[test]
    fn given_tilde_in_base_dir_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            base_dir: Some(PathBuf::from("~/conf")),
            sources: vec![PathBuf::from("$HOME/app.yaml")],
            ..Settings::default()
        };
        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let base = settings.base_dir.unwrap();
        assert!(base.to_string_lossy().starts_with(&home));
        assert!(settings.sources[0].to_string_lossy().starts_with(&home));
    }

    #[test]
    fn test_merge_array_union_keeps_order() {
        let result = Settings::merge_array(&strings(&["a", "b"]), &strings(&["c", "a"]));
        assert_eq!(result, strings(&["a", "b", "c"]));
    }

    #[test]
    fn test_merge_array_negation() {
        let result = Settings::merge_array(&strings(&["a", "b"]), &strings(&["!a", "c"]));
        assert_eq!(result, strings(&["b", "c"]));
    }

    #[test]
    fn test_merge_array_negation_nonexistent() {
        let result = Settings::merge_array(&strings(&["a", "b"]), &strings(&["!x"]));
        assert_eq!(result, strings(&["a", "b"]));
    }

    #[test]
    fn test_apply_global_replaces_masks_but_local_merges() {
        let base = Settings {
            masks: strings(&["default.**"]),
            ..Settings::default()
        };
        let global = RawSettings {
            masks: Some(strings(&["env.**"])),
            unique: Some(false),
            ..RawSettings::default()
        };
        let after_global = base.apply_global(&global);
        assert_eq!(after_global.masks, strings(&["env.**"]));
        assert!(!after_global.unique);

        let local = RawSettings {
            masks: Some(strings(&["prod.**"])),
            ..RawSettings::default()
        };
        let after_local = after_global.merge_with(&local);
        assert_eq!(after_local.masks, strings(&["env.**", "prod.**"]));
        assert!(!after_local.unique);
    }

    #[test]
    fn given_settings_when_rendered_then_toml_round_trips() {
        let settings = Settings {
            masks: strings(&["env.**"]),
            ..Settings::default()
        };
        let text = settings.to_toml().unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn given_template_when_parsed_then_valid_toml() {
        let parsed: RawSettings = toml::from_str(&Settings::template()).unwrap();
        assert!(parsed.max_iterations.is_none());
    }

    #[test]
    fn given_file_only_when_loading_then_defaults_fill_gaps() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("only.toml");
        fs::write(&path, "unique = false\n").unwrap();
        let settings = Settings::load_file_only(&path).unwrap();
        assert!(!settings.unique);
        assert_eq!(settings.max_iterations, 64);
    }
}
