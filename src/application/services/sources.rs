//! Source loading service
//!
//! Reads YAML documents, `.env` files and in-memory mappings and merges them,
//! in order, into a configuration tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::application::{ApplicationResult, IoResultExt};
use crate::config::EnvSourceSettings;
use crate::domain::sources::{env_to_node, parse_env_document, parse_yaml_source};
use crate::domain::{ConfigTree, Node, SourceKind};
use crate::infrastructure::traits::{Environment, FileSystem};

/// One source to merge.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    Yaml(PathBuf),
    EnvFile(PathBuf),
    Mapping { name: String, node: Node },
}

impl SourceSpec {
    /// Pick the source kind from the file name: `.env`, `*.env` and `.env.*`
    /// are env files, everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        if is_env_file(path) {
            SourceSpec::EnvFile(path.to_path_buf())
        } else {
            SourceSpec::Yaml(path.to_path_buf())
        }
    }
}

fn is_env_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name == ".env" || name.starts_with(".env.") || name.ends_with(".env")
}

/// Service reading configuration sources.
pub struct SourceService {
    fs: Arc<dyn FileSystem>,
    env: Arc<dyn Environment>,
    env_settings: EnvSourceSettings,
}

impl SourceService {
    pub fn new(fs: Arc<dyn FileSystem>, env: Arc<dyn Environment>) -> Self {
        Self {
            fs,
            env,
            env_settings: EnvSourceSettings::default(),
        }
    }

    pub fn with_env_settings(mut self, env_settings: EnvSourceSettings) -> Self {
        self.env_settings = env_settings;
        self
    }

    /// Merge a YAML file; its top level must be a mapping.
    #[instrument(level = "debug", skip(self, tree))]
    pub fn add_yaml_source(&self, tree: &mut ConfigTree, path: &Path) -> ApplicationResult<()> {
        let name = path.display().to_string();
        let content = self.fs.read_to_string(path).with_path_context(path)?;
        let node = parse_yaml_source(&content, &name)?;
        tree.merge_source(&name, SourceKind::Yaml, node)?;
        Ok(())
    }

    /// Merge a `.env` file as a flat map of string values.
    ///
    /// With `include_process_env`, process variables are added on top and win
    /// over values from the file.
    #[instrument(level = "debug", skip(self, tree))]
    pub fn add_env_source(&self, tree: &mut ConfigTree, path: &Path) -> ApplicationResult<()> {
        let name = path.display().to_string();
        let content = self.fs.read_to_string(path).with_path_context(path)?;
        let mut variables = parse_env_document(&content, &name)?;
        debug!("{}: {} variables", name, variables.len());

        if self.env_settings.include_process_env {
            self.overlay_process_env(&mut variables);
        }
        tree.merge_source(&name, SourceKind::EnvFile, env_to_node(variables))?;
        Ok(())
    }

    /// Merge only the process environment, as if from an empty `.env` file.
    pub fn add_process_env(&self, tree: &mut ConfigTree) -> ApplicationResult<()> {
        let mut variables = IndexMap::new();
        self.overlay_process_env(&mut variables);
        tree.merge_source("environment", SourceKind::EnvFile, env_to_node(variables))?;
        Ok(())
    }

    fn overlay_process_env(&self, variables: &mut IndexMap<String, String>) {
        let before = variables.len();
        for (key, value) in self.env.vars() {
            if self.env_settings.uppercase_only && key != key.to_uppercase() {
                continue;
            }
            variables.insert(key, value);
        }
        debug!("process environment added {} variables", variables.len() - before);
    }

    /// Merge an in-memory mapping.
    pub fn add_mapping(&self, tree: &mut ConfigTree, name: &str, node: Node) -> ApplicationResult<()> {
        tree.merge_source(name, SourceKind::Mapping, node)?;
        Ok(())
    }

    pub fn add_source(&self, tree: &mut ConfigTree, spec: &SourceSpec) -> ApplicationResult<()> {
        match spec {
            SourceSpec::Yaml(path) => self.add_yaml_source(tree, path),
            SourceSpec::EnvFile(path) => self.add_env_source(tree, path),
            SourceSpec::Mapping { name, node } => self.add_mapping(tree, name, node.clone()),
        }
    }

    /// Build a tree from `specs`, later sources overriding earlier ones.
    pub fn load(&self, specs: &[SourceSpec]) -> ApplicationResult<ConfigTree> {
        let mut tree = ConfigTree::new();
        for spec in specs {
            self.add_source(&mut tree, spec)?;
        }
        debug!("loaded {} sources", tree.sources().len());
        Ok(tree)
    }
}
