//! Service container for dependency injection
//!
//! Wires settings, I/O boundaries and services together.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::application::binder::BinderBuilder;
use crate::application::services::{SourceService, SourceSpec};
use crate::application::{ApplicationResult, ResolutionBinder, ResolutionReport, TemplateEngine};
use crate::config::Settings;
use crate::domain::ConfigTree;
use crate::infrastructure::traits::{Environment, FileSystem, ProcessEnvironment, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Environment lookup
    pub env: Arc<dyn Environment>,

    pub sources: SourceService,
    pub engine: TemplateEngine,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem), Arc::new(ProcessEnvironment))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>, env: Arc<dyn Environment>) -> Self {
        let settings = Arc::new(settings);
        let sources = SourceService::new(fs.clone(), env.clone()).with_env_settings(settings.env.clone());
        let engine = TemplateEngine::new(fs.clone(), env.clone())
            .with_base_dir(settings.base_dir.clone())
            .with_max_iterations(settings.max_iterations);

        Self {
            settings,
            fs,
            env,
            sources,
            engine,
        }
    }

    /// Source specs for `paths`, or the configured default sources if empty.
    pub fn source_specs(&self, paths: &[PathBuf]) -> Vec<SourceSpec> {
        let paths: &[PathBuf] = if paths.is_empty() {
            &self.settings.sources
        } else {
            paths
        };
        paths.iter().map(|p| SourceSpec::from_path(p)).collect()
    }

    /// Merge the sources into a tree, without resolving templates.
    pub fn load(&self, paths: &[PathBuf]) -> ApplicationResult<ConfigTree> {
        self.sources.load(&self.source_specs(paths))
    }

    /// Merge the sources and resolve templates.
    pub fn load_resolved(&self, paths: &[PathBuf]) -> ApplicationResult<(ConfigTree, ResolutionReport)> {
        let mut tree = self.load(paths)?;
        let report = self.engine.resolve(&mut tree)?;
        debug!("{} sources resolved", tree.sources().len());
        Ok((tree, report))
    }

    /// Binder builder with the configured masks and uniqueness.
    pub fn binder(&self) -> BinderBuilder {
        self.settings
            .masks
            .iter()
            .fold(ResolutionBinder::builder(), |builder, mask| builder.mask(mask))
            .unique(self.settings.unique)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::application::ResolutionRequest;
    use crate::infrastructure::traits::StaticEnvironment;

    #[test]
    fn given_settings_when_wiring_then_engine_uses_ceiling_and_binder_uses_masks() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("config.yaml");
        fs::write(
            &yaml,
            "env:\n  db:\n    user: ${{ env:DB_USER }}\nprod:\n  db:\n    user: bob\n",
        )
        .unwrap();

        let settings = Settings {
            max_iterations: 5,
            masks: vec!["env.**".to_string()],
            ..Settings::default()
        };
        let container = ServiceContainer::with_deps(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(StaticEnvironment::new().with("DB_USER", "alice")),
        );
        assert_eq!(container.engine.max_iterations(), 5);

        let (tree, report) = container.load_resolved(&[yaml]).unwrap();
        assert_eq!(report.substitutions, 1);

        let args = container
            .binder()
            .param("user", ResolutionRequest::path("db.user"))
            .build()
            .unwrap()
            .bind(&tree)
            .unwrap();
        assert_eq!(args.require::<String>("user").unwrap(), "alice");
    }

    #[test]
    fn given_no_paths_when_loading_then_configured_sources_used() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("defaults.yaml");
        fs::write(&yaml, "name: app\n").unwrap();
        let settings = Settings {
            sources: vec![yaml],
            ..Settings::default()
        };
        let container = ServiceContainer::with_deps(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(StaticEnvironment::new()),
        );
        let tree = container.load(&[]).unwrap();
        assert_eq!(tree.get("name").unwrap(), &"app");
    }
}
