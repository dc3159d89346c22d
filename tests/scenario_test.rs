//! End-to-end: settings, sources, templates, holder and binder wired together

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use cfgtree::config::Settings;
use cfgtree::infrastructure::traits::{RealFileSystem, StaticEnvironment};
use cfgtree::{ConfigHolder, Providers, ResolutionRequest, ServiceContainer};

#[derive(Debug, Deserialize)]
struct AppConfig {
    index: u32,
    stream: bool,
    llm: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct FeatureFlags {
    enable_new_feature: bool,
    beta_mode: bool,
}

fn resources() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/resources")
}

fn container() -> ServiceContainer {
    let settings = Settings {
        base_dir: Some(resources()),
        sources: vec![resources().join("config.yaml"), resources().join("config.env")],
        ..Settings::default()
    };
    let env = StaticEnvironment::new()
        .with("DB_USER", "test_user")
        .with("DB_PASSWORD", "test_password");
    ServiceContainer::with_deps(settings, Arc::new(RealFileSystem), Arc::new(env))
}

#[test]
fn given_configured_holder_when_binding_basic_types_then_values_converted() {
    // Arrange
    cfgtree::util::testing::init_test_setup();
    let container = container();
    let (tree, _) = container.load_resolved(&[]).unwrap();
    let holder = ConfigHolder::new();
    holder.set(tree).unwrap();

    let binder = container
        .binder()
        .param("x", ResolutionRequest::path("index"))
        .param("y", ResolutionRequest::path("stream"))
        .param("z", ResolutionRequest::path("llm"))
        .param("flags", ResolutionRequest::path("feature_flags"))
        .param("user", ResolutionRequest::path("db.user"))
        .build()
        .unwrap();

    // Act
    let args = binder.bind_configured(&holder, &Providers::new()).unwrap();

    // Assert
    assert_eq!(args.require::<i64>("x").unwrap(), 9);
    assert!(args.require::<bool>("y").unwrap());
    assert_eq!(args.require::<String>("z").unwrap(), "path/to/llm/config");
    assert_eq!(
        args.require::<FeatureFlags>("flags").unwrap(),
        FeatureFlags {
            enable_new_feature: true,
            beta_mode: false,
        }
    );
    assert_eq!(args.source_path("flags").unwrap(), Some("app.extra_settings.feature_flags"));
    assert_eq!(args.require::<String>("user").unwrap(), "test_user");
}

#[test]
fn given_resolved_tree_when_converting_whole_tree_then_model_built() {
    let (tree, report) = container().load_resolved(&[]).unwrap();

    let app: AppConfig = tree.to().unwrap();

    assert_eq!(app.index, 9);
    assert!(app.stream);
    assert_eq!(app.llm, "path/to/llm/config");
    assert!(report.passes >= 1);
    assert_eq!(tree.get("ENV2").unwrap(), &"String from env file");
}

#[test]
fn given_masked_settings_when_binding_url_then_only_masked_branch_considered() {
    let settings = Settings {
        base_dir: Some(resources()),
        sources: vec![resources().join("config.yaml")],
        masks: vec!["app.**".to_string()],
        ..Settings::default()
    };
    let container = ServiceContainer::with_deps(
        settings,
        Arc::new(RealFileSystem),
        Arc::new(StaticEnvironment::new().with("DB_USER", "u")),
    );
    let (tree, _) = container.load_resolved(&[]).unwrap();

    let args = container
        .binder()
        .param("url", ResolutionRequest::path("url").optional())
        .param("db_url", ResolutionRequest::by_name())
        .build()
        .unwrap()
        .bind(&tree)
        .unwrap();

    // debug.db.url is outside the mask
    assert_eq!(args.node("url").unwrap(), None);
    assert_eq!(
        args.require::<String>("db_url").unwrap(),
        "postgresql://u:strong:/-password@localhost:5432/app_db"
    );
}
