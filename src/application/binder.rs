//! Parameter binding: locate values in a resolved tree for named parameters.
//!
//! A [`ResolutionBinder`] is built once from a list of parameter descriptors
//! and then binds them against any number of trees.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use crate::application::holder::ConfigHolder;
use crate::application::providers::{downcast, Providers};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::mask::compile_masks;
use crate::domain::path::strip_absolute;
use crate::domain::{ConfigTree, DomainError, DomainResult, Mask, Node};

/// Where a parameter's value is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PathSpec {
    /// Exact dotted path from the root.
    Absolute(String),
    /// Dotted suffix matched against every node path.
    Relative(String),
    /// The parameter name, used as relative path.
    #[default]
    Name,
}

impl From<&str> for PathSpec {
    /// `^a.b` is absolute, anything else relative.
    fn from(raw: &str) -> Self {
        match strip_absolute(raw) {
            (true, path) => PathSpec::Absolute(path.to_string()),
            (false, path) => PathSpec::Relative(path.to_string()),
        }
    }
}

/// Descriptor for one config-valued parameter.
#[derive(Debug, Clone, Default)]
pub struct ResolutionRequest {
    path: PathSpec,
    masks: Option<Vec<String>>,
    unique: Option<bool>,
    optional: bool,
    default: Option<Node>,
}

impl ResolutionRequest {
    /// Look up by parameter name.
    pub fn by_name() -> Self {
        Self::default()
    }

    /// Look up by dotted path; a leading `^` makes it absolute.
    pub fn path(path: &str) -> Self {
        Self {
            path: PathSpec::from(path),
            ..Self::default()
        }
    }

    pub fn absolute(path: &str) -> Self {
        let (_, path) = strip_absolute(path);
        Self {
            path: PathSpec::Absolute(path.to_string()),
            ..Self::default()
        }
    }

    /// Add a mask; request masks replace the binder's masks.
    pub fn mask(mut self, mask: &str) -> Self {
        self.masks.get_or_insert_with(Vec::new).push(mask.to_string());
        self
    }

    /// Override the binder's uniqueness requirement.
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = Some(unique);
        self
    }

    /// Bind `None` instead of failing when nothing matches.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Bind `value` when nothing matches.
    pub fn default_value(mut self, value: impl Into<Node>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn path_spec(&self) -> &PathSpec {
        &self.path
    }

    pub fn is_optional(&self) -> bool {
        self.optional || self.default.is_some()
    }
}

/// A value found for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Full dotted path of the match; `None` for a default.
    pub path: Option<String>,
    pub node: Node,
}

impl Resolved {
    pub fn to<T: DeserializeOwned>(&self, fallback_path: &str) -> DomainResult<T> {
        self.node.to(self.path.as_deref().unwrap_or(fallback_path))
    }
}

/// Locate the node for `request`; `name` is used when the request has no path.
///
/// `masks` and `unique` are the defaults the request may override.
pub fn locate<'t>(
    tree: &'t ConfigTree,
    name: &str,
    path: &PathSpec,
    masks: &[Mask],
    unique: bool,
) -> ApplicationResult<Option<(String, &'t Node)>> {
    let suffix = match path {
        PathSpec::Absolute(path) => {
            return match tree.get(path) {
                Ok(node) => Ok(Some((path.clone(), node))),
                Err(DomainError::PathNotFound { .. }) => Ok(None),
                Err(e) => Err(e.into()),
            };
        }
        PathSpec::Relative(path) => path.as_str(),
        PathSpec::Name => name,
    };

    let mut candidates = tree.find_by_suffix(suffix, masks)?;
    trace!("'{}': {} candidates", suffix, candidates.len());
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ if unique => Err(DomainError::AmbiguousResolution {
            query: suffix.to_string(),
            candidates: candidates.into_iter().map(|(p, _)| p).collect(),
        }
        .into()),
        _ => Ok(Some(candidates.swap_remove(0))),
    }
}

/// Resolve a single request against `tree` with no binder-level masks and
/// uniqueness required unless the request says otherwise.
pub fn resolve(tree: &ConfigTree, name: &str, request: &ResolutionRequest) -> ApplicationResult<Option<Resolved>> {
    let compiled = CompiledRequest::compile(request.clone())?;
    compiled.resolve(tree, name, &[], true)
}

/// Resolve and convert a single request.
pub fn resolve_as<T: DeserializeOwned>(
    tree: &ConfigTree,
    name: &str,
    request: &ResolutionRequest,
) -> ApplicationResult<Option<T>> {
    match resolve(tree, name, request)? {
        Some(resolved) => Ok(Some(resolved.to(name)?)),
        None => Ok(None),
    }
}

#[derive(Debug, Clone)]
struct CompiledRequest {
    request: ResolutionRequest,
    masks: Option<Vec<Mask>>,
}

impl CompiledRequest {
    fn compile(request: ResolutionRequest) -> DomainResult<Self> {
        let masks = request.masks.as_deref().map(compile_masks).transpose()?;
        Ok(Self { request, masks })
    }

    fn resolve(
        &self,
        tree: &ConfigTree,
        name: &str,
        masks: &[Mask],
        unique: bool,
    ) -> ApplicationResult<Option<Resolved>> {
        let masks = self.masks.as_deref().unwrap_or(masks);
        let unique = self.request.unique.unwrap_or(unique);

        if let Some((path, node)) = locate(tree, name, &self.request.path, masks, unique)? {
            return Ok(Some(Resolved {
                path: Some(path),
                node: node.clone(),
            }));
        }
        if let Some(default) = &self.request.default {
            return Ok(Some(Resolved {
                path: None,
                node: default.clone(),
            }));
        }
        if self.request.optional {
            return Ok(None);
        }

        let wanted = match &self.request.path {
            PathSpec::Absolute(path) | PathSpec::Relative(path) => path.as_str(),
            PathSpec::Name => name,
        };
        Err(DomainError::path_not_found(wanted).into())
    }
}

#[derive(Debug, Clone)]
enum ParamKind {
    Config(CompiledRequest),
    Dependency(String),
}

#[derive(Debug, Clone)]
struct Param {
    name: String,
    kind: ParamKind,
}

/// Builder for [`ResolutionBinder`].
#[derive(Debug, Clone)]
pub struct BinderBuilder {
    params: Vec<(String, Option<ResolutionRequest>, Option<String>)>,
    masks: Vec<String>,
    unique: bool,
}

impl Default for BinderBuilder {
    fn default() -> Self {
        Self {
            params: Vec::new(),
            masks: Vec::new(),
            unique: true,
        }
    }
}

impl BinderBuilder {
    /// Mask applied to every request that has none of its own.
    pub fn mask(mut self, mask: &str) -> Self {
        self.masks.push(mask.to_string());
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn param(mut self, name: &str, request: ResolutionRequest) -> Self {
        self.params.push((name.to_string(), Some(request), None));
        self
    }

    /// Parameter looked up by its own name.
    pub fn by_name(self, name: &str) -> Self {
        self.param(name, ResolutionRequest::by_name())
    }

    /// Parameter supplied by the provider registered as `provider`.
    pub fn dependency(mut self, name: &str, provider: &str) -> Self {
        self.params.push((name.to_string(), None, Some(provider.to_string())));
        self
    }

    pub fn build(self) -> DomainResult<ResolutionBinder> {
        let masks = compile_masks(&self.masks)?;
        let params = self
            .params
            .into_iter()
            .map(|(name, request, provider)| {
                let kind = match (request, provider) {
                    (Some(request), _) => ParamKind::Config(CompiledRequest::compile(request)?),
                    (None, provider) => ParamKind::Dependency(provider.unwrap_or_else(|| name.clone())),
                };
                Ok(Param { name, kind })
            })
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(ResolutionBinder {
            params,
            masks,
            unique: self.unique,
        })
    }
}

/// Binds a fixed parameter list against resolved trees.
#[derive(Debug, Clone)]
pub struct ResolutionBinder {
    params: Vec<Param>,
    masks: Vec<Mask>,
    unique: bool,
}

impl ResolutionBinder {
    pub fn builder() -> BinderBuilder {
        BinderBuilder::default()
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// Bind config parameters; dependency parameters fail with `DependencyNotFound`.
    pub fn bind(&self, tree: &ConfigTree) -> ApplicationResult<BoundArgs> {
        self.bind_with(tree, &Providers::new())
    }

    /// Bind against the tree stored under the holder's default key.
    pub fn bind_configured(&self, holder: &ConfigHolder, providers: &Providers) -> ApplicationResult<BoundArgs> {
        let tree = holder.get()?;
        self.bind_with(&tree, providers)
    }

    #[instrument(level = "debug", skip_all)]
    pub fn bind_with(&self, tree: &ConfigTree, providers: &Providers) -> ApplicationResult<BoundArgs> {
        let mut bindings = IndexMap::with_capacity(self.params.len());
        for param in &self.params {
            let binding = match &param.kind {
                ParamKind::Config(request) => {
                    let resolved = request.resolve(tree, &param.name, &self.masks, self.unique)?;
                    trace!(
                        "{} <- {}",
                        param.name,
                        resolved
                            .as_ref()
                            .and_then(|r| r.path.as_deref())
                            .unwrap_or("<default>")
                    );
                    Binding::Value(resolved)
                }
                ParamKind::Dependency(provider) => Binding::Dependency(providers.get_any(provider)?),
            };
            bindings.insert(param.name.clone(), binding);
        }
        debug!("bound {} parameters", bindings.len());
        Ok(BoundArgs { bindings })
    }
}

#[derive(Debug, Clone)]
enum Binding {
    Value(Option<Resolved>),
    Dependency(Arc<dyn Any + Send + Sync>),
}

/// Values bound by a [`ResolutionBinder`], by parameter name.
#[derive(Debug, Clone)]
pub struct BoundArgs {
    bindings: IndexMap<String, Binding>,
}

impl BoundArgs {
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    fn binding(&self, name: &str) -> ApplicationResult<&Binding> {
        self.bindings
            .get(name)
            .ok_or_else(|| ApplicationError::UnknownParameter {
                name: name.to_string(),
            })
    }

    fn resolved(&self, name: &str) -> ApplicationResult<Option<&Resolved>> {
        match self.binding(name)? {
            Binding::Value(resolved) => Ok(resolved.as_ref()),
            Binding::Dependency(_) => Err(ApplicationError::ParameterKind {
                name: name.to_string(),
                expected: "config value".to_string(),
            }),
        }
    }

    /// Raw node bound to `name`; `None` for an absent optional parameter.
    pub fn node(&self, name: &str) -> ApplicationResult<Option<&Node>> {
        Ok(self.resolved(name)?.map(|r| &r.node))
    }

    /// Full dotted path the value came from.
    pub fn source_path(&self, name: &str) -> ApplicationResult<Option<&str>> {
        Ok(self.resolved(name)?.and_then(|r| r.path.as_deref()))
    }

    /// Convert the bound value; `None` for an absent optional parameter.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> ApplicationResult<Option<T>> {
        match self.resolved(name)? {
            Some(resolved) => Ok(Some(resolved.to(name)?)),
            None => Ok(None),
        }
    }

    /// Convert the bound value, failing with `PathNotFound` if absent.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> ApplicationResult<T> {
        self.get(name)?
            .ok_or_else(|| DomainError::path_not_found(name).into())
    }

    pub fn dependency<T: Any + Send + Sync>(&self, name: &str) -> ApplicationResult<Arc<T>> {
        match self.binding(name)? {
            Binding::Dependency(value) => downcast(name, value.clone()),
            Binding::Value(_) => Err(ApplicationError::ParameterKind {
                name: name.to_string(),
                expected: "dependency".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Service {
        host: String,
        port: u16,
    }

    fn tree() -> ConfigTree {
        let mut tree = ConfigTree::new();
        tree.set("env.db.user", "alice").unwrap();
        tree.set("env.db.port", 5432).unwrap();
        tree.set("prod.db.user", "bob").unwrap();
        tree.set("env.services.api.host", "api.local").unwrap();
        tree.set("env.services.api.port", 8080).unwrap();
        tree.set("env.services.web.host", "web.local").unwrap();
        tree.set("env.services.web.port", 80).unwrap();
        tree
    }

    #[test]
    fn given_two_suffix_matches_when_unique_then_ambiguous_lists_both() {
        let err = resolve(&tree(), "user", &ResolutionRequest::path("db.user")).unwrap_err();
        match err {
            ApplicationError::Domain(DomainError::AmbiguousResolution { query, candidates }) => {
                assert_eq!(query, "db.user");
                assert_eq!(candidates, vec!["env.db.user", "prod.db.user"]);
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn given_mask_when_resolving_then_only_masked_candidate() {
        let request = ResolutionRequest::path("db.user").mask("env.**");
        let resolved = resolve(&tree(), "user", &request).unwrap().unwrap();
        assert_eq!(resolved.path.as_deref(), Some("env.db.user"));
        assert_eq!(resolved.node, "alice");
    }

    #[test]
    fn given_not_unique_when_resolving_then_first_in_natural_order() {
        let request = ResolutionRequest::path("db.user").unique(false);
        let resolved = resolve(&tree(), "user", &request).unwrap().unwrap();
        assert_eq!(resolved.path.as_deref(), Some("env.db.user"));
    }

    #[test]
    fn given_suffix_inside_segment_when_resolving_then_no_match() {
        let err = resolve(&tree(), "x", &ResolutionRequest::path("b.user")).unwrap_err();
        assert!(matches!(err, ApplicationError::Domain(DomainError::PathNotFound { .. })));
    }

    #[test]
    fn given_absolute_path_when_resolving_then_direct_lookup() {
        let services: HashMap<String, Service> =
            resolve_as(&tree(), "services", &ResolutionRequest::path("^env.services"))
                .unwrap()
                .unwrap();
        assert_eq!(services["api"].port, 8080);
        assert_eq!(services["web"].host, "web.local");
    }

    #[test]
    fn given_missing_optional_when_binding_then_none() {
        let binder = ResolutionBinder::builder()
            .param("timeout", ResolutionRequest::by_name().optional())
            .param("retries", ResolutionRequest::by_name().default_value(3))
            .build()
            .unwrap();
        let args = binder.bind(&tree()).unwrap();
        assert_eq!(args.get::<u64>("timeout").unwrap(), None);
        assert_eq!(args.require::<u32>("retries").unwrap(), 3);
        assert_eq!(args.source_path("retries").unwrap(), None);
    }

    #[test]
    fn given_missing_required_when_binding_then_path_not_found() {
        let binder = ResolutionBinder::builder().by_name("timeout").build().unwrap();
        let err = binder.bind(&tree()).unwrap_err();
        assert_eq!(err.path(), Some("timeout"));
    }

    #[test]
    fn given_binder_mask_when_request_has_own_mask_then_request_wins() {
        let binder = ResolutionBinder::builder()
            .mask("prod.**")
            .param("user", ResolutionRequest::path("db.user"))
            .param("env_user", ResolutionRequest::path("db.user").mask("env.**"))
            .build()
            .unwrap();
        let args = binder.bind(&tree()).unwrap();
        assert_eq!(args.require::<String>("user").unwrap(), "bob");
        assert_eq!(args.require::<String>("env_user").unwrap(), "alice");
    }

    #[test]
    fn given_wrong_model_when_converting_then_error_names_type_and_source() {
        let binder = ResolutionBinder::builder()
            .param("api", ResolutionRequest::path("services.api"))
            .build()
            .unwrap();
        let args = binder.bind(&tree()).unwrap();
        let err = args.require::<Vec<Service>>("api").unwrap_err();
        match err {
            ApplicationError::Domain(DomainError::ModelConversion { type_name, path, .. }) => {
                assert!(type_name.contains("Vec"));
                assert_eq!(path, "env.services.api");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn given_dependency_param_when_binding_then_provider_value() {
        #[derive(Debug)]
        struct Pool(usize);

        let mut providers = Providers::new();
        providers.register("pool", || Pool(4));
        let binder = ResolutionBinder::builder()
            .by_name("port")
            .dependency("pool", "pool")
            .build()
            .unwrap();
        let args = binder.bind_with(&tree(), &providers).unwrap();
        assert_eq!(args.dependency::<Pool>("pool").unwrap().0, 4);
        assert_eq!(args.require::<u16>("port").unwrap(), 5432);
        assert_eq!(args.names().collect::<Vec<_>>(), vec!["port", "pool"]);

        let err = binder.bind(&tree()).unwrap_err();
        assert!(matches!(err, ApplicationError::DependencyNotFound { .. }));
    }
}
