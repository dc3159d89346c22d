//! Template engine: resolves `${{ ACTION:ARG }}` expressions in string leaves.
//!
//! Resolution runs full-tree scans until a scan finds no templated scalar.
//! Each scalar is rewritten until its text holds no expression. `config`
//! references resolve their target first, so a chain of references settles
//! in one pass. Cycles are caught with a stack of (path, text) frames
//! currently being resolved; `max_iterations` bounds both the number of scans
//! and the rewrites of a single scalar.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::application::actions::{ConfigAction, EnvAction, FileAction, YamlAction};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::path::{segments, strip_absolute};
use crate::domain::template::{self, contains_template, is_whole_value, TemplateExpr};
use crate::domain::{ConfigTree, DomainError, Node, Scalar};
use crate::infrastructure::traits::{Environment, FileSystem};

/// Default ceiling for scans and per-scalar rewrites.
pub const DEFAULT_MAX_ITERATIONS: usize = 64;

/// What an action produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutput {
    /// Plain text, splice-able anywhere.
    Text(String),
    /// A tree value; scalars splice as text, containers only as whole value.
    Value(Node),
    /// A parsed document; only valid as the whole value.
    Document(Node),
}

/// A resolver for one action name.
pub trait TemplateAction: Send + Sync {
    fn resolve(&self, ctx: &mut ActionContext<'_>, arg: &str) -> ApplicationResult<ActionOutput>;
}

struct FnAction<F>(F);

impl<F> TemplateAction for FnAction<F>
where
    F: Fn(&mut ActionContext<'_>, &str) -> ApplicationResult<ActionOutput> + Send + Sync,
{
    fn resolve(&self, ctx: &mut ActionContext<'_>, arg: &str) -> ApplicationResult<ActionOutput> {
        (self.0)(ctx, arg)
    }
}

/// (path, text) currently being resolved.
type Frame = (String, String);

/// Everything an action may touch while resolving one expression.
pub struct ActionContext<'a> {
    engine: &'a TemplateEngine,
    tree: &'a mut ConfigTree,
    stack: &'a mut Vec<Frame>,
    path: &'a str,
}

impl ActionContext<'_> {
    /// Dotted path of the scalar holding the expression.
    pub fn path(&self) -> &str {
        self.path
    }

    pub fn env(&self) -> &dyn Environment {
        self.engine.env.as_ref()
    }

    /// Relative paths are taken from the engine's base directory, if any.
    pub fn resolve_file_path(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        match &self.engine.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn read_file(&self, path: &Path) -> ApplicationResult<String> {
        self.engine.fs.read_to_string(path).with_path_context(path)
    }

    /// Value at `target` in the tree being resolved, with its templates
    /// resolved first.
    pub fn resolve_reference(&mut self, target: &str) -> ApplicationResult<Node> {
        let (_, target) = strip_absolute(target);
        let segs = segments(target)?;

        // a templated scalar on the way (e.g. a pending yaml graft) must settle first
        for end in 1..segs.len() {
            let prefix = segs[..end].join(".");
            let node = match self.tree.get(&prefix) {
                Ok(node) => node,
                Err(_) => break,
            };
            if node.as_str().is_some_and(contains_template) {
                self.engine.resolve_scalar(self.tree, &prefix, self.stack)?;
            }
        }

        for pending in self.tree.template_paths(target) {
            self.engine.resolve_scalar(self.tree, &pending, self.stack)?;
        }

        match self.tree.get(target) {
            Ok(node) => Ok(node.clone()),
            Err(_) => Err(ApplicationError::MissingReference {
                path: self.path.to_string(),
                target: target.to_string(),
            }),
        }
    }
}

/// Summary of one resolution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Scans that found templated scalars
    pub passes: usize,
    /// Scalars rewritten
    pub substitutions: usize,
}

/// Resolves template expressions across a tree.
pub struct TemplateEngine {
    actions: BTreeMap<String, Arc<dyn TemplateAction>>,
    fs: Arc<dyn FileSystem>,
    env: Arc<dyn Environment>,
    base_dir: Option<PathBuf>,
    max_iterations: usize,
}

impl TemplateEngine {
    /// Engine with the built-in `env`, `file`, `config` and `yaml` actions.
    pub fn new(fs: Arc<dyn FileSystem>, env: Arc<dyn Environment>) -> Self {
        let mut engine = Self {
            actions: BTreeMap::new(),
            fs,
            env,
            base_dir: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        };
        engine.register("env", EnvAction);
        engine.register("file", FileAction);
        engine.register("config", ConfigAction);
        engine.register("yaml", YamlAction);
        engine
    }

    pub fn with_base_dir(mut self, base_dir: Option<PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Register (or replace) the resolver for `name`.
    pub fn register(&mut self, name: &str, action: impl TemplateAction + 'static) {
        self.actions.insert(name.to_string(), Arc::new(action));
    }

    /// Register a closure as resolver for `name`.
    pub fn register_fn<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut ActionContext<'_>, &str) -> ApplicationResult<ActionOutput> + Send + Sync + 'static,
    {
        self.register(name, FnAction(f));
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    /// Resolve every template in `tree` in place.
    ///
    /// The first failure aborts the run; the tree may then hold a mix of
    /// resolved and unresolved values and should be discarded.
    #[instrument(level = "debug", skip_all)]
    pub fn resolve(&self, tree: &mut ConfigTree) -> ApplicationResult<ResolutionReport> {
        let mut report = ResolutionReport::default();
        let mut stack = Vec::new();

        loop {
            let pending = tree.template_paths("");
            if pending.is_empty() {
                debug!(
                    "templates resolved: {} passes, {} substitutions",
                    report.passes, report.substitutions
                );
                return Ok(report);
            }
            if report.passes >= self.max_iterations {
                return Err(ApplicationError::TemplateResolutionLimitExceeded {
                    path: pending[0].clone(),
                    limit: self.max_iterations,
                });
            }
            report.passes += 1;
            debug!("pass {}: {} templated values", report.passes, pending.len());

            for path in pending {
                if self.resolve_scalar(tree, &path, &mut stack)? {
                    report.substitutions += 1;
                }
            }
        }
    }

    /// Rewrite the scalar at `path` until it holds no expression.
    ///
    /// Returns false if the path no longer holds a templated string.
    fn resolve_scalar(
        &self,
        tree: &mut ConfigTree,
        path: &str,
        stack: &mut Vec<Frame>,
    ) -> ApplicationResult<bool> {
        let mut current = match tree.get(path).ok().and_then(Node::as_str) {
            Some(text) if contains_template(text) => text.to_string(),
            _ => return Ok(false),
        };
        let mut seen = HashSet::new();

        for _ in 0..self.max_iterations {
            let revisited = stack.iter().any(|(p, text)| p == path && *text == current);
            if revisited || !seen.insert(current.clone()) {
                return Err(ApplicationError::CircularTemplateReference {
                    path: path.to_string(),
                    expression: current,
                });
            }

            stack.push((path.to_string(), current.clone()));
            let result = self.evaluate(tree, path, &current, stack);
            stack.pop();

            match result? {
                Node::Scalar(Scalar::Str(next)) if contains_template(&next) => {
                    trace!("{}: rewritten to another template", path);
                    current = next;
                }
                resolved => {
                    trace!("{}: resolved", path);
                    tree.set(path, resolved)?;
                    return Ok(true);
                }
            }
        }

        Err(ApplicationError::TemplateResolutionLimitExceeded {
            path: path.to_string(),
            limit: self.max_iterations,
        })
    }

    /// One substitution round over `text`.
    fn evaluate(
        &self,
        tree: &mut ConfigTree,
        path: &str,
        text: &str,
        stack: &mut Vec<Frame>,
    ) -> ApplicationResult<Node> {
        let exprs = template::scan(text).map_err(|e| DomainError::MalformedTemplateExpression {
            path: path.to_string(),
            expression: e.expression,
            reason: e.reason,
        })?;

        if is_whole_value(text, &exprs) {
            return Ok(match self.dispatch(tree, path, &exprs[0], stack)? {
                ActionOutput::Text(s) => Node::from(s),
                ActionOutput::Value(node) | ActionOutput::Document(node) => node,
            });
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for expr in &exprs {
            out.push_str(&text[last..expr.span.start]);
            let piece = match self.dispatch(tree, path, expr, stack)? {
                ActionOutput::Text(s) => s,
                ActionOutput::Value(Node::Scalar(s)) => s.to_string(),
                ActionOutput::Value(_) => {
                    return Err(ApplicationError::InvalidTemplateUsage {
                        path: path.to_string(),
                        reason: format!("{} resolves to a container and cannot be embedded in text", expr.raw),
                    })
                }
                ActionOutput::Document(_) => {
                    return Err(ApplicationError::InvalidTemplateUsage {
                        path: path.to_string(),
                        reason: format!("{} must be the whole value", expr.raw),
                    })
                }
            };
            out.push_str(&piece);
            last = expr.span.end;
        }
        out.push_str(&text[last..]);
        Ok(Node::from(out))
    }

    fn dispatch(
        &self,
        tree: &mut ConfigTree,
        path: &str,
        expr: &TemplateExpr,
        stack: &mut Vec<Frame>,
    ) -> ApplicationResult<ActionOutput> {
        let action = self
            .actions
            .get(&expr.action)
            .ok_or_else(|| ApplicationError::UnknownTemplateAction {
                path: path.to_string(),
                action: expr.action.clone(),
            })?;
        trace!("{}: {} -> {}:{}", path, expr.raw, expr.action, expr.arg);
        let mut ctx = ActionContext {
            engine: self,
            tree,
            stack,
            path,
        };
        action.resolve(&mut ctx, &expr.arg)
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("actions", &self.actions())
            .field("base_dir", &self.base_dir)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}
