//! Built-in template actions: `env`, `file`, `config`, `yaml`.

use tracing::trace;

use crate::application::template::{ActionContext, ActionOutput, TemplateAction};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::sources::parse_yaml_document;
use crate::domain::template::split_default;

/// `${{ env:NAME[:DEFAULT] }}`, the default runs to the end of the argument.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvAction;

impl TemplateAction for EnvAction {
    fn resolve(&self, ctx: &mut ActionContext<'_>, arg: &str) -> ApplicationResult<ActionOutput> {
        let (name, default) = split_default(arg);
        match (ctx.env().var(name), default) {
            (Some(value), _) => Ok(ActionOutput::Text(value)),
            (None, Some(default)) => {
                trace!("{}: {} unset, using default", ctx.path(), name);
                Ok(ActionOutput::Text(default.to_string()))
            }
            (None, None) => Err(ApplicationError::MissingEnvVar {
                name: name.to_string(),
                path: ctx.path().to_string(),
            }),
        }
    }
}

/// `${{ file:PATH }}`: the file's content, verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileAction;

impl TemplateAction for FileAction {
    fn resolve(&self, ctx: &mut ActionContext<'_>, arg: &str) -> ApplicationResult<ActionOutput> {
        let path = ctx.resolve_file_path(arg);
        Ok(ActionOutput::Text(ctx.read_file(&path)?))
    }
}

/// `${{ config:DOTTED.PATH }}`: a value from the tree being resolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigAction;

impl TemplateAction for ConfigAction {
    fn resolve(&self, ctx: &mut ActionContext<'_>, arg: &str) -> ApplicationResult<ActionOutput> {
        Ok(ActionOutput::Value(ctx.resolve_reference(arg)?))
    }
}

/// `${{ yaml:PATH }}`: a parsed YAML document grafted in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlAction;

impl TemplateAction for YamlAction {
    fn resolve(&self, ctx: &mut ActionContext<'_>, arg: &str) -> ApplicationResult<ActionOutput> {
        let path = ctx.resolve_file_path(arg);
        let content = ctx.read_file(&path)?;
        let document = parse_yaml_document(&content, &path.display().to_string())?;
        Ok(ActionOutput::Document(document))
    }
}
