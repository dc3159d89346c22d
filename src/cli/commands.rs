//! Command dispatch

use std::io;

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::binder::locate;
use crate::application::PathSpec;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::mask::compile_masks;
use crate::domain::{ConfigTree, DomainError, Node};
use crate::infrastructure::ServiceContainer;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `cfgtree --help`".to_string(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            completion(*shell);
            return Ok(());
        }
        Commands::Config { command } => return config_command(cli, command),
        _ => {}
    }

    let settings = Settings::load(cli.settings.as_deref())?;
    let container = ServiceContainer::new(settings);
    if cli.sources.is_empty() && container.settings.sources.is_empty() {
        return Err(CliError::Usage(
            "no sources: pass --source or set `sources` in the settings file".to_string(),
        ));
    }

    match command {
        Commands::Resolve { raw } => resolve(cli, &container, *raw),
        Commands::Get { path, raw } => get(cli, &container, path, *raw),
        Commands::Flatten { raw } => flatten(cli, &container, *raw),
        Commands::Keys { depth } => keys(cli, &container, *depth),
        Commands::Find { suffix, mask, one } => find(cli, &container, suffix, mask, *one),
        Commands::Tree { path } => tree(cli, &container, path.as_deref()),
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

fn load(cli: &Cli, container: &ServiceContainer, raw: bool) -> CliResult<ConfigTree> {
    if raw {
        return Ok(container.load(&cli.sources)?);
    }
    let (tree, report) = container.load_resolved(&cli.sources)?;
    debug!(
        "resolved in {} passes, {} substitutions",
        report.passes, report.substitutions
    );
    Ok(tree)
}

/// Scalars as plain text, containers as YAML.
fn render(node: &Node) -> CliResult<String> {
    match node {
        Node::Scalar(scalar) => Ok(scalar.to_string()),
        _ => Ok(node.to_yaml_string()?.trim_end().to_string()),
    }
}

fn summary(node: &Node) -> String {
    match node {
        Node::Map(map) => format!("<map: {} keys>", map.len()),
        Node::Seq(seq) => format!("<sequence: {} items>", seq.len()),
        Node::Scalar(scalar) => scalar.to_string(),
    }
}

#[instrument(level = "debug", skip(cli, container))]
fn resolve(cli: &Cli, container: &ServiceContainer, raw: bool) -> CliResult<()> {
    let tree = load(cli, container, raw)?;
    output::info(tree.to_yaml_string()?.trim_end());
    Ok(())
}

#[instrument(level = "debug", skip(cli, container))]
fn get(cli: &Cli, container: &ServiceContainer, path: &str, raw: bool) -> CliResult<()> {
    let tree = load(cli, container, raw)?;
    output::info(&render(tree.get(path)?)?);
    Ok(())
}

#[instrument(level = "debug", skip(cli, container))]
fn flatten(cli: &Cli, container: &ServiceContainer, raw: bool) -> CliResult<()> {
    let tree = load(cli, container, raw)?;
    for (path, value) in tree.flatten() {
        output::entry(&path, &value);
    }
    Ok(())
}

#[instrument(level = "debug", skip(cli, container))]
fn keys(cli: &Cli, container: &ServiceContainer, depth: Option<usize>) -> CliResult<()> {
    if depth == Some(0) {
        return Err(CliError::InvalidArgs("--depth must be at least 1".to_string()));
    }
    let tree = load(cli, container, false)?;
    for path in tree.paths(depth) {
        output::info(&path);
    }
    Ok(())
}

#[instrument(level = "debug", skip(cli, container))]
fn find(
    cli: &Cli,
    container: &ServiceContainer,
    suffix: &str,
    masks: &[String],
    one: bool,
) -> CliResult<()> {
    let tree = load(cli, container, false)?;
    let masks = if masks.is_empty() {
        compile_masks(&container.settings.masks)?
    } else {
        compile_masks(masks)?
    };

    if one {
        let path = PathSpec::from(suffix);
        return match locate(&tree, suffix, &path, &masks, container.settings.unique)? {
            Some((path, node)) => {
                output::entry(&path, &render(node)?);
                Ok(())
            }
            None => Err(DomainError::path_not_found(suffix).into()),
        };
    }

    let found = tree.find_by_suffix(suffix, &masks)?;
    if found.is_empty() {
        output::warning(&format!("no path ends with '{suffix}'"));
    }
    for (path, node) in found {
        output::entry(&path, &summary(node));
    }
    Ok(())
}

fn display_tree(label: String, node: &Node) -> Tree<String> {
    match node {
        Node::Scalar(scalar) => Tree::new(format!("{label}: {scalar}")),
        Node::Map(map) => Tree::new(label).with_leaves(
            map.iter()
                .map(|(key, child)| display_tree(key.clone(), child)),
        ),
        Node::Seq(seq) => Tree::new(label).with_leaves(
            seq.iter()
                .enumerate()
                .map(|(i, child)| display_tree(format!("[{i}]"), child)),
        ),
    }
}

#[instrument(level = "debug", skip(cli, container))]
fn tree(cli: &Cli, container: &ServiceContainer, path: Option<&str>) -> CliResult<()> {
    let tree = load(cli, container, false)?;
    let (label, node) = match path {
        Some(path) => (path.to_string(), tree.get(path)?),
        None => (".".to_string(), tree.root()),
    };
    output::info(&display_tree(label, node));
    Ok(())
}

fn config_command(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(cli.settings.as_deref())?;
            output::info(settings.to_toml()?.trim_end());
        }
        ConfigCommands::Template => output::info(Settings::template().trim_end()),
        ConfigCommands::Path => {
            output::header("Settings files");
            match global_config_path() {
                Some(path) => {
                    let state = if path.exists() { "exists" } else { "not found" };
                    output::detail(&format!("global: {} ({state})", path.display()));
                }
                None => output::detail("global: <no config directory>"),
            }
            match &cli.settings {
                Some(path) => output::detail(&format!("local:  {}", path.display())),
                None => output::detail("local:  <none, use --settings>"),
            }
        }
    }
    Ok(())
}

fn completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
