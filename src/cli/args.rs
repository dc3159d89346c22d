//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Hierarchical configuration: merge YAML and .env sources, resolve templates, look up values
#[derive(Parser, Debug)]
#[command(name = "cfgtree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d, -dd, -ddd)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Settings file layered over the global settings
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub settings: Option<PathBuf>,

    /// Configuration source, merged in the order given (.env files detected by name)
    #[arg(short = 's', long = "source", global = true, value_hint = ValueHint::FilePath)]
    pub sources: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the merged, resolved configuration as YAML
    Resolve {
        /// Skip template resolution
        #[arg(long)]
        raw: bool,
    },

    /// Print the value at a dotted path
    Get {
        /// Dotted path, e.g. db.user
        path: String,
        /// Skip template resolution
        #[arg(long)]
        raw: bool,
    },

    /// Print every leaf as path=value
    Flatten {
        /// Skip template resolution
        #[arg(long)]
        raw: bool,
    },

    /// List dotted paths
    Keys {
        /// Stop at this many segments
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Find nodes whose path ends with a suffix
    Find {
        /// Dotted suffix, e.g. db.user
        suffix: String,
        /// Only consider paths matching a mask (repeatable), e.g. env.**
        #[arg(short, long)]
        mask: Vec<String>,
        /// Resolve to one value the way parameters are bound
        #[arg(long)]
        one: bool,
    },

    /// Show the configuration as a tree
    Tree {
        /// Start at this path
        path: Option<String>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged settings
    Show,

    /// Print a settings template
    Template,

    /// Show settings paths
    Path,
}
