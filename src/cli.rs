//! CLI argument parsing for the normalization run.
//!
//! The CLI stays thin: it picks the base directory, config and confirmation
//! source, then hands off to the orchestrator.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "refnorm",
    version,
    about = "Normalize reference directives to point at the canonical anchor directory",
    after_help = "Runs a dry-run preview first, asks for confirmation, then rewrites each changed\ndocument after saving <file>.backup.<YYYYMMDD_HHMMSS> next to it.\n\nExamples:\n  refnorm --base ~/projects\n  refnorm --base ~/projects --dry-run\n  refnorm --base ./proj --config refnorm.json --yes"
)]
pub struct RootArgs {
    /// Base directory containing the documents and the anchor directory
    /// (defaults to $HOME/projects)
    #[arg(long, value_name = "DIR")]
    pub base: Option<PathBuf>,

    /// JSON config overriding document name, anchor, and legacy forms
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Apply without prompting
    #[arg(long, conflicts_with = "dry_run")]
    pub yes: bool,

    /// Preview changes only; never prompt or write
    #[arg(long)]
    pub dry_run: bool,

    /// Emit debug logs to stderr
    #[arg(long)]
    pub verbose: bool,
}
