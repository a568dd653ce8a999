//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand, ValueEnum,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::retrieval::RetrievalMode;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Retrieval pipeline for a documentation book
#[derive(Parser)]
#[command(
    name = "bookrag",
    version = env!("CARGO_PKG_VERSION"),
    about = "Index a documentation book and retrieve grounded passages",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  \
        $ bookrag init\n  \
        $ bookrag index --dry-run\n  \
        $ bookrag index\n  \
        $ bookrag query \"what is a ROS 2 node?\" --language ur"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up .bookrag directory with default configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Load, chunk, embed and upsert the corpus
    Index {
        /// Corpus root (overrides corpus.root)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Load and chunk only; no provider or store calls
        #[arg(long)]
        dry_run: bool,

        /// Index at most N files
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Retrieve passages for a question
    Query {
        /// Question text
        text: String,

        #[arg(long, value_enum, default_value_t = ModeArg::WholeBook)]
        mode: ModeArg,

        /// Selected passage (selection mode)
        #[arg(long)]
        selection: Option<String>,

        /// Document the selection came from (selection mode)
        #[arg(long, value_name = "PATH")]
        anchor: Option<String>,

        /// Preferred result language (e.g. en, ur)
        #[arg(short, long)]
        language: Option<String>,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,

        /// Also print the assembled prompt context
        #[arg(long)]
        context: bool,
    },

    /// Display active settings
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    WholeBook,
    Selection,
}

impl From<ModeArg> for RetrievalMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::WholeBook => RetrievalMode::WholeBook,
            ModeArg::Selection => RetrievalMode::Selection,
        }
    }
}
