//! Command-line interface for symposium.
//!
//! Provides the `debate` command that stages one debate end to end, and
//! `personas` to list the built-in participants.

mod commands;

pub use commands::{
    parse_cli, run, run_with_cli, Cli, Commands, DebateArgs, SelectionMode, TerminationMode,
    DEFAULT_PROMPT,
};
