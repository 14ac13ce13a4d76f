//! CLI module for toolrag - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
