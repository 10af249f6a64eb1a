#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

#[macro_use]
pub mod environment;

pub mod arg_parser;
mod commands;
pub mod configuration;
pub mod embedded_blocks;
pub mod format;
pub mod modules;
pub mod node;
pub mod plugins;
pub mod run_cli;
pub mod utils;

#[cfg(test)]
mod test_helpers;
