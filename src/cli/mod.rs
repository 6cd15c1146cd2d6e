//! CLI command handlers
//!
//! This module contains the implementation of the operator commands,
//! bridging the clap argument parsing with the library.

pub mod check;
pub mod migrate;
pub mod show;

pub use check::handle_check_command;
pub use migrate::{handle_migrate_command, MigrateArgs};
pub use show::handle_config_command;
