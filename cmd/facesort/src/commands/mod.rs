//! CLI commands module.

mod config;
mod manage;
mod sort;
mod util;

pub use config::ConfigCommand;
pub use manage::{RenameCommand, ResetCommand};
pub use sort::SortCommand;

pub(crate) use util::*;
