//! Machine configuration.
//!
//! This module provides:
//! - [`Literal`]: numbers, characters and `@name` references
//! - [`Config`]: the per-address descriptor map, with its loader and exporter
//! - [`ConfigFile`]: the JSON form, with devices referenced by name

pub mod literal;
pub mod loader;
pub mod file;

use thiserror::Error;

use crate::machine::{Address, MemoryError};

pub use literal::Literal;
pub use loader::{export, load, Block, CellConfig, CellValue, Config};
pub use file::{load_file, save_file, CellSpec, ConfigFile, EntrySpec, LiteralSpec, OneOrMany};

/// Errors that can occur while loading, exporting or parsing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid literal: {0:?}")]
    InvalidLiteral(String),

    #[error("malformed block at {addr}: {reason}")]
    MalformedBlock { addr: Address, reason: String },

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("trigger at {0} has no device label")]
    UnlabeledTrigger(Address),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),
}
