//! The move machine.
//!
//! This module implements the whole engine:
//! - [`SymbolTable`]: names bound to addresses
//! - [`Memory`]: sparse cells with read and write triggers
//! - [`Machine`]: the single-instruction fetch/execute loop

pub mod symbols;
pub mod memory;
pub mod execute;

/// A cell address. Memory is sparse and unbounded.
pub type Address = u64;

/// The content of a cell.
pub type Word = i64;

pub use symbols::SymbolTable;
pub use memory::{CellRef, Memory, MemoryError, ReadTrigger, WriteTrigger};
pub use execute::{Machine, MachineError, MachineState, Move, IP};
