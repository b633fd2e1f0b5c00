//! # OISC Move Machine
//!
//! A one-instruction computer. The only instruction moves a word from one
//! address to another; arithmetic, comparison and I/O are memory-mapped
//! cells whose reads and writes run host callbacks.
//!
//! ```
//! use oisc::{Console, DeviceRegistry, Example, Machine};
//!
//! let devices = DeviceRegistry::standard(&Console::new());
//! let config = Example::TwoPlusTwo.config(&devices).unwrap();
//! let mut vm = Machine::from_config(&config).unwrap();
//! vm.run(100).unwrap();
//! assert_eq!(vm.mem.read("res").unwrap(), 4);
//! ```

pub mod machine;
pub mod config;
pub mod devices;
pub mod programs;

// Re-export commonly used types
pub use machine::{
    Address, CellRef, Machine, MachineError, MachineState, Memory, MemoryError, Move, ReadTrigger,
    SymbolTable, Word, WriteTrigger, IP,
};
pub use config::{export, load, CellConfig, Config, ConfigError, ConfigFile, Literal};
pub use devices::{Console, DeviceRegistry};
pub use programs::{default_config, Example};
