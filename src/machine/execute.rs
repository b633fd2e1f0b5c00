//! Execution engine for the move machine.
//!
//! There is one instruction: the pair of cells at the instruction pointer
//! names a source and a destination, and the value read through the source
//! is written through the destination. Everything else happens in triggers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::memory::{Memory, MemoryError};
use super::{Address, Word};
use crate::config::{self, Config, ConfigError};

/// Conventional address of the instruction pointer.
pub const IP: Address = 0;

/// Machine execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// The instruction pointer reads non-zero.
    Running,
    /// The instruction pointer reads 0.
    Halted,
}

/// One executed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    /// Instruction pointer the move was fetched from.
    pub ip: Address,
    /// Source address (contents of `ip`).
    pub src: Address,
    /// Destination address (contents of `ip + 1`).
    pub dst: Address,
    /// Value moved.
    pub value: Word,
    /// True if the move wrote the instruction pointer, so no advance happened.
    pub jumped: bool,
}

/// The move machine: triggered memory plus an instruction pointer cell.
#[derive(Clone, Debug)]
pub struct Machine {
    /// Machine memory.
    pub mem: Memory,
    /// Address of the instruction pointer cell.
    ip_addr: Address,
    /// Moves executed so far.
    pub steps: u64,
    last_move: Option<Move>,
}

impl Machine {
    /// Create a machine over empty memory. It starts halted.
    pub fn new() -> Self {
        Self::with_memory(Memory::new())
    }

    /// Create a machine over prepared memory.
    pub fn with_memory(mem: Memory) -> Self {
        Self {
            mem,
            ip_addr: IP,
            steps: 0,
            last_move: None,
        }
    }

    /// Build a machine from a configuration.
    ///
    /// Loading is all-or-nothing: on error no machine is produced.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut mem = Memory::new();
        config::load(config, &mut mem)?;
        Ok(Self::with_memory(mem))
    }

    /// Apply more configuration to a live machine.
    ///
    /// On error the machine is left exactly as it was.
    pub fn configure(&mut self, config: &Config) -> Result<(), ConfigError> {
        config::load(config, &mut self.mem)
    }

    /// Snapshot the current memory as a configuration.
    pub fn export_config(&self, include_callbacks: bool) -> Config {
        config::export(&self.mem, include_callbacks)
    }

    /// Use a different cell as the instruction pointer.
    pub fn with_ip_address(mut self, addr: Address) -> Self {
        self.ip_addr = addr;
        self
    }

    pub fn ip_address(&self) -> Address {
        self.ip_addr
    }

    /// Read the instruction pointer.
    pub fn ip(&mut self) -> Result<Word, MachineError> {
        Ok(self.mem.read(self.ip_addr)?)
    }

    pub fn is_halted(&mut self) -> Result<bool, MachineError> {
        Ok(self.ip()? == 0)
    }

    pub fn state(&mut self) -> Result<MachineState, MachineError> {
        if self.is_halted()? {
            Ok(MachineState::Halted)
        } else {
            Ok(MachineState::Running)
        }
    }

    /// The most recent move, if any.
    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    /// Execute one move.
    ///
    /// Operands are fetched and the move is performed at the current
    /// instruction pointer. Advancing to `ip + 2` is the last sub-step and is
    /// skipped when the instruction pointer cell was written during the move;
    /// that write is a jump.
    pub fn step(&mut self) -> Result<Move, MachineError> {
        let ip_word = self.ip()?;
        if ip_word == 0 {
            return Err(MachineError::Halted);
        }
        let ip = to_address(ip_word)?;
        let src = to_address(self.mem.read(ip)?)?;
        let dst = to_address(self.mem.read(ip + 1)?)?;

        let mark = self.mem.clock();
        let value = self.mem.read(src)?;
        self.mem.write(dst, value)?;

        let jumped = self.mem.written_since(self.ip_addr, mark);
        if !jumped {
            let next = ip_word
                .checked_add(2)
                .ok_or(MachineError::InvalidAddress(ip_word))?;
            self.mem.write(self.ip_addr, next)?;
        }

        self.steps += 1;
        let mv = Move { ip, src, dst, value, jumped };
        tracing::trace!(ip, src, dst, value, jumped, "move");
        self.last_move = Some(mv);
        Ok(mv)
    }

    /// Run until the machine halts or `max_steps` moves have executed.
    ///
    /// Returns the number of moves executed. A program that halts on exactly
    /// its last budgeted move counts as halted.
    pub fn run(&mut self, max_steps: u64) -> Result<u64, MachineError> {
        let mut executed = 0;
        loop {
            if executed == max_steps {
                if self.is_halted()? {
                    break;
                }
                tracing::debug!(steps = executed, "step budget exhausted");
                return Err(MachineError::BudgetExhausted { steps: executed });
            }
            match self.step() {
                Ok(_) => executed += 1,
                Err(MachineError::Halted) => break,
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(steps = executed, total = self.steps, "halted");
        Ok(executed)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

fn to_address(word: Word) -> Result<Address, MachineError> {
    Address::try_from(word).map_err(|_| MachineError::InvalidAddress(word))
}

/// Errors that can occur during execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("machine halted: instruction pointer reads 0")]
    Halted,

    #[error("step budget exhausted after {steps} steps without halting")]
    BudgetExhausted { steps: u64 },

    #[error("invalid address: {0}")]
    InvalidAddress(Word),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}
