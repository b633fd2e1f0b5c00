//! Built-in programs.
//!
//! Every program is layered on top of the base layout, which maps the
//! registers, the arithmetic/logic devices and console I/O into the low
//! addresses and puts a boot move at 16 that jumps to the address stored
//! in cell 18.

use crate::config::{Config, ConfigError, ConfigFile};
use crate::devices::DeviceRegistry;

const BASE: &str = include_str!("../programs/base.json");
const TWO_PLUS_TWO: &str = include_str!("../programs/two_plus_two.json");
const FIBONACCI: &str = include_str!("../programs/fibonacci.json");
const ECHO: &str = include_str!("../programs/echo.json");

/// A built-in program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Example {
    /// The default layout alone. Halts after the boot move.
    Base,
    /// Adds two constants into `res`.
    TwoPlusTwo,
    /// Writes the Fibonacci sequence from address 48 upward. Never halts.
    Fibonacci,
    /// Copies input to output until input runs dry.
    Echo,
}

impl Example {
    pub const ALL: [Example; 4] = [Example::Base, Example::TwoPlusTwo, Example::Fibonacci, Example::Echo];

    pub fn name(self) -> &'static str {
        match self {
            Example::Base => "base",
            Example::TwoPlusTwo => "two_plus_two",
            Example::Fibonacci => "fibonacci",
            Example::Echo => "echo",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|example| example.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Example::Base => "default layout only; halts on boot",
            Example::TwoPlusTwo => "adds 2 and 2 into `res`",
            Example::Fibonacci => "fills memory from 48 with Fibonacci numbers (runs forever)",
            Example::Echo => "copies input to output",
        }
    }

    /// The program's own JSON, without the base layout.
    pub fn source(self) -> &'static str {
        match self {
            Example::Base => BASE,
            Example::TwoPlusTwo => TWO_PLUS_TWO,
            Example::Fibonacci => FIBONACCI,
            Example::Echo => ECHO,
        }
    }

    /// The full configuration: base layout with the program on top.
    pub fn config(self, devices: &DeviceRegistry) -> Result<Config, ConfigError> {
        let mut config = default_config(devices)?;
        if self != Example::Base {
            config.merge(ConfigFile::parse(self.source())?.to_config(devices)?);
        }
        Ok(config)
    }
}

/// The base layout.
pub fn default_config(devices: &DeviceRegistry) -> Result<Config, ConfigError> {
    ConfigFile::parse(BASE)?.to_config(devices)
}
