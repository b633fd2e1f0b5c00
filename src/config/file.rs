//! JSON configuration files.
//!
//! A file is an object keyed by address. Each entry is a bare literal, an
//! array of literals, or a cell object:
//!
//! ```text
//! {
//!     "0":  { "name": "IP", "value": 16 },
//!     "4":  { "name": "add", "onread": "add" },
//!     "12": { "name": "out", "onwrite": "putchar" },
//!     "18": 32,
//!     "32": [20, "@A", 21, "@B"]
//! }
//! ```
//!
//! Triggers are named devices looked up in a [`DeviceRegistry`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Block, CellConfig, CellValue, Config, ConfigError, Literal};
use crate::devices::DeviceRegistry;
use crate::machine::{Address, Word};

/// A literal as written in JSON: a number or a string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralSpec {
    Number(Word),
    Text(String),
}

impl LiteralSpec {
    pub fn to_literal(&self) -> Result<Literal, ConfigError> {
        match self {
            LiteralSpec::Number(n) => Ok(Literal::Number(*n)),
            LiteralSpec::Text(text) => Literal::parse(text),
        }
    }
}

impl From<&Literal> for LiteralSpec {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Number(n) => LiteralSpec::Number(*n),
            // A digit written as text would read back as a number.
            Literal::Char(c) if c.is_ascii_digit() => LiteralSpec::Number(Word::from(u32::from(*c))),
            Literal::Char(c) => LiteralSpec::Text(c.to_string()),
            Literal::SymbolRef(name) => LiteralSpec::Text(format!("@{}", name)),
        }
    }
}

/// Either a single item or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }

    fn from_vec(mut items: Vec<T>) -> Self {
        if items.len() == 1 {
            if let Some(item) = items.pop() {
                return OneOrMany::One(item);
            }
        }
        OneOrMany::Many(items)
    }
}

/// A cell object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CellSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<LiteralSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<OneOrMany<LiteralSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onread: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onwrite: Option<OneOrMany<String>>,
}

impl CellSpec {
    fn to_cell(&self, devices: &DeviceRegistry) -> Result<CellConfig, ConfigError> {
        let mut cell = CellConfig::new();

        cell.symbols.extend(self.name.iter().chain(self.symbol.iter()).cloned());
        if let Some(symbols) = &self.symbols {
            cell.symbols.extend(symbols.as_slice().iter().cloned());
        }
        if let Some(value) = &self.value {
            cell.value = Some(CellValue::Literal(value.to_literal()?));
        }
        if let Some(values) = &self.values {
            cell.values = Some(Block::Items(literals(values.as_slice())?));
        }
        if let Some(name) = &self.onread {
            cell.onread = Some(devices.read(name)?);
        }
        if let Some(names) = &self.onwrite {
            let triggers = names
                .as_slice()
                .iter()
                .map(|name| devices.write(name))
                .collect::<Result<Vec<_>, _>>()?;
            cell.onwrite = Some(triggers);
        }

        Ok(cell)
    }

    /// True if nothing but `values` would be written.
    fn has_only_values(&self) -> bool {
        self.name.is_none()
            && self.symbol.is_none()
            && self.symbols.is_none()
            && self.value.is_none()
            && self.onread.is_none()
            && self.onwrite.is_none()
    }
}

/// One entry of a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntrySpec {
    Literal(LiteralSpec),
    Block(Vec<LiteralSpec>),
    Cell(CellSpec),
}

/// A parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigFile {
    pub entries: BTreeMap<Address, EntrySpec>,
}

impl ConfigFile {
    /// Parse JSON text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build the in-memory configuration, binding device names to triggers.
    pub fn to_config(&self, devices: &DeviceRegistry) -> Result<Config, ConfigError> {
        let mut config = Config::new();
        for (&addr, entry) in &self.entries {
            let cell = match entry {
                EntrySpec::Literal(literal) => CellConfig::from(literal.to_literal()?),
                EntrySpec::Block(items) => CellConfig::from(literals(items)?),
                EntrySpec::Cell(spec) => spec.to_cell(devices)?,
            };
            config.insert(addr, cell);
        }
        Ok(config)
    }

    /// Describe a configuration in file form.
    ///
    /// Triggers are written by device label; an unlabeled trigger is an
    /// error unless callbacks are excluded. Generated blocks are expanded.
    pub fn from_config(config: &Config, include_callbacks: bool) -> Result<Self, ConfigError> {
        let mut entries = BTreeMap::new();

        for (addr, cell) in config.iter() {
            let mut spec = CellSpec::default();

            match cell.symbols.as_slice() {
                [] => {}
                [one] => spec.symbol = Some(one.clone()),
                many => spec.symbols = Some(OneOrMany::Many(many.to_vec())),
            }

            match &cell.value {
                Some(CellValue::Literal(literal)) => spec.value = Some(literal.into()),
                Some(CellValue::Computed(trigger)) if include_callbacks => {
                    spec.onread = Some(label(trigger.label(), addr)?);
                }
                _ => {}
            }

            if let Some(block) = &cell.values {
                let items = block.items(addr).iter().map(LiteralSpec::from).collect();
                spec.values = Some(OneOrMany::Many(items));
            }

            if include_callbacks {
                if let Some(trigger) = &cell.onread {
                    spec.onread = Some(label(trigger.label(), addr)?);
                }
                if let Some(triggers) = &cell.onwrite {
                    let names = triggers
                        .iter()
                        .map(|trigger| label(trigger.label(), addr))
                        .collect::<Result<Vec<_>, _>>()?;
                    spec.onwrite = Some(OneOrMany::from_vec(names));
                }
            }

            let entry = match (spec.has_only_values(), spec.values.take()) {
                (true, Some(OneOrMany::Many(items))) => EntrySpec::Block(items),
                (_, values) => EntrySpec::Cell(CellSpec { values, ..spec }),
            };
            entries.insert(addr, entry);
        }

        Ok(Self { entries })
    }
}

fn literals(items: &[LiteralSpec]) -> Result<Vec<Literal>, ConfigError> {
    items.iter().map(LiteralSpec::to_literal).collect()
}

fn label(label: Option<&str>, addr: Address) -> Result<String, ConfigError> {
    label.map(str::to_string).ok_or(ConfigError::UnlabeledTrigger(addr))
}

/// Read and parse a configuration file.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
    ConfigFile::parse(&text)
}

/// Write a configuration file as pretty JSON.
pub fn save_file<P: AsRef<Path>>(path: P, file: &ConfigFile) -> Result<(), ConfigError> {
    let json = file.to_json()?;
    std::fs::write(path.as_ref(), json + "\n").map_err(|e| ConfigError::Io(e.to_string()))
}
