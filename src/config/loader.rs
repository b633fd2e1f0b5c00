//! Configuration model, loader and exporter.
//!
//! A [`Config`] maps addresses to [`CellConfig`] descriptors. Loading binds
//! every symbol of every entry first, then resolves literals and installs
//! triggers, so `@name` may refer to a symbol declared anywhere.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::{ConfigError, Literal};
use crate::machine::{Address, Memory, ReadTrigger, WriteTrigger};

/// Initial content of a cell.
#[derive(Clone, Debug)]
pub enum CellValue {
    /// Stored as the raw value.
    Literal(Literal),
    /// Installed as the read trigger.
    Computed(ReadTrigger),
}

type BlockFn = dyn Fn(Address) -> Vec<Literal>;

/// A contiguous run of values starting at the entry's address.
#[derive(Clone)]
pub enum Block {
    Items(Vec<Literal>),
    /// Called with the base address to produce the items.
    Generated(Rc<BlockFn>),
}

impl Block {
    /// Produce the items placed at `base`.
    pub fn items(&self, base: Address) -> Vec<Literal> {
        match self {
            Block::Items(items) => items.clone(),
            Block::Generated(generate) => generate(base),
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Items(items) => f.debug_tuple("Items").field(items).finish(),
            Block::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

/// Descriptor for one address.
#[derive(Clone, Debug, Default)]
pub struct CellConfig {
    pub symbols: Vec<String>,
    pub value: Option<CellValue>,
    pub values: Option<Block>,
    pub onread: Option<ReadTrigger>,
    pub onwrite: Option<Vec<WriteTrigger>>,
}

impl CellConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cell with one symbol.
    pub fn named(name: &str) -> Self {
        Self::new().symbol(name)
    }

    /// Add an alias.
    pub fn symbol(mut self, name: &str) -> Self {
        self.symbols.push(name.to_string());
        self
    }

    /// Set the initial raw value.
    pub fn value(mut self, literal: impl Into<Literal>) -> Self {
        self.value = Some(CellValue::Literal(literal.into()));
        self
    }

    /// Set the initial value to `@name`.
    pub fn value_ref(mut self, name: &str) -> Self {
        self.value = Some(CellValue::Literal(Literal::SymbolRef(name.to_string())));
        self
    }

    /// Compute the value on every read.
    pub fn computed(mut self, trigger: ReadTrigger) -> Self {
        self.value = Some(CellValue::Computed(trigger));
        self
    }

    /// Place a block of literals from this address upward.
    pub fn values<I, L>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        self.values = Some(Block::Items(items.into_iter().map(Into::into).collect()));
        self
    }

    /// Place a block generated from the base address.
    pub fn generated<F>(mut self, generate: F) -> Self
    where
        F: Fn(Address) -> Vec<Literal> + 'static,
    {
        self.values = Some(Block::Generated(Rc::new(generate)));
        self
    }

    pub fn onread(mut self, trigger: ReadTrigger) -> Self {
        self.onread = Some(trigger);
        self
    }

    /// Add a write trigger. Loading replaces any triggers already on the cell.
    pub fn onwrite(mut self, trigger: WriteTrigger) -> Self {
        self.onwrite.get_or_insert_with(Vec::new).push(trigger);
        self
    }

    fn is_empty(&self) -> bool {
        self.symbols.is_empty()
            && self.value.is_none()
            && self.values.is_none()
            && self.onread.is_none()
            && self.onwrite.is_none()
    }
}

/// Bare literal shorthand: the value at this address, no symbol.
impl From<Literal> for CellConfig {
    fn from(literal: Literal) -> Self {
        CellConfig::new().values([literal])
    }
}

impl From<i64> for CellConfig {
    fn from(n: i64) -> Self {
        CellConfig::from(Literal::Number(n))
    }
}

/// Block shorthand: values from this address upward, no symbol.
impl From<Vec<Literal>> for CellConfig {
    fn from(items: Vec<Literal>) -> Self {
        CellConfig::new().values(items)
    }
}

/// Machine configuration: one descriptor per address.
#[derive(Clone, Debug, Default)]
pub struct Config {
    cells: BTreeMap<Address, CellConfig>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Config::insert`].
    pub fn cell(mut self, addr: Address, cell: impl Into<CellConfig>) -> Self {
        self.insert(addr, cell);
        self
    }

    /// Set the descriptor of `addr`, replacing any previous one.
    pub fn insert(&mut self, addr: Address, cell: impl Into<CellConfig>) {
        self.cells.insert(addr, cell.into());
    }

    pub fn get(&self, addr: Address) -> Option<&CellConfig> {
        self.cells.get(&addr)
    }

    /// Layer `other` on top; its descriptors win per address.
    pub fn merge(&mut self, other: Config) {
        self.cells.extend(other.cells);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Address, &CellConfig)> {
        self.cells.iter().map(|(addr, cell)| (*addr, cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Load a configuration into memory.
///
/// Literals are stored as raw values without running write triggers. The
/// load is atomic: on error `memory` is untouched.
pub fn load(config: &Config, memory: &mut Memory) -> Result<(), ConfigError> {
    let mut staged = memory.clone();

    for (addr, cell) in config.iter() {
        for name in &cell.symbols {
            staged.register_symbol(name, addr);
        }
    }

    for (addr, cell) in config.iter() {
        apply(addr, cell, &mut staged)?;
    }

    tracing::debug!(entries = config.len(), symbols = staged.symbols().len(), "configuration loaded");
    *memory = staged;
    Ok(())
}

fn apply(addr: Address, cell: &CellConfig, memory: &mut Memory) -> Result<(), ConfigError> {
    if let Some(trigger) = &cell.onread {
        memory.register_read_trigger(addr, trigger.clone())?;
    }
    if let Some(triggers) = &cell.onwrite {
        memory.register_write_triggers(addr, triggers.iter().cloned(), true)?;
    }

    match &cell.value {
        Some(CellValue::Computed(trigger)) => memory.register_read_trigger(addr, trigger.clone())?,
        Some(CellValue::Literal(literal)) => {
            let word = literal.resolve(memory)?;
            memory.poke(addr, word);
        }
        None => {}
    }

    if let Some(block) = &cell.values {
        for (offset, literal) in block.items(addr).iter().enumerate() {
            let target = Address::try_from(offset)
                .ok()
                .and_then(|offset| addr.checked_add(offset))
                .ok_or_else(|| ConfigError::MalformedBlock {
                    addr,
                    reason: "block runs past the end of the address space".into(),
                })?;
            let word = literal.resolve(memory)?;
            memory.poke(target, word);
        }
    }

    Ok(())
}

/// Snapshot memory as a configuration.
///
/// Every stored value becomes a `value`, every alias a symbol. Triggers are
/// exported by handle when `include_callbacks` is set.
pub fn export(memory: &Memory, include_callbacks: bool) -> Config {
    let mut config = Config::new();

    for addr in memory.addresses() {
        let mut cell = CellConfig {
            symbols: memory.symbols().aliases_of(addr).to_vec(),
            value: memory.stored(addr).map(|word| CellValue::Literal(Literal::Number(word))),
            ..CellConfig::default()
        };
        if include_callbacks {
            cell.onread = memory.read_trigger(addr).cloned();
            let triggers = memory.write_triggers(addr);
            if !triggers.is_empty() {
                cell.onwrite = Some(triggers.to_vec());
            }
        }
        if !cell.is_empty() {
            config.insert(addr, cell);
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MemoryError;
    use std::cell::RefCell;

    fn loaded(config: &Config) -> Memory {
        let mut mem = Memory::new();
        load(config, &mut mem).unwrap();
        mem
    }

    #[test]
    fn test_symbols_and_values() {
        let config = Config::new()
            .cell(0, CellConfig::named("IP").value(16i64))
            .cell(1, CellConfig::named("A").symbol("acc").value('x'))
            .cell(5, CellConfig::new().value_ref("acc"));
        let mut mem = loaded(&config);

        assert_eq!(mem.read("IP").unwrap(), 16);
        assert_eq!(mem.read("acc").unwrap(), 'x' as i64);
        assert_eq!(mem.read(5u64).unwrap(), 1);
        assert_eq!(mem.symbols().aliases_of(1), ["A", "acc"]);
    }

    #[test]
    fn test_forward_symbol_reference() {
        let config = Config::new()
            .cell(32, vec![Literal::SymbolRef("res".into()), Literal::SymbolRef("A".into())])
            .cell(22, CellConfig::named("res"))
            .cell(1, CellConfig::named("A"));
        let mem = loaded(&config);

        assert_eq!(mem.peek(32), 22);
        assert_eq!(mem.peek(33), 1);
    }

    #[test]
    fn test_bare_shorthand() {
        let config = Config::new().cell(18, 32i64).cell(38, vec![Literal::Number(41), Literal::Char('A')]);
        let mem = loaded(&config);

        assert_eq!(mem.peek(18), 32);
        assert_eq!(mem.peek(38), 41);
        assert_eq!(mem.peek(39), 65);
        assert!(mem.symbols().is_empty());
    }

    #[test]
    fn test_generated_block() {
        let config = Config::new().cell(
            40,
            CellConfig::new().generated(|base| (0..3).map(|i| Literal::Number(base as i64 + i)).collect()),
        );
        let mem = loaded(&config);

        assert_eq!(mem.peek(40), 40);
        assert_eq!(mem.peek(41), 41);
        assert_eq!(mem.peek(42), 42);
    }

    #[test]
    fn test_triggers_installed() {
        let out = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&out);
        let config = Config::new()
            .cell(1, CellConfig::named("A").value(20i64))
            .cell(2, CellConfig::named("B").value(22i64))
            .cell(4, CellConfig::named("add").onread(ReadTrigger::new(|m| Ok(m.read("A")? + m.read("B")?))))
            .cell(
                12,
                CellConfig::named("out").onwrite(WriteTrigger::new(move |_, v| {
                    sink.borrow_mut().push(v);
                    Ok(())
                })),
            );
        let mut mem = loaded(&config);

        assert_eq!(mem.read("add").unwrap(), 42);
        mem.write("out", 7).unwrap();
        assert_eq!(*out.borrow(), vec![7]);
    }

    #[test]
    fn test_computed_value() {
        let config = Config::new().cell(9, CellConfig::new().computed(ReadTrigger::new(|_| Ok(-3))));
        let mut mem = loaded(&config);
        assert_eq!(mem.read(9u64).unwrap(), -3);
    }

    #[test]
    fn test_onwrite_replaces_existing() {
        let mut mem = Memory::new();
        mem.register_write_trigger(12u64, WriteTrigger::new(|_, _| Err(MemoryError::Device("old".into()))))
            .unwrap();
        let config = Config::new().cell(12, CellConfig::new().onwrite(WriteTrigger::new(|_, _| Ok(()))));
        load(&config, &mut mem).unwrap();

        assert_eq!(mem.write_triggers(12).len(), 1);
        assert!(mem.write(12u64, 1).is_ok());
    }

    #[test]
    fn test_load_does_not_fire_write_triggers() {
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        let config = Config::new().cell(
            12,
            CellConfig::named("out").value(1i64).onwrite(WriteTrigger::new(move |_, _| {
                *h.borrow_mut() += 1;
                Ok(())
            })),
        );
        let mem = loaded(&config);

        assert_eq!(*hits.borrow(), 0);
        assert_eq!(mem.peek(12), 1);
    }

    #[test]
    fn test_invalid_literal_is_atomic() {
        let mut mem = Memory::new();
        mem.poke(1, 5);
        let config = Config::new()
            .cell(1, CellConfig::named("A").value(9i64))
            .cell(2, CellConfig::new().value_ref("nowhere"));

        assert_eq!(load(&config, &mut mem), Err(ConfigError::InvalidLiteral("@nowhere".into())));
        assert_eq!(mem.peek(1), 5);
        assert!(mem.symbols().is_empty());
    }

    #[test]
    fn test_block_past_address_space() {
        let config = Config::new().cell(u64::MAX, vec![Literal::Number(1), Literal::Number(2)]);
        let mut mem = Memory::new();
        assert!(matches!(load(&config, &mut mem), Err(ConfigError::MalformedBlock { .. })));
    }

    #[test]
    fn test_export_round_trip_pure_data() {
        let config = Config::new()
            .cell(0, CellConfig::named("IP").value(16i64))
            .cell(16, vec![Literal::Number(18), Literal::Number(0)])
            .cell(20, CellConfig::named("op1").symbol("first").value(2i64))
            .cell(22, CellConfig::named("res"));
        let mut original = loaded(&config);
        let mut reloaded = loaded(&export(&original, true));

        for addr in 0..40u64 {
            assert_eq!(original.read(addr).unwrap(), reloaded.read(addr).unwrap(), "address {}", addr);
        }
        assert_eq!(reloaded.symbols().aliases_of(20), ["op1", "first"]);
        assert_eq!(reloaded.resolve("res").unwrap(), 22);
    }

    #[test]
    fn test_export_callbacks() {
        let trigger = ReadTrigger::labeled("add", |_| Ok(0));
        let first = WriteTrigger::labeled("putchar", |_, _| Ok(()));
        let second = WriteTrigger::labeled("putchar", |_, _| Ok(()));
        let config = Config::new()
            .cell(4, CellConfig::named("add").onread(trigger.clone()))
            .cell(12, CellConfig::named("out").onwrite(first.clone()).onwrite(second.clone()));
        let mem = loaded(&config);

        let with = export(&mem, true);
        let cell = with.get(4).unwrap();
        assert!(cell.onread.as_ref().unwrap().same_as(&trigger));
        assert!(cell.value.is_none());

        let exported = with.get(12).unwrap().onwrite.as_ref().unwrap();
        assert_eq!(exported.len(), 2);
        assert!(exported[0].same_as(&first));
        assert!(exported[1].same_as(&second));
        assert!(!exported[0].same_as(&second));

        let without = export(&mem, false);
        assert!(without.get(4).unwrap().onread.is_none());
        assert_eq!(without.get(4).unwrap().symbols, ["add"]);
    }
}
