//! Triggered memory.
//!
//! A sparse map from address to cell. Any cell may carry a read trigger,
//! which computes its value on every read, and an ordered list of write
//! triggers, which run on every write. Arithmetic units and I/O devices are
//! nothing more than cells wired this way.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use super::symbols::SymbolTable;
use super::{Address, Word};

/// A cell reference: either a raw address or a symbol name.
///
/// Names that are not bound but consist only of decimal digits resolve to the
/// address they spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRef<'a> {
    Addr(Address),
    Name(&'a str),
}

impl From<Address> for CellRef<'_> {
    fn from(addr: Address) -> Self {
        CellRef::Addr(addr)
    }
}

impl<'a> From<&'a str> for CellRef<'a> {
    fn from(name: &'a str) -> Self {
        CellRef::Name(name)
    }
}

impl<'a> From<&'a String> for CellRef<'a> {
    fn from(name: &'a String) -> Self {
        CellRef::Name(name.as_str())
    }
}

impl fmt::Display for CellRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellRef::Addr(addr) => write!(f, "{}", addr),
            CellRef::Name(name) => write!(f, "{}", name),
        }
    }
}

type ReadFn = dyn Fn(&mut Memory) -> Result<Word, MemoryError>;
type WriteFn = dyn Fn(&mut Memory, Word) -> Result<(), MemoryError>;

/// Computes a cell's value on every read.
///
/// The optional label is the trigger's identity: it survives export and lets
/// a configuration file name the device again.
#[derive(Clone)]
pub struct ReadTrigger {
    label: Option<Rc<str>>,
    func: Rc<ReadFn>,
}

impl ReadTrigger {
    /// Wrap an unlabeled closure.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&mut Memory) -> Result<Word, MemoryError> + 'static,
    {
        Self { label: None, func: Rc::new(func) }
    }

    /// Wrap a closure under a device label.
    pub fn labeled<F>(label: &str, func: F) -> Self
    where
        F: Fn(&mut Memory) -> Result<Word, MemoryError> + 'static,
    {
        Self { label: Some(Rc::from(label)), func: Rc::new(func) }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Evaluate against the current memory state.
    pub fn call(&self, memory: &mut Memory) -> Result<Word, MemoryError> {
        (self.func)(memory)
    }

    /// True if both handles share the same closure.
    pub fn same_as(&self, other: &ReadTrigger) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for ReadTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadTrigger")
            .field(&self.label.as_deref().unwrap_or("<anonymous>"))
            .finish()
    }
}

/// Side effect run on every write to a cell.
#[derive(Clone)]
pub struct WriteTrigger {
    label: Option<Rc<str>>,
    func: Rc<WriteFn>,
}

impl WriteTrigger {
    /// Wrap an unlabeled closure.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&mut Memory, Word) -> Result<(), MemoryError> + 'static,
    {
        Self { label: None, func: Rc::new(func) }
    }

    /// Wrap a closure under a device label.
    pub fn labeled<F>(label: &str, func: F) -> Self
    where
        F: Fn(&mut Memory, Word) -> Result<(), MemoryError> + 'static,
    {
        Self { label: Some(Rc::from(label)), func: Rc::new(func) }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Run the side effect for an incoming value.
    pub fn call(&self, memory: &mut Memory, value: Word) -> Result<(), MemoryError> {
        (self.func)(memory, value)
    }

    /// True if both handles share the same closure.
    pub fn same_as(&self, other: &WriteTrigger) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for WriteTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WriteTrigger")
            .field(&self.label.as_deref().unwrap_or("<anonymous>"))
            .finish()
    }
}

#[derive(Clone, Default)]
struct Cell {
    /// Raw value, set by writes and configuration.
    stored: Option<Word>,
    /// Last value seen through this cell, from a write or a read trigger.
    observed: Option<Word>,
    /// Write clock at the most recent write.
    written_at: u64,
    on_read: Option<ReadTrigger>,
    on_write: Vec<WriteTrigger>,
}

/// Sparse, symbol-addressable memory with read and write triggers.
#[derive(Clone, Default)]
pub struct Memory {
    cells: BTreeMap<Address, Cell>,
    symbols: SymbolTable,
    clock: u64,
}

impl Memory {
    /// Create an empty memory. Every address reads 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a reference to its address.
    pub fn resolve<'a>(&self, key: impl Into<CellRef<'a>>) -> Result<Address, MemoryError> {
        match key.into() {
            CellRef::Addr(addr) => Ok(addr),
            CellRef::Name(name) => {
                if let Some(addr) = self.symbols.resolve(name) {
                    return Ok(addr);
                }
                if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(addr) = name.parse::<Address>() {
                        return Ok(addr);
                    }
                }
                Err(MemoryError::UnknownSymbol(name.to_string()))
            }
        }
    }

    /// Read a cell.
    ///
    /// A registered read trigger is always evaluated and its result recorded
    /// as the last observed value. Otherwise the stored value is returned, or
    /// 0 for a cell that was never set.
    pub fn read<'a>(&mut self, key: impl Into<CellRef<'a>>) -> Result<Word, MemoryError> {
        let addr = self.resolve(key)?;
        let trigger = self.cells.get(&addr).and_then(|cell| cell.on_read.clone());
        match trigger {
            Some(trigger) => {
                let value = trigger.call(self)?;
                self.cells.entry(addr).or_default().observed = Some(value);
                Ok(value)
            }
            None => Ok(self.peek(addr)),
        }
    }

    /// Write a cell.
    ///
    /// The value is always recorded, then every write trigger of the cell
    /// runs in registration order.
    pub fn write<'a>(&mut self, key: impl Into<CellRef<'a>>, value: Word) -> Result<(), MemoryError> {
        let addr = self.resolve(key)?;
        self.clock += 1;
        let cell = self.cells.entry(addr).or_default();
        cell.stored = Some(value);
        cell.observed = Some(value);
        cell.written_at = self.clock;
        if cell.on_write.is_empty() {
            return Ok(());
        }
        let triggers = cell.on_write.clone();
        for trigger in &triggers {
            trigger.call(self, value)?;
        }
        Ok(())
    }

    /// Store a raw value without running write triggers.
    pub fn poke(&mut self, addr: Address, value: Word) {
        let cell = self.cells.entry(addr).or_default();
        cell.stored = Some(value);
        cell.observed = Some(value);
    }

    /// Raw stored value (0 if unset). Never runs triggers.
    pub fn peek(&self, addr: Address) -> Word {
        self.stored(addr).unwrap_or(0)
    }

    /// Raw stored value, if any.
    pub fn stored(&self, addr: Address) -> Option<Word> {
        self.cells.get(&addr).and_then(|cell| cell.stored)
    }

    /// Last value seen through the cell, for display.
    pub fn observed(&self, addr: Address) -> Option<Word> {
        self.cells.get(&addr).and_then(|cell| cell.observed)
    }

    /// Bind a symbol to an address.
    pub fn register_symbol(&mut self, name: &str, addr: Address) {
        tracing::trace!(name, addr, "bind symbol");
        self.symbols.bind(name, addr);
    }

    /// Install the read trigger of a cell, replacing any previous one.
    pub fn register_read_trigger<'a>(
        &mut self,
        key: impl Into<CellRef<'a>>,
        trigger: ReadTrigger,
    ) -> Result<(), MemoryError> {
        let addr = self.resolve(key)?;
        tracing::debug!(addr, label = trigger.label(), "register read trigger");
        self.cells.entry(addr).or_default().on_read = Some(trigger);
        Ok(())
    }

    /// Install write triggers on a cell.
    ///
    /// With `overwrite` the list is replaced. Without it the new triggers run
    /// after the ones already registered.
    pub fn register_write_triggers<'a>(
        &mut self,
        key: impl Into<CellRef<'a>>,
        triggers: impl IntoIterator<Item = WriteTrigger>,
        overwrite: bool,
    ) -> Result<(), MemoryError> {
        let addr = self.resolve(key)?;
        let cell = self.cells.entry(addr).or_default();
        if overwrite {
            cell.on_write.clear();
        }
        cell.on_write.extend(triggers);
        tracing::debug!(addr, count = cell.on_write.len(), overwrite, "register write triggers");
        Ok(())
    }

    /// Append a single write trigger.
    pub fn register_write_trigger<'a>(
        &mut self,
        key: impl Into<CellRef<'a>>,
        trigger: WriteTrigger,
    ) -> Result<(), MemoryError> {
        self.register_write_triggers(key, [trigger], false)
    }

    pub fn read_trigger(&self, addr: Address) -> Option<&ReadTrigger> {
        self.cells.get(&addr).and_then(|cell| cell.on_read.as_ref())
    }

    pub fn write_triggers(&self, addr: Address) -> &[WriteTrigger] {
        self.cells.get(&addr).map(|cell| cell.on_write.as_slice()).unwrap_or(&[])
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Every address that holds a value, a trigger, or a symbol, ascending.
    pub fn addresses(&self) -> Vec<Address> {
        let mut addrs: Vec<Address> = self.cells.keys().copied().collect();
        addrs.extend(self.symbols.addresses());
        addrs.sort_unstable();
        addrs.dedup();
        addrs
    }

    /// Current write clock. Advances by one on every `write`.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// True if `addr` was written after the clock read `mark`.
    pub fn written_since(&self, addr: Address, mark: u64) -> bool {
        self.cells.get(&addr).is_some_and(|cell| cell.written_at > mark)
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let triggered = self
            .cells
            .values()
            .filter(|cell| cell.on_read.is_some() || !cell.on_write.is_empty())
            .count();

        f.debug_struct("Memory")
            .field("cells", &self.cells.len())
            .field("triggered_cells", &triggered)
            .field("symbols", &self.symbols.len())
            .finish()
    }
}

/// Errors raised by memory access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// A name that is neither a bound symbol nor a decimal address.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Raised by a host device callback.
    #[error("device error: {0}")]
    Device(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_unset_reads_zero() {
        let mut mem = Memory::new();
        assert_eq!(mem.read(12345u64).unwrap(), 0);
        assert_eq!(mem.read("77").unwrap(), 0);
    }

    #[test]
    fn test_read_write_by_symbol() {
        let mut mem = Memory::new();
        mem.register_symbol("A", 1);

        mem.write("A", 42).unwrap();
        assert_eq!(mem.read(1u64).unwrap(), 42);
        assert_eq!(mem.read("1").unwrap(), 42);
    }

    #[test]
    fn test_unknown_symbol() {
        let mut mem = Memory::new();
        assert_eq!(mem.read("nope"), Err(MemoryError::UnknownSymbol("nope".into())));
        assert_eq!(mem.write("nope", 1), Err(MemoryError::UnknownSymbol("nope".into())));
    }

    #[test]
    fn test_read_trigger_overrides_stored() {
        let mut mem = Memory::new();
        mem.register_symbol("A", 1);
        mem.register_symbol("B", 2);
        mem.register_symbol("add", 4);
        mem.register_read_trigger("add", ReadTrigger::new(|m| Ok(m.read("A")? + m.read("B")?)))
            .unwrap();

        mem.write("A", 3).unwrap();
        mem.write("B", 4).unwrap();
        mem.write("add", 100).unwrap();

        assert_eq!(mem.read("add").unwrap(), 7);
        assert_eq!(mem.read("add").unwrap(), 7);
        assert_eq!(mem.stored(4), Some(100));
        assert_eq!(mem.observed(4), Some(7));
    }

    #[test]
    fn test_later_read_trigger_replaces() {
        let mut mem = Memory::new();
        mem.register_read_trigger(9u64, ReadTrigger::new(|_| Ok(1))).unwrap();
        mem.register_read_trigger(9u64, ReadTrigger::new(|_| Ok(2))).unwrap();
        assert_eq!(mem.read(9u64).unwrap(), 2);
    }

    #[test]
    fn test_write_triggers_run_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut mem = Memory::new();

        for tag in ["first", "second"] {
            let log = Rc::clone(&log);
            mem.register_write_trigger(
                12u64,
                WriteTrigger::new(move |_, v| {
                    log.borrow_mut().push((tag, v));
                    Ok(())
                }),
            )
            .unwrap();
        }

        mem.write(12u64, 65).unwrap();
        assert_eq!(*log.borrow(), vec![("first", 65), ("second", 65)]);
        assert_eq!(mem.observed(12), Some(65));
    }

    #[test]
    fn test_overwrite_replaces_write_triggers() {
        let hits = Rc::new(RefCell::new(0));
        let mut mem = Memory::new();
        let h = Rc::clone(&hits);
        mem.register_write_trigger(3u64, WriteTrigger::new(move |_, _| {
            *h.borrow_mut() += 1;
            Ok(())
        }))
        .unwrap();
        mem.register_write_triggers(3u64, [WriteTrigger::new(|_, _| Ok(()))], true).unwrap();

        mem.write(3u64, 1).unwrap();
        assert_eq!(*hits.borrow(), 0);
        assert_eq!(mem.write_triggers(3).len(), 1);
    }

    #[test]
    fn test_write_trigger_can_write_other_cells() {
        let mut mem = Memory::new();
        mem.register_write_trigger(10u64, WriteTrigger::new(|m, v| m.write(11u64, v * 2))).unwrap();

        mem.write(10u64, 21).unwrap();
        assert_eq!(mem.read(11u64).unwrap(), 42);
    }

    #[test]
    fn test_written_since() {
        let mut mem = Memory::new();
        mem.write(0u64, 16).unwrap();
        let mark = mem.clock();
        assert!(!mem.written_since(0, mark));
        mem.write(0u64, 18).unwrap();
        assert!(mem.written_since(0, mark));
        assert!(!mem.written_since(1, mark));
    }

    #[test]
    fn test_poke_skips_triggers() {
        let mut mem = Memory::new();
        mem.register_write_trigger(5u64, WriteTrigger::new(|_, _| Err(MemoryError::Device("boom".into()))))
            .unwrap();
        mem.poke(5, 9);
        assert_eq!(mem.peek(5), 9);
        assert!(mem.write(5u64, 1).is_err());
    }

    #[test]
    fn test_addresses_include_symbol_only_cells() {
        let mut mem = Memory::new();
        mem.register_symbol("res", 22);
        mem.poke(20, 2);
        assert_eq!(mem.addresses(), vec![20, 22]);
    }
}
