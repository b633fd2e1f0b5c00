//! Built-in devices.
//!
//! The arithmetic and logic units of the default layout are read triggers
//! over the registers `A`, `B` and `C`. Comparisons follow the machine's
//! convention of 0 for true and -1 for false, so their result can be fed
//! straight into `ter`.
//!
//! Character I/O goes through a [`Console`], whose buffers belong to the host.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crate::config::ConfigError;
use crate::machine::{Memory, ReadTrigger, Word, WriteTrigger};

const TRUE: Word = 0;
const FALSE: Word = -1;

fn flag(cond: bool) -> Word {
    if cond {
        TRUE
    } else {
        FALSE
    }
}

/// Floor division; division by zero yields 0.
pub fn floor_div(a: Word, b: Word) -> Word {
    if b == 0 {
        return 0;
    }
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn binary(label: &str, op: fn(Word, Word) -> Word) -> ReadTrigger {
    ReadTrigger::labeled(label, move |mem: &mut Memory| {
        let a = mem.read("A")?;
        let b = mem.read("B")?;
        Ok(op(a, b))
    })
}

/// The arithmetic/logic devices, by name.
pub fn alu() -> Vec<(&'static str, ReadTrigger)> {
    vec![
        ("add", binary("add", Word::wrapping_add)),
        ("sub", binary("sub", Word::wrapping_sub)),
        ("mul", binary("mul", Word::wrapping_mul)),
        ("div", binary("div", floor_div)),
        ("gt", binary("gt", |a, b| flag(a > b))),
        ("lt", binary("lt", |a, b| flag(a < b))),
        ("eq", binary("eq", |a, b| flag(a == b))),
        ("xor", binary("xor", |a, b| a ^ b)),
        ("not", ReadTrigger::labeled("not", |mem| Ok(flag(mem.read("C")? != 0)))),
        (
            "ter",
            ReadTrigger::labeled("ter", |mem| {
                if mem.read("C")? == 0 {
                    mem.read("A")
                } else {
                    mem.read("B")
                }
            }),
        ),
    ]
}

/// Host-side character buffers for the `getchar` and `putchar` devices.
///
/// Clones share the same buffers.
#[derive(Clone, Debug, Default)]
pub struct Console {
    input: Rc<RefCell<VecDeque<Word>>>,
    output: Rc<RefCell<Vec<Word>>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// A console with `text` queued as input.
    pub fn with_input(text: &str) -> Self {
        let console = Self::new();
        console.feed(text);
        console
    }

    /// Queue characters for the input device.
    pub fn feed(&self, text: &str) {
        self.input
            .borrow_mut()
            .extend(text.chars().map(|c| Word::from(u32::from(c))));
    }

    /// Characters not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.input.borrow().len()
    }

    /// Everything written to the output device so far.
    pub fn output(&self) -> Vec<Word> {
        self.output.borrow().clone()
    }

    /// Output decoded as text. Words that are not code points become U+FFFD.
    pub fn output_text(&self) -> String {
        self.output
            .borrow()
            .iter()
            .map(|&w| {
                u32::try_from(w)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER)
            })
            .collect()
    }

    /// Drain the output buffer.
    pub fn take_output(&self) -> Vec<Word> {
        std::mem::take(&mut *self.output.borrow_mut())
    }

    /// Input device: the next queued character, or 0 once the queue is empty.
    pub fn getchar(&self) -> ReadTrigger {
        let input = Rc::clone(&self.input);
        ReadTrigger::labeled("getchar", move |_| Ok(input.borrow_mut().pop_front().unwrap_or(0)))
    }

    /// Output device: appends every written word.
    pub fn putchar(&self) -> WriteTrigger {
        let output = Rc::clone(&self.output);
        WriteTrigger::labeled("putchar", move |_, value| {
            output.borrow_mut().push(value);
            Ok(())
        })
    }
}

/// Named triggers that configuration files may refer to.
#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    reads: BTreeMap<String, ReadTrigger>,
    writes: BTreeMap<String, WriteTrigger>,
}

impl DeviceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The ALU devices plus `getchar`/`putchar` bound to `console`.
    pub fn standard(console: &Console) -> Self {
        let mut registry = Self::new();
        for (name, trigger) in alu() {
            registry.insert_read(name, trigger);
        }
        registry.insert_read("getchar", console.getchar());
        registry.insert_write("putchar", console.putchar());
        registry
    }

    pub fn insert_read(&mut self, name: &str, trigger: ReadTrigger) {
        self.reads.insert(name.to_string(), trigger);
    }

    pub fn insert_write(&mut self, name: &str, trigger: WriteTrigger) {
        self.writes.insert(name.to_string(), trigger);
    }

    pub fn read(&self, name: &str) -> Result<ReadTrigger, ConfigError> {
        self.reads
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownDevice(name.to_string()))
    }

    pub fn write(&self, name: &str) -> Result<WriteTrigger, ConfigError> {
        self.writes
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownDevice(name.to_string()))
    }

    pub fn read_names(&self) -> impl Iterator<Item = &str> {
        self.reads.keys().map(String::as_str)
    }

    pub fn write_names(&self) -> impl Iterator<Item = &str> {
        self.writes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registers(a: Word, b: Word, c: Word) -> Memory {
        let mut mem = Memory::new();
        mem.register_symbol("A", 1);
        mem.register_symbol("B", 2);
        mem.register_symbol("C", 3);
        mem.poke(1, a);
        mem.poke(2, b);
        mem.poke(3, c);
        mem
    }

    fn eval(name: &str, a: Word, b: Word, c: Word) -> Word {
        let registry = DeviceRegistry::standard(&Console::new());
        let mut mem = registers(a, b, c);
        registry.read(name).unwrap().call(&mut mem).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("add", 2, 2, 0), 4);
        assert_eq!(eval("sub", 2, 5, 0), -3);
        assert_eq!(eval("mul", -4, 6, 0), -24);
        assert_eq!(eval("xor", 0b1100, 0b1010, 0), 0b0110);
        assert_eq!(eval("add", Word::MAX, 1, 0), Word::MIN);
    }

    #[test]
    fn test_floor_div() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(floor_div(-7, -2), 3);
        assert_eq!(floor_div(-8, 2), -4);
        assert_eq!(floor_div(5, 0), 0);
        assert_eq!(eval("div", 9, 4, 0), 2);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("gt", 3, 2, 0), TRUE);
        assert_eq!(eval("gt", 2, 3, 0), FALSE);
        assert_eq!(eval("lt", 2, 3, 0), TRUE);
        assert_eq!(eval("eq", 5, 5, 0), TRUE);
        assert_eq!(eval("eq", 5, 6, 0), FALSE);
    }

    #[test]
    fn test_not_and_ternary() {
        assert_eq!(eval("not", 0, 0, 0), -1);
        assert_eq!(eval("not", 0, 0, 7), 0);
        assert_eq!(eval("ter", 10, 20, 0), 10);
        assert_eq!(eval("ter", 10, 20, -1), 20);
    }

    #[test]
    fn test_console_devices() {
        let console = Console::with_input("hi");
        let mut mem = Memory::new();
        mem.register_read_trigger(11u64, console.getchar()).unwrap();
        mem.register_write_trigger(12u64, console.putchar()).unwrap();

        assert_eq!(mem.read(11u64).unwrap(), 'h' as Word);
        assert_eq!(console.pending_input(), 1);
        assert_eq!(mem.read(11u64).unwrap(), 'i' as Word);
        assert_eq!(mem.read(11u64).unwrap(), 0);

        mem.write(12u64, 'o' as Word).unwrap();
        mem.write(12u64, 'k' as Word).unwrap();
        mem.write(12u64, -5).unwrap();
        assert_eq!(console.output_text(), "ok\u{FFFD}");
        assert_eq!(console.take_output().len(), 3);
        assert!(console.output().is_empty());
    }

    #[test]
    fn test_unknown_names() {
        let registry = DeviceRegistry::standard(&Console::new());
        assert!(registry.read("putchar").is_err());
        assert!(registry.write("add").is_err());
        assert_eq!(registry.write_names().collect::<Vec<_>>(), vec!["putchar"]);
    }
}
