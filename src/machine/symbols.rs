//! Symbol table: names bound to cell addresses.
//!
//! A name maps to exactly one address; an address may carry any number of
//! aliases. Both directions are kept in sync on every bind.

use std::collections::{BTreeMap, HashMap};

use super::Address;

/// Bidirectional name/address mapping.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    by_name: HashMap<String, Address>,
    by_addr: BTreeMap<Address, Vec<String>>,
}

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `addr`.
    ///
    /// Rebinding an existing name moves it to the new address and removes it
    /// from the aliases of the old one.
    pub fn bind(&mut self, name: &str, addr: Address) {
        if let Some(old) = self.by_name.insert(name.to_string(), addr) {
            if old == addr {
                return;
            }
            if let Some(aliases) = self.by_addr.get_mut(&old) {
                aliases.retain(|alias| alias != name);
                if aliases.is_empty() {
                    self.by_addr.remove(&old);
                }
            }
        }
        self.by_addr.entry(addr).or_default().push(name.to_string());
    }

    /// Look up the address bound to `name`.
    pub fn resolve(&self, name: &str) -> Option<Address> {
        self.by_name.get(name).copied()
    }

    /// Aliases of `addr`, in binding order.
    pub fn aliases_of(&self, addr: Address) -> &[String] {
        self.by_addr.get(&addr).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Addresses that own at least one alias, ascending.
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.by_addr.keys().copied()
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True if no name is bound.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
