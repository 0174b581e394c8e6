use std::collections::BTreeSet;

/// Virtual and physical breakpoint sets, checked once per fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakpoints {
    virtual_addresses: BTreeSet<u32>,
    physical_addresses: BTreeSet<u32>,
}

impl Breakpoints {
    /// Adds a breakpoint on a virtual PC; returns `false` if already present.
    pub fn add_virtual(&mut self, address: u32) -> bool {
        self.virtual_addresses.insert(address)
    }

    /// Removes a virtual breakpoint; returns `false` if it was not set.
    pub fn remove_virtual(&mut self, address: u32) -> bool {
        self.virtual_addresses.remove(&address)
    }

    /// Adds a breakpoint on a translated physical PC; returns `false` if already present.
    pub fn add_physical(&mut self, address: u32) -> bool {
        self.physical_addresses.insert(address)
    }

    /// Removes a physical breakpoint; returns `false` if it was not set.
    pub fn remove_physical(&mut self, address: u32) -> bool {
        self.physical_addresses.remove(&address)
    }

    /// Returns `true` when `address` is a virtual breakpoint.
    #[must_use]
    pub fn has_virtual(&self, address: u32) -> bool {
        self.virtual_addresses.contains(&address)
    }

    /// Returns `true` when `address` is a physical breakpoint.
    #[must_use]
    pub fn has_physical(&self, address: u32) -> bool {
        self.physical_addresses.contains(&address)
    }

    /// Returns `true` when neither set holds an address.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.virtual_addresses.is_empty() && self.physical_addresses.is_empty()
    }

    /// Virtual breakpoints in ascending order.
    pub fn virtual_addresses(&self) -> impl Iterator<Item = u32> + '_ {
        self.virtual_addresses.iter().copied()
    }

    /// Physical breakpoints in ascending order.
    pub fn physical_addresses(&self) -> impl Iterator<Item = u32> + '_ {
        self.physical_addresses.iter().copied()
    }

    /// Removes every breakpoint.
    pub fn clear(&mut self) {
        self.virtual_addresses.clear();
        self.physical_addresses.clear();
    }
}
