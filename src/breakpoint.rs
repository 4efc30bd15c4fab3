/// Ordered list of program counter values to pause at.
#[derive(Clone, Debug, Default)]
pub struct Breakpoints(Vec<u16>);

/// Result of toggling a breakpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: u16) -> bool {
        self.0.contains(&address)
    }

    /// Adds the address if absent. Returns whether it was added.
    pub fn insert(&mut self, address: u16) -> bool {
        if self.contains(address) {
            return false;
        }
        self.0.push(address);
        true
    }

    /// Returns whether the address was found.
    pub fn remove(&mut self, address: u16) -> bool {
        let initial_len = self.0.len();
        self.0.retain(|breakpoint| *breakpoint != address);
        initial_len != self.0.len()
    }

    /// Remove the address if present, otherwise add it.
    pub fn toggle(&mut self, address: u16) -> Toggle {
        if self.remove(address) {
            Toggle::Removed
        } else {
            self.insert(address);
            Toggle::Added
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &u16> {
        self.0.iter()
    }
}
