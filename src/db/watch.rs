use super::expr::{ExprEnv, evaluate};
use std::fmt;
use thiserror::Error;

//===========================================================================//

/// The number of watchpoint slots in a [`WatchPool`].
pub const NUM_WATCHPOINTS: usize = 32;

/// An error from adding or removing a watchpoint.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum WatchError {
    /// All watchpoint slots are in use.
    #[error("Watchpoint pool is full. Cannot create new watchpoint.")]
    PoolFull,
    /// There are no active watchpoints.
    #[error("No watchpoints to delete.")]
    NoWatchpoints,
    /// No active watchpoint has the given number.
    #[error("Watchpoint {0} not found.")]
    NotFound(usize),
}

//===========================================================================//

/// A debugger expression that is re-evaluated after every instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Watchpoint {
    id: usize,
    expr: String,
    old_value: u32,
}

impl Watchpoint {
    /// Returns the watchpoint's number, which is also its slot index.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the watched expression.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Returns the most recently observed value of the expression.
    pub fn old_value(&self) -> u32 {
        self.old_value
    }
}

/// A change in a watched expression's value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WatchHit {
    /// The number of the watchpoint that triggered.
    pub id: usize,
    /// The watched expression.
    pub expr: String,
    /// The value before the change.
    pub old_value: u32,
    /// The value after the change.
    pub new_value: u32,
}

impl fmt::Display for WatchHit {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        writeln!(formatter, "Watchpoint {}: {}", self.id, self.expr)?;
        writeln!(
            formatter,
            "Old value = {} (0x{:x})",
            self.old_value, self.old_value
        )?;
        write!(
            formatter,
            "New value = {} (0x{:x})",
            self.new_value, self.new_value
        )
    }
}

//===========================================================================//

/// A fixed-size pool of watchpoints.  Every slot is either on the free
/// stack or in the active list, never both.
pub struct WatchPool {
    slots: Vec<Watchpoint>,
    free: Vec<usize>,
    // Most recently added first.
    active: Vec<usize>,
}

impl WatchPool {
    /// Returns a pool with all slots free.
    pub fn new() -> WatchPool {
        let slots = (0..NUM_WATCHPOINTS)
            .map(|id| Watchpoint { id, expr: String::new(), old_value: 0 })
            .collect();
        let free = (0..NUM_WATCHPOINTS).rev().collect();
        WatchPool { slots, free, active: Vec::new() }
    }

    /// Takes the next free slot, watching the given expression with an
    /// initial value of zero, and returns the new watchpoint's number.
    pub fn allocate(&mut self, expr: &str) -> Result<usize, WatchError> {
        let id = self.free.pop().ok_or(WatchError::PoolFull)?;
        let slot = &mut self.slots[id];
        slot.expr = expr.to_string();
        slot.old_value = 0;
        self.active.insert(0, id);
        Ok(id)
    }

    /// Records the current value of the watched expression.
    pub fn set_value(&mut self, id: usize, value: u32) {
        if self.active.contains(&id) {
            self.slots[id].old_value = value;
        }
    }

    /// Removes the given watchpoint and returns its slot to the free stack.
    pub fn release(&mut self, id: usize) -> Result<(), WatchError> {
        if self.active.is_empty() {
            return Err(WatchError::NoWatchpoints);
        }
        let position = self
            .active
            .iter()
            .position(|&active| active == id)
            .ok_or(WatchError::NotFound(id))?;
        self.active.remove(position);
        let slot = &mut self.slots[id];
        slot.expr.clear();
        slot.old_value = 0;
        self.free.push(id);
        Ok(())
    }

    /// Returns true if no watchpoints are active.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Iterates over the active watchpoints, most recently added first.
    pub fn iter(&self) -> impl Iterator<Item = &Watchpoint> + '_ {
        self.active.iter().map(|&id| &self.slots[id])
    }

    /// Re-evaluates every active watchpoint, updating the stored values and
    /// returning the ones that changed.  Watchpoints whose expressions fail
    /// to evaluate are left unchanged.
    pub fn poll_all(&mut self, env: &dyn ExprEnv) -> Vec<WatchHit> {
        let mut hits = Vec::new();
        for &id in self.active.iter() {
            let slot = &mut self.slots[id];
            let Ok(new_value) = evaluate(&slot.expr, env) else {
                continue;
            };
            if new_value != slot.old_value {
                hits.push(WatchHit {
                    id,
                    expr: slot.expr.clone(),
                    old_value: slot.old_value,
                    new_value,
                });
                slot.old_value = new_value;
            }
        }
        hits
    }
}

impl Default for WatchPool {
    fn default() -> WatchPool {
        WatchPool::new()
    }
}

//===========================================================================//


//===========================================================================//
