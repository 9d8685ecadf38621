//! Module handles memory access observers,
//! which store which accesses occur at a given memory location.
//!
//! You would typically access an observer via the [`Sic1Emulator::observer`] field.
//! The [`AccessObserver`] records the accesses of the most recent step
//! (useful for highlighting memory in a UI) and keeps a running count of
//! every byte accessed, which is reported as the emulator's memory-access counter.
//!
//! [`Sic1Emulator::observer`]: crate::sim::Sic1Emulator::observer

use std::collections::BTreeMap;

/// The set of accesses which have occurred at this location.
///
/// ## Example
///
/// ```
/// # use sic1_ensemble::sim::observer::AccessSet;
///
/// let accesses = AccessSet::READ;
/// assert!(accesses.accessed());
/// assert!(accesses.read());
/// assert!(!accesses.written());
/// assert!(!accesses.modified());
/// ```
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct AccessSet(u8);
impl AccessSet {
    /// Set with only the read flag enabled.
    pub const READ: Self = Self(1 << 0);
    /// Set with only the write flag enabled.
    pub const WRITTEN: Self = Self(1 << 1);
    /// Set with only the modify flag enabled.
    pub const MODIFIED: Self = Self(1 << 2);

    /// True if any access has occurred.
    pub fn accessed(&self) -> bool {
        self.0 != 0
    }

    /// True if a read has occurred.
    pub fn read(&self) -> bool {
        self.0 & Self::READ.0 != 0
    }
    /// True if a write has occurred (does not necessarily have to change data).
    pub fn written(&self) -> bool {
        self.0 & Self::WRITTEN.0 != 0
    }
    /// True if a write has occurred (data must change).
    pub fn modified(&self) -> bool {
        self.0 & Self::MODIFIED.0 != 0
    }
}
impl std::ops::BitOr for AccessSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}
impl std::ops::BitOrAssign for AccessSet {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
impl std::fmt::Debug for AccessSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessSet")
            .field("read", &self.read())
            .field("written", &self.written())
            .field("modified", &self.modified())
            .finish()
    }
}

/// A struct that tracks accesses in memory.
#[derive(Debug, Default, Clone)]
pub struct AccessObserver {
    step: BTreeMap<u8, AccessSet>,
    total: u64
}
impl AccessObserver {
    /// Creates a new access observer.
    pub fn new() -> Self {
        Default::default()
    }

    /// Clears the accesses of the last step. The running total is preserved.
    pub fn clear_step(&mut self) {
        self.step.clear();
    }

    /// Clears all accesses, including the running total.
    pub fn clear(&mut self) {
        std::mem::take(self);
    }

    /// Records a read of the byte at the given address.
    pub fn record_read(&mut self, addr: u8) {
        self.update(addr, AccessSet::READ);
    }

    /// Records a write of the byte at the given address.
    pub fn record_write(&mut self, addr: u8, modified: bool) {
        let set = match modified {
            true  => AccessSet::WRITTEN | AccessSet::MODIFIED,
            false => AccessSet::WRITTEN,
        };
        self.update(addr, set);
    }

    fn update(&mut self, addr: u8, set: AccessSet) {
        *self.step.entry(addr).or_default() |= set;
        self.total += 1;
    }

    /// Gets the access set for the given memory location during the last step.
    pub fn get_mem_accesses(&self, addr: u8) -> AccessSet {
        self.step.get(&addr).copied().unwrap_or_default()
    }

    /// Iterates over every location accessed during the last step, in address order.
    pub fn mem_accesses(&self) -> impl Iterator<Item=(u8, AccessSet)> + '_ {
        self.step.iter().map(|(&addr, &set)| (addr, set))
    }

    /// Total number of bytes accessed since the last [`AccessObserver::clear`].
    pub fn total(&self) -> u64 {
        self.total
    }
}
