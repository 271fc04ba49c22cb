// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Decides whether a slot needs an upload.

A slot is dirty when it has never been written, when the caller forces it, or
when the live value differs byte for byte from what the slot's *staging* bytes
hold.  The comparison is always against host staging memory, never against the
device copy: staging is the record of what was last sent.  A slot whose device
bytes happen to match (for example after some other writer filled the device
region) is still dirty until this tracker has uploaded through it once.

Slot state only moves one way.  Once a slot has been uploaded it stays
initialized for the life of its owner.
*/

/// Outcome of a dirty check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dirtiness {
    /// Never uploaded.
    Uninitialized,
    /// The caller asked for an upload regardless of contents.
    Forced,
    /// The value differs from the staging bytes.
    Changed,
    /// Nothing to do.
    Clean,
}

impl Dirtiness {
    pub fn needs_upload(self) -> bool {
        !matches!(self, Dirtiness::Clean)
    }
}

/// Per-slot "has ever been written" flags.
#[derive(Debug, Clone)]
pub struct SlotStates {
    initialized: Vec<bool>,
}

impl SlotStates {
    pub fn new(slot_count: usize) -> Self {
        SlotStates {
            initialized: vec![false; slot_count],
        }
    }

    pub fn is_initialized(&self, slot: usize) -> bool {
        self.initialized[slot]
    }

    /// Classifies `slot` given the live value and the slot's staging bytes.
    pub fn check(&self, slot: usize, current: &[u8], staged: &[u8], force: bool) -> Dirtiness {
        if force {
            Dirtiness::Forced
        } else if !self.initialized[slot] {
            Dirtiness::Uninitialized
        } else if current != staged {
            Dirtiness::Changed
        } else {
            Dirtiness::Clean
        }
    }

    pub fn mark_initialized(&mut self, slot: usize) {
        self.initialized[slot] = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virgin_slot_is_dirty_even_when_bytes_match() {
        let states = SlotStates::new(2);
        let zeros = [0u8; 8];
        assert_eq!(states.check(0, &zeros, &zeros, false), Dirtiness::Uninitialized);
        assert!(states.check(0, &zeros, &zeros, false).needs_upload());
    }

    #[test]
    fn initialized_slot_compares_bytes() {
        let mut states = SlotStates::new(2);
        states.mark_initialized(1);
        assert_eq!(states.check(1, &[1, 2], &[1, 2], false), Dirtiness::Clean);
        assert_eq!(states.check(1, &[1, 2], &[1, 3], false), Dirtiness::Changed);
        //other slots are independent
        assert_eq!(states.check(0, &[1, 2], &[1, 2], false), Dirtiness::Uninitialized);
    }

    #[test]
    fn force_wins() {
        let mut states = SlotStates::new(1);
        states.mark_initialized(0);
        assert_eq!(states.check(0, &[7], &[7], true), Dirtiness::Forced);
    }

    #[test]
    #[should_panic]
    fn out_of_range() {
        SlotStates::new(1).is_initialized(1);
    }
}
