//! Shared test fixtures and helpers.

use crate::exchange_point::{SLOT_COUNT, SlotId};

/// Words per [`Burst`]: large enough that a copy is several stores.
pub(crate) const BURST_WORDS: usize = 16;

/// Payload whose words must all be equal. Any mixture of two write cycles
/// shows up as a non-uniform burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Burst([u64; BURST_WORDS]);

impl Burst {
    pub(crate) fn filled(value: u64) -> Self {
        Self([value; BURST_WORDS])
    }

    pub(crate) fn fill(&mut self, value: u64) {
        self.0.fill(value);
    }

    pub(crate) fn is_uniform(&self) -> bool {
        self.0.iter().all(|&w| w == self.0[0])
    }

    pub(crate) fn value(&self) -> u64 {
        self.0[0]
    }
}

/// Panics unless the three indices are distinct and in range.
pub(crate) fn assert_permutation(ids: [SlotId; SLOT_COUNT]) {
    let mut seen = [false; SLOT_COUNT];
    for id in ids {
        assert!(!seen[id.index()], "slot {id:?} owned twice: {ids:?}");
        seen[id.index()] = true;
    }
}
