//! The exchange point: a single atomic byte through which slot ownership moves
//! between the producer and the consumer.
//!
//! The byte packs the index of the slot currently parked in the exchange
//! together with a dirty flag:
//!
//! ```text
//!   bit 7 .. 3   bits 2-1      bit 0
//!   unused       slot index    dirty (1 = committed, not yet claimed)
//! ```
//!
//! Index and flag always travel together. Keeping them in two separate atomics
//! lets the consumer pair a fresh flag with a stale index (or the reverse),
//! which is exactly how a naive double buffer ends up reading a slot the
//! producer is still writing.

use crate::sync::{AtomicU8, Ordering};

/// Number of slots circulating through a triple buffer.
pub const SLOT_COUNT: usize = 3;

const DIRTY: u8 = 1;
const INDEX_SHIFT: u8 = 1;

/// Index of one of the three slots (0, 1 or 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u8);

impl SlotId {
    pub const S0: Self = Self(0);
    pub const S1: Self = Self(1);
    pub const S2: Self = Self(2);

    /// Returns `None` for indices outside `0..SLOT_COUNT`.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < SLOT_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    const fn pack(self, dirty: bool) -> u8 {
        (self.0 << INDEX_SHIFT) | if dirty { DIRTY } else { 0 }
    }
}

/// Decoded value of the exchange point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    /// Slot currently parked in the exchange.
    pub slot: SlotId,
    /// The parked slot holds a committed payload the consumer has not claimed.
    pub dirty: bool,
}

impl Record {
    #[inline]
    const fn unpack(raw: u8) -> Self {
        Self {
            slot: SlotId(raw >> INDEX_SHIFT),
            dirty: raw & DIRTY != 0,
        }
    }
}

/// The single synchronization point of the triple buffer.
///
/// Both operations are one unconditional atomic instruction on the write path
/// (no compare-and-swap, no retry loop), so neither role can be starved or
/// livelocked by the other.
#[derive(Debug)]
#[repr(align(64))]
pub struct ExchangePoint {
    state: AtomicU8,
}

impl ExchangePoint {
    /// A clean exchange holding `initial`.
    #[must_use]
    pub fn new(initial: SlotId) -> Self {
        Self {
            state: AtomicU8::new(initial.pack(false)),
        }
    }

    /// Producer side: park `candidate` as the newest payload and take back
    /// whatever slot was parked before.
    ///
    /// Release publishes every write made into `candidate` before this call.
    /// Acquire pairs with the consumer's release in [`try_claim`], so the
    /// producer's upcoming writes into the returned slot are ordered after the
    /// consumer's last reads of it.
    ///
    /// The returned record's `dirty` flag is set when the previous payload was
    /// never claimed and has just been discarded.
    ///
    /// [`try_claim`]: Self::try_claim
    #[inline]
    pub fn commit(&self, candidate: SlotId) -> Record {
        Record::unpack(self.state.swap(candidate.pack(true), Ordering::AcqRel))
    }

    /// Consumer side: if a newer payload is parked, swap `candidate` in and
    /// return the newer slot. Returns `None` without writing when clean.
    ///
    /// Only the consumer clears the dirty flag, so once the acquire load has
    /// seen it set it stays set until the swap below.
    #[inline]
    pub fn try_claim(&self, candidate: SlotId) -> Option<SlotId> {
        if self.state.load(Ordering::Acquire) & DIRTY == 0 {
            return None;
        }
        let previous = Record::unpack(self.state.swap(candidate.pack(false), Ordering::AcqRel));
        debug_assert!(
            previous.dirty,
            "dirty flag cleared behind the consumer's back"
        );
        Some(previous.slot)
    }

    /// Relaxed peek at the dirty flag. Diagnostics only: the answer may be
    /// stale by the time the caller acts on it.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.load(Ordering::Relaxed) & DIRTY != 0
    }

    /// Current record. Same caveat as [`is_dirty`](Self::is_dirty).
    #[inline]
    #[must_use]
    pub fn load(&self) -> Record {
        Record::unpack(self.state.load(Ordering::Acquire))
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn slot_id_bounds() {
        assert_eq!(SlotId::new(0), Some(SlotId::S0));
        assert_eq!(SlotId::new(2), Some(SlotId::S2));
        assert_eq!(SlotId::new(3), None);
        assert_eq!(SlotId::S1.index(), 1);
    }

    #[test]
    fn starts_clean() {
        let point = ExchangePoint::new(SlotId::S2);
        assert_eq!(
            point.load(),
            Record {
                slot: SlotId::S2,
                dirty: false
            }
        );
        assert!(!point.is_dirty());
    }

    #[test]
    fn claim_on_clean_is_a_no_op() {
        let point = ExchangePoint::new(SlotId::S2);
        assert_eq!(point.try_claim(SlotId::S0), None);
        assert_eq!(point.load().slot, SlotId::S2);
    }

    #[test]
    fn commit_then_claim_moves_ownership() {
        let point = ExchangePoint::new(SlotId::S2);

        let previous = point.commit(SlotId::S1);
        assert_eq!(previous.slot, SlotId::S2);
        assert!(!previous.dirty);
        assert!(point.is_dirty());

        assert_eq!(point.try_claim(SlotId::S0), Some(SlotId::S1));
        assert_eq!(
            point.load(),
            Record {
                slot: SlotId::S0,
                dirty: false
            }
        );
    }

    #[test]
    fn second_commit_reports_overwrite() {
        let point = ExchangePoint::new(SlotId::S2);
        let first = point.commit(SlotId::S1);
        let second = point.commit(first.slot);
        assert!(second.dirty);
        assert_eq!(second.slot, SlotId::S1);
    }
}
