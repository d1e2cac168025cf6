//! Lock-free triple buffer: latest-value handoff from one producer to one
//! consumer, with in-place payload reuse.
//!
//! Three pre-allocated slots circulate between the two roles. The producer
//! owns one ("back"), the consumer owns one ("front"), and the third is parked
//! in the [`ExchangePoint`]. A slot changes hands only through one atomic swap
//! on that point, so the three indices are always a permutation of {0, 1, 2}
//! and neither role can ever touch a slot the other one owns.
//!
//! ```text
//!   Owned by producer --commit--> parked (dirty) --claim--> Owned by consumer
//!          ^                                                       |
//!          +-------- returned by a later commit <-- parked (clean) +
//! ```
//!
//! Cost: `commit` is one atomic swap. `read` is one atomic load when nothing
//! new arrived, plus one atomic swap when something did. The only heap
//! allocation is the shared block created by [`triple_buffer`].
//!
//! # Example
//!
//! ```
//! # #[cfg(not(feature = "loom"))] {
//! let (mut producer, mut consumer) = frame_exchange::triple_buffer([0u32; 4]);
//!
//! producer.write().fill(7);
//! producer.commit();
//!
//! assert_eq!(*consumer.read(), [7; 4]);
//! // Nothing new: the consumer keeps seeing the last claimed payload.
//! assert_eq!(*consumer.read(), [7; 4]);
//! # }
//! ```

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::exchange_point::{ExchangePoint, SLOT_COUNT, SlotId};
use crate::sync::{AtomicU8, Ordering, UnsafeCell};

/// One payload plus the version of the commit that last filled it.
/// Cache-line aligned so neighbouring slots never share a line.
#[repr(align(64))]
struct Slot<T> {
    cell: UnsafeCell<Stamped<T>>,
}

struct Stamped<T> {
    version: u64,
    payload: T,
}

/// Shared block: three slots, the exchange point, and the handle count.
struct Shared<T> {
    slots: [Slot<T>; SLOT_COUNT],
    exchange: ExchangePoint,
    /// Starts at 2 (producer + consumer). Not on the hot path.
    handles: AtomicU8,
}

/// Producer half of a triple buffer.
///
/// `Send` but neither `Sync` nor `Clone`: exactly one thread can produce.
pub struct Producer<T> {
    shared: NonNull<Shared<T>>,
    back: SlotId,
    committed: u64,
    _marker: PhantomData<T>,
}

/// Consumer half of a triple buffer.
///
/// `Send` but neither `Sync` nor `Clone`: exactly one thread can consume.
pub struct Consumer<T> {
    shared: NonNull<Shared<T>>,
    front: SlotId,
    _marker: PhantomData<T>,
}

// Safety: each half only ever dereferences the slot it owns, plus the shared
// exchange point which is atomic. Ownership of a slot moves between threads
// only through the acquire/release swaps in `ExchangePoint`, so sending a half
// to another thread is sound whenever the payload itself may be sent.
#[expect(unsafe_code)]
unsafe impl<T: Send> Send for Producer<T> {}
#[expect(unsafe_code)]
unsafe impl<T: Send> Send for Consumer<T> {}

/// Create a triple buffer whose three slots start as clones of `initial`.
///
/// A consumer reading before the first commit observes `initial` with
/// version 0.
#[must_use]
pub fn triple_buffer<T: Clone>(initial: T) -> (Producer<T>, Consumer<T>) {
    triple_buffer_with(|| initial.clone())
}

/// Create a triple buffer, calling `init` once per slot.
///
/// ```
/// # #[cfg(not(feature = "loom"))] {
/// let (_producer, mut consumer) =
///     frame_exchange::triple_buffer_with(Vec::<f32>::new);
/// assert!(consumer.read().is_empty());
/// # }
/// ```
#[must_use]
pub fn triple_buffer_with<T>(mut init: impl FnMut() -> T) -> (Producer<T>, Consumer<T>) {
    let slots = std::array::from_fn(|_| Slot {
        cell: UnsafeCell::new(Stamped {
            version: 0,
            payload: init(),
        }),
    });
    // Initial permutation: consumer S0, producer S1, exchange (S2, clean).
    let shared = NonNull::from(Box::leak(Box::new(Shared {
        slots,
        exchange: ExchangePoint::new(SlotId::S2),
        handles: AtomicU8::new(2),
    })));
    let producer = Producer {
        shared,
        back: SlotId::S1,
        committed: 0,
        _marker: PhantomData,
    };
    let consumer = Consumer {
        shared,
        front: SlotId::S0,
        _marker: PhantomData,
    };
    (producer, consumer)
}

impl<T> Shared<T> {
    #[inline]
    fn cell(&self, id: SlotId) -> &UnsafeCell<Stamped<T>> {
        &self.slots[id.index()].cell
    }
}

#[expect(unsafe_code)]
fn release_handle<T>(shared: NonNull<Shared<T>>) {
    // Safety: the block stays allocated until the handle count reaches 0, and
    // this half has not released its handle yet.
    unsafe {
        if shared.as_ref().handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Last half gone: the payloads in all three slots drop with the box.
            drop(Box::from_raw(shared.as_ptr()));
        }
    }
}

impl<T> Producer<T> {
    #[inline]
    #[expect(unsafe_code)]
    fn shared(&self) -> &Shared<T> {
        // Safety: valid for as long as this half exists.
        unsafe { self.shared.as_ref() }
    }

    /// Mutable access to the producer's private slot.
    ///
    /// The slot does not hold the last committed payload (that one now belongs
    /// to the exchange or the consumer). It holds whatever the slot contained
    /// when it was last circulated back, so overwrite every field that matters.
    #[inline]
    #[expect(unsafe_code)]
    pub fn write(&mut self) -> &mut T {
        let cell = self.shared().cell(self.back);
        // Safety: `back` is owned exclusively by the producer until the next
        // commit, and `&mut self` keeps this borrow from outliving it.
        unsafe { cell.with_mut(|p| &mut (*p).payload) }
    }

    /// Publish the back slot and take over the previously parked one.
    ///
    /// Returns `true` if the previously committed payload was never claimed by
    /// the consumer and has been discarded.
    #[inline]
    #[expect(unsafe_code)]
    pub fn commit(&mut self) -> bool {
        self.committed += 1;
        let version = self.committed;
        // Safety: still exclusively owned; the swap below publishes it.
        let stamp = |p: *mut Stamped<T>| unsafe { (*p).version = version };
        self.shared().cell(self.back).with_mut(stamp);
        let previous = self.shared().exchange.commit(self.back);
        self.back = previous.slot;
        previous.dirty
    }

    /// Overwrite the back slot with `value` and commit it.
    #[inline]
    pub fn publish(&mut self, value: T) -> bool {
        *self.write() = value;
        self.commit()
    }

    /// Number of commits made so far. Also the version of the latest commit.
    #[inline]
    #[must_use]
    pub fn committed(&self) -> u64 {
        self.committed
    }

    /// True while the latest commit has not been claimed yet. Diagnostics
    /// only: never gate a commit on it.
    #[must_use]
    pub fn has_unclaimed(&self) -> bool {
        self.shared().exchange.is_dirty()
    }

    /// Returns true if the consumer has been dropped.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.shared().handles.load(Ordering::Relaxed) == 1
    }
}

impl<T> Consumer<T> {
    #[inline]
    #[expect(unsafe_code)]
    fn shared(&self) -> &Shared<T> {
        // Safety: valid for as long as this half exists.
        unsafe { self.shared.as_ref() }
    }

    #[inline]
    #[expect(unsafe_code)]
    fn front(&self) -> &Stamped<T> {
        // Safety: `front` is owned exclusively by the consumer; the producer
        // can only get it back after the consumer swaps it into the exchange,
        // which takes `&mut self` and so ends this borrow first.
        unsafe { self.shared().cell(self.front).with(|p| &*p) }
    }

    /// Claim the newest committed payload, if there is one.
    ///
    /// Returns `false` (and changes nothing) when no commit happened since the
    /// last claim.
    #[inline]
    pub fn update(&mut self) -> bool {
        match self.shared().exchange.try_claim(self.front) {
            Some(newer) => {
                self.front = newer;
                true
            }
            None => false,
        }
    }

    /// The most recently committed payload, or the previous one again if
    /// nothing new was committed since the last read.
    #[inline]
    pub fn read(&mut self) -> &T {
        self.update();
        &self.front().payload
    }

    /// Like [`read`](Self::read), also returning the payload's version (the
    /// producer's commit count when it was published, 0 for the initial value).
    #[inline]
    pub fn read_versioned(&mut self) -> (u64, &T) {
        self.update();
        let stamped = self.front();
        (stamped.version, &stamped.payload)
    }

    /// The payload currently held, without claiming anything new.
    #[inline]
    #[must_use]
    pub fn current(&self) -> &T {
        &self.front().payload
    }

    /// Version of the payload currently held, without claiming anything new.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.front().version
    }

    /// True if a commit is waiting to be claimed. Diagnostics only.
    #[must_use]
    pub fn has_update(&self) -> bool {
        self.shared().exchange.is_dirty()
    }

    /// Returns true if the producer has been dropped.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.shared().handles.load(Ordering::Relaxed) == 1
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        release_handle(self.shared);
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        release_handle(self.shared);
    }
}

impl<T> std::fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("back", &self.back)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

impl<T> std::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("front", &self.front)
            .finish_non_exhaustive()
    }
}

/// Slots held by (producer, consumer, exchange), in that order.
#[cfg(test)]
pub(crate) fn slot_owners<T>(producer: &Producer<T>, consumer: &Consumer<T>) -> [SlotId; 3] {
    let parked = producer.shared().exchange.load().slot;
    [producer.back, consumer.front, parked]
}
