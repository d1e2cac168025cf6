//! Blocking two-slot double buffer.
//!
//! Both slots and the front index sit behind one mutex; a condvar lets the
//! reader sleep until something new arrives. Simpler than the triple buffer
//! and able to wait, but the writer stalls whenever the reader holds its
//! guard, so keep it off any real-time producer path.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, MappedMutexGuard, Mutex, MutexGuard};

struct State<T> {
    slots: [T; 2],
    /// Slot the reader sees. The writer fills the other one.
    front: usize,
    /// A commit happened since the reader last looked.
    fresh: bool,
    version: u64,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

/// Writing half of a [`locked_double_buffer`].
pub struct LockedWriter<T> {
    shared: Arc<Shared<T>>,
}

/// Reading half of a [`locked_double_buffer`].
pub struct LockedReader<T> {
    shared: Arc<Shared<T>>,
    version: u64,
}

/// Create a double buffer whose two slots start as clones of `initial`.
#[must_use]
pub fn locked_double_buffer<T: Clone>(initial: T) -> (LockedWriter<T>, LockedReader<T>) {
    locked_double_buffer_with(|| initial.clone())
}

/// Create a double buffer, calling `init` once per slot.
#[must_use]
pub fn locked_double_buffer_with<T>(
    mut init: impl FnMut() -> T,
) -> (LockedWriter<T>, LockedReader<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            slots: [init(), init()],
            front: 0,
            fresh: false,
            version: 0,
        }),
        ready: Condvar::new(),
    });
    (
        LockedWriter {
            shared: shared.clone(),
        },
        LockedReader { shared, version: 0 },
    )
}

impl<T> LockedWriter<T> {
    /// Lock and borrow the back slot. Holding the guard blocks the reader.
    pub fn write(&mut self) -> MappedMutexGuard<'_, T> {
        MutexGuard::map(self.shared.state.lock(), |s| &mut s.slots[1 - s.front])
    }

    /// Swap the slots and wake a waiting reader. Returns `true` if the reader
    /// never saw the previous commit.
    pub fn commit(&mut self) -> bool {
        let overwrote = {
            let mut s = self.shared.state.lock();
            s.front = 1 - s.front;
            s.version += 1;
            std::mem::replace(&mut s.fresh, true)
        };
        self.shared.ready.notify_one();
        overwrote
    }

    /// Overwrite the back slot with `value` and commit it.
    pub fn publish(&mut self, value: T) -> bool {
        *self.write() = value;
        self.commit()
    }

    /// Returns true if the reader has been dropped.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        Arc::strong_count(&self.shared) == 1
    }
}

impl<T> LockedReader<T> {
    /// Lock and borrow the latest committed slot. Holding the guard blocks the
    /// writer.
    pub fn read(&mut self) -> MappedMutexGuard<'_, T> {
        self.read_versioned().1
    }

    /// Like [`read`](Self::read), also returning the payload's version.
    pub fn read_versioned(&mut self) -> (u64, MappedMutexGuard<'_, T>) {
        let mut s = self.shared.state.lock();
        s.fresh = false;
        self.version = s.version;
        (s.version, MutexGuard::map(s, |s| &mut s.slots[s.front]))
    }

    /// Block until a commit newer than the last read arrives, or `timeout`
    /// elapses. Returns `None` on timeout.
    pub fn wait_read(&mut self, timeout: Duration) -> Option<MappedMutexGuard<'_, T>> {
        let shared = &*self.shared;
        let mut s = shared.state.lock();
        let result = shared.ready.wait_while_for(&mut s, |s| !s.fresh, timeout);
        if result.timed_out() && !s.fresh {
            return None;
        }
        s.fresh = false;
        self.version = s.version;
        Some(MutexGuard::map(s, |s| &mut s.slots[s.front]))
    }

    /// True if a commit arrived since the last read.
    #[must_use]
    pub fn has_update(&self) -> bool {
        self.shared.state.lock().fresh
    }

    /// Version of the payload returned by the last read (0 before any commit).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns true if the writer has been dropped.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        Arc::strong_count(&self.shared) == 1
    }
}
