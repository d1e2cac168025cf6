//! Regression suite for the classic broken double buffer.
//!
//! `SharedIndexBuffer` is the naive design: two slots and one shared "front"
//! index, with each role deriving its slot from that index independently. The
//! reader checks the index and then copies the slot, but those two steps are
//! not one atomic unit, so the writer can flip the index twice in between and
//! land on the very slot being copied.
//!
//! Slots are arrays of relaxed atomics so the race is observable without
//! undefined behaviour: a tear shows up as a frame mixing two write cycles.

#![cfg(not(feature = "loom"))]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use frame_exchange::triple_buffer;

const WORDS: usize = 64;

type Frame = [u64; WORDS];

fn is_uniform(frame: &Frame) -> bool {
    frame.iter().all(|&w| w == frame[0])
}

struct SharedIndexBuffer {
    front: AtomicUsize,
    slots: [[AtomicU64; WORDS]; 2],
}

impl SharedIndexBuffer {
    fn new() -> Self {
        Self {
            front: AtomicUsize::new(0),
            slots: std::array::from_fn(|_| std::array::from_fn(|_| AtomicU64::new(0))),
        }
    }

    /// Writer: fill "the other slot", then make it the front.
    fn publish(&self, value: u64) {
        let back = 1 - self.front.load(Ordering::Acquire);
        for word in &self.slots[back] {
            word.store(value, Ordering::Relaxed);
        }
        self.front.store(back, Ordering::Release);
    }

    /// Reader, step 1: decide which slot is ours.
    fn begin_read(&self) -> usize {
        self.front.load(Ordering::Acquire)
    }

    /// Reader, step 2: copy part of it.
    fn copy_words(&self, slot: usize, range: std::ops::Range<usize>, out: &mut Frame) {
        for i in range {
            out[i] = self.slots[slot][i].load(Ordering::Relaxed);
        }
    }

    fn read(&self, out: &mut Frame) {
        let slot = self.begin_read();
        self.copy_words(slot, 0..WORDS, out);
    }
}

/// The interleaving that breaks the naive buffer, replayed step by step.
#[test]
fn shared_index_tears_under_double_flip() {
    let buffer = SharedIndexBuffer::new();
    buffer.publish(1); // front = slot 1

    let mut frame = [0; WORDS];
    let slot = buffer.begin_read();
    buffer.copy_words(slot, 0..WORDS / 2, &mut frame);

    // Writer runs two cycles while the reader is mid-copy: the first lands in
    // slot 0, the second flips back into the slot being read.
    buffer.publish(2);
    buffer.publish(3);

    buffer.copy_words(slot, WORDS / 2..WORDS, &mut frame);
    assert!(!is_uniform(&frame), "expected a torn frame, got {frame:?}");
    assert_eq!(frame[0], 1);
    assert_eq!(frame[WORDS - 1], 3);
}

/// The same interleaving against the triple buffer: the held frame is
/// untouched by any number of commits.
#[test]
fn triple_buffer_survives_double_flip() {
    let (mut producer, mut consumer) = triple_buffer([0u64; WORDS]);
    producer.publish([1; WORDS]);

    let frame = consumer.read();
    assert!(frame[..WORDS / 2].iter().all(|&w| w == 1));

    producer.publish([2; WORDS]);
    producer.publish([3; WORDS]);

    assert!(frame[WORDS / 2..].iter().all(|&w| w == 1));

    assert_eq!(*consumer.read(), [3; WORDS]);
}

/// Hammer a buffer from two threads for up to `budget`, returning
/// (reads, torn reads). `publish` and `read` are the only differences between
/// the two runs below.
fn stress(
    budget: Duration,
    publish: impl FnMut(u64) + Send + 'static,
    mut read: impl FnMut(&mut Frame),
    stop_on_first_tear: bool,
) -> (u64, u64) {
    let done = Arc::new(AtomicBool::new(false));
    let writer = thread::spawn({
        let done = done.clone();
        let mut publish = publish;
        move || {
            let mut value = 1u64;
            while !done.load(Ordering::Relaxed) {
                publish(value);
                value += 1;
            }
        }
    });

    let start = Instant::now();
    let mut frame = [0u64; WORDS];
    let (mut reads, mut torn) = (0u64, 0u64);
    while start.elapsed() < budget {
        read(&mut frame);
        reads += 1;
        if !is_uniform(&frame) {
            torn += 1;
            if stop_on_first_tear {
                break;
            }
        }
    }

    done.store(true, Ordering::Relaxed);
    writer.join().unwrap();
    (reads, torn)
}

#[test]
fn triple_buffer_stress_has_zero_tears() {
    let (mut producer, mut consumer) = triple_buffer([0u64; WORDS]);
    let (reads, torn) = stress(
        Duration::from_millis(500),
        move |v| {
            producer.write().fill(v);
            producer.commit();
        },
        |out| out.copy_from_slice(consumer.read()),
        false,
    );
    // Even sharing one core with the writer, 500 ms is far more than this.
    assert!(reads >= 10_000, "only {reads} reads");
    assert_eq!(torn, 0, "{torn} torn reads out of {reads}");
}

/// Stops at the first tear, so the budget is only an upper bound.
#[test]
fn shared_index_stress_detects_tears() {
    let buffer = Arc::new(SharedIndexBuffer::new());
    let writer_side = buffer.clone();
    let (reads, torn) = stress(
        Duration::from_secs(10),
        move |v| writer_side.publish(v),
        |out| buffer.read(out),
        true,
    );
    assert!(torn > 0, "no tear detected in {reads} reads");
}
